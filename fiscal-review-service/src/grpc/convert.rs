//! Conversions from derived engine state to protobuf messages.

use crate::consensus::{Blocker, DiligenceInfo, GateEvaluation, ReportSummary, SignOffState};
use crate::grpc::proto;
use crate::models::datetime_to_timestamp;
use crate::services::ReportOverview;

fn count(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

impl From<ReportSummary> for proto::ReportSummary {
    fn from(s: ReportSummary) -> Self {
        Self {
            total_transactions: count(s.total_transactions),
            approved_transactions: count(s.approved_transactions),
            pending_transactions: count(s.pending_transactions),
            diligence_count: count(s.diligence_count),
            confirmed_diligences: count(s.confirmed_diligences),
            all_diligences_confirmed: s.all_diligences_confirmed,
            signature_count: count(s.signature_count),
            is_finished: s.is_finished,
            has_final_pdf: s.has_final_pdf,
        }
    }
}

impl From<SignOffState> for proto::SignOffState {
    fn from(s: SignOffState) -> Self {
        match s {
            SignOffState::Open => Self::Open,
            SignOffState::ReadyForSignatures => Self::ReadyForSignatures,
            SignOffState::ReadyForFinal => Self::ReadyForFinal,
            SignOffState::Finalized => Self::Finalized,
        }
    }
}

impl From<Blocker> for proto::Blocker {
    fn from(b: Blocker) -> Self {
        let (kind, n) = match b {
            Blocker::PendingTransactions(n) => (proto::BlockerKind::PendingTransactions, n),
            Blocker::MissingFiscalSignatures(n) => (proto::BlockerKind::MissingFiscalSignatures, n),
            Blocker::UnconfirmedDiligences(n) => (proto::BlockerKind::UnconfirmedDiligences, n),
            Blocker::MissingTreasurerSignature => (proto::BlockerKind::MissingTreasurerSignature, 1),
            Blocker::ReportLocked => (proto::BlockerKind::ReportLocked, 0),
            Blocker::AlreadyFinalized => (proto::BlockerKind::AlreadyFinalized, 0),
        };
        Self {
            kind: kind.into(),
            count: count(n),
        }
    }
}

impl From<GateEvaluation> for proto::SignOffEvaluation {
    fn from(g: GateEvaluation) -> Self {
        Self {
            state: proto::SignOffState::from(g.state).into(),
            locked: g.locked,
            treasurer_signed: g.treasurer_signed,
            can_finalize: g.can_finalize,
            blockers: g.blockers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<DiligenceInfo> for proto::DiligenceInfo {
    fn from(d: DiligenceInfo) -> Self {
        Self {
            confirmed: d.is_confirmed(),
            transaction_id: d.transaction_id.to_string(),
            is_diligence: d.is_diligence,
            ack_count: count(d.ack_count),
            reviewer_count: count(d.reviewer_count),
            reason: d.reason,
            opened_by: d.opened_by,
            opened_utc: d.opened_utc.map(datetime_to_timestamp),
            opener_name: d.opener_name,
        }
    }
}

impl From<ReportOverview> for proto::ReportOverview {
    fn from(o: ReportOverview) -> Self {
        Self {
            report: Some(o.report.into()),
            summary: Some(o.summary.into()),
            sign_off: Some(o.sign_off.into()),
        }
    }
}
