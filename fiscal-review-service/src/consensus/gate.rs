//! Sign-off gate: OPEN → READY_FOR_SIGNATURES → READY_FOR_FINAL → FINALIZED.
//!
//! LOCKED is orthogonal. A locked report keeps its computed state but cannot
//! be finalized until an administrator reopens it.

use super::{aggregate, ReportSummary, REQUIRED_FISCAL_SIGNATURES};
use crate::error::FiscalError;
use crate::models::{Report, Review, Signature, SignerRole};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOffState {
    Open,
    ReadyForSignatures,
    ReadyForFinal,
    Finalized,
}

impl SignOffState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::ReadyForSignatures => "ready_for_signatures",
            Self::ReadyForFinal => "ready_for_final",
            Self::Finalized => "finalized",
        }
    }
}

/// An unmet finalization precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum Blocker {
    PendingTransactions(u32),
    MissingFiscalSignatures(u32),
    UnconfirmedDiligences(u32),
    MissingTreasurerSignature,
    ReportLocked,
    AlreadyFinalized,
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingTransactions(n) => write!(f, "{} transaction(s) pending review", n),
            Self::MissingFiscalSignatures(n) => write!(f, "{} fiscal signature(s) missing", n),
            Self::UnconfirmedDiligences(n) => write!(f, "{} diligence(s) unconfirmed", n),
            Self::MissingTreasurerSignature => write!(f, "treasurer signature missing"),
            Self::ReportLocked => write!(f, "report is locked"),
            Self::AlreadyFinalized => write!(f, "report already finalized"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateEvaluation {
    pub state: SignOffState,
    pub locked: bool,
    pub treasurer_signed: bool,
    /// The finalize action may be offered.
    pub can_finalize: bool,
    pub blockers: Vec<Blocker>,
}

impl GateEvaluation {
    /// Precondition check performed before any finalization work.
    pub fn ensure_finalizable(&self, report: &Report) -> Result<(), FiscalError> {
        if self.state == SignOffState::Finalized {
            return Err(FiscalError::ReportImmutable(report.report_id));
        }
        if self.locked {
            return Err(FiscalError::ReportLocked(report.report_id));
        }
        if !self.can_finalize {
            return Err(FiscalError::QuorumNotReached(self.blockers.clone()));
        }
        Ok(())
    }
}

pub fn evaluate_gate(report: &Report, summary: &ReportSummary, treasurer_signed: bool) -> GateEvaluation {
    let locked = report.is_locked();

    if report.is_finished() {
        return GateEvaluation {
            state: SignOffState::Finalized,
            locked,
            treasurer_signed,
            can_finalize: false,
            blockers: vec![Blocker::AlreadyFinalized],
        };
    }

    let signatures_complete = summary.signature_count >= REQUIRED_FISCAL_SIGNATURES;

    let state = if summary.pending_transactions > 0 {
        SignOffState::Open
    } else if signatures_complete && summary.all_diligences_confirmed && !summary.has_final_pdf {
        SignOffState::ReadyForFinal
    } else {
        SignOffState::ReadyForSignatures
    };

    let mut blockers = Vec::new();
    if summary.pending_transactions > 0 {
        blockers.push(Blocker::PendingTransactions(summary.pending_transactions));
    }
    if !signatures_complete {
        blockers.push(Blocker::MissingFiscalSignatures(
            REQUIRED_FISCAL_SIGNATURES - summary.signature_count,
        ));
    }
    if !summary.all_diligences_confirmed {
        blockers.push(Blocker::UnconfirmedDiligences(
            summary.diligence_count - summary.confirmed_diligences,
        ));
    }
    if !treasurer_signed {
        blockers.push(Blocker::MissingTreasurerSignature);
    }
    if locked {
        blockers.push(Blocker::ReportLocked);
    }
    if summary.has_final_pdf {
        blockers.push(Blocker::AlreadyFinalized);
    }

    GateEvaluation {
        state,
        locked,
        treasurer_signed,
        can_finalize: state == SignOffState::ReadyForFinal && treasurer_signed && !locked,
        blockers,
    }
}

/// Gate check over rows read inside the finalizing write.
pub fn check_finalizable(
    report: &Report,
    reviews: &[Review],
    signatures: &[Signature],
) -> Result<(), FiscalError> {
    let summary = aggregate(report, reviews, signatures);
    let treasurer_signed = signatures.iter().any(|s| s.role == SignerRole::Treasurer);
    evaluate_gate(report, &summary, treasurer_signed).ensure_finalizable(report)
}
