//! Report progress aggregator.

use super::{resolve_diligences, PANEL_QUORUM, REQUIRED_FISCAL_SIGNATURES};
use crate::models::{Report, Review, Signature, SignerRole};
use serde::Serialize;
use std::collections::BTreeSet;

/// Per-report counters, recomputed from scratch on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_transactions: u32,
    /// Transactions with verdicts from at least `PANEL_QUORUM` distinct
    /// reviewers, whatever the verdict mix.
    pub approved_transactions: u32,
    pub pending_transactions: u32,
    pub diligence_count: u32,
    pub confirmed_diligences: u32,
    pub all_diligences_confirmed: bool,
    /// Distinct fiscal signers.
    pub signature_count: u32,
    pub is_finished: bool,
    pub has_final_pdf: bool,
}

pub fn aggregate(report: &Report, reviews: &[Review], signatures: &[Signature]) -> ReportSummary {
    let diligences = resolve_diligences(reviews);

    let total_transactions = report.total_entries.max(0) as u32;
    let approved_transactions = diligences
        .values()
        .filter(|d| d.reviewer_count >= PANEL_QUORUM)
        .count() as u32;
    let pending_transactions = total_transactions.saturating_sub(approved_transactions);

    let diligence_count = diligences.values().filter(|d| d.is_diligence).count() as u32;
    let confirmed_diligences = diligences.values().filter(|d| d.is_confirmed()).count() as u32;
    let all_diligences_confirmed =
        diligence_count == 0 || diligence_count == confirmed_diligences;

    let signature_count = signatures
        .iter()
        .filter(|s| s.role == SignerRole::Fiscal)
        .map(|s| s.user_id.as_str())
        .collect::<BTreeSet<_>>()
        .len() as u32;

    // Finalization is a ratchet: a finished report stays finished.
    let is_finished = report.is_finished()
        || (pending_transactions == 0
            && signature_count >= REQUIRED_FISCAL_SIGNATURES
            && all_diligences_confirmed);

    ReportSummary {
        total_transactions,
        approved_transactions,
        pending_transactions,
        diligence_count,
        confirmed_diligences,
        all_diligences_confirmed,
        signature_count,
        is_finished,
        has_final_pdf: report.has_final_pdf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportStatus, VerdictStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn report(total: i32, status: ReportStatus) -> Report {
        Report {
            report_id: Uuid::nil(),
            title: "March".to_string(),
            competence_period: "2025-03".to_string(),
            account_type: "checking".to_string(),
            status,
            total_entries: total,
            pdf_url: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn review(tx: u128, user: &str, status: VerdictStatus, ack: bool) -> Review {
        Review {
            report_id: Uuid::nil(),
            transaction_id: Uuid::from_u128(tx),
            user_id: user.to_string(),
            status,
            observation: None,
            diligence_ack: ack,
            diligence_opened_by: None,
            diligence_opened_utc: None,
            diligence_opener_name: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn signature(user: &str, role: SignerRole) -> Signature {
        Signature {
            signature_id: Uuid::new_v4(),
            report_id: Uuid::nil(),
            user_id: user.to_string(),
            role,
            display_name: user.to_uppercase(),
            signature_image: vec![1, 2, 3],
            created_utc: Utc::now(),
        }
    }

    fn panel_approves(tx: u128) -> Vec<Review> {
        ["a", "b", "c"]
            .iter()
            .map(|u| review(tx, u, VerdictStatus::Approved, false))
            .collect()
    }

    #[test]
    fn empty_report_has_everything_pending() {
        let summary = aggregate(&report(4, ReportStatus::Open), &[], &[]);

        assert_eq!(summary.approved_transactions, 0);
        assert_eq!(summary.pending_transactions, 4);
        assert!(summary.all_diligences_confirmed);
        assert!(!summary.is_finished);
    }

    #[test]
    fn quorum_counts_distinct_reviewers_not_verdicts() {
        let mut reviews = panel_approves(1);
        reviews[0].status = VerdictStatus::Divergent;
        reviews.push(review(2, "a", VerdictStatus::Approved, false));
        reviews.push(review(2, "b", VerdictStatus::Approved, false));

        let summary = aggregate(&report(2, ReportStatus::Open), &reviews, &[]);

        assert_eq!(summary.approved_transactions, 1);
        assert_eq!(summary.pending_transactions, 1);
        assert_eq!(summary.diligence_count, 1);
        assert_eq!(summary.confirmed_diligences, 0);
        assert!(!summary.all_diligences_confirmed);
    }

    #[test]
    fn treasurer_signature_is_not_a_panel_signature() {
        let signatures = vec![
            signature("a", SignerRole::Fiscal),
            signature("b", SignerRole::Fiscal),
            signature("t", SignerRole::Treasurer),
        ];
        let summary = aggregate(&report(1, ReportStatus::Open), &panel_approves(1), &signatures);

        assert_eq!(summary.signature_count, 2);
        assert!(!summary.is_finished);
    }

    #[test]
    fn duplicate_signers_counted_once() {
        let signatures = vec![
            signature("a", SignerRole::Fiscal),
            signature("a", SignerRole::Fiscal),
        ];
        let summary = aggregate(&report(1, ReportStatus::Open), &[], &signatures);

        assert_eq!(summary.signature_count, 1);
    }

    #[test]
    fn complete_panel_marks_report_finished_in_summary() {
        let signatures = vec![
            signature("a", SignerRole::Fiscal),
            signature("b", SignerRole::Fiscal),
            signature("c", SignerRole::Fiscal),
        ];
        let summary = aggregate(&report(1, ReportStatus::Open), &panel_approves(1), &signatures);

        assert_eq!(summary.pending_transactions, 0);
        assert!(summary.is_finished);
        assert!(!summary.has_final_pdf);
    }

    #[test]
    fn finished_status_short_circuits() {
        let summary = aggregate(&report(3, ReportStatus::Finished), &[], &[]);

        assert_eq!(summary.pending_transactions, 3);
        assert!(summary.is_finished);
    }

    #[test]
    fn ten_confirmed_and_one_open_diligence_is_not_all_confirmed() {
        let mut reviews = Vec::new();
        for tx in 0..11u128 {
            let mut rows = vec![
                review(tx, "a", VerdictStatus::Divergent, true),
                review(tx, "b", VerdictStatus::Approved, true),
                review(tx, "c", VerdictStatus::Approved, true),
            ];
            if tx == 10 {
                rows[2].diligence_ack = false;
            }
            reviews.extend(rows);
        }

        let summary = aggregate(&report(11, ReportStatus::Open), &reviews, &[]);

        assert_eq!(summary.diligence_count, 11);
        assert_eq!(summary.confirmed_diligences, 10);
        assert!(!summary.all_diligences_confirmed);
    }

    #[test]
    fn aggregation_is_repeatable() {
        let reviews = panel_approves(1);
        let signatures = vec![signature("a", SignerRole::Fiscal)];
        let report = report(2, ReportStatus::Open);

        assert_eq!(
            aggregate(&report, &reviews, &signatures),
            aggregate(&report, &reviews, &signatures)
        );
    }
}
