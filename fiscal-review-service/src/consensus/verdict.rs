//! Write rules of the review store.
//!
//! Both store backends call these planners inside their atomic write so the
//! upsert of the caller's row and the ack reset of the other reviewers land
//! together.

use crate::models::{Review, VerdictInput, VerdictStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The row to upsert for a verdict, plus its side effect on other reviewers.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictPlan {
    pub review: Review,
    /// The reviewer moved from absent/approved to divergent.
    pub opens_diligence: bool,
}

impl VerdictPlan {
    /// Other reviewers of the transaction must re-acknowledge.
    pub fn resets_other_acks(&self) -> bool {
        self.opens_diligence
    }
}

pub fn plan_verdict(existing: Option<&Review>, input: &VerdictInput, now: DateTime<Utc>) -> VerdictPlan {
    let was_divergent = existing.is_some_and(Review::is_divergent);
    let opens_diligence = input.status == VerdictStatus::Divergent && !was_divergent;

    let mut review = existing.cloned().unwrap_or_else(|| {
        blank_review(input.report_id, input.transaction_id, &input.user_id, now)
    });
    review.status = input.status;
    review.observation = input.trimmed_observation();
    review.updated_utc = now;

    if opens_diligence {
        // The opener acknowledges their own flag.
        review.diligence_ack = true;
        review.diligence_opened_by = Some(input.user_id.clone());
        review.diligence_opened_utc = Some(now);
        review.diligence_opener_name = input.display_name.clone();
    }

    VerdictPlan {
        review,
        opens_diligence,
    }
}

/// Acknowledge a diligence without touching the reviewer's own verdict.
/// A reviewer with no row yet is recorded as approving.
pub fn plan_confirmation(
    existing: Option<&Review>,
    report_id: Uuid,
    transaction_id: Uuid,
    user_id: &str,
    now: DateTime<Utc>,
) -> Review {
    let mut review = existing
        .cloned()
        .unwrap_or_else(|| blank_review(report_id, transaction_id, user_id, now));
    review.diligence_ack = true;
    review.updated_utc = now;
    review
}

fn blank_review(report_id: Uuid, transaction_id: Uuid, user_id: &str, now: DateTime<Utc>) -> Review {
    Review {
        report_id,
        transaction_id,
        user_id: user_id.to_string(),
        status: VerdictStatus::Approved,
        observation: None,
        diligence_ack: false,
        diligence_opened_by: None,
        diligence_opened_utc: None,
        diligence_opener_name: None,
        created_utc: now,
        updated_utc: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input(status: VerdictStatus, observation: Option<&str>) -> VerdictInput {
        VerdictInput {
            report_id: Uuid::nil(),
            transaction_id: Uuid::from_u128(7),
            user_id: "ana".to_string(),
            display_name: Some("Ana Souza".to_string()),
            status,
            observation: observation.map(String::from),
        }
    }

    #[test]
    fn first_approval_creates_unacknowledged_row() {
        let now = Utc::now();
        let plan = plan_verdict(None, &input(VerdictStatus::Approved, None), now);

        assert!(!plan.opens_diligence);
        assert!(!plan.resets_other_acks());
        assert_eq!(plan.review.status, VerdictStatus::Approved);
        assert!(!plan.review.diligence_ack);
        assert_eq!(plan.review.created_utc, now);
    }

    #[test]
    fn first_divergence_stamps_opener_and_self_acks() {
        let now = Utc::now();
        let plan = plan_verdict(
            None,
            &input(VerdictStatus::Divergent, Some("  receipt missing ")),
            now,
        );

        assert!(plan.opens_diligence);
        assert!(plan.resets_other_acks());
        assert!(plan.review.diligence_ack);
        assert_eq!(plan.review.diligence_opened_by.as_deref(), Some("ana"));
        assert_eq!(plan.review.diligence_opened_utc, Some(now));
        assert_eq!(plan.review.diligence_opener_name.as_deref(), Some("Ana Souza"));
        assert_eq!(plan.review.observation.as_deref(), Some("receipt missing"));
    }

    #[test]
    fn approval_turning_divergent_opens_diligence() {
        let earlier = Utc::now() - Duration::minutes(5);
        let approved = plan_verdict(None, &input(VerdictStatus::Approved, None), earlier).review;

        let now = Utc::now();
        let plan = plan_verdict(
            Some(&approved),
            &input(VerdictStatus::Divergent, Some("duplicate charge")),
            now,
        );

        assert!(plan.opens_diligence);
        assert_eq!(plan.review.created_utc, earlier);
        assert_eq!(plan.review.updated_utc, now);
    }

    #[test]
    fn repeated_divergence_keeps_original_stamps() {
        let first_at = Utc::now() - Duration::hours(1);
        let first = plan_verdict(
            None,
            &input(VerdictStatus::Divergent, Some("first note")),
            first_at,
        )
        .review;

        let plan = plan_verdict(
            Some(&first),
            &input(VerdictStatus::Divergent, Some("clarified note")),
            Utc::now(),
        );

        assert!(!plan.opens_diligence);
        assert_eq!(plan.review.diligence_opened_utc, Some(first_at));
        assert_eq!(plan.review.observation.as_deref(), Some("clarified note"));
    }

    #[test]
    fn approval_does_not_touch_ack_or_stamps() {
        let flagged = plan_verdict(
            None,
            &input(VerdictStatus::Divergent, Some("check")),
            Utc::now(),
        )
        .review;

        let plan = plan_verdict(Some(&flagged), &input(VerdictStatus::Approved, None), Utc::now());

        assert!(!plan.resets_other_acks());
        assert_eq!(plan.review.status, VerdictStatus::Approved);
        assert!(plan.review.diligence_ack);
        assert_eq!(plan.review.diligence_opened_by.as_deref(), Some("ana"));
    }

    #[test]
    fn confirmation_without_row_records_approval() {
        let review = plan_confirmation(None, Uuid::nil(), Uuid::from_u128(7), "bia", Utc::now());

        assert_eq!(review.status, VerdictStatus::Approved);
        assert!(review.diligence_ack);
        assert_eq!(review.user_id, "bia");
    }

    #[test]
    fn confirmation_keeps_existing_verdict() {
        let flagged = plan_verdict(
            None,
            &input(VerdictStatus::Divergent, Some("check")),
            Utc::now(),
        )
        .review;
        let mut reset = flagged.clone();
        reset.diligence_ack = false;

        let review = plan_confirmation(
            Some(&reset),
            reset.report_id,
            reset.transaction_id,
            "ana",
            Utc::now(),
        );

        assert_eq!(review.status, VerdictStatus::Divergent);
        assert!(review.diligence_ack);
        assert_eq!(review.observation.as_deref(), Some("check"));
    }
}
