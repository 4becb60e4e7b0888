//! Diligence resolver: which transactions are contested, and whether the
//! panel has acknowledged the contest.

use super::PANEL_QUORUM;
use crate::models::Review;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Per-transaction diligence state, keyed by transaction id.
pub type DiligenceMap = BTreeMap<Uuid, DiligenceInfo>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiligenceInfo {
    pub transaction_id: Uuid,
    /// At least one reviewer currently holds a divergent verdict.
    pub is_diligence: bool,
    pub ack_count: u32,
    pub reviewer_count: u32,
    /// Observation of the most recently updated divergent verdict.
    pub reason: Option<String>,
    pub opened_by: Option<String>,
    pub opened_utc: Option<DateTime<Utc>>,
    pub opener_name: Option<String>,
}

impl DiligenceInfo {
    pub fn is_confirmed(&self) -> bool {
        self.is_diligence && self.ack_count >= PANEL_QUORUM
    }
}

/// Group review rows by transaction and derive each transaction's diligence
/// state. Transactions without any review are absent from the map.
pub fn resolve_diligences(reviews: &[Review]) -> DiligenceMap {
    let mut grouped: BTreeMap<Uuid, Vec<&Review>> = BTreeMap::new();
    for review in reviews {
        grouped.entry(review.transaction_id).or_default().push(review);
    }

    grouped
        .into_iter()
        .map(|(transaction_id, rows)| (transaction_id, resolve_one(transaction_id, &rows)))
        .collect()
}

fn resolve_one(transaction_id: Uuid, rows: &[&Review]) -> DiligenceInfo {
    let reviewers: BTreeSet<&str> = rows.iter().map(|r| r.user_id.as_str()).collect();
    let ack_count = rows.iter().filter(|r| r.diligence_ack).count() as u32;

    let divergent: Vec<&Review> = rows.iter().copied().filter(|r| r.is_divergent()).collect();

    let reason = divergent
        .iter()
        .max_by(|a, b| {
            a.updated_utc
                .cmp(&b.updated_utc)
                .then_with(|| b.user_id.cmp(&a.user_id))
        })
        .and_then(|r| r.observation.clone());

    let opener = divergent
        .iter()
        .filter(|r| r.diligence_opened_utc.is_some())
        .min_by(|a, b| {
            a.diligence_opened_utc
                .cmp(&b.diligence_opened_utc)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

    DiligenceInfo {
        transaction_id,
        is_diligence: !divergent.is_empty(),
        ack_count,
        reviewer_count: reviewers.len() as u32,
        reason,
        opened_by: opener.and_then(|r| r.diligence_opened_by.clone()),
        opened_utc: opener.and_then(|r| r.diligence_opened_utc),
        opener_name: opener.and_then(|r| r.diligence_opener_name.clone()),
    }
}
