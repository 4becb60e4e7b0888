//! Review model: one reviewer's verdict on one transaction.

use super::datetime_to_timestamp;
use crate::grpc::proto;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Approved,
    Divergent,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Divergent => "divergent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(Self::Approved),
            "divergent" => Some(Self::Divergent),
            _ => None,
        }
    }

    /// Convert from proto enum value.
    pub fn from_proto(value: i32) -> Option<Self> {
        match proto::VerdictStatus::try_from(value).ok()? {
            proto::VerdictStatus::Approved => Some(Self::Approved),
            proto::VerdictStatus::Divergent => Some(Self::Divergent),
            proto::VerdictStatus::Unspecified => None,
        }
    }
}

impl From<VerdictStatus> for proto::VerdictStatus {
    fn from(s: VerdictStatus) -> Self {
        match s {
            VerdictStatus::Approved => Self::Approved,
            VerdictStatus::Divergent => Self::Divergent,
        }
    }
}

/// At most one row exists per (report, transaction, reviewer).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub report_id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: String,
    pub status: VerdictStatus,
    pub observation: Option<String>,
    /// "I acknowledge this transaction is under diligence."
    pub diligence_ack: bool,
    pub diligence_opened_by: Option<String>,
    pub diligence_opened_utc: Option<DateTime<Utc>>,
    pub diligence_opener_name: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Review {
    pub fn is_divergent(&self) -> bool {
        self.status == VerdictStatus::Divergent
    }
}

impl From<Review> for proto::Review {
    fn from(r: Review) -> Self {
        Self {
            report_id: r.report_id.to_string(),
            transaction_id: r.transaction_id.to_string(),
            user_id: r.user_id,
            status: proto::VerdictStatus::from(r.status).into(),
            observation: r.observation,
            diligence_ack: r.diligence_ack,
            diligence_opened_by: r.diligence_opened_by,
            diligence_opened_utc: r.diligence_opened_utc.map(datetime_to_timestamp),
            diligence_opener_name: r.diligence_opener_name,
            created_utc: Some(datetime_to_timestamp(r.created_utc)),
            updated_utc: Some(datetime_to_timestamp(r.updated_utc)),
        }
    }
}

/// A verdict as submitted by a reviewer.
#[derive(Debug, Clone, Validate)]
pub struct VerdictInput {
    pub report_id: Uuid,
    pub transaction_id: Uuid,
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(length(max = 200))]
    pub display_name: Option<String>,
    pub status: VerdictStatus,
    #[validate(length(max = 2000))]
    pub observation: Option<String>,
}

impl VerdictInput {
    /// Observation with surrounding whitespace removed; blank counts as absent.
    pub fn trimmed_observation(&self) -> Option<String> {
        self.observation
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
    }
}
