//! Report model: the unit a fiscal panel reviews and signs off.

use super::{datetime_to_timestamp, NewTransaction};
use crate::grpc::proto;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Administrative status persisted on the report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Locked,
    Finished,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Locked => "locked",
            Self::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "locked" => Some(Self::Locked),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }

    /// Convert from proto enum value.
    pub fn from_proto(value: i32) -> Option<Self> {
        match proto::ReportStatus::try_from(value).ok()? {
            proto::ReportStatus::Open => Some(Self::Open),
            proto::ReportStatus::Locked => Some(Self::Locked),
            proto::ReportStatus::Finished => Some(Self::Finished),
            proto::ReportStatus::Unspecified => None,
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ReportStatus> for proto::ReportStatus {
    fn from(s: ReportStatus) -> Self {
        match s {
            ReportStatus::Open => Self::Open,
            ReportStatus::Locked => Self::Locked,
            ReportStatus::Finished => Self::Finished,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub report_id: Uuid,
    pub title: String,
    pub competence_period: String,
    pub account_type: String,
    pub status: ReportStatus,
    /// Number of statement lines at creation time.
    pub total_entries: i32,
    pub pdf_url: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Report {
    pub fn is_finished(&self) -> bool {
        self.status == ReportStatus::Finished
    }

    pub fn is_locked(&self) -> bool {
        self.status == ReportStatus::Locked
    }

    pub fn has_final_pdf(&self) -> bool {
        self.pdf_url.is_some()
    }
}

impl From<Report> for proto::Report {
    fn from(r: Report) -> Self {
        Self {
            report_id: r.report_id.to_string(),
            title: r.title,
            competence_period: r.competence_period,
            account_type: r.account_type,
            status: proto::ReportStatus::from(r.status).into(),
            total_entries: r.total_entries,
            pdf_url: r.pdf_url,
            created_utc: Some(datetime_to_timestamp(r.created_utc)),
            updated_utc: Some(datetime_to_timestamp(r.updated_utc)),
        }
    }
}

/// A statement sent for review, with its parsed lines in statement order.
#[derive(Debug, Clone, Validate)]
pub struct NewReport {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 50))]
    pub competence_period: String,
    #[validate(length(min = 1, max = 50))]
    pub account_type: String,
    #[validate(length(min = 1, max = 10000))]
    pub transactions: Vec<NewTransaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn report_with(transactions: Vec<NewTransaction>) -> NewReport {
        NewReport {
            title: "June statement".to_string(),
            competence_period: "2025-06".to_string(),
            account_type: "checking".to_string(),
            transactions,
        }
    }

    #[test]
    fn report_needs_at_least_one_line() {
        let errors = report_with(vec![]).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("transactions"));
    }

    #[test]
    fn report_with_lines_is_valid() {
        let line = NewTransaction {
            transaction_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            description: "Card payment".to_string(),
            amount: Decimal::new(4250, 2),
            direction: Direction::Debit,
        };
        assert!(report_with(vec![line]).validate().is_ok());
    }
}
