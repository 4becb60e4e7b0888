//! Ledger lines imported from a bank statement.

use crate::grpc::proto;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Entry direction (credit or debit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    /// Convert from proto enum value.
    pub fn from_proto(value: i32) -> Option<Self> {
        match proto::Direction::try_from(value).ok()? {
            proto::Direction::Credit => Some(Self::Credit),
            proto::Direction::Debit => Some(Self::Debit),
            proto::Direction::Unspecified => None,
        }
    }

    /// Convert to proto enum value.
    pub fn to_proto(self) -> i32 {
        match self {
            Self::Credit => proto::Direction::Credit as i32,
            Self::Debit => proto::Direction::Debit as i32,
        }
    }

    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(Self::Credit),
            "debit" => Some(Self::Debit),
            _ => None,
        }
    }
}

/// One bank-statement line. Never mutated once imported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub report_id: Uuid,
    /// Position in the original statement.
    pub entry_index: i32,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: Direction,
}

impl From<Transaction> for proto::Transaction {
    fn from(t: Transaction) -> Self {
        Self {
            transaction_id: t.transaction_id.to_string(),
            report_id: t.report_id.to_string(),
            entry_index: t.entry_index,
            transaction_date: t.transaction_date.to_string(),
            description: t.description,
            amount: t.amount.to_string(),
            direction: t.direction.to_proto(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewTransaction {
    pub transaction_date: NaiveDate,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub amount: Decimal,
    pub direction: Direction,
}

impl NewTransaction {
    /// Parse a statement line received over gRPC.
    pub fn from_proto(input: proto::TransactionInput) -> Result<Self, String> {
        let transaction_date = NaiveDate::parse_from_str(&input.transaction_date, "%Y-%m-%d")
            .map_err(|_| format!("Invalid transaction_date: {}", input.transaction_date))?;
        let amount = Decimal::from_str(&input.amount)
            .map_err(|_| format!("Invalid amount: {}", input.amount))?;
        let direction = Direction::from_proto(input.direction)
            .ok_or_else(|| "Transaction direction must be credit or debit".to_string())?;

        Ok(Self {
            transaction_date,
            description: input.description,
            amount,
            direction,
        })
    }
}
