//! Error taxonomy of the review and sign-off engine.

use crate::consensus::Blocker;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FiscalError {
    #[error("You already signed report {report_id}")]
    DuplicateSignature { report_id: Uuid, user_id: String },

    #[error("Report {0} is finished and can no longer be changed")]
    ReportImmutable(Uuid),

    #[error("Report {0} is locked by an administrator")]
    ReportLocked(Uuid),

    #[error("Report is not ready for finalization: {}", format_blockers(.0))]
    QuorumNotReached(Vec<Blocker>),

    #[error("Transaction {transaction_id} does not belong to report {report_id}")]
    TransactionNotInReport { report_id: Uuid, transaction_id: Uuid },

    #[error("Final document could not be emitted: {0}")]
    ArtifactEmissionFailure(anyhow::Error),

    #[error("Report {0} not found")]
    ReportNotFound(Uuid),

    #[error("Invalid verdict: {0}")]
    InvalidVerdict(String),

    #[error("Invalid status transition: {0}")]
    InvalidStatusTransition(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(anyhow::Error),
}

fn format_blockers(blockers: &[Blocker]) -> String {
    blockers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl FiscalError {
    /// Short label used for the error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateSignature { .. } => "duplicate_signature",
            Self::ReportImmutable(_) => "report_immutable",
            Self::ReportLocked(_) => "report_locked",
            Self::QuorumNotReached(_) => "quorum_not_reached",
            Self::TransactionNotInReport { .. } => "transaction_not_in_report",
            Self::ArtifactEmissionFailure(_) => "artifact_emission_failure",
            Self::ReportNotFound(_) => "report_not_found",
            Self::InvalidVerdict(_) => "invalid_verdict",
            Self::InvalidStatusTransition(_) => "invalid_status_transition",
            Self::Validation(_) => "validation",
            Self::Database(_) => "database",
        }
    }
}

impl From<FiscalError> for AppError {
    fn from(err: FiscalError) -> Self {
        match err {
            FiscalError::DuplicateSignature { .. } => {
                AppError::Conflict(anyhow::anyhow!("{}", err))
            }
            FiscalError::ReportImmutable(_)
            | FiscalError::ReportLocked(_)
            | FiscalError::QuorumNotReached(_)
            | FiscalError::InvalidStatusTransition(_) => {
                AppError::PreconditionFailed(anyhow::anyhow!("{}", err))
            }
            FiscalError::TransactionNotInReport { .. } | FiscalError::InvalidVerdict(_) => {
                AppError::BadRequest(anyhow::anyhow!("{}", err))
            }
            FiscalError::Validation(errors) => AppError::ValidationError(errors),
            FiscalError::ReportNotFound(_) => AppError::NotFound(anyhow::anyhow!("{}", err)),
            FiscalError::ArtifactEmissionFailure(cause) => {
                AppError::BadGateway(format!("final document emission failed: {}", cause))
            }
            FiscalError::Database(cause) => AppError::DatabaseError(cause),
        }
    }
}

impl From<FiscalError> for tonic::Status {
    fn from(err: FiscalError) -> Self {
        AppError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn duplicate_signature_is_already_exists() {
        let status: tonic::Status = FiscalError::DuplicateSignature {
            report_id: Uuid::nil(),
            user_id: "u-1".to_string(),
        }
        .into();
        assert_eq!(status.code(), Code::AlreadyExists);
        assert!(status.message().contains("already signed"));
    }

    #[test]
    fn quorum_not_reached_lists_blockers() {
        let err = FiscalError::QuorumNotReached(vec![
            Blocker::PendingTransactions(2),
            Blocker::MissingTreasurerSignature,
        ]);
        let status: tonic::Status = err.into();
        assert_eq!(status.code(), Code::FailedPrecondition);
        assert!(status.message().contains("2 transaction(s) pending"));
        assert!(status.message().contains("treasurer"));
    }

    #[test]
    fn emission_failure_is_retryable() {
        let status: tonic::Status =
            FiscalError::ArtifactEmissionFailure(anyhow::anyhow!("disk full")).into();
        assert_eq!(status.code(), Code::Unavailable);
    }
}
