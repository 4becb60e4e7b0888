//! Persistence contract for reports, ledger lines, reviews and signatures.

use crate::error::FiscalError;
use crate::models::{
    NewReport, Report, ReportStatus, Review, Signature, SignatureInput, SignerRole, Transaction,
    VerdictInput,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Outcome of a verdict write.
#[derive(Debug, Clone)]
pub struct VerdictOutcome {
    pub review: Review,
    pub opened_diligence: bool,
    /// Other reviewers whose acknowledgement was reset.
    pub acks_reset: u64,
}

/// Storage backend of the engine.
///
/// Implementations must enforce, atomically:
/// - one review per (report, transaction, reviewer);
/// - one signature per (report, user) whatever the role, and a single
///   treasurer signature per report, rejecting duplicates with
///   `FiscalError::DuplicateSignature`;
/// - no review or signature write against a finished report
///   (`FiscalError::ReportImmutable`) or a locked one
///   (`FiscalError::ReportLocked`);
/// - finished is terminal: no status change ever leaves it.
#[async_trait]
pub trait FiscalStore: Send + Sync {
    async fn health_check(&self) -> Result<(), FiscalError>;

    /// Create a report and its ledger lines; `entry_index` follows input order.
    async fn create_report(&self, input: &NewReport) -> Result<(Report, Vec<Transaction>), FiscalError>;

    async fn get_report(&self, report_id: Uuid) -> Result<Option<Report>, FiscalError>;

    async fn list_reports(&self, status: Option<ReportStatus>) -> Result<Vec<Report>, FiscalError>;

    /// Set an administrative status. Returns `None` for an unknown report and
    /// `FiscalError::ReportImmutable` for a finished one.
    async fn update_report_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
    ) -> Result<Option<Report>, FiscalError>;

    /// Delete a report with all its lines, reviews and signatures.
    async fn delete_report(&self, report_id: Uuid) -> Result<bool, FiscalError>;

    /// Ledger lines ordered by `entry_index`.
    async fn list_transactions(&self, report_id: Uuid) -> Result<Vec<Transaction>, FiscalError>;

    async fn list_reviews(
        &self,
        report_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> Result<Vec<Review>, FiscalError>;

    /// Upsert the caller's verdict and, when it opens a diligence, reset the
    /// acknowledgement of every other reviewer of the transaction.
    async fn record_verdict(&self, input: &VerdictInput) -> Result<VerdictOutcome, FiscalError>;

    /// Set the caller's own acknowledgement, creating an approval if needed.
    async fn confirm_diligence(
        &self,
        report_id: Uuid,
        transaction_id: Uuid,
        user_id: &str,
    ) -> Result<Review, FiscalError>;

    async fn insert_signature(&self, input: &SignatureInput) -> Result<Signature, FiscalError>;

    async fn list_signatures(
        &self,
        report_id: Uuid,
        role: Option<SignerRole>,
    ) -> Result<Vec<Signature>, FiscalError>;

    /// Re-evaluate the sign-off gate against the current rows and, in the
    /// same atomic unit, flip the report to finished with its document URL.
    ///
    /// Fails with `ReportNotFound`, `ReportImmutable`, `ReportLocked` or
    /// `QuorumNotReached` and leaves the report untouched.
    async fn mark_finalized(&self, report_id: Uuid, pdf_url: &str) -> Result<Report, FiscalError>;
}
