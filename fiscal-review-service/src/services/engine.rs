//! Review and sign-off orchestration.
//!
//! The engine loads rows from the store, derives progress and gate state with
//! the pure consensus functions, and drives finalization. Role checks belong
//! to the caller; every operation receives the acting user explicitly.

use crate::consensus::{
    aggregate, evaluate_gate, resolve_diligences, DiligenceMap, GateEvaluation, ReportSummary,
};
use crate::error::FiscalError;
use crate::models::{
    Actor, NewReport, Report, ReportStatus, Review, Signature, SignatureInput, SignerRole,
    Transaction, VerdictInput, VerdictStatus,
};
use crate::services::finalization::{EmittedArtifact, FinalizationEmitter, FinalizationPacket};
use crate::services::metrics;
use crate::services::store::FiscalStore;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// A report with its freshly derived progress and gate state.
#[derive(Debug, Clone)]
pub struct ReportOverview {
    pub report: Report,
    pub summary: ReportSummary,
    pub sign_off: GateEvaluation,
}

#[derive(Debug, Clone, Default)]
pub struct SignatureSets {
    pub fiscal: Vec<Signature>,
    pub treasurer: Option<Signature>,
}

impl SignatureSets {
    fn split(signatures: Vec<Signature>) -> Self {
        let mut sets = Self::default();
        for signature in signatures {
            match signature.role {
                SignerRole::Fiscal => sets.fiscal.push(signature),
                SignerRole::Treasurer => {
                    sets.treasurer.get_or_insert(signature);
                }
            }
        }
        sets
    }
}

#[derive(Clone)]
pub struct FiscalReviewEngine {
    store: Arc<dyn FiscalStore>,
    emitter: Arc<dyn FinalizationEmitter>,
}

impl FiscalReviewEngine {
    pub fn new(store: Arc<dyn FiscalStore>, emitter: Arc<dyn FinalizationEmitter>) -> Self {
        Self { store, emitter }
    }

    async fn require_report(&self, report_id: Uuid) -> Result<Report, FiscalError> {
        self.store
            .get_report(report_id)
            .await?
            .ok_or(FiscalError::ReportNotFound(report_id))
    }

    /// Reject review and signature writes against finished or locked reports.
    async fn require_writable(&self, report_id: Uuid) -> Result<Report, FiscalError> {
        let report = self.require_report(report_id).await?;
        if report.is_finished() {
            return Err(FiscalError::ReportImmutable(report_id));
        }
        if report.is_locked() {
            return Err(FiscalError::ReportLocked(report_id));
        }
        Ok(report)
    }

    async fn overview_of(&self, report: Report) -> Result<ReportOverview, FiscalError> {
        let reviews = self.store.list_reviews(report.report_id, None).await?;
        let signatures = SignatureSets::split(self.store.list_signatures(report.report_id, None).await?);

        let summary = aggregate(&report, &reviews, &signatures.fiscal);
        let sign_off = evaluate_gate(&report, &summary, signatures.treasurer.is_some());

        Ok(ReportOverview {
            report,
            summary,
            sign_off,
        })
    }

    // =========================================================================
    // Report administration
    // =========================================================================

    #[instrument(skip(self, actor, input), fields(user_id = %actor.user_id, lines = input.transactions.len()))]
    pub async fn create_report(
        &self,
        actor: &Actor,
        input: NewReport,
    ) -> Result<(Report, Vec<Transaction>), FiscalError> {
        input.validate()?;
        for line in &input.transactions {
            line.validate()?;
        }

        let (report, transactions) = self.store.create_report(&input).await?;

        info!(
            report_id = %report.report_id,
            total_entries = report.total_entries,
            "Report opened for review"
        );
        Ok((report, transactions))
    }

    #[instrument(skip(self))]
    pub async fn get_report_overview(&self, report_id: Uuid) -> Result<ReportOverview, FiscalError> {
        let report = self.require_report(report_id).await?;
        self.overview_of(report).await
    }

    #[instrument(skip(self))]
    pub async fn list_report_overviews(
        &self,
        status: Option<ReportStatus>,
    ) -> Result<Vec<ReportOverview>, FiscalError> {
        let reports = self.store.list_reports(status).await?;
        let mut overviews = Vec::with_capacity(reports.len());
        for report in reports {
            overviews.push(self.overview_of(report).await?);
        }
        Ok(overviews)
    }

    /// Lock or reopen a report. Finished is only reached through finalization.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn set_report_status(
        &self,
        actor: &Actor,
        report_id: Uuid,
        status: ReportStatus,
    ) -> Result<Report, FiscalError> {
        if status == ReportStatus::Finished {
            return Err(FiscalError::InvalidStatusTransition(
                "reports are finished by finalization only".to_string(),
            ));
        }

        let current = self.require_report(report_id).await?;
        if current.is_finished() {
            return Err(FiscalError::ReportImmutable(report_id));
        }
        if current.status == status {
            return Ok(current);
        }

        let report = self
            .store
            .update_report_status(report_id, status)
            .await?
            .ok_or(FiscalError::ReportNotFound(report_id))?;

        info!(from = %current.status, to = %report.status, "Report status changed");
        Ok(report)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn delete_report(&self, actor: &Actor, report_id: Uuid) -> Result<(), FiscalError> {
        if !self.store.delete_report(report_id).await? {
            return Err(FiscalError::ReportNotFound(report_id));
        }
        info!("Report deleted");
        Ok(())
    }

    // =========================================================================
    // Ledger and review reads
    // =========================================================================

    pub async fn list_transactions(&self, report_id: Uuid) -> Result<Vec<Transaction>, FiscalError> {
        self.require_report(report_id).await?;
        self.store.list_transactions(report_id).await
    }

    pub async fn list_reviews(
        &self,
        report_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> Result<Vec<Review>, FiscalError> {
        self.require_report(report_id).await?;
        self.store.list_reviews(report_id, transaction_id).await
    }

    #[instrument(skip(self))]
    pub async fn diligences(&self, report_id: Uuid) -> Result<DiligenceMap, FiscalError> {
        self.require_report(report_id).await?;
        let reviews = self.store.list_reviews(report_id, None).await?;
        Ok(resolve_diligences(&reviews))
    }

    // =========================================================================
    // Verdicts
    // =========================================================================

    #[instrument(
        skip(self, actor, observation),
        fields(user_id = %actor.user_id, status = status.as_str())
    )]
    pub async fn record_verdict(
        &self,
        actor: &Actor,
        report_id: Uuid,
        transaction_id: Uuid,
        status: VerdictStatus,
        observation: Option<String>,
    ) -> Result<Review, FiscalError> {
        let input = VerdictInput {
            report_id,
            transaction_id,
            user_id: actor.user_id.clone(),
            display_name: actor.display_name.clone(),
            status,
            observation,
        };
        input.validate()?;
        if status == VerdictStatus::Divergent && input.trimmed_observation().is_none() {
            return Err(FiscalError::InvalidVerdict(
                "a divergent verdict requires an observation".to_string(),
            ));
        }

        self.require_writable(report_id).await?;
        let outcome = self.store.record_verdict(&input).await?;

        metrics::record_verdict(status.as_str());
        if outcome.opened_diligence {
            metrics::record_diligence_event("opened");
            info!(
                acks_reset = outcome.acks_reset,
                "Diligence opened; other reviewers must re-acknowledge"
            );
        }

        Ok(outcome.review)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn confirm_diligence(
        &self,
        actor: &Actor,
        report_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Review, FiscalError> {
        self.require_writable(report_id).await?;
        let review = self
            .store
            .confirm_diligence(report_id, transaction_id, &actor.user_id)
            .await?;

        metrics::record_diligence_event("confirmed");
        info!("Diligence acknowledged");
        Ok(review)
    }

    // =========================================================================
    // Signatures
    // =========================================================================

    #[instrument(
        skip(self, actor, signature_image),
        fields(user_id = %actor.user_id, role = role.as_str())
    )]
    pub async fn sign_report(
        &self,
        actor: &Actor,
        role: SignerRole,
        report_id: Uuid,
        signature_image: Vec<u8>,
    ) -> Result<Signature, FiscalError> {
        let input = SignatureInput {
            report_id,
            user_id: actor.user_id.clone(),
            role,
            display_name: actor.name().to_string(),
            signature_image,
        };
        input.validate()?;

        self.require_writable(report_id).await?;
        match self.store.insert_signature(&input).await {
            Ok(signature) => {
                metrics::record_signature(role.as_str(), "recorded");
                info!(signature_id = %signature.signature_id, "Report signed");
                Ok(signature)
            }
            Err(err @ FiscalError::DuplicateSignature { .. }) => {
                metrics::record_signature(role.as_str(), "duplicate");
                warn!("Duplicate signature rejected");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn signatures(&self, report_id: Uuid) -> Result<SignatureSets, FiscalError> {
        self.require_report(report_id).await?;
        Ok(SignatureSets::split(
            self.store.list_signatures(report_id, None).await?,
        ))
    }

    // =========================================================================
    // Sign-off
    // =========================================================================

    pub async fn sign_off_state(&self, report_id: Uuid) -> Result<ReportOverview, FiscalError> {
        self.get_report_overview(report_id).await
    }

    /// Emit the final declaration and mark the report finished.
    ///
    /// Nothing is written unless the gate is open. The report is only marked
    /// finished after the artifact is stored, and the store checks the gate
    /// again atomically with that write; if it refuses, the artifact is
    /// discarded again.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn finalize_report(&self, actor: &Actor, report_id: Uuid) -> Result<Report, FiscalError> {
        let report = self.require_report(report_id).await?;
        let reviews = self.store.list_reviews(report_id, None).await?;
        let signatures = SignatureSets::split(self.store.list_signatures(report_id, None).await?);

        let summary = aggregate(&report, &reviews, &signatures.fiscal);
        let gate = evaluate_gate(&report, &summary, signatures.treasurer.is_some());
        if let Err(err) = gate.ensure_finalizable(&report) {
            metrics::record_finalization("rejected");
            return Err(err);
        }
        let Some(treasurer_signature) = signatures.treasurer else {
            metrics::record_finalization("rejected");
            return Err(FiscalError::QuorumNotReached(gate.blockers));
        };

        let packet = FinalizationPacket {
            transactions: self.store.list_transactions(report_id).await?,
            diligences: resolve_diligences(&reviews),
            report,
            summary,
            reviews,
            fiscal_signatures: signatures.fiscal,
            treasurer_signature,
        };

        let artifact = match self.emitter.emit(&packet).await {
            Ok(artifact) => artifact,
            Err(e) => {
                metrics::record_finalization("emission_failed");
                warn!(error = %e, "Final declaration could not be emitted");
                return Err(FiscalError::ArtifactEmissionFailure(e));
            }
        };

        match self.store.mark_finalized(report_id, &artifact.url).await {
            Ok(finished) => {
                metrics::record_finalization("finalized");
                info!(
                    pdf_url = %artifact.url,
                    digest = %artifact.digest,
                    "Report finalized"
                );
                Ok(finished)
            }
            Err(err @ FiscalError::ReportImmutable(_)) => {
                // Finished concurrently: the winner's report points at the
                // same key, so the artifact stays.
                metrics::record_finalization("conflict");
                warn!("Report was finalized concurrently");
                Err(err)
            }
            Err(err) => {
                let outcome = match err {
                    FiscalError::QuorumNotReached(_)
                    | FiscalError::ReportLocked(_)
                    | FiscalError::ReportNotFound(_) => "rejected",
                    _ => "status_write_failed",
                };
                metrics::record_finalization(outcome);
                warn!(error = %err, "Report changed during finalization");
                self.discard(&artifact).await;
                Err(err)
            }
        }
    }

    async fn discard(&self, artifact: &EmittedArtifact) {
        match self.emitter.discard(artifact).await {
            Ok(()) => warn!(key = %artifact.key, "Final declaration discarded"),
            Err(e) => warn!(key = %artifact.key, error = %e, "Failed to discard final declaration"),
        }
    }
}
