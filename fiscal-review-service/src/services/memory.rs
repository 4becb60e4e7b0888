//! In-process store backend.
//!
//! Every write takes the single state lock, so multi-row effects (verdict
//! upsert plus ack reset, cascade delete) are applied as one unit.

use crate::consensus::{check_finalizable, plan_confirmation, plan_verdict};
use crate::error::FiscalError;
use crate::models::{
    NewReport, Report, ReportStatus, Review, Signature, SignatureInput, SignerRole, Transaction,
    VerdictInput,
};
use crate::services::store::{FiscalStore, VerdictOutcome};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

type ReviewKey = (Uuid, Uuid, String);

#[derive(Default)]
struct MemoryState {
    reports: HashMap<Uuid, Report>,
    transactions: HashMap<Uuid, Transaction>,
    reviews: BTreeMap<ReviewKey, Review>,
    signatures: Vec<Signature>,
}

impl MemoryState {
    fn ensure_writable(&self, report_id: Uuid) -> Result<(), FiscalError> {
        match self.reports.get(&report_id) {
            None => Err(FiscalError::ReportNotFound(report_id)),
            Some(report) if report.is_finished() => Err(FiscalError::ReportImmutable(report_id)),
            Some(report) if report.is_locked() => Err(FiscalError::ReportLocked(report_id)),
            Some(_) => Ok(()),
        }
    }

    fn ensure_in_report(&self, report_id: Uuid, transaction_id: Uuid) -> Result<(), FiscalError> {
        match self.transactions.get(&transaction_id) {
            Some(t) if t.report_id == report_id => Ok(()),
            _ => Err(FiscalError::TransactionNotInReport {
                report_id,
                transaction_id,
            }),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FiscalStore for MemoryStore {
    async fn health_check(&self) -> Result<(), FiscalError> {
        Ok(())
    }

    async fn create_report(&self, input: &NewReport) -> Result<(Report, Vec<Transaction>), FiscalError> {
        let now = Utc::now();
        let report = Report {
            report_id: Uuid::new_v4(),
            title: input.title.clone(),
            competence_period: input.competence_period.clone(),
            account_type: input.account_type.clone(),
            status: ReportStatus::Open,
            total_entries: input.transactions.len() as i32,
            pdf_url: None,
            created_utc: now,
            updated_utc: now,
        };

        let transactions: Vec<Transaction> = input
            .transactions
            .iter()
            .enumerate()
            .map(|(index, line)| Transaction {
                transaction_id: Uuid::new_v4(),
                report_id: report.report_id,
                entry_index: index as i32,
                transaction_date: line.transaction_date,
                description: line.description.clone(),
                amount: line.amount,
                direction: line.direction,
            })
            .collect();

        let mut state = self.state.write().await;
        state.reports.insert(report.report_id, report.clone());
        for transaction in &transactions {
            state
                .transactions
                .insert(transaction.transaction_id, transaction.clone());
        }

        Ok((report, transactions))
    }

    async fn get_report(&self, report_id: Uuid) -> Result<Option<Report>, FiscalError> {
        Ok(self.state.read().await.reports.get(&report_id).cloned())
    }

    async fn list_reports(&self, status: Option<ReportStatus>) -> Result<Vec<Report>, FiscalError> {
        let state = self.state.read().await;
        let mut reports: Vec<Report> = state
            .reports
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        reports.sort_by(|a, b| {
            b.created_utc
                .cmp(&a.created_utc)
                .then_with(|| a.report_id.cmp(&b.report_id))
        });
        Ok(reports)
    }

    async fn update_report_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
    ) -> Result<Option<Report>, FiscalError> {
        let mut state = self.state.write().await;
        match state.reports.get_mut(&report_id) {
            None => Ok(None),
            Some(report) if report.is_finished() => Err(FiscalError::ReportImmutable(report_id)),
            Some(report) => {
                report.status = status;
                report.updated_utc = Utc::now();
                Ok(Some(report.clone()))
            }
        }
    }

    async fn delete_report(&self, report_id: Uuid) -> Result<bool, FiscalError> {
        let mut state = self.state.write().await;
        if state.reports.remove(&report_id).is_none() {
            return Ok(false);
        }
        state.transactions.retain(|_, t| t.report_id != report_id);
        state.reviews.retain(|(r, _, _), _| *r != report_id);
        state.signatures.retain(|s| s.report_id != report_id);
        Ok(true)
    }

    async fn list_transactions(&self, report_id: Uuid) -> Result<Vec<Transaction>, FiscalError> {
        let state = self.state.read().await;
        let mut transactions: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.report_id == report_id)
            .cloned()
            .collect();
        transactions.sort_by_key(|t| t.entry_index);
        Ok(transactions)
    }

    async fn list_reviews(
        &self,
        report_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> Result<Vec<Review>, FiscalError> {
        let state = self.state.read().await;
        Ok(state
            .reviews
            .values()
            .filter(|r| r.report_id == report_id)
            .filter(|r| transaction_id.is_none_or(|t| r.transaction_id == t))
            .cloned()
            .collect())
    }

    async fn record_verdict(&self, input: &VerdictInput) -> Result<VerdictOutcome, FiscalError> {
        let mut state = self.state.write().await;
        state.ensure_writable(input.report_id)?;
        state.ensure_in_report(input.report_id, input.transaction_id)?;

        let key = (input.report_id, input.transaction_id, input.user_id.clone());
        let plan = plan_verdict(state.reviews.get(&key), input, Utc::now());

        let mut acks_reset = 0;
        if plan.resets_other_acks() {
            for review in state.reviews.values_mut().filter(|r| {
                r.report_id == input.report_id
                    && r.transaction_id == input.transaction_id
                    && r.user_id != input.user_id
                    && r.diligence_ack
            }) {
                review.diligence_ack = false;
                acks_reset += 1;
            }
        }

        state.reviews.insert(key, plan.review.clone());

        Ok(VerdictOutcome {
            review: plan.review,
            opened_diligence: plan.opens_diligence,
            acks_reset,
        })
    }

    async fn confirm_diligence(
        &self,
        report_id: Uuid,
        transaction_id: Uuid,
        user_id: &str,
    ) -> Result<Review, FiscalError> {
        let mut state = self.state.write().await;
        state.ensure_writable(report_id)?;
        state.ensure_in_report(report_id, transaction_id)?;

        let key = (report_id, transaction_id, user_id.to_string());
        let review = plan_confirmation(
            state.reviews.get(&key),
            report_id,
            transaction_id,
            user_id,
            Utc::now(),
        );
        state.reviews.insert(key, review.clone());
        Ok(review)
    }

    async fn insert_signature(&self, input: &SignatureInput) -> Result<Signature, FiscalError> {
        let mut state = self.state.write().await;
        state.ensure_writable(input.report_id)?;

        let duplicate = state.signatures.iter().any(|s| {
            s.report_id == input.report_id
                && (s.user_id == input.user_id
                    || (s.role == SignerRole::Treasurer && input.role == SignerRole::Treasurer))
        });
        if duplicate {
            return Err(FiscalError::DuplicateSignature {
                report_id: input.report_id,
                user_id: input.user_id.clone(),
            });
        }

        let signature = Signature {
            signature_id: Uuid::new_v4(),
            report_id: input.report_id,
            user_id: input.user_id.clone(),
            role: input.role,
            display_name: input.display_name.clone(),
            signature_image: input.signature_image.clone(),
            created_utc: Utc::now(),
        };
        state.signatures.push(signature.clone());
        Ok(signature)
    }

    async fn list_signatures(
        &self,
        report_id: Uuid,
        role: Option<SignerRole>,
    ) -> Result<Vec<Signature>, FiscalError> {
        let state = self.state.read().await;
        Ok(state
            .signatures
            .iter()
            .filter(|s| s.report_id == report_id)
            .filter(|s| role.is_none_or(|r| s.role == r))
            .cloned()
            .collect())
    }

    async fn mark_finalized(&self, report_id: Uuid, pdf_url: &str) -> Result<Report, FiscalError> {
        let mut state = self.state.write().await;
        let report = state
            .reports
            .get(&report_id)
            .ok_or(FiscalError::ReportNotFound(report_id))?;

        let reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| r.report_id == report_id)
            .cloned()
            .collect();
        let signatures: Vec<Signature> = state
            .signatures
            .iter()
            .filter(|s| s.report_id == report_id)
            .cloned()
            .collect();
        check_finalizable(report, &reviews, &signatures)?;

        let report = state
            .reports
            .get_mut(&report_id)
            .ok_or(FiscalError::ReportNotFound(report_id))?;
        report.status = ReportStatus::Finished;
        report.pdf_url = Some(pdf_url.to_string());
        report.updated_utc = Utc::now();
        Ok(report.clone())
    }
}
