//! gRPC service implementation for FiscalReviewService.

#![allow(clippy::result_large_err)]

use crate::error::FiscalError;
use crate::grpc::identity::{extract_actor, require_role};
use crate::grpc::proto::*;
use crate::models::{
    NewReport, NewTransaction, ReportStatus as DomainReportStatus, Role,
    VerdictStatus as DomainVerdictStatus,
};
use crate::services::{record_error, record_grpc_request, FiscalReviewEngine};
use std::str::FromStr;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use uuid::Uuid;

fn parse_uuid(value: &str, field: &str) -> Result<Uuid, Status> {
    Uuid::from_str(value).map_err(|_| Status::invalid_argument(format!("Invalid {}", field)))
}

/// Count the failure and convert it for the wire.
fn fail(method: &str, err: FiscalError) -> Status {
    record_error(err.kind());
    record_grpc_request(method, "error");
    err.into()
}

fn ok<T>(method: &str, body: T) -> Result<Response<T>, Status> {
    record_grpc_request(method, "ok");
    Ok(Response::new(body))
}

/// FiscalReviewService gRPC implementation.
pub struct FiscalReviewServiceImpl {
    engine: Arc<FiscalReviewEngine>,
}

impl FiscalReviewServiceImpl {
    pub fn new(engine: Arc<FiscalReviewEngine>) -> Self {
        Self { engine }
    }
}

#[tonic::async_trait]
impl fiscal_review_service_server::FiscalReviewService for FiscalReviewServiceImpl {
    // =========================================================================
    // Report Administration
    // =========================================================================

    async fn create_report(
        &self,
        request: Request<CreateReportRequest>,
    ) -> Result<Response<CreateReportResponse>, Status> {
        let actor = require_role(&request, &[Role::Admin])?;
        let req = request.into_inner();

        let transactions = req
            .transactions
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                NewTransaction::from_proto(line)
                    .map_err(|e| Status::invalid_argument(format!("Line {}: {}", i, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let input = NewReport {
            title: req.title,
            competence_period: req.competence_period,
            account_type: req.account_type,
            transactions,
        };

        let (report, transactions) = self
            .engine
            .create_report(&actor, input)
            .await
            .map_err(|e| fail("create_report", e))?;

        ok(
            "create_report",
            CreateReportResponse {
                report: Some(report.into()),
                transactions: transactions.into_iter().map(Into::into).collect(),
            },
        )
    }

    async fn update_report_status(
        &self,
        request: Request<UpdateReportStatusRequest>,
    ) -> Result<Response<UpdateReportStatusResponse>, Status> {
        let actor = require_role(&request, &[Role::Admin])?;
        let req = request.into_inner();
        let report_id = parse_uuid(&req.report_id, "report_id")?;
        let status = DomainReportStatus::from_proto(req.status)
            .ok_or_else(|| Status::invalid_argument("Report status must be specified"))?;

        let report = self
            .engine
            .set_report_status(&actor, report_id, status)
            .await
            .map_err(|e| fail("update_report_status", e))?;

        ok(
            "update_report_status",
            UpdateReportStatusResponse {
                report: Some(report.into()),
            },
        )
    }

    async fn delete_report(
        &self,
        request: Request<DeleteReportRequest>,
    ) -> Result<Response<DeleteReportResponse>, Status> {
        let actor = require_role(&request, &[Role::Admin])?;
        let report_id = parse_uuid(&request.get_ref().report_id, "report_id")?;

        self.engine
            .delete_report(&actor, report_id)
            .await
            .map_err(|e| fail("delete_report", e))?;

        ok("delete_report", DeleteReportResponse {})
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    async fn get_report(
        &self,
        request: Request<GetReportRequest>,
    ) -> Result<Response<GetReportResponse>, Status> {
        extract_actor(&request)?;
        let report_id = parse_uuid(&request.get_ref().report_id, "report_id")?;

        let overview = self
            .engine
            .get_report_overview(report_id)
            .await
            .map_err(|e| fail("get_report", e))?;

        ok(
            "get_report",
            GetReportResponse {
                overview: Some(overview.into()),
            },
        )
    }

    async fn list_reports(
        &self,
        request: Request<ListReportsRequest>,
    ) -> Result<Response<ListReportsResponse>, Status> {
        extract_actor(&request)?;
        let status = match request.get_ref().status_filter {
            None | Some(0) => None,
            Some(value) => Some(
                DomainReportStatus::from_proto(value)
                    .ok_or_else(|| Status::invalid_argument("Invalid status_filter"))?,
            ),
        };

        let reports = self
            .engine
            .list_report_overviews(status)
            .await
            .map_err(|e| fail("list_reports", e))?;

        ok(
            "list_reports",
            ListReportsResponse {
                reports: reports.into_iter().map(Into::into).collect(),
            },
        )
    }

    async fn list_transactions(
        &self,
        request: Request<ListTransactionsRequest>,
    ) -> Result<Response<ListTransactionsResponse>, Status> {
        extract_actor(&request)?;
        let report_id = parse_uuid(&request.get_ref().report_id, "report_id")?;

        let transactions = self
            .engine
            .list_transactions(report_id)
            .await
            .map_err(|e| fail("list_transactions", e))?;

        ok(
            "list_transactions",
            ListTransactionsResponse {
                transactions: transactions.into_iter().map(Into::into).collect(),
            },
        )
    }

    async fn list_reviews(
        &self,
        request: Request<ListReviewsRequest>,
    ) -> Result<Response<ListReviewsResponse>, Status> {
        extract_actor(&request)?;
        let req = request.into_inner();
        let report_id = parse_uuid(&req.report_id, "report_id")?;
        let transaction_id = req
            .transaction_id
            .as_deref()
            .map(|t| parse_uuid(t, "transaction_id"))
            .transpose()?;

        let reviews = self
            .engine
            .list_reviews(report_id, transaction_id)
            .await
            .map_err(|e| fail("list_reviews", e))?;

        ok(
            "list_reviews",
            ListReviewsResponse {
                reviews: reviews.into_iter().map(Into::into).collect(),
            },
        )
    }

    async fn list_diligences(
        &self,
        request: Request<ListDiligencesRequest>,
    ) -> Result<Response<ListDiligencesResponse>, Status> {
        extract_actor(&request)?;
        let report_id = parse_uuid(&request.get_ref().report_id, "report_id")?;

        let diligences = self
            .engine
            .diligences(report_id)
            .await
            .map_err(|e| fail("list_diligences", e))?;

        ok(
            "list_diligences",
            ListDiligencesResponse {
                diligences: diligences.into_values().map(Into::into).collect(),
            },
        )
    }

    async fn list_signatures(
        &self,
        request: Request<ListSignaturesRequest>,
    ) -> Result<Response<ListSignaturesResponse>, Status> {
        extract_actor(&request)?;
        let report_id = parse_uuid(&request.get_ref().report_id, "report_id")?;

        let sets = self
            .engine
            .signatures(report_id)
            .await
            .map_err(|e| fail("list_signatures", e))?;

        ok(
            "list_signatures",
            ListSignaturesResponse {
                fiscal_signatures: sets.fiscal.into_iter().map(Into::into).collect(),
                treasurer_signature: sets.treasurer.map(Into::into),
            },
        )
    }

    async fn get_sign_off_state(
        &self,
        request: Request<GetSignOffStateRequest>,
    ) -> Result<Response<GetSignOffStateResponse>, Status> {
        extract_actor(&request)?;
        let report_id = parse_uuid(&request.get_ref().report_id, "report_id")?;

        let overview = self
            .engine
            .sign_off_state(report_id)
            .await
            .map_err(|e| fail("get_sign_off_state", e))?;

        ok(
            "get_sign_off_state",
            GetSignOffStateResponse {
                summary: Some(overview.summary.into()),
                sign_off: Some(overview.sign_off.into()),
            },
        )
    }

    // =========================================================================
    // Review
    // =========================================================================

    async fn record_verdict(
        &self,
        request: Request<RecordVerdictRequest>,
    ) -> Result<Response<RecordVerdictResponse>, Status> {
        let actor = require_role(&request, &[Role::Fiscal])?;
        let req = request.into_inner();
        let report_id = parse_uuid(&req.report_id, "report_id")?;
        let transaction_id = parse_uuid(&req.transaction_id, "transaction_id")?;
        let status = DomainVerdictStatus::from_proto(req.status)
            .ok_or_else(|| Status::invalid_argument("Verdict must be approved or divergent"))?;

        let review = self
            .engine
            .record_verdict(&actor, report_id, transaction_id, status, req.observation)
            .await
            .map_err(|e| fail("record_verdict", e))?;

        ok(
            "record_verdict",
            RecordVerdictResponse {
                review: Some(review.into()),
            },
        )
    }

    async fn confirm_diligence(
        &self,
        request: Request<ConfirmDiligenceRequest>,
    ) -> Result<Response<ConfirmDiligenceResponse>, Status> {
        let actor = require_role(&request, &[Role::Fiscal])?;
        let req = request.into_inner();
        let report_id = parse_uuid(&req.report_id, "report_id")?;
        let transaction_id = parse_uuid(&req.transaction_id, "transaction_id")?;

        let review = self
            .engine
            .confirm_diligence(&actor, report_id, transaction_id)
            .await
            .map_err(|e| fail("confirm_diligence", e))?;

        ok(
            "confirm_diligence",
            ConfirmDiligenceResponse {
                review: Some(review.into()),
            },
        )
    }

    // =========================================================================
    // Sign-off
    // =========================================================================

    async fn sign_report(
        &self,
        request: Request<SignReportRequest>,
    ) -> Result<Response<SignReportResponse>, Status> {
        let actor = require_role(&request, &[Role::Fiscal, Role::Treasurer])?;
        let role = actor
            .signer_role()
            .ok_or_else(|| Status::permission_denied("Caller cannot sign reports"))?;
        let req = request.into_inner();
        let report_id = parse_uuid(&req.report_id, "report_id")?;

        let signature = self
            .engine
            .sign_report(&actor, role, report_id, req.signature_image)
            .await
            .map_err(|e| fail("sign_report", e))?;

        ok(
            "sign_report",
            SignReportResponse {
                signature: Some(signature.into()),
            },
        )
    }

    async fn finalize_report(
        &self,
        request: Request<FinalizeReportRequest>,
    ) -> Result<Response<FinalizeReportResponse>, Status> {
        let actor = require_role(&request, &[Role::Treasurer])?;
        let report_id = parse_uuid(&request.get_ref().report_id, "report_id")?;

        let report = self
            .engine
            .finalize_report(&actor, report_id)
            .await
            .map_err(|e| fail("finalize_report", e))?;

        ok(
            "finalize_report",
            FinalizeReportResponse {
                report: Some(report.into()),
            },
        )
    }
}
