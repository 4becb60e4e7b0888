//! Common test utilities for fiscal-review-service integration tests.

#![allow(dead_code)]

use fiscal_review_service::config::{ArtifactConfig, FiscalConfig, StoreBackend};
use fiscal_review_service::grpc::proto::fiscal_review_service_client::FiscalReviewServiceClient;
use fiscal_review_service::grpc::proto::*;
use fiscal_review_service::services::{FiscalStore, MemoryStore};
use fiscal_review_service::startup::Application;
use service_core::config::Config as CommonConfig;
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tonic::transport::Channel;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,fiscal_review_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config(artifacts: &TempDir) -> FiscalConfig {
    FiscalConfig {
        common: CommonConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        service_name: "fiscal-review-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        store_backend: StoreBackend::Memory,
        database: None,
        artifacts: ArtifactConfig {
            storage_path: artifacts.path().to_path_buf(),
            public_base_url: Some("https://files.test".to_string()),
        },
    }
}

/// Test application wrapper.
pub struct TestApp {
    pub grpc_client: FiscalReviewServiceClient<Channel>,
    pub http_address: String,
    pub http_port: u16,
    pub grpc_port: u16,
    pub artifacts: TempDir,
}

/// Spawn a test application on the in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_store(Arc::new(MemoryStore::new())).await
}

/// Spawn a test application around the given store.
pub async fn spawn_app_with_store(store: Arc<dyn FiscalStore>) -> TestApp {
    init_tracing();

    let artifacts = tempfile::tempdir().expect("Failed to create artifact dir");
    let app = Application::build_with_store(test_config(&artifacts), store)
        .await
        .expect("Failed to build application");

    let http_port = app.http_port();
    let grpc_port = app.grpc_port();
    let grpc_addr = format!("http://127.0.0.1:{}", grpc_port);

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let grpc_client = {
        let mut attempts = 0;
        loop {
            match FiscalReviewServiceClient::connect(grpc_addr.clone()).await {
                Ok(client) => break client,
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                }
                Err(e) => panic!("Failed to connect gRPC client after 20 attempts: {}", e),
            }
        }
    };

    TestApp {
        grpc_client,
        http_address: format!("http://127.0.0.1:{}", http_port),
        http_port,
        grpc_port,
        artifacts,
    }
}

/// Attach trusted identity metadata, as the gateway would.
pub fn as_user<T>(request: T, user_id: &str, role: &str) -> tonic::Request<T> {
    let mut req = tonic::Request::new(request);
    req.metadata_mut()
        .insert("x-user-id", user_id.parse().unwrap());
    req.metadata_mut()
        .insert("x-user-name", format!("User {}", user_id).parse().unwrap());
    req.metadata_mut().insert("x-user-role", role.parse().unwrap());
    req
}

pub fn as_admin<T>(request: T) -> tonic::Request<T> {
    as_user(request, "admin-1", "admin")
}

pub fn as_fiscal<T>(request: T, user_id: &str) -> tonic::Request<T> {
    as_user(request, user_id, "fiscal")
}

pub fn as_treasurer<T>(request: T, user_id: &str) -> tonic::Request<T> {
    as_user(request, user_id, "treasurer")
}

pub const PANEL: [&str; 3] = ["fiscal-a", "fiscal-b", "fiscal-c"];

impl TestApp {
    /// Create a report with `lines` statement lines; returns the report id and
    /// transaction ids in statement order.
    pub async fn seed_report(&self, lines: usize) -> (String, Vec<String>) {
        let transactions = (0..lines)
            .map(|i| TransactionInput {
                transaction_date: format!("2025-05-{:02}", (i % 28) + 1),
                description: format!("Statement line {}", i),
                amount: format!("{}.50", 100 + i),
                direction: if i % 2 == 0 {
                    Direction::Credit as i32
                } else {
                    Direction::Debit as i32
                },
            })
            .collect();

        let response = self
            .grpc_client
            .clone()
            .create_report(as_admin(CreateReportRequest {
                title: "May 2025 checking".to_string(),
                competence_period: "2025-05".to_string(),
                account_type: "checking".to_string(),
                transactions,
            }))
            .await
            .expect("create_report failed")
            .into_inner();

        let report = response.report.unwrap();
        let ids = response
            .transactions
            .into_iter()
            .map(|t| t.transaction_id)
            .collect();
        (report.report_id, ids)
    }

    pub async fn verdict(
        &self,
        user: &str,
        report_id: &str,
        transaction_id: &str,
        status: VerdictStatus,
        observation: Option<&str>,
    ) -> Result<Review, tonic::Status> {
        self.grpc_client
            .clone()
            .record_verdict(as_fiscal(
                RecordVerdictRequest {
                    report_id: report_id.to_string(),
                    transaction_id: transaction_id.to_string(),
                    status: status as i32,
                    observation: observation.map(String::from),
                },
                user,
            ))
            .await
            .map(|r| r.into_inner().review.unwrap())
    }

    pub async fn confirm(
        &self,
        user: &str,
        report_id: &str,
        transaction_id: &str,
    ) -> Result<Review, tonic::Status> {
        self.grpc_client
            .clone()
            .confirm_diligence(as_fiscal(
                ConfirmDiligenceRequest {
                    report_id: report_id.to_string(),
                    transaction_id: transaction_id.to_string(),
                },
                user,
            ))
            .await
            .map(|r| r.into_inner().review.unwrap())
    }

    /// Every panel member approves every line.
    pub async fn approve_all(&self, report_id: &str, transaction_ids: &[String]) {
        for user in PANEL {
            for transaction_id in transaction_ids {
                self.verdict(user, report_id, transaction_id, VerdictStatus::Approved, None)
                    .await
                    .expect("approval failed");
            }
        }
    }

    pub async fn sign(
        &self,
        user: &str,
        role: &str,
        report_id: &str,
    ) -> Result<Signature, tonic::Status> {
        self.grpc_client
            .clone()
            .sign_report(as_user(
                SignReportRequest {
                    report_id: report_id.to_string(),
                    signature_image: format!("signature of {}", user).into_bytes(),
                },
                user,
                role,
            ))
            .await
            .map(|r| r.into_inner().signature.unwrap())
    }

    pub async fn sign_off(&self, report_id: &str) -> GetSignOffStateResponse {
        self.grpc_client
            .clone()
            .get_sign_off_state(as_admin(GetSignOffStateRequest {
                report_id: report_id.to_string(),
            }))
            .await
            .expect("get_sign_off_state failed")
            .into_inner()
    }

    pub async fn reviews(&self, report_id: &str, transaction_id: &str) -> Vec<Review> {
        self.grpc_client
            .clone()
            .list_reviews(as_admin(ListReviewsRequest {
                report_id: report_id.to_string(),
                transaction_id: Some(transaction_id.to_string()),
            }))
            .await
            .expect("list_reviews failed")
            .into_inner()
            .reviews
    }

    pub async fn finalize(&self, user: &str, report_id: &str) -> Result<Report, tonic::Status> {
        self.grpc_client
            .clone()
            .finalize_report(as_treasurer(
                FinalizeReportRequest {
                    report_id: report_id.to_string(),
                },
                user,
            ))
            .await
            .map(|r| r.into_inner().report.unwrap())
    }
}
