//! Services module for fiscal-review-service.

pub mod database;
pub mod engine;
pub mod finalization;
pub mod memory;
pub mod metrics;
pub mod storage;
pub mod store;

pub use database::Database;
pub use engine::{FiscalReviewEngine, ReportOverview, SignatureSets};
pub use finalization::{
    declaration_key, DeclarationEmitter, EmittedArtifact, FinalizationEmitter, FinalizationPacket,
};
pub use memory::MemoryStore;
pub use metrics::{
    get_metrics, init_metrics, record_diligence_event, record_error, record_finalization,
    record_grpc_request, record_signature, record_verdict,
};
pub use storage::{LocalStorage, Storage};
pub use store::{FiscalStore, VerdictOutcome};
