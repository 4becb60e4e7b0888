//! gRPC module for fiscal-review-service.

mod convert;
pub mod identity;
mod service;

pub use identity::{extract_actor, require_role, USER_ID_HEADER, USER_NAME_HEADER, USER_ROLE_HEADER};
pub use service::FiscalReviewServiceImpl;

/// Generated protobuf code.
pub mod proto {
    tonic::include_proto!("micros.fiscal.v1");

    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("fiscal_descriptor");
}
