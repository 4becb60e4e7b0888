//! Domain models for fiscal-review-service.

mod actor;
mod report;
mod review;
mod signature;
mod transaction;

pub use actor::{Actor, Role};
pub use report::{NewReport, Report, ReportStatus};
pub use review::{Review, VerdictInput, VerdictStatus};
pub use signature::{Signature, SignatureInput, SignerRole};
pub use transaction::{Direction, NewTransaction, Transaction};

use chrono::{DateTime, Utc};
use prost_types::Timestamp;

pub(crate) fn datetime_to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}
