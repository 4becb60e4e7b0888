//! Consensus rules of the fiscal panel.
//!
//! Everything here is a pure function of stored review and signature rows.
//! Derived state (diligences, progress, sign-off gate) is recomputed on every
//! read and never persisted.

mod diligence;
mod gate;
mod progress;
mod verdict;

pub use diligence::{resolve_diligences, DiligenceInfo, DiligenceMap};
pub use gate::{check_finalizable, evaluate_gate, Blocker, GateEvaluation, SignOffState};
pub use progress::{aggregate, ReportSummary};
pub use verdict::{plan_confirmation, plan_verdict, VerdictPlan};

/// Distinct reviewers needed for a transaction to count as processed, and
/// acknowledgements needed to confirm a diligence.
pub const PANEL_QUORUM: u32 = 3;

/// Distinct fiscal signatures needed before a report can be finalized.
pub const REQUIRED_FISCAL_SIGNATURES: u32 = 3;
