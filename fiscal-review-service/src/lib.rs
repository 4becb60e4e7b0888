//! Fiscal Review Service - panel review, diligence tracking and sign-off of
//! financial reports.

pub mod config;
pub mod consensus;
pub mod error;
pub mod grpc;
pub mod models;
pub mod services;
pub mod startup;
