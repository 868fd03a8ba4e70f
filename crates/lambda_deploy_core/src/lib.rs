//! Deployment domain primitives for serverless functions.
//!
//! This crate owns the desired-state contract and the deterministic
//! reconciliation rules (event-source diffing, bucket-notification merging,
//! resource naming). It intentionally excludes AWS SDK and process/filesystem
//! concerns; see `lambda_deploy_aws` for the adapters that execute the plans.

pub mod contract;
pub mod naming;
pub mod notifications;
pub mod reconcile;
