//! AWS-oriented adapters and handlers for deploying serverless functions.
//!
//! This crate owns everything with side effects: building the code archive on
//! disk, talking to the function platform, object storage, scheduler and log
//! services through region-scoped client handles, and coordinating the
//! per-region deployment state machine. Pure planning lives in
//! `lambda_deploy_core`, re-exported here as `runtime`.

pub mod adapters;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;

pub use lambda_deploy_core as runtime;
