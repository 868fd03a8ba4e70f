use std::sync::Arc;

use serde::Serialize;

use crate::error::ProviderError;

pub mod aws;
pub mod function_platform;
pub mod log_groups;
pub mod object_store;
pub mod scheduler;

use function_platform::FunctionPlatform;
use log_groups::LogGroups;
use object_store::ObjectStore;
use scheduler::Scheduler;

/// Provider handles bound to a single region's endpoints.
#[derive(Clone)]
pub struct RegionClients {
    pub region: String,
    pub functions: Arc<dyn FunctionPlatform>,
    pub storage: Arc<dyn ObjectStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub logs: Arc<dyn LogGroups>,
}

/// How an idempotent setup call settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Applied {
    Done,
    AlreadyExisted,
}

/// Maps a conflict response to success; every other error passes through.
pub fn tolerate_conflict(result: Result<(), ProviderError>) -> Result<Applied, ProviderError> {
    match result {
        Ok(()) => Ok(Applied::Done),
        Err(error) if error.is_conflict() => {
            tracing::info!(
                operation = %error.operation,
                detail = %error.message,
                "resource already exists, treating as success"
            );
            Ok(Applied::AlreadyExisted)
        }
        Err(error) => Err(error),
    }
}
