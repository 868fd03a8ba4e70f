use futures::stream::{self, StreamExt};
use lambda_deploy_core::reconcile::ReconciliationOp;
use serde::Serialize;

use crate::adapters::function_platform::FunctionPlatform;
use crate::adapters::{tolerate_conflict, Applied};
use crate::error::ProviderError;

pub const MAX_CONCURRENT_MAPPING_CALLS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub op: ReconciliationOp,
    pub applied: Option<Applied>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationOutcome {
    fn settle(op: ReconciliationOp, result: Result<Applied, ProviderError>) -> Self {
        match result {
            Ok(applied) => Self {
                op,
                applied: Some(applied),
                error: None,
            },
            Err(error) => Self {
                op,
                applied: None,
                error: Some(error.to_string()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs every op against the platform with bounded concurrency.
///
/// A failing op is recorded against its own identifier; siblings keep going.
/// Outcomes come back in op order.
pub async fn apply_operations(
    platform: &dyn FunctionPlatform,
    region: &str,
    function_name: &str,
    ops: Vec<ReconciliationOp>,
) -> Vec<OperationOutcome> {
    stream::iter(ops)
        .map(|op| async move {
            let result = apply_operation(platform, function_name, &op).await;
            match &result {
                Ok(applied) => tracing::info!(
                    component = "event_sources",
                    region,
                    function = function_name,
                    op = op.kind(),
                    target = op.target(),
                    applied = ?applied,
                    "event source mapping synced"
                ),
                Err(error) => tracing::warn!(
                    component = "event_sources",
                    region,
                    function = function_name,
                    op = op.kind(),
                    target = op.target(),
                    error = %error,
                    "event source mapping op failed"
                ),
            }
            OperationOutcome::settle(op, result)
        })
        .buffered(MAX_CONCURRENT_MAPPING_CALLS)
        .collect()
        .await
}

async fn apply_operation(
    platform: &dyn FunctionPlatform,
    function_name: &str,
    op: &ReconciliationOp,
) -> Result<Applied, ProviderError> {
    match op {
        ReconciliationOp::Create(mapping) => {
            tolerate_conflict(platform.create_event_source_mapping(function_name, mapping).await)
        }
        ReconciliationOp::Update { uuid, source } => platform
            .update_event_source_mapping(function_name, uuid, source.enabled, source.batch_size)
            .await
            .map(|()| Applied::Done),
        ReconciliationOp::Delete { uuid } => platform
            .delete_event_source_mapping(uuid)
            .await
            .map(|()| Applied::Done),
    }
}
