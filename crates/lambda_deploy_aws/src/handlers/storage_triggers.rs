use futures::future::try_join_all;
use lambda_deploy_core::contract::TriggerParams;
use lambda_deploy_core::naming::{bucket_arn, storage_statement_id, STORAGE_PRINCIPAL};
use lambda_deploy_core::notifications::{invoke_grants, merge};
use serde::Serialize;

use crate::adapters::function_platform::{FunctionPlatform, PermissionGrant};
use crate::adapters::object_store::ObjectStore;
use crate::adapters::{tolerate_conflict, Applied};
use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSyncSummary {
    pub bucket: String,
    pub function_configurations: usize,
}

/// Grants the storage service invoke rights, then replaces each bucket's
/// notification configuration with the merged set.
///
/// `triggers` must be the complete desired set for the buckets involved; the
/// write clobbers whatever configuration the bucket had before.
pub async fn sync_bucket_notifications(
    platform: &dyn FunctionPlatform,
    storage: &dyn ObjectStore,
    function_name: &str,
    triggers: &[TriggerParams],
) -> Result<Vec<BucketSyncSummary>, ProviderError> {
    if triggers.is_empty() {
        return Ok(Vec::new());
    }

    // Statement ids are per bucket, so each grant goes on the invoked function's own policy.
    let grants: Vec<PermissionGrant> = invoke_grants(triggers)
        .into_iter()
        .map(|grant| PermissionGrant {
            function_name: grant.function_arn,
            principal: STORAGE_PRINCIPAL.to_string(),
            source_arn: bucket_arn(&grant.bucket),
            statement_id: storage_statement_id(&grant.bucket),
        })
        .collect();

    let applied: Vec<Applied> = try_join_all(
        grants
            .iter()
            .map(|grant| async move { tolerate_conflict(platform.add_permission(grant).await) }),
    )
    .await?;
    tracing::debug!(
        component = "storage_triggers",
        function = function_name,
        grants = applied.len(),
        "storage invoke permissions in place"
    );

    let merged = merge(triggers);
    try_join_all(merged.iter().map(|params| async move {
        storage.put_bucket_notification(params).await?;
        tracing::info!(
            component = "storage_triggers",
            function = function_name,
            bucket = %params.bucket,
            configurations = params.function_configurations.len(),
            "bucket notification configuration replaced"
        );
        Ok::<_, ProviderError>(BucketSyncSummary {
            bucket: params.bucket.clone(),
            function_configurations: params.function_configurations.len(),
        })
    }))
    .await
}
