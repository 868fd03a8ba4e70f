use std::future::Future;
use std::path::Path;

use futures::future::join_all;
use lambda_deploy_core::contract::{
    manifest_fingerprint, CodeDelivery, DeployManifest, DeploymentSpec, ScheduleSpec,
    TriggerParams,
};
use lambda_deploy_core::naming::{log_group_name, staging_bucket_name, staging_object_key};
use lambda_deploy_core::reconcile::reconcile;
use serde::Serialize;
use serde_json::{json, Value};

use crate::adapters::function_platform::{CodeLocation, FunctionInfo, FunctionPlatform};
use crate::adapters::{tolerate_conflict, Applied, RegionClients};
use crate::error::{BuildError, DeployError, ProviderError};
use crate::handlers::archive::{self, ArchiveOptions, Artifact};
use crate::handlers::event_sources::{apply_operations, OperationOutcome};
use crate::handlers::schedule::{self, PublishedSchedule};
use crate::handlers::storage_triggers::{sync_bucket_notifications, BucketSyncSummary};

/// Region that takes bucket creation without a location constraint.
const DEFAULT_STORAGE_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleOutcome {
    pub rule_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<PublishedSchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageTriggerOutcome {
    pub buckets: Vec<BucketSyncSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Success payload of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionDeployment {
    pub function_arn: String,
    pub action: FunctionAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_group: Option<Applied>,
    pub event_sources: Vec<OperationOutcome>,
    pub schedules: Vec<ScheduleOutcome>,
    pub storage_triggers: StorageTriggerOutcome,
}

impl RegionDeployment {
    /// Trigger-level failures that did not stop the region.
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        for outcome in &self.event_sources {
            if let Some(error) = &outcome.error {
                failures.push(format!(
                    "event source {} {}: {error}",
                    outcome.op.kind(),
                    outcome.op.target()
                ));
            }
        }
        for outcome in &self.schedules {
            if let Some(error) = &outcome.error {
                failures.push(format!("schedule {}: {error}", outcome.rule_name));
            }
        }
        if let Some(error) = &self.storage_triggers.error {
            failures.push(format!("storage triggers: {error}"));
        }
        failures
    }
}

#[derive(Debug)]
pub struct RegionReport {
    pub region: String,
    pub outcome: Result<RegionDeployment, DeployError>,
}

/// Settled result of every region of one deploy call.
#[derive(Debug)]
pub struct DeploymentReport {
    pub function_name: String,
    pub regions: Vec<RegionReport>,
}

impl DeploymentReport {
    pub fn is_success(&self) -> bool {
        self.first_error().is_none()
    }

    /// First failure in region order, region-level errors before trigger failures.
    pub fn first_error(&self) -> Option<String> {
        self.regions.iter().find_map(|report| match &report.outcome {
            Err(error) => Some(format!("{}: {error}", report.region)),
            Ok(deployment) => deployment
                .failures()
                .into_iter()
                .next()
                .map(|failure| format!("{}: {failure}", report.region)),
        })
    }

    pub fn to_json(&self) -> Value {
        let regions: Vec<Value> = self
            .regions
            .iter()
            .map(|report| match &report.outcome {
                Ok(deployment) => json!({
                    "region": report.region,
                    "status": if deployment.failures().is_empty() { "deployed" } else { "partial" },
                    "deployment": deployment,
                }),
                Err(error) => json!({
                    "region": report.region,
                    "status": "failed",
                    "error": error.to_string(),
                }),
            })
            .collect();

        json!({
            "function_name": self.function_name,
            "status": if self.is_success() { "succeeded" } else { "failed" },
            "first_error": self.first_error(),
            "regions": regions,
        })
    }
}

enum StagedCode {
    Direct,
    Bucket { bucket: String, key: String },
}

impl StagedCode {
    fn location<'a>(&'a self, artifact: &'a Artifact) -> CodeLocation<'a> {
        match self {
            Self::Direct => CodeLocation::ZipFile(artifact.as_bytes()),
            Self::Bucket { bucket, key } => CodeLocation::Bucket { bucket, key },
        }
    }
}

/// Builds the artifact once, optionally persists it, then deploys every
/// region. A build failure aborts before any region is contacted.
pub async fn build_and_deploy<F, Fut>(
    manifest: &DeployManifest,
    source_dir: &Path,
    options: &ArchiveOptions,
    package_dir: Option<&Path>,
    connect: F,
) -> Result<DeploymentReport, DeployError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = RegionClients>,
{
    let artifact = {
        let source_dir = source_dir.to_path_buf();
        let options = options.clone();
        tokio::task::spawn_blocking(move || archive::build(&source_dir, &options))
            .await
            .map_err(|error| BuildError::Task(error.to_string()))??
    };

    if let Some(dir) = package_dir {
        let path = archive::write_artifact(
            dir,
            &manifest.function.function_name,
            Some(options.environment.as_str()),
            &artifact,
        )?;
        tracing::info!(
            component = "coordinator",
            path = %path.display(),
            "artifact written"
        );
    }

    let regions = join_all(manifest.function.regions.iter().cloned().map(&connect)).await;
    Ok(deploy(manifest, &artifact, &regions).await)
}

/// Deploys to every region concurrently and waits for all of them to settle.
pub async fn deploy(
    manifest: &DeployManifest,
    artifact: &Artifact,
    regions: &[RegionClients],
) -> DeploymentReport {
    let function_name = manifest.function.function_name.clone();
    tracing::info!(
        component = "coordinator",
        function = %function_name,
        regions = regions.len(),
        artifact_bytes = artifact.size(),
        manifest_fingerprint = %manifest_fingerprint(manifest),
        "deployment started"
    );

    let reports = join_all(regions.iter().map(|clients| async move {
        let outcome = deploy_region(manifest, artifact, clients).await;
        match &outcome {
            Ok(deployment) => tracing::info!(
                component = "coordinator",
                region = %clients.region,
                function = %manifest.function.function_name,
                action = ?deployment.action,
                failures = deployment.failures().len(),
                "region deployed"
            ),
            Err(error) => tracing::error!(
                component = "coordinator",
                region = %clients.region,
                function = %manifest.function.function_name,
                error = %error,
                "region deployment failed"
            ),
        }
        RegionReport {
            region: clients.region.clone(),
            outcome,
        }
    }))
    .await;

    DeploymentReport {
        function_name,
        regions: reports,
    }
}

/// One region: check existence, create or update, then sync triggers.
pub async fn deploy_region(
    manifest: &DeployManifest,
    artifact: &Artifact,
    clients: &RegionClients,
) -> Result<RegionDeployment, DeployError> {
    let spec = &manifest.function;
    let region = clients.region.as_str();
    let platform = clients.functions.as_ref();

    let staged = stage_code(manifest, artifact, clients).await?;
    let code = staged.location(artifact);

    let (function, action, existing) = match platform.get_function(&spec.function_name).await {
        Ok(_) => {
            tracing::debug!(
                component = "coordinator",
                region,
                function = %spec.function_name,
                "function exists, updating"
            );
            let (function, existing) = tokio::join!(
                update_function(platform, spec, code),
                platform.list_event_source_mappings(&spec.function_name),
            );
            (function?, FunctionAction::Updated, existing?)
        }
        Err(error) if error.is_not_found() => {
            tracing::debug!(
                component = "coordinator",
                region,
                function = %spec.function_name,
                "function not found, creating"
            );
            let function = create_function(platform, spec, code).await?;
            (function, FunctionAction::Created, Vec::new())
        }
        Err(error) => return Err(error.into()),
    };

    let log_group = if manifest.create_log_group {
        let name = log_group_name(&spec.function_name);
        Some(tolerate_conflict(clients.logs.create_log_group(&name).await)?)
    } else {
        None
    };

    let ops = reconcile(&existing, &manifest.event_sources);
    let schedules: Vec<ScheduleSpec> = manifest
        .schedules
        .iter()
        .map(|event| ScheduleSpec::for_function(event, &function.function_arn))
        .collect();
    let triggers: Vec<TriggerParams> = manifest
        .storage_triggers
        .iter()
        .map(|event| TriggerParams::for_function(event, &function.function_arn))
        .collect();

    let (event_sources, schedules, storage_triggers) = tokio::join!(
        apply_operations(platform, region, &spec.function_name, ops),
        publish_schedules(clients, &spec.function_name, &schedules),
        sync_bucket_notifications(
            platform,
            clients.storage.as_ref(),
            &spec.function_name,
            &triggers
        ),
    );

    let storage_triggers = match storage_triggers {
        Ok(buckets) => StorageTriggerOutcome {
            buckets,
            error: None,
        },
        Err(error) => {
            tracing::warn!(
                component = "coordinator",
                region,
                error = %error,
                "storage trigger sync failed"
            );
            StorageTriggerOutcome {
                buckets: Vec::new(),
                error: Some(error.to_string()),
            }
        }
    };

    Ok(RegionDeployment {
        function_arn: function.function_arn,
        action,
        log_group,
        event_sources,
        schedules,
        storage_triggers,
    })
}

async fn stage_code(
    manifest: &DeployManifest,
    artifact: &Artifact,
    clients: &RegionClients,
) -> Result<StagedCode, ProviderError> {
    let CodeDelivery::Bucket { prefix } = &manifest.code_delivery else {
        return Ok(StagedCode::Direct);
    };

    let function_name = &manifest.function.function_name;
    let bucket = staging_bucket_name(prefix, function_name, &clients.region);
    let key = staging_object_key(function_name);
    let location_constraint =
        (clients.region != DEFAULT_STORAGE_REGION).then_some(clients.region.as_str());

    tolerate_conflict(
        clients
            .storage
            .create_bucket(&bucket, location_constraint)
            .await,
    )?;
    clients
        .storage
        .put_object(&bucket, &key, artifact.as_bytes())
        .await?;
    tracing::info!(
        component = "coordinator",
        region = %clients.region,
        bucket = %bucket,
        key = %key,
        "artifact staged"
    );

    Ok(StagedCode::Bucket { bucket, key })
}

async fn create_function(
    platform: &dyn FunctionPlatform,
    spec: &DeploymentSpec,
    code: CodeLocation<'_>,
) -> Result<FunctionInfo, ProviderError> {
    match platform.create_function(spec, code).await {
        Err(error) if error.is_conflict() => {
            tracing::info!(
                component = "coordinator",
                function = %spec.function_name,
                "function appeared concurrently, treating create as success"
            );
            platform.get_function(&spec.function_name).await
        }
        other => other,
    }
}

/// Code first, then configuration; the configuration call needs the code
/// update to have been accepted.
async fn update_function(
    platform: &dyn FunctionPlatform,
    spec: &DeploymentSpec,
    code: CodeLocation<'_>,
) -> Result<FunctionInfo, ProviderError> {
    platform
        .update_function_code(&spec.function_name, code, spec.publish)
        .await?;
    platform.update_function_configuration(spec).await
}

async fn publish_schedules(
    clients: &RegionClients,
    function_name: &str,
    schedules: &[ScheduleSpec],
) -> Vec<ScheduleOutcome> {
    join_all(schedules.iter().map(|spec| async move {
        let result = schedule::publish(
            clients.functions.as_ref(),
            clients.scheduler.as_ref(),
            function_name,
            spec,
        )
        .await;
        match result {
            Ok(published) => ScheduleOutcome {
                rule_name: spec.rule_name.clone(),
                published: Some(published),
                error: None,
            },
            Err(error) => {
                tracing::warn!(
                    component = "coordinator",
                    region = %clients.region,
                    rule = %spec.rule_name,
                    error = %error,
                    "schedule publish failed"
                );
                ScheduleOutcome {
                    rule_name: spec.rule_name.clone(),
                    published: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }))
    .await
}
