#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lambda_deploy_aws::adapters::function_platform::{
    CodeLocation, FunctionInfo, FunctionPlatform, PermissionGrant,
};
use lambda_deploy_aws::adapters::log_groups::LogGroups;
use lambda_deploy_aws::adapters::object_store::ObjectStore;
use lambda_deploy_aws::adapters::scheduler::{RuleDefinition, RuleTarget, Scheduler};
use lambda_deploy_aws::adapters::RegionClients;
use lambda_deploy_aws::error::{ProviderError, ProviderErrorKind};
use lambda_deploy_aws::runtime::contract::{
    normalize_manifest, DeployManifest, DeploymentSpec, ExistingEventSourceMapping,
    NewEventSourceMapping,
};
use lambda_deploy_aws::runtime::notifications::BucketNotificationParams;
use serde_json::Value;

pub const ACCOUNT_ID: &str = "123456789012";

/// Arguments of one `update_event_source_mapping` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingUpdate {
    pub uuid: String,
    pub enabled: Option<bool>,
    pub batch_size: Option<u32>,
}

struct InjectedFailure {
    key: String,
    kind: ProviderErrorKind,
    remaining: usize,
}

/// In-memory stand-in for every provider of one region. Records each call as
/// `"<operation> <target>"` in arrival order.
pub struct FakeCloud {
    pub region: String,
    calls: Mutex<Vec<String>>,
    failures: Mutex<Vec<InjectedFailure>>,
    function: Mutex<Option<FunctionInfo>>,
    mappings: Mutex<Vec<ExistingEventSourceMapping>>,
    created_mappings: Mutex<Vec<NewEventSourceMapping>>,
    updated_mappings: Mutex<Vec<MappingUpdate>>,
    grants: Mutex<Vec<PermissionGrant>>,
    notifications: Mutex<Vec<BucketNotificationParams>>,
    code_sources: Mutex<Vec<String>>,
    targets: Mutex<Vec<(String, String, String)>>,
}

impl FakeCloud {
    pub fn new(region: &str) -> Arc<Self> {
        Arc::new(Self {
            region: region.to_string(),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            function: Mutex::new(None),
            mappings: Mutex::new(Vec::new()),
            created_mappings: Mutex::new(Vec::new()),
            updated_mappings: Mutex::new(Vec::new()),
            grants: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            code_sources: Mutex::new(Vec::new()),
            targets: Mutex::new(Vec::new()),
        })
    }

    pub fn clients(self: &Arc<Self>) -> RegionClients {
        RegionClients {
            region: self.region.clone(),
            functions: self.clone(),
            storage: self.clone(),
            scheduler: self.clone(),
            logs: self.clone(),
        }
    }

    pub fn function_arn(&self, function_name: &str) -> String {
        format!(
            "arn:aws:lambda:{}:{ACCOUNT_ID}:function:{function_name}",
            self.region
        )
    }

    pub fn with_function(&self, function_name: &str) {
        *self.function.lock().expect("poisoned mutex") = Some(FunctionInfo {
            function_name: function_name.to_string(),
            function_arn: self.function_arn(function_name),
        });
    }

    pub fn with_mapping(&self, event_source_arn: &str, uuid: &str, enabled: bool, batch_size: u32) {
        self.mappings
            .lock()
            .expect("poisoned mutex")
            .push(ExistingEventSourceMapping {
                event_source_arn: event_source_arn.to_string(),
                uuid: uuid.to_string(),
                enabled,
                batch_size: Some(batch_size),
            });
    }

    /// Fails every call whose operation, or `"<operation> <target>"`, equals `key`.
    pub fn fail(&self, key: &str, kind: ProviderErrorKind) {
        self.inject(key, kind, usize::MAX);
    }

    pub fn fail_once(&self, key: &str, kind: ProviderErrorKind) {
        self.inject(key, kind, 1);
    }

    fn inject(&self, key: &str, kind: ProviderErrorKind, remaining: usize) {
        self.failures
            .lock()
            .expect("poisoned mutex")
            .push(InjectedFailure {
                key: key.to_string(),
                kind,
                remaining,
            });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.split(' ').next() == Some(operation))
            .collect()
    }

    /// Position of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|call| call.starts_with(prefix))
    }

    pub fn grants(&self) -> Vec<PermissionGrant> {
        self.grants.lock().expect("poisoned mutex").clone()
    }

    pub fn created_mappings(&self) -> Vec<NewEventSourceMapping> {
        self.created_mappings.lock().expect("poisoned mutex").clone()
    }

    pub fn updated_mappings(&self) -> Vec<MappingUpdate> {
        self.updated_mappings.lock().expect("poisoned mutex").clone()
    }

    pub fn notifications(&self) -> Vec<BucketNotificationParams> {
        self.notifications.lock().expect("poisoned mutex").clone()
    }

    pub fn code_sources(&self) -> Vec<String> {
        self.code_sources.lock().expect("poisoned mutex").clone()
    }

    pub fn targets(&self) -> Vec<(String, String, String)> {
        self.targets.lock().expect("poisoned mutex").clone()
    }

    fn record(&self, operation: &str, target: &str) -> Result<(), ProviderError> {
        let call = format!("{operation} {target}");
        self.calls
            .lock()
            .expect("poisoned mutex")
            .push(call.clone());

        let mut failures = self.failures.lock().expect("poisoned mutex");
        let injected = failures
            .iter_mut()
            .find(|failure| failure.remaining > 0 && (failure.key == operation || failure.key == call));
        match injected {
            Some(failure) => {
                failure.remaining -= 1;
                Err(ProviderError::new(
                    operation,
                    failure.kind,
                    format!("injected failure for {call}"),
                ))
            }
            None => Ok(()),
        }
    }

    fn record_code(&self, code: CodeLocation<'_>) {
        let source = match code {
            CodeLocation::ZipFile(bytes) => format!("zip:{}", bytes.len()),
            CodeLocation::Bucket { bucket, key } => format!("s3://{bucket}/{key}"),
        };
        self.code_sources
            .lock()
            .expect("poisoned mutex")
            .push(source);
    }

    fn current_function(&self, function_name: &str) -> Result<FunctionInfo, ProviderError> {
        self.function
            .lock()
            .expect("poisoned mutex")
            .clone()
            .ok_or_else(|| {
                ProviderError::new(
                    "get_function",
                    ProviderErrorKind::NotFound,
                    format!("function {function_name} not found"),
                )
            })
    }
}

#[async_trait]
impl FunctionPlatform for FakeCloud {
    async fn get_function(&self, function_name: &str) -> Result<FunctionInfo, ProviderError> {
        self.record("get_function", function_name)?;
        self.current_function(function_name)
    }

    async fn create_function(
        &self,
        spec: &DeploymentSpec,
        code: CodeLocation<'_>,
    ) -> Result<FunctionInfo, ProviderError> {
        self.record("create_function", &spec.function_name)?;
        self.record_code(code);
        self.with_function(&spec.function_name);
        self.current_function(&spec.function_name)
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        code: CodeLocation<'_>,
        _publish: bool,
    ) -> Result<FunctionInfo, ProviderError> {
        self.record("update_function_code", function_name)?;
        self.record_code(code);
        self.current_function(function_name)
    }

    async fn update_function_configuration(
        &self,
        spec: &DeploymentSpec,
    ) -> Result<FunctionInfo, ProviderError> {
        self.record("update_function_configuration", &spec.function_name)?;
        self.current_function(&spec.function_name)
    }

    async fn list_event_source_mappings(
        &self,
        function_name: &str,
    ) -> Result<Vec<ExistingEventSourceMapping>, ProviderError> {
        self.record("list_event_source_mappings", function_name)?;
        Ok(self.mappings.lock().expect("poisoned mutex").clone())
    }

    async fn create_event_source_mapping(
        &self,
        _function_name: &str,
        mapping: &NewEventSourceMapping,
    ) -> Result<(), ProviderError> {
        self.record("create_event_source_mapping", &mapping.event_source_arn)?;
        self.created_mappings
            .lock()
            .expect("poisoned mutex")
            .push(mapping.clone());
        Ok(())
    }

    async fn update_event_source_mapping(
        &self,
        _function_name: &str,
        uuid: &str,
        enabled: Option<bool>,
        batch_size: Option<u32>,
    ) -> Result<(), ProviderError> {
        self.record("update_event_source_mapping", uuid)?;
        self.updated_mappings
            .lock()
            .expect("poisoned mutex")
            .push(MappingUpdate {
                uuid: uuid.to_string(),
                enabled,
                batch_size,
            });
        Ok(())
    }

    async fn delete_event_source_mapping(&self, uuid: &str) -> Result<(), ProviderError> {
        self.record("delete_event_source_mapping", uuid)
    }

    async fn add_permission(&self, grant: &PermissionGrant) -> Result<(), ProviderError> {
        self.grants
            .lock()
            .expect("poisoned mutex")
            .push(grant.clone());
        self.record("add_permission", &grant.statement_id)
    }
}

#[async_trait]
impl ObjectStore for FakeCloud {
    async fn create_bucket(
        &self,
        bucket: &str,
        location_constraint: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.record(
            "create_bucket",
            &format!("{bucket} {}", location_constraint.unwrap_or("-")),
        )
    }

    async fn put_object(&self, bucket: &str, key: &str, _body: &[u8]) -> Result<(), ProviderError> {
        self.record("put_object", &format!("{bucket}/{key}"))
    }

    async fn put_bucket_notification(
        &self,
        params: &BucketNotificationParams,
    ) -> Result<(), ProviderError> {
        self.record("put_bucket_notification", &params.bucket)?;
        self.notifications
            .lock()
            .expect("poisoned mutex")
            .push(params.clone());
        Ok(())
    }
}

#[async_trait]
impl Scheduler for FakeCloud {
    async fn put_rule(&self, rule: &RuleDefinition<'_>) -> Result<String, ProviderError> {
        self.record("put_rule", rule.name)?;
        Ok(format!(
            "arn:aws:events:{}:{ACCOUNT_ID}:rule/{}",
            self.region, rule.name
        ))
    }

    async fn put_targets(
        &self,
        rule_name: &str,
        targets: &[RuleTarget<'_>],
    ) -> Result<(), ProviderError> {
        self.record("put_targets", rule_name)?;
        let mut recorded = self.targets.lock().expect("poisoned mutex");
        for target in targets {
            recorded.push((
                rule_name.to_string(),
                target.id.to_string(),
                target.arn.to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LogGroups for FakeCloud {
    async fn create_log_group(&self, log_group_name: &str) -> Result<(), ProviderError> {
        self.record("create_log_group", log_group_name)
    }
}

/// Manifest for `orders-handler` in `regions`, with `extra` merged over the
/// top-level keys.
pub fn manifest(regions: &[&str], extra: Value) -> DeployManifest {
    let mut raw = serde_json::json!({
        "function": {
            "function_name": "orders-handler",
            "regions": regions,
            "handler": "index.handler",
            "role": format!("arn:aws:iam::{ACCOUNT_ID}:role/orders"),
            "runtime": "nodejs20.x",
            "memory_size": 256,
            "timeout": 30
        }
    });
    if let (Some(target), Value::Object(extra)) = (raw.as_object_mut(), extra) {
        target.extend(extra);
    }
    normalize_manifest(serde_json::from_value(raw).expect("manifest json")).expect("valid manifest")
}

pub fn queue_arn(region: &str, name: &str) -> String {
    format!("arn:aws:sqs:{region}:{ACCOUNT_ID}:{name}")
}

pub fn stream_arn(region: &str, name: &str) -> String {
    format!("arn:aws:kinesis:{region}:{ACCOUNT_ID}:stream/{name}")
}
