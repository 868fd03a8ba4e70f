use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_eventbridge::types::{RuleState, Target};
use aws_sdk_lambda::config::Region;
use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{
    DeadLetterConfig, Environment, EventSourcePosition, FunctionCode, Runtime, TracingConfig,
    TracingMode, VpcConfig,
};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Event, FilterRule, FilterRuleName,
    LambdaFunctionConfiguration, NotificationConfiguration, NotificationConfigurationFilter,
    S3KeyFilter,
};
use lambda_deploy_core::contract::{
    DeploymentSpec, ExistingEventSourceMapping, NewEventSourceMapping,
};
use lambda_deploy_core::naming::is_stream_source;
use lambda_deploy_core::notifications::BucketNotificationParams;

use crate::adapters::function_platform::{
    CodeLocation, FunctionInfo, FunctionPlatform, PermissionGrant,
};
use crate::adapters::log_groups::LogGroups;
use crate::adapters::object_store::ObjectStore;
use crate::adapters::scheduler::{RuleDefinition, RuleTarget, Scheduler};
use crate::adapters::RegionClients;
use crate::error::{ProviderError, ProviderErrorKind};

const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException", "NoSuchBucket", "NotFound"];
const CONFLICT_CODES: &[&str] = &[
    "ResourceConflictException",
    "ResourceAlreadyExistsException",
    "BucketAlreadyOwnedByYou",
];
const INVOKE_ACTION: &str = "lambda:InvokeFunction";

/// Loads credentials once and binds one client per service to `region`.
pub async fn connect_region(region: &str) -> RegionClients {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;

    RegionClients {
        region: region.to_string(),
        functions: Arc::new(AwsFunctionPlatform {
            client: aws_sdk_lambda::Client::new(&config),
        }),
        storage: Arc::new(AwsObjectStore {
            client: aws_sdk_s3::Client::new(&config),
        }),
        scheduler: Arc::new(AwsScheduler {
            client: aws_sdk_eventbridge::Client::new(&config),
        }),
        logs: Arc::new(AwsLogGroups {
            client: aws_sdk_cloudwatchlogs::Client::new(&config),
        }),
    }
}

fn classify<E, R>(operation: &str, error: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let kind = match error.code() {
        Some(code) if NOT_FOUND_CODES.contains(&code) => ProviderErrorKind::NotFound,
        Some(code) if CONFLICT_CODES.contains(&code) => ProviderErrorKind::Conflict,
        _ => ProviderErrorKind::Other,
    };
    ProviderError::new(operation, kind, DisplayErrorContext(&error).to_string())
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn function_info(
    operation: &str,
    function_name: &str,
    function_arn: Option<&str>,
) -> Result<FunctionInfo, ProviderError> {
    let function_arn = function_arn
        .ok_or_else(|| ProviderError::other(operation, "response did not include a function arn"))?;
    Ok(FunctionInfo {
        function_name: function_name.to_string(),
        function_arn: function_arn.to_string(),
    })
}

fn function_code(code: CodeLocation<'_>) -> FunctionCode {
    match code {
        CodeLocation::ZipFile(bytes) => FunctionCode::builder()
            .zip_file(Blob::new(bytes.to_vec()))
            .build(),
        CodeLocation::Bucket { bucket, key } => {
            FunctionCode::builder().s3_bucket(bucket).s3_key(key).build()
        }
    }
}

fn vpc_config(spec: &DeploymentSpec) -> Option<VpcConfig> {
    spec.vpc.as_ref().map(|vpc| {
        VpcConfig::builder()
            .set_subnet_ids(Some(vpc.subnet_ids.clone()))
            .set_security_group_ids(Some(vpc.security_group_ids.clone()))
            .build()
    })
}

fn environment(spec: &DeploymentSpec) -> Environment {
    let variables: HashMap<String, String> = spec
        .environment
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Environment::builder().set_variables(Some(variables)).build()
}

fn dead_letter_config(spec: &DeploymentSpec) -> Option<DeadLetterConfig> {
    spec.dead_letter_target
        .as_deref()
        .map(|target| DeadLetterConfig::builder().target_arn(target).build())
}

fn tracing_config(spec: &DeploymentSpec) -> Option<TracingConfig> {
    spec.tracing_mode.map(|mode| {
        TracingConfig::builder()
            .mode(TracingMode::from(mode.as_str()))
            .build()
    })
}

pub struct AwsFunctionPlatform {
    client: aws_sdk_lambda::Client,
}

#[async_trait]
impl FunctionPlatform for AwsFunctionPlatform {
    async fn get_function(&self, function_name: &str) -> Result<FunctionInfo, ProviderError> {
        let output = self
            .client
            .get_function()
            .function_name(function_name)
            .send()
            .await
            .map_err(|error| classify("get_function", error))?;

        function_info(
            "get_function",
            function_name,
            output
                .configuration()
                .and_then(|configuration| configuration.function_arn()),
        )
    }

    async fn create_function(
        &self,
        spec: &DeploymentSpec,
        code: CodeLocation<'_>,
    ) -> Result<FunctionInfo, ProviderError> {
        let tags: HashMap<String, String> = spec
            .tags
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let output = self
            .client
            .create_function()
            .function_name(&spec.function_name)
            .handler(&spec.handler)
            .role(&spec.role)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .memory_size(to_i32(spec.memory_size))
            .timeout(to_i32(spec.timeout))
            .description(&spec.description)
            .publish(spec.publish)
            .code(function_code(code))
            .environment(environment(spec))
            .set_vpc_config(vpc_config(spec))
            .set_dead_letter_config(dead_letter_config(spec))
            .set_tracing_config(tracing_config(spec))
            .set_layers(Some(spec.layers.clone()))
            .set_kms_key_arn(spec.kms_key_arn.clone())
            .set_tags((!tags.is_empty()).then_some(tags))
            .send()
            .await
            .map_err(|error| classify("create_function", error))?;

        function_info("create_function", &spec.function_name, output.function_arn())
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        code: CodeLocation<'_>,
        publish: bool,
    ) -> Result<FunctionInfo, ProviderError> {
        let request = self
            .client
            .update_function_code()
            .function_name(function_name)
            .publish(publish);
        let request = match code {
            CodeLocation::ZipFile(bytes) => request.zip_file(Blob::new(bytes.to_vec())),
            CodeLocation::Bucket { bucket, key } => request.s3_bucket(bucket).s3_key(key),
        };

        let output = request
            .send()
            .await
            .map_err(|error| classify("update_function_code", error))?;

        function_info("update_function_code", function_name, output.function_arn())
    }

    async fn update_function_configuration(
        &self,
        spec: &DeploymentSpec,
    ) -> Result<FunctionInfo, ProviderError> {
        let output = self
            .client
            .update_function_configuration()
            .function_name(&spec.function_name)
            .handler(&spec.handler)
            .role(&spec.role)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .memory_size(to_i32(spec.memory_size))
            .timeout(to_i32(spec.timeout))
            .description(&spec.description)
            .environment(environment(spec))
            .set_vpc_config(vpc_config(spec))
            .set_dead_letter_config(dead_letter_config(spec))
            .set_tracing_config(tracing_config(spec))
            .set_layers(Some(spec.layers.clone()))
            .set_kms_key_arn(spec.kms_key_arn.clone())
            .send()
            .await
            .map_err(|error| classify("update_function_configuration", error))?;

        function_info(
            "update_function_configuration",
            &spec.function_name,
            output.function_arn(),
        )
    }

    async fn list_event_source_mappings(
        &self,
        function_name: &str,
    ) -> Result<Vec<ExistingEventSourceMapping>, ProviderError> {
        let mut mappings = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_event_source_mappings()
                .function_name(function_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|error| classify("list_event_source_mappings", error))?;

            for mapping in output.event_source_mappings() {
                let (Some(event_source_arn), Some(uuid)) =
                    (mapping.event_source_arn(), mapping.uuid())
                else {
                    continue;
                };
                mappings.push(ExistingEventSourceMapping {
                    event_source_arn: event_source_arn.to_string(),
                    uuid: uuid.to_string(),
                    enabled: matches!(mapping.state(), Some("Enabled" | "Enabling")),
                    batch_size: mapping
                        .batch_size()
                        .and_then(|size| u32::try_from(size).ok()),
                });
            }

            match output.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(mappings)
    }

    async fn create_event_source_mapping(
        &self,
        function_name: &str,
        mapping: &NewEventSourceMapping,
    ) -> Result<(), ProviderError> {
        let starting_position = is_stream_source(&mapping.event_source_arn)
            .then(|| EventSourcePosition::from(mapping.starting_position.as_str()));

        self.client
            .create_event_source_mapping()
            .function_name(function_name)
            .event_source_arn(&mapping.event_source_arn)
            .enabled(mapping.enabled)
            .batch_size(to_i32(mapping.batch_size))
            .set_starting_position(starting_position)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| classify("create_event_source_mapping", error))
    }

    async fn update_event_source_mapping(
        &self,
        function_name: &str,
        uuid: &str,
        enabled: Option<bool>,
        batch_size: Option<u32>,
    ) -> Result<(), ProviderError> {
        self.client
            .update_event_source_mapping()
            .uuid(uuid)
            .function_name(function_name)
            .set_enabled(enabled)
            .set_batch_size(batch_size.map(to_i32))
            .send()
            .await
            .map(|_| ())
            .map_err(|error| classify("update_event_source_mapping", error))
    }

    async fn delete_event_source_mapping(&self, uuid: &str) -> Result<(), ProviderError> {
        self.client
            .delete_event_source_mapping()
            .uuid(uuid)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| classify("delete_event_source_mapping", error))
    }

    async fn add_permission(&self, grant: &PermissionGrant) -> Result<(), ProviderError> {
        self.client
            .add_permission()
            .function_name(&grant.function_name)
            .action(INVOKE_ACTION)
            .principal(&grant.principal)
            .source_arn(&grant.source_arn)
            .statement_id(&grant.statement_id)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| classify("add_permission", error))
    }
}

pub struct AwsObjectStore {
    client: aws_sdk_s3::Client,
}

#[async_trait]
impl ObjectStore for AwsObjectStore {
    async fn create_bucket(
        &self,
        bucket: &str,
        location_constraint: Option<&str>,
    ) -> Result<(), ProviderError> {
        let configuration = location_constraint.map(|constraint| {
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(constraint))
                .build()
        });

        self.client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(configuration)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| classify("create_bucket", error))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), ProviderError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .send()
            .await
            .map(|_| ())
            .map_err(|error| classify("put_object", error))
    }

    async fn put_bucket_notification(
        &self,
        params: &BucketNotificationParams,
    ) -> Result<(), ProviderError> {
        let operation = "put_bucket_notification_configuration";
        let mut configurations = Vec::with_capacity(params.function_configurations.len());
        for entry in &params.function_configurations {
            let filter = entry.filter.as_ref().map(|filter| {
                let rules = filter
                    .rules()
                    .into_iter()
                    .map(|(name, value)| {
                        FilterRule::builder()
                            .name(FilterRuleName::from(name))
                            .value(value)
                            .build()
                    })
                    .collect();
                NotificationConfigurationFilter::builder()
                    .key(S3KeyFilter::builder().set_filter_rules(Some(rules)).build())
                    .build()
            });

            let configuration = LambdaFunctionConfiguration::builder()
                .lambda_function_arn(&entry.function_arn)
                .set_events(Some(
                    entry
                        .events
                        .iter()
                        .map(|event| Event::from(event.as_str()))
                        .collect(),
                ))
                .set_filter(filter)
                .build()
                .map_err(|error| ProviderError::other(operation, error.to_string()))?;
            configurations.push(configuration);
        }

        self.client
            .put_bucket_notification_configuration()
            .bucket(&params.bucket)
            .notification_configuration(
                NotificationConfiguration::builder()
                    .set_lambda_function_configurations(Some(configurations))
                    .build(),
            )
            .send()
            .await
            .map(|_| ())
            .map_err(|error| classify(operation, error))
    }
}

pub struct AwsScheduler {
    client: aws_sdk_eventbridge::Client,
}

#[async_trait]
impl Scheduler for AwsScheduler {
    async fn put_rule(&self, rule: &RuleDefinition<'_>) -> Result<String, ProviderError> {
        let output = self
            .client
            .put_rule()
            .name(rule.name)
            .description(rule.description)
            .state(RuleState::from(rule.state.as_str()))
            .schedule_expression(rule.schedule_expression)
            .send()
            .await
            .map_err(|error| classify("put_rule", error))?;

        output
            .rule_arn()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::other("put_rule", "response did not include a rule arn"))
    }

    async fn put_targets(
        &self,
        rule_name: &str,
        targets: &[RuleTarget<'_>],
    ) -> Result<(), ProviderError> {
        let mut built = Vec::with_capacity(targets.len());
        for target in targets {
            built.push(
                Target::builder()
                    .id(target.id)
                    .arn(target.arn)
                    .build()
                    .map_err(|error| ProviderError::other("put_targets", error.to_string()))?,
            );
        }

        let output = self
            .client
            .put_targets()
            .rule(rule_name)
            .set_targets(Some(built))
            .send()
            .await
            .map_err(|error| classify("put_targets", error))?;

        match output.failed_entries().first() {
            Some(entry) => Err(ProviderError::other(
                "put_targets",
                entry.error_message().unwrap_or("target rejected"),
            )),
            None => Ok(()),
        }
    }
}

pub struct AwsLogGroups {
    client: aws_sdk_cloudwatchlogs::Client,
}

#[async_trait]
impl LogGroups for AwsLogGroups {
    async fn create_log_group(&self, log_group_name: &str) -> Result<(), ProviderError> {
        self.client
            .create_log_group()
            .log_group_name(log_group_name)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| classify("create_log_group", error))
    }
}
