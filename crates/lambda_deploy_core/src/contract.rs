use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MANIFEST_SCHEMA_VERSION: &str = "v1";
pub const DEFAULT_MEMORY_SIZE_MB: u32 = 128;
pub const DEFAULT_TIMEOUT_SECS: u32 = 3;
pub const MIN_MEMORY_SIZE_MB: u32 = 128;
pub const MAX_MEMORY_SIZE_MB: u32 = 10_240;
pub const MAX_TIMEOUT_SECS: u32 = 900;
pub const DEFAULT_BATCH_SIZE: u32 = 100;
pub const MAX_BATCH_SIZE: u32 = 10_000;

pub type EnvironmentVariables = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VpcConfig {
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TracingMode {
    Active,
    PassThrough,
}

impl TracingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::PassThrough => "PassThrough",
        }
    }
}

/// Function definition shared by every target region of one deploy call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentSpec {
    pub function_name: String,
    pub regions: Vec<String>,
    pub handler: String,
    pub role: String,
    pub runtime: String,
    #[serde(default = "default_memory_size")]
    pub memory_size: u32,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub publish: bool,
    #[serde(default)]
    pub vpc: Option<VpcConfig>,
    #[serde(default)]
    pub environment: EnvironmentVariables,
    #[serde(default)]
    pub dead_letter_target: Option<String>,
    #[serde(default)]
    pub tracing_mode: Option<TracingMode>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub kms_key_arn: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartingPosition {
    #[default]
    Latest,
    TrimHorizon,
    AtTimestamp,
}

impl StartingPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "LATEST",
            Self::TrimHorizon => "TRIM_HORIZON",
            Self::AtTimestamp => "AT_TIMESTAMP",
        }
    }
}

/// Desired event-source binding. `event_source_arn` is the diff key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventSourceSpec {
    pub event_source_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_position: Option<StartingPosition>,
}

impl EventSourceSpec {
    pub fn new(event_source_arn: impl Into<String>) -> Self {
        Self {
            event_source_arn: event_source_arn.into(),
            enabled: None,
            batch_size: None,
            starting_position: None,
        }
    }

    /// Fills every omitted field with the creation defaults.
    pub fn with_defaults(&self) -> NewEventSourceMapping {
        NewEventSourceMapping {
            event_source_arn: self.event_source_arn.clone(),
            enabled: self.enabled.unwrap_or(false),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            starting_position: self.starting_position.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEventSourceMapping {
    pub event_source_arn: String,
    pub enabled: bool,
    pub batch_size: u32,
    pub starting_position: StartingPosition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExistingEventSourceMapping {
    pub event_source_arn: String,
    pub uuid: String,
    pub enabled: bool,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleState {
    Enabled,
    Disabled,
}

impl ScheduleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        }
    }
}

/// Declared schedule; bound to a function arn once the function exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleEvent {
    pub name: String,
    pub schedule_expression: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleSpec {
    pub rule_name: String,
    pub schedule_expression: String,
    pub state: ScheduleState,
    pub description: String,
    pub function_arn: String,
}

impl ScheduleSpec {
    pub fn for_function(event: &ScheduleEvent, function_arn: impl Into<String>) -> Self {
        let description = match event.description.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => format!("{} - {}", event.name, event.schedule_expression),
        };
        Self {
            rule_name: event.name.clone(),
            schedule_expression: event.schedule_expression.clone(),
            state: if event.enabled {
                ScheduleState::Enabled
            } else {
                ScheduleState::Disabled
            },
            description,
            function_arn: function_arn.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl KeyFilter {
    /// Filter rules as `(name, value)` pairs in provider order.
    pub fn rules(&self) -> Vec<(&'static str, &str)> {
        let mut rules = Vec::with_capacity(2);
        if let Some(prefix) = self.prefix.as_deref() {
            rules.push(("prefix", prefix));
        }
        if let Some(suffix) = self.suffix.as_deref() {
            rules.push(("suffix", suffix));
        }
        rules
    }
}

/// Declared storage trigger; bound to a function arn once the function exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageEvent {
    pub bucket: String,
    pub events: Vec<String>,
    #[serde(default)]
    pub filter: Option<KeyFilter>,
}

/// One bucket-notification request for one function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerParams {
    pub bucket: String,
    pub events: Vec<String>,
    pub function_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<KeyFilter>,
}

impl TriggerParams {
    pub fn for_function(event: &StorageEvent, function_arn: impl Into<String>) -> Self {
        Self {
            bucket: event.bucket.clone(),
            events: event.events.clone(),
            function_arn: function_arn.into(),
            filter: event.filter.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CodeDelivery {
    #[default]
    Direct,
    Bucket {
        prefix: String,
    },
}

/// Complete desired state for one deploy invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployManifest {
    pub function: DeploymentSpec,
    #[serde(default)]
    pub event_sources: Vec<EventSourceSpec>,
    #[serde(default)]
    pub schedules: Vec<ScheduleEvent>,
    #[serde(default)]
    pub storage_triggers: Vec<StorageEvent>,
    #[serde(default)]
    pub code_delivery: CodeDelivery,
    #[serde(default)]
    pub create_log_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn default_memory_size() -> u32 {
    DEFAULT_MEMORY_SIZE_MB
}

pub fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

pub fn normalize_manifest(mut manifest: DeployManifest) -> Result<DeployManifest, ValidationError> {
    let function = &mut manifest.function;
    function.function_name = function.function_name.trim().to_string();
    if function.function_name.is_empty() {
        return Err(ValidationError::new("function_name cannot be empty"));
    }

    function.regions = function
        .regions
        .iter()
        .map(|region| region.trim().to_string())
        .collect();
    if function.regions.is_empty() {
        return Err(ValidationError::new("at least one region is required"));
    }
    let mut seen_regions = BTreeSet::new();
    for region in &function.regions {
        if region.is_empty() {
            return Err(ValidationError::new("region names must be non-empty strings"));
        }
        if !seen_regions.insert(region.as_str()) {
            return Err(ValidationError::new(format!(
                "region '{region}' is listed more than once"
            )));
        }
    }

    for (field, value) in [
        ("handler", &function.handler),
        ("role", &function.role),
        ("runtime", &function.runtime),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::new(format!("{field} cannot be empty")));
        }
    }

    if !(MIN_MEMORY_SIZE_MB..=MAX_MEMORY_SIZE_MB).contains(&function.memory_size) {
        return Err(ValidationError::new(format!(
            "memory_size must be between {MIN_MEMORY_SIZE_MB} and {MAX_MEMORY_SIZE_MB} MB"
        )));
    }

    if function.timeout == 0 || function.timeout > MAX_TIMEOUT_SECS {
        return Err(ValidationError::new(format!(
            "timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds"
        )));
    }

    let mut seen_sources = BTreeSet::new();
    for source in &manifest.event_sources {
        if source.event_source_arn.trim().is_empty() {
            return Err(ValidationError::new("event_source_arn cannot be empty"));
        }
        if !seen_sources.insert(source.event_source_arn.as_str()) {
            return Err(ValidationError::new(format!(
                "event source '{}' is declared more than once",
                source.event_source_arn
            )));
        }
        if let Some(batch_size) = source.batch_size {
            if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
                return Err(ValidationError::new(format!(
                    "batch_size for '{}' must be between 1 and {MAX_BATCH_SIZE}",
                    source.event_source_arn
                )));
            }
        }
    }

    let mut seen_schedules = BTreeSet::new();
    for schedule in &manifest.schedules {
        if schedule.name.trim().is_empty() {
            return Err(ValidationError::new("schedule name cannot be empty"));
        }
        if schedule.schedule_expression.trim().is_empty() {
            return Err(ValidationError::new(format!(
                "schedule '{}' requires a schedule_expression",
                schedule.name
            )));
        }
        if !seen_schedules.insert(schedule.name.as_str()) {
            return Err(ValidationError::new(format!(
                "schedule '{}' is declared more than once",
                schedule.name
            )));
        }
    }

    for trigger in &manifest.storage_triggers {
        if trigger.bucket.trim().is_empty() {
            return Err(ValidationError::new("storage trigger bucket cannot be empty"));
        }
        if trigger.events.is_empty() {
            return Err(ValidationError::new(format!(
                "storage trigger for bucket '{}' requires at least one event",
                trigger.bucket
            )));
        }
    }

    if let CodeDelivery::Bucket { prefix } = &manifest.code_delivery {
        if prefix.trim().is_empty() {
            return Err(ValidationError::new("code_delivery bucket prefix cannot be empty"));
        }
    }

    Ok(manifest)
}

pub fn manifest_fingerprint(manifest: &DeployManifest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(manifest));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> DeployManifest {
        DeployManifest {
            function: DeploymentSpec {
                function_name: " thumbnailer ".to_string(),
                regions: vec!["us-east-1".to_string(), "eu-west-1".to_string()],
                handler: "index.handler".to_string(),
                role: "arn:aws:iam::123456789012:role/lambda".to_string(),
                runtime: "nodejs20.x".to_string(),
                memory_size: 256,
                timeout: 30,
                description: String::new(),
                publish: false,
                vpc: None,
                environment: EnvironmentVariables::new(),
                dead_letter_target: None,
                tracing_mode: None,
                layers: Vec::new(),
                kms_key_arn: None,
                tags: BTreeMap::new(),
            },
            event_sources: vec![EventSourceSpec::new("arn:aws:sqs:us-east-1:1:jobs")],
            schedules: Vec::new(),
            storage_triggers: Vec::new(),
            code_delivery: CodeDelivery::Direct,
            create_log_group: false,
        }
    }

    #[test]
    fn normalize_manifest_trims_function_name() {
        let normalized = normalize_manifest(sample_manifest()).expect("manifest should pass");
        assert_eq!(normalized.function.function_name, "thumbnailer");
    }

    #[test]
    fn normalize_manifest_rejects_duplicate_event_sources() {
        let mut manifest = sample_manifest();
        manifest
            .event_sources
            .push(EventSourceSpec::new("arn:aws:sqs:us-east-1:1:jobs"));

        let error = normalize_manifest(manifest).expect_err("manifest should fail");
        assert_eq!(
            error.message(),
            "event source 'arn:aws:sqs:us-east-1:1:jobs' is declared more than once"
        );
    }

    #[test]
    fn normalize_manifest_rejects_duplicate_regions() {
        let mut manifest = sample_manifest();
        manifest.function.regions.push(" us-east-1".to_string());

        let error = normalize_manifest(manifest).expect_err("manifest should fail");
        assert_eq!(error.message(), "region 'us-east-1' is listed more than once");
    }

    #[test]
    fn normalize_manifest_rejects_out_of_range_timeout() {
        let mut manifest = sample_manifest();
        manifest.function.timeout = 901;

        let error = normalize_manifest(manifest).expect_err("manifest should fail");
        assert!(error.message().starts_with("timeout must be between"));
    }

    #[test]
    fn manifest_deserializes_with_defaults() {
        let manifest: DeployManifest = serde_json::from_str(
            r#"{
                "function": {
                    "function_name": "worker",
                    "regions": ["us-west-2"],
                    "handler": "index.handler",
                    "role": "arn:aws:iam::1:role/r",
                    "runtime": "nodejs20.x"
                },
                "schedules": [{"name": "nightly", "schedule_expression": "rate(1 day)"}]
            }"#,
        )
        .expect("manifest should parse");

        assert_eq!(manifest.function.memory_size, DEFAULT_MEMORY_SIZE_MB);
        assert_eq!(manifest.function.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(manifest.code_delivery, CodeDelivery::Direct);
        assert!(manifest.schedules[0].enabled);
    }

    #[test]
    fn schedule_description_defaults_to_name_and_expression() {
        let event = ScheduleEvent {
            name: "nightly".to_string(),
            schedule_expression: "cron(0 3 * * ? *)".to_string(),
            enabled: false,
            description: None,
        };

        let spec = ScheduleSpec::for_function(&event, "arn:aws:lambda:us-east-1:1:function:f");
        assert_eq!(spec.description, "nightly - cron(0 3 * * ? *)");
        assert_eq!(spec.state, ScheduleState::Disabled);
    }

    #[test]
    fn fingerprint_is_stable_for_identical_manifests() {
        let manifest = sample_manifest();
        assert_eq!(
            manifest_fingerprint(&manifest),
            manifest_fingerprint(&manifest.clone())
        );
    }
}
