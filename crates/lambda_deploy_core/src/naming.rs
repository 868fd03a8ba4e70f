use sha2::{Digest, Sha256};

pub const MAX_STATEMENT_ID_LEN: usize = 100;
pub const MAX_BUCKET_NAME_LEN: usize = 63;
pub const STORAGE_PRINCIPAL: &str = "s3.amazonaws.com";
pub const SCHEDULER_PRINCIPAL: &str = "events.amazonaws.com";

/// `<function>[-<environment>].zip`
pub fn artifact_file_name(function_name: &str, environment: Option<&str>) -> String {
    match environment.map(str::trim) {
        Some(environment) if !environment.is_empty() => {
            format!("{function_name}-{environment}.zip")
        }
        _ => format!("{function_name}.zip"),
    }
}

pub fn log_group_name(function_name: &str) -> String {
    format!("/aws/lambda/{function_name}")
}

pub fn bucket_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{bucket}")
}

pub fn schedule_statement_id(rule_name: &str) -> String {
    statement_id("schedule", rule_name)
}

pub fn storage_statement_id(bucket: &str) -> String {
    statement_id("s3", bucket)
}

fn statement_id(kind: &str, name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let mut id = format!("{kind}-{sanitized}");
    id.truncate(MAX_STATEMENT_ID_LEN);
    id
}

/// Per-region staging bucket for bucket-based code delivery.
pub fn staging_bucket_name(prefix: &str, function_name: &str, region: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{function_name}@{region}"));
    let digest = format!("{:x}", hasher.finalize());
    let suffix = format!("-{region}-{}", &digest[..8]);

    let mut head = prefix.trim_matches('-').to_ascii_lowercase();
    head.truncate(MAX_BUCKET_NAME_LEN.saturating_sub(suffix.len()));
    format!("{}{suffix}", head.trim_end_matches('-'))
}

pub fn staging_object_key(function_name: &str) -> String {
    format!("deploy-package-{function_name}.zip")
}

/// Whether the source is a stream that accepts a starting position.
pub fn is_stream_source(event_source_arn: &str) -> bool {
    let service = event_source_arn.split(':').nth(2).unwrap_or_default();
    match service {
        "kinesis" | "kafka" => true,
        "dynamodb" => event_source_arn.contains("/stream/"),
        _ => false,
    }
}
