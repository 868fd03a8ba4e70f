use serde::{Deserialize, Serialize};

use crate::contract::{KeyFilter, TriggerParams};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionNotificationConfig {
    pub events: Vec<String>,
    pub function_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<KeyFilter>,
}

/// Full notification configuration written to one bucket in a single replace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketNotificationParams {
    pub bucket: String,
    pub function_configurations: Vec<FunctionNotificationConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvokeGrant {
    pub bucket: String,
    pub function_arn: String,
}

/// Groups trigger requests by bucket.
///
/// Buckets appear in first-seen order and each bucket keeps its triggers in
/// insertion order, since overlapping filters are resolved by position.
pub fn merge(triggers: &[TriggerParams]) -> Vec<BucketNotificationParams> {
    let mut merged: Vec<BucketNotificationParams> = Vec::new();

    for trigger in triggers {
        let config = FunctionNotificationConfig {
            events: trigger.events.clone(),
            function_arn: trigger.function_arn.clone(),
            filter: trigger
                .filter
                .clone()
                .filter(|filter| !filter.rules().is_empty()),
        };

        match merged
            .iter_mut()
            .find(|params| params.bucket == trigger.bucket)
        {
            Some(params) => params.function_configurations.push(config),
            None => merged.push(BucketNotificationParams {
                bucket: trigger.bucket.clone(),
                function_configurations: vec![config],
            }),
        }
    }

    merged
}

/// Distinct `(bucket, function)` pairs that need an invoke grant, in first-seen order.
pub fn invoke_grants(triggers: &[TriggerParams]) -> Vec<InvokeGrant> {
    let mut grants: Vec<InvokeGrant> = Vec::new();
    for trigger in triggers {
        let grant = InvokeGrant {
            bucket: trigger.bucket.clone(),
            function_arn: trigger.function_arn.clone(),
        };
        if !grants.contains(&grant) {
            grants.push(grant);
        }
    }
    grants
}
