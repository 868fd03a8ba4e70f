use lambda_deploy_core::contract::ScheduleSpec;
use lambda_deploy_core::naming::{schedule_statement_id, SCHEDULER_PRINCIPAL};
use serde::Serialize;

use crate::adapters::function_platform::{FunctionPlatform, PermissionGrant};
use crate::adapters::scheduler::{RuleDefinition, RuleTarget, Scheduler};
use crate::adapters::{tolerate_conflict, Applied};
use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedSchedule {
    pub rule_name: String,
    pub rule_arn: String,
    pub permission: Applied,
}

/// Publishes one schedule: put rule, grant invoke on the rule arn, attach the
/// function as the rule's single target. Each step needs the previous one, and
/// a failure stops the sequence without undoing earlier steps.
pub async fn publish(
    platform: &dyn FunctionPlatform,
    scheduler: &dyn Scheduler,
    function_name: &str,
    spec: &ScheduleSpec,
) -> Result<PublishedSchedule, ProviderError> {
    let rule_arn = scheduler
        .put_rule(&RuleDefinition {
            name: &spec.rule_name,
            description: &spec.description,
            state: spec.state,
            schedule_expression: &spec.schedule_expression,
        })
        .await?;

    let permission = tolerate_conflict(
        platform
            .add_permission(&PermissionGrant {
                function_name: function_name.to_string(),
                principal: SCHEDULER_PRINCIPAL.to_string(),
                source_arn: rule_arn.clone(),
                statement_id: schedule_statement_id(&spec.rule_name),
            })
            .await,
    )?;

    // Target id is the rule name so a re-publish replaces the previous target.
    scheduler
        .put_targets(
            &spec.rule_name,
            &[RuleTarget {
                id: &spec.rule_name,
                arn: &spec.function_arn,
            }],
        )
        .await?;

    tracing::info!(
        component = "schedule",
        rule = %spec.rule_name,
        rule_arn = %rule_arn,
        state = spec.state.as_str(),
        "schedule published"
    );

    Ok(PublishedSchedule {
        rule_name: spec.rule_name.clone(),
        rule_arn,
        permission,
    })
}
