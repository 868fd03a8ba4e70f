use async_trait::async_trait;
use lambda_deploy_core::contract::ScheduleState;

use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDefinition<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub state: ScheduleState,
    pub schedule_expression: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTarget<'a> {
    pub id: &'a str,
    pub arn: &'a str,
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Creates or updates the rule and returns its arn.
    async fn put_rule(&self, rule: &RuleDefinition<'_>) -> Result<String, ProviderError>;

    async fn put_targets(
        &self,
        rule_name: &str,
        targets: &[RuleTarget<'_>],
    ) -> Result<(), ProviderError>;
}
