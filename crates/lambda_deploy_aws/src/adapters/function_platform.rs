use async_trait::async_trait;
use lambda_deploy_core::contract::{DeploymentSpec, ExistingEventSourceMapping, NewEventSourceMapping};

use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub function_name: String,
    pub function_arn: String,
}

/// Where the platform should read the function code from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeLocation<'a> {
    ZipFile(&'a [u8]),
    Bucket { bucket: &'a str, key: &'a str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub function_name: String,
    pub principal: String,
    pub source_arn: String,
    pub statement_id: String,
}

#[async_trait]
pub trait FunctionPlatform: Send + Sync {
    async fn get_function(&self, function_name: &str) -> Result<FunctionInfo, ProviderError>;

    async fn create_function(
        &self,
        spec: &DeploymentSpec,
        code: CodeLocation<'_>,
    ) -> Result<FunctionInfo, ProviderError>;

    async fn update_function_code(
        &self,
        function_name: &str,
        code: CodeLocation<'_>,
        publish: bool,
    ) -> Result<FunctionInfo, ProviderError>;

    async fn update_function_configuration(
        &self,
        spec: &DeploymentSpec,
    ) -> Result<FunctionInfo, ProviderError>;

    async fn list_event_source_mappings(
        &self,
        function_name: &str,
    ) -> Result<Vec<ExistingEventSourceMapping>, ProviderError>;

    async fn create_event_source_mapping(
        &self,
        function_name: &str,
        mapping: &NewEventSourceMapping,
    ) -> Result<(), ProviderError>;

    async fn update_event_source_mapping(
        &self,
        function_name: &str,
        uuid: &str,
        enabled: Option<bool>,
        batch_size: Option<u32>,
    ) -> Result<(), ProviderError>;

    async fn delete_event_source_mapping(&self, uuid: &str) -> Result<(), ProviderError>;

    async fn add_permission(&self, grant: &PermissionGrant) -> Result<(), ProviderError>;
}
