use async_trait::async_trait;

use crate::error::ProviderError;

#[async_trait]
pub trait LogGroups: Send + Sync {
    async fn create_log_group(&self, log_group_name: &str) -> Result<(), ProviderError>;
}
