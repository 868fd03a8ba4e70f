use async_trait::async_trait;
use lambda_deploy_core::notifications::BucketNotificationParams;

use crate::error::ProviderError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates the bucket; an "already owned by you" response surfaces as a conflict.
    async fn create_bucket(
        &self,
        bucket: &str,
        location_constraint: Option<&str>,
    ) -> Result<(), ProviderError>;

    async fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), ProviderError>;

    /// Replaces the bucket's whole notification configuration.
    async fn put_bucket_notification(
        &self,
        params: &BucketNotificationParams,
    ) -> Result<(), ProviderError>;
}
