//! Lambda code deployment helpers.

use std::path::Path;

use aws_config::SdkConfig;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::Client;
use tracing::info;

use crate::error::{CfError, Result};

/// Thin wrapper over the Lambda API for pushing new function code.
pub struct LambdaOps {
    client: Client,
}

impl LambdaOps {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Point a function at a deployment package already staged in S3.
    pub async fn update_code_from_s3(
        &self,
        function_name: &str,
        bucket: &str,
        key: &str,
    ) -> Result<()> {
        self.client
            .update_function_code()
            .function_name(function_name)
            .s3_bucket(bucket)
            .s3_key(key)
            .send()
            .await
            .map_err(|err| CfError::aws("UpdateFunctionCode", err))?;
        info!(function = function_name, bucket, key, "function code updated from S3");
        Ok(())
    }

    /// Upload a local zip file as the function's new code.
    pub async fn update_code_from_file(&self, function_name: &str, zip: &Path) -> Result<()> {
        let bytes = tokio::fs::read(zip).await?;
        self.client
            .update_function_code()
            .function_name(function_name)
            .zip_file(Blob::new(bytes))
            .send()
            .await
            .map_err(|err| CfError::aws("UpdateFunctionCode", err))?;
        info!(function = function_name, zip = %zip.display(), "function code updated from file");
        Ok(())
    }

    /// Publish the current code as an immutable version, returning the
    /// version number.
    pub async fn publish_version(
        &self,
        function_name: &str,
        description: Option<&str>,
    ) -> Result<String> {
        let published = self
            .client
            .publish_version()
            .function_name(function_name)
            .set_description(description.map(str::to_string))
            .send()
            .await
            .map_err(|err| CfError::aws("PublishVersion", err))?;

        let version = published.version().unwrap_or_default().to_string();
        info!(function = function_name, version = %version, "published function version");
        Ok(version)
    }
}
