//! CloudWatch Logs cleanup helpers.

use aws_config::SdkConfig;
use aws_sdk_cloudwatchlogs::Client;
use tracing::info;

use crate::error::{CfError, Result};

/// Thin wrapper over the CloudWatch Logs API.
pub struct LogOps {
    client: Client,
}

impl LogOps {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Delete every log group whose name starts with `prefix` (typically
    /// `/aws/lambda/<stack-name>`), returning the number deleted.
    pub async fn delete_log_groups_with_prefix(&self, prefix: &str) -> Result<usize> {
        let mut next_token: Option<String> = None;
        let mut deleted = 0usize;

        loop {
            let page = self
                .client
                .describe_log_groups()
                .log_group_name_prefix(prefix)
                .set_next_token(next_token.clone())
                .send()
                .await
                .map_err(|err| CfError::aws("DescribeLogGroups", err))?;

            for group in page.log_groups() {
                if let Some(name) = group.log_group_name() {
                    self.client
                        .delete_log_group()
                        .log_group_name(name)
                        .send()
                        .await
                        .map_err(|err| CfError::aws("DeleteLogGroup", err))?;
                    info!(log_group = name, "deleted log group");
                    deleted += 1;
                }
            }

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(deleted)
    }
}
