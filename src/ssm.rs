//! SSM Parameter Store helpers.

use aws_config::SdkConfig;
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client;
use tracing::{debug, info};

use crate::error::{CfError, Result};

/// Thin wrapper over the Parameter Store API.
pub struct ParameterOps {
    client: Client,
}

impl ParameterOps {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Create or overwrite a parameter. `secure` stores it as a
    /// SecureString under the account's default KMS key.
    pub async fn put_parameter(&self, name: &str, value: &str, secure: bool) -> Result<()> {
        self.client
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(if secure {
                ParameterType::SecureString
            } else {
                ParameterType::String
            })
            .overwrite(true)
            .send()
            .await
            .map_err(|err| CfError::aws("PutParameter", err))?;
        info!(parameter = name, secure, "parameter stored");
        Ok(())
    }

    /// Fetch a parameter's value (decrypted), `None` if it does not exist.
    pub async fn get_parameter(&self, name: &str) -> Result<Option<String>> {
        match self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|parameter| parameter.value())
                .map(str::to_string)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_parameter_not_found()) =>
            {
                debug!(parameter = name, "parameter does not exist");
                Ok(None)
            }
            Err(err) => Err(CfError::aws("GetParameter", err)),
        }
    }

    /// Delete a parameter. Returns `false` when it was already absent.
    pub async fn delete_parameter(&self, name: &str) -> Result<bool> {
        match self.client.delete_parameter().name(name).send().await {
            Ok(_) => {
                info!(parameter = name, "parameter deleted");
                Ok(true)
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_parameter_not_found()) =>
            {
                debug!(parameter = name, "parameter already absent");
                Ok(false)
            }
            Err(err) => Err(CfError::aws("DeleteParameter", err)),
        }
    }
}
