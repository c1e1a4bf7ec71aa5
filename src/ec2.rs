//! EC2 key-pair management helpers.

use aws_config::SdkConfig;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::Client;
use tracing::{debug, info};

use crate::error::{CfError, Result};

/// Thin wrapper over the EC2 key-pair API.
pub struct KeyPairOps {
    client: Client,
}

fn is_missing_key_pair(err: &impl ProvideErrorMetadata) -> bool {
    err.code() == Some("InvalidKeyPair.NotFound")
}

impl KeyPairOps {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Create the key pair if it does not exist.
    ///
    /// Returns the private key material when the pair was newly created;
    /// `None` when it already existed (the provider never hands the
    /// material out again).
    pub async fn ensure_key_pair(&self, name: &str) -> Result<Option<String>> {
        match self
            .client
            .describe_key_pairs()
            .key_names(name)
            .send()
            .await
        {
            Ok(_) => {
                debug!(key_pair = name, "key pair already exists");
                Ok(None)
            }
            Err(err) if is_missing_key_pair(&err) => {
                let created = self
                    .client
                    .create_key_pair()
                    .key_name(name)
                    .send()
                    .await
                    .map_err(|err| CfError::aws("CreateKeyPair", err))?;
                info!(key_pair = name, "key pair created");
                Ok(created.key_material().map(str::to_string))
            }
            Err(err) => Err(CfError::aws("DescribeKeyPairs", err)),
        }
    }

    /// Delete a key pair. Deleting an absent pair is a no-op on the
    /// provider side, so this is idempotent.
    pub async fn delete_key_pair(&self, name: &str) -> Result<()> {
        self.client
            .delete_key_pair()
            .key_name(name)
            .send()
            .await
            .map_err(|err| CfError::aws("DeleteKeyPair", err))?;
        info!(key_pair = name, "key pair deleted");
        Ok(())
    }
}
