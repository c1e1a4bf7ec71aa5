//! Cognito user pool admin helpers.

use aws_config::SdkConfig;
use aws_sdk_cognitoidentityprovider::types::MessageActionType;
use aws_sdk_cognitoidentityprovider::Client;
use tracing::{debug, info};

use crate::error::{CfError, Result};

/// Thin wrapper over the Cognito admin API for provisioning users from
/// deployment tooling.
pub struct UserPoolOps {
    client: Client,
}

impl UserPoolOps {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Admin-create a user with a temporary password, suppressing the
    /// invitation message. A user that already exists is left untouched.
    pub async fn create_user(
        &self,
        user_pool_id: &str,
        username: &str,
        temporary_password: &str,
    ) -> Result<()> {
        match self
            .client
            .admin_create_user()
            .user_pool_id(user_pool_id)
            .username(username)
            .temporary_password(temporary_password)
            .message_action(MessageActionType::Suppress)
            .send()
            .await
        {
            Ok(_) => {
                info!(user_pool = user_pool_id, username, "user created");
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_username_exists_exception()) =>
            {
                debug!(user_pool = user_pool_id, username, "user already exists");
                Ok(())
            }
            Err(err) => Err(CfError::aws("AdminCreateUser", err)),
        }
    }

    /// Set a permanent password, completing the forced-change flow started
    /// by [`create_user`].
    ///
    /// [`create_user`]: UserPoolOps::create_user
    pub async fn set_permanent_password(
        &self,
        user_pool_id: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        self.client
            .admin_set_user_password()
            .user_pool_id(user_pool_id)
            .username(username)
            .password(password)
            .permanent(true)
            .send()
            .await
            .map_err(|err| CfError::aws("AdminSetUserPassword", err))?;
        info!(user_pool = user_pool_id, username, "permanent password set");
        Ok(())
    }
}
