//! IoT policy version rotation helpers.

use aws_config::SdkConfig;
use aws_sdk_iot::Client;
use tracing::{debug, info};

use crate::error::{CfError, Result};

/// The provider keeps at most this many versions of a policy.
const MAX_POLICY_VERSIONS: usize = 5;

/// Thin wrapper over the IoT policy API.
pub struct IotPolicyOps {
    client: Client,
}

/// Pick the version to evict before creating a new one: the oldest
/// non-default version, by numeric version id.
fn evictable_version(versions: &[(String, bool)]) -> Option<String> {
    if versions.len() < MAX_POLICY_VERSIONS {
        return None;
    }
    versions
        .iter()
        .filter(|(_, is_default)| !is_default)
        .min_by_key(|(id, _)| id.parse::<u64>().unwrap_or(u64::MAX))
        .map(|(id, _)| id.clone())
}

impl IotPolicyOps {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Publish a new default version of a policy, deleting the oldest
    /// non-default version first when the policy is at the version limit.
    /// Returns the new version id.
    pub async fn rotate_policy_version(
        &self,
        policy_name: &str,
        policy_document: &str,
    ) -> Result<String> {
        let listed = self
            .client
            .list_policy_versions()
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|err| CfError::aws("ListPolicyVersions", err))?;

        let versions: Vec<(String, bool)> = listed
            .policy_versions()
            .iter()
            .filter_map(|version| {
                version
                    .version_id()
                    .map(|id| (id.to_string(), version.is_default_version()))
            })
            .collect();

        if let Some(version_id) = evictable_version(&versions) {
            debug!(policy = policy_name, version = %version_id, "evicting oldest policy version");
            self.client
                .delete_policy_version()
                .policy_name(policy_name)
                .policy_version_id(&version_id)
                .send()
                .await
                .map_err(|err| CfError::aws("DeletePolicyVersion", err))?;
        }

        let created = self
            .client
            .create_policy_version()
            .policy_name(policy_name)
            .policy_document(policy_document)
            .set_as_default(true)
            .send()
            .await
            .map_err(|err| CfError::aws("CreatePolicyVersion", err))?;

        let version = created.policy_version_id().unwrap_or_default().to_string();
        info!(policy = policy_name, version = %version, "policy version rotated");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(ids: &[(&str, bool)]) -> Vec<(String, bool)> {
        ids.iter()
            .map(|(id, is_default)| (id.to_string(), *is_default))
            .collect()
    }

    #[test]
    fn test_no_eviction_below_limit() {
        let v = versions(&[("1", true), ("2", false)]);
        assert_eq!(evictable_version(&v), None);
    }

    #[test]
    fn test_evicts_oldest_non_default_at_limit() {
        let v = versions(&[
            ("1", false),
            ("2", false),
            ("3", true),
            ("4", false),
            ("5", false),
        ]);
        assert_eq!(evictable_version(&v), Some("1".to_string()));
    }

    #[test]
    fn test_default_version_is_never_evicted() {
        let v = versions(&[
            ("1", true),
            ("2", false),
            ("3", false),
            ("4", false),
            ("5", false),
        ]);
        assert_eq!(evictable_version(&v), Some("2".to_string()));
    }
}
