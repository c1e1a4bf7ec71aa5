//! Provider boundary for CloudFormation.
//!
//! [`CloudFormationApi`] is the seam between the orchestrator and AWS:
//! [`SdkCloudFormation`] wraps the real client and absorbs the provider's
//! "not found" and "nothing to update" conditions into typed outcomes, so
//! everything above it deals in domain values instead of SDK errors.

use aws_config::SdkConfig;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::{Capability as SdkCapability, ChangeSetType, Parameter, Stack};
use aws_sdk_cloudformation::Client;
use tracing::debug;

use crate::error::{CfError, Result};

use super::{
    Capability, ChangeSetKind, ChangeSetState, ResolvedTemplate, ResourceChange, StackSpec,
    StackState,
};

/// Disposition of an UpdateStack submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was accepted and is now in flight.
    Started,
    /// The provider reported "no updates to perform"; a valid no-op, not an
    /// error.
    NoChanges,
}

/// Subset of the CloudFormation API used by the stack lifecycle.
///
/// All methods re-derive state from the provider; implementations hold no
/// cache. "Not found" is surfaced as `Ok(None)` where absence is a valid
/// observation.
#[async_trait::async_trait]
pub trait CloudFormationApi: Send + Sync {
    async fn describe_stack(&self, name: &str) -> Result<Option<StackState>>;

    /// Submit a stack create. `disable_rollback` keeps a failed create
    /// around for inspection instead of tearing it down.
    async fn create_stack(&self, spec: &StackSpec, disable_rollback: bool) -> Result<()>;

    async fn update_stack(&self, spec: &StackSpec) -> Result<UpdateOutcome>;

    async fn delete_stack(&self, name: &str) -> Result<()>;

    async fn create_change_set(
        &self,
        spec: &StackSpec,
        change_set_name: &str,
        kind: ChangeSetKind,
    ) -> Result<()>;

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<Option<ChangeSetState>>;

    /// Fire-and-forget from the API's perspective: callers must poll the
    /// stack afterwards to learn the outcome of the execution.
    async fn execute_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()>;

    async fn delete_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()>;
}

/// Real implementation backed by the AWS SDK client.
pub struct SdkCloudFormation {
    client: Client,
}

impl SdkCloudFormation {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

/// DescribeStacks reports a missing stack as a ValidationError rather than
/// a dedicated error shape.
fn is_missing_stack(err: &impl ProvideErrorMetadata) -> bool {
    err.code() == Some("ValidationError")
        && err.message().is_some_and(|m| m.contains("does not exist"))
}

fn is_no_updates(err: &impl ProvideErrorMetadata) -> bool {
    err.code() == Some("ValidationError")
        && err
            .message()
            .is_some_and(|m| m.contains("No updates are to be performed"))
}

fn to_parameters(spec: &StackSpec) -> Vec<Parameter> {
    spec.parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn to_capabilities(spec: &StackSpec) -> Vec<SdkCapability> {
    spec.capabilities
        .iter()
        .map(|capability| match capability {
            Capability::Iam => SdkCapability::CapabilityIam,
            Capability::NamedIam => SdkCapability::CapabilityNamedIam,
            Capability::AutoExpand => SdkCapability::CapabilityAutoExpand,
        })
        .collect()
}

fn to_stack_state(stack: &Stack) -> StackState {
    let outputs = stack
        .outputs()
        .iter()
        .filter_map(|output| match (output.output_key(), output.output_value()) {
            (Some(key), Some(value)) => Some((key.to_string(), value.to_string())),
            _ => None,
        })
        .collect();

    StackState {
        name: stack.stack_name().unwrap_or_default().to_string(),
        stack_id: stack.stack_id().map(str::to_string),
        status: stack
            .stack_status()
            .map(|status| status.as_str().to_string())
            .unwrap_or_default(),
        status_reason: stack.stack_status_reason().map(str::to_string),
        outputs,
    }
}

#[async_trait::async_trait]
impl CloudFormationApi for SdkCloudFormation {
    async fn describe_stack(&self, name: &str) -> Result<Option<StackState>> {
        match self
            .client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
        {
            Ok(output) => Ok(output.stacks().first().map(to_stack_state)),
            Err(err) if is_missing_stack(&err) => {
                debug!(stack = name, "stack does not exist");
                Ok(None)
            }
            Err(err) => Err(CfError::aws("DescribeStacks", err)),
        }
    }

    async fn create_stack(&self, spec: &StackSpec, disable_rollback: bool) -> Result<()> {
        let mut request = self
            .client
            .create_stack()
            .stack_name(&spec.name)
            .disable_rollback(disable_rollback)
            .set_parameters(Some(to_parameters(spec)))
            .set_capabilities(Some(to_capabilities(spec)));
        request = match &spec.template {
            ResolvedTemplate::Body(body) => request.template_body(body),
            ResolvedTemplate::Url(url) => request.template_url(url),
        };
        request
            .send()
            .await
            .map_err(|err| CfError::aws("CreateStack", err))?;
        Ok(())
    }

    async fn update_stack(&self, spec: &StackSpec) -> Result<UpdateOutcome> {
        let mut request = self
            .client
            .update_stack()
            .stack_name(&spec.name)
            .set_parameters(Some(to_parameters(spec)))
            .set_capabilities(Some(to_capabilities(spec)));
        request = match &spec.template {
            ResolvedTemplate::Body(body) => request.template_body(body),
            ResolvedTemplate::Url(url) => request.template_url(url),
        };
        match request.send().await {
            Ok(_) => Ok(UpdateOutcome::Started),
            Err(err) if is_no_updates(&err) => Ok(UpdateOutcome::NoChanges),
            Err(err) => Err(CfError::aws("UpdateStack", err)),
        }
    }

    async fn delete_stack(&self, name: &str) -> Result<()> {
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|err| CfError::aws("DeleteStack", err))?;
        Ok(())
    }

    async fn create_change_set(
        &self,
        spec: &StackSpec,
        change_set_name: &str,
        kind: ChangeSetKind,
    ) -> Result<()> {
        let mut request = self
            .client
            .create_change_set()
            .stack_name(&spec.name)
            .change_set_name(change_set_name)
            .change_set_type(match kind {
                ChangeSetKind::Create => ChangeSetType::Create,
                ChangeSetKind::Update => ChangeSetType::Update,
            })
            .set_parameters(Some(to_parameters(spec)))
            .set_capabilities(Some(to_capabilities(spec)));
        request = match &spec.template {
            ResolvedTemplate::Body(body) => request.template_body(body),
            ResolvedTemplate::Url(url) => request.template_url(url),
        };
        request
            .send()
            .await
            .map_err(|err| CfError::aws("CreateChangeSet", err))?;
        Ok(())
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<Option<ChangeSetState>> {
        match self
            .client
            .describe_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await
        {
            Ok(output) => {
                let changes = output
                    .changes()
                    .iter()
                    .filter_map(|change| change.resource_change())
                    .map(|change| ResourceChange {
                        action: change
                            .action()
                            .map(|action| action.as_str().to_string())
                            .unwrap_or_default(),
                        logical_id: change.logical_resource_id().unwrap_or_default().to_string(),
                        resource_type: change.resource_type().unwrap_or_default().to_string(),
                        replacement: change
                            .replacement()
                            .map(|replacement| replacement.as_str().to_string()),
                    })
                    .collect();

                Ok(Some(ChangeSetState {
                    stack_name: stack_name.to_string(),
                    name: output
                        .change_set_name()
                        .unwrap_or(change_set_name)
                        .to_string(),
                    status: output
                        .status()
                        .map(|status| status.as_str().to_string())
                        .unwrap_or_default(),
                    status_reason: output.status_reason().map(str::to_string),
                    changes,
                }))
            }
            Err(err) if err.code() == Some("ChangeSetNotFound") => {
                debug!(
                    stack = stack_name,
                    change_set = change_set_name,
                    "change set does not exist"
                );
                Ok(None)
            }
            Err(err) => Err(CfError::aws("DescribeChangeSet", err)),
        }
    }

    async fn execute_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        self.client
            .execute_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await
            .map_err(|err| CfError::aws("ExecuteChangeSet", err))?;
        Ok(())
    }

    async fn delete_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        self.client
            .delete_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await
            .map_err(|err| CfError::aws("DeleteChangeSet", err))?;
        Ok(())
    }
}
