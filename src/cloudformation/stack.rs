//! Stack lifecycle orchestration: upsert, delete, describe.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use aws_config::SdkConfig;
use tracing::{info, warn};

use crate::config::CfConfig;
use crate::confirm::{Confirm, TerminalConfirm};
use crate::error::{CfError, Result};
use crate::poll::Poller;
use crate::s3::{ObjectStore, S3ObjectStore};

use super::changeset::format_change_set;
use super::{
    classify_stack, generated_change_set_name, preview_change_set_name,
    template_contains_transforms, ArtifactBucket, ChangeSetKind, ChangeSetManager,
    CloudFormationApi, ResolvedTemplate, SdkCloudFormation, StackRequest, StackSpec, StackState,
    TemplateSource, UpdateOutcome, BUCKET_OUTPUT_SUFFIX,
};

/// Top-level entry point for the stack lifecycle.
///
/// Not internally concurrent for a given stack: each call is a single
/// logical flow of control, and concurrent calls targeting the same stack
/// name are not coordinated (the provider arbitrates such races).
pub struct StackManager {
    api: Arc<dyn CloudFormationApi>,
    store: Arc<dyn ObjectStore>,
    confirm: Arc<dyn Confirm>,
    change_sets: ChangeSetManager,
    poller: Poller,
}

impl StackManager {
    /// Build a manager against real AWS clients, prompting on the terminal
    /// when a review is requested.
    pub fn new(config: &CfConfig, sdk: &SdkConfig) -> Self {
        Self::with_components(
            Arc::new(SdkCloudFormation::new(sdk)),
            Arc::new(S3ObjectStore::new(sdk)),
            Arc::new(TerminalConfirm),
            config.poll_interval(),
        )
    }

    /// Build a manager from explicit collaborators. This is the seam used
    /// by the integration tests and by callers that want a non-terminal
    /// review prompt.
    pub fn with_components(
        api: Arc<dyn CloudFormationApi>,
        store: Arc<dyn ObjectStore>,
        confirm: Arc<dyn Confirm>,
        poll_interval: Duration,
    ) -> Self {
        let poller = Poller::new(poll_interval);
        Self {
            change_sets: ChangeSetManager::new(Arc::clone(&api), poller),
            api,
            store,
            confirm,
            poller,
        }
    }

    /// Fetch the current state of a stack, `None` if it does not exist.
    pub async fn describe(&self, name: &str) -> Result<Option<StackState>> {
        self.api.describe_stack(name).await
    }

    /// Create the stack if it does not exist, otherwise update it.
    ///
    /// Templates containing a serverless transform go through a change set
    /// for both create and update, because transformed resources cannot be
    /// diffed by the direct mutation path. With `options.review` set, an
    /// update first computes a preview change set and asks the operator for
    /// approval; the preview is deleted again whatever they decide.
    ///
    /// Resolves to the stack's terminal description, which for a no-op is
    /// simply its current stable state.
    pub async fn upsert(&self, request: StackRequest) -> Result<StackState> {
        if let Some(artifact) = request.options.artifact_store.clone() {
            return self.stage_and_recurse(request, artifact).await;
        }

        let request = resolve_template(request).await?;
        let contains_transforms = match request.options.contains_transforms {
            Some(value) => value,
            None => match &request.template {
                TemplateSource::Body(body) => template_contains_transforms(body),
                // A staged template cannot be read back locally; staging
                // threads the flag explicitly, so reaching here means the
                // caller supplied a URL directly without an override.
                _ => false,
            },
        };
        let spec = to_spec(&request)?;

        match self.api.describe_stack(&request.name).await? {
            None => {
                info!(stack = %request.name, transforms = contains_transforms, "stack does not exist, creating");
                if contains_transforms {
                    self.apply_change_set(&spec, ChangeSetKind::Create).await
                } else {
                    self.create_directly(&spec).await
                }
            }
            Some(current) => {
                if request.options.review {
                    if let Some(unchanged) = self.review_gate(&spec, &current).await? {
                        return Ok(unchanged);
                    }
                }
                info!(stack = %request.name, transforms = contains_transforms, "stack exists, updating");
                if contains_transforms {
                    self.apply_change_set(&spec, ChangeSetKind::Update).await
                } else {
                    self.update_directly(&spec).await
                }
            }
        }
    }

    /// Delete a stack, emptying every S3 bucket named by an output key
    /// ending in `Bucket` first (a non-empty bucket blocks deletion).
    ///
    /// Idempotent: deleting an absent stack succeeds without side effects.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let Some(stack) = self.api.describe_stack(name).await? else {
            info!(stack = name, "stack already absent, nothing to delete");
            return Ok(());
        };

        for (key, value) in &stack.outputs {
            if key.ends_with(BUCKET_OUTPUT_SUFFIX) {
                info!(stack = name, output = %key, bucket = %value, "emptying bucket before delete");
                self.store.empty_bucket(value).await?;
            }
        }

        info!(stack = name, "deleting stack");
        self.api.delete_stack(name).await?;
        self.wait_for_stack(name, true).await?;
        Ok(())
    }

    /// Stage the template to the artifact bucket and re-enter `upsert` with
    /// the resulting URL, carrying the transform flag derived from the
    /// local body.
    async fn stage_and_recurse(
        &self,
        request: StackRequest,
        artifact: ArtifactBucket,
    ) -> Result<StackState> {
        let TemplateSource::Path(path) = &request.template else {
            return Err(CfError::InvalidRequest(
                "artifact staging requires a local template path".into(),
            ));
        };

        let body = read_template(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                CfError::InvalidRequest(format!(
                    "template path has no usable file name: {}",
                    path.display()
                ))
            })?;
        let key = match &artifact.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), file_name),
            None => file_name.to_string(),
        };

        let url = self.store.upload(&artifact.bucket, &key, path).await?;
        info!(stack = %request.name, url = %url, "template staged, re-entering upsert");

        let mut next = request;
        next.options.contains_transforms = Some(
            next.options
                .contains_transforms
                .unwrap_or_else(|| template_contains_transforms(&body)),
        );
        next.options.artifact_store = None;
        next.template = TemplateSource::Url(url);
        Box::pin(self.upsert(next)).await
    }

    /// Compute a preview change set and ask the operator for approval.
    ///
    /// Returns `Ok(Some(state))` when the preview is empty (no-op
    /// short-circuit, skipping the prompt), `Ok(None)` when approved. The
    /// preview change set is deleted after the decision regardless of the
    /// outcome.
    async fn review_gate(
        &self,
        spec: &StackSpec,
        current: &StackState,
    ) -> Result<Option<StackState>> {
        let preview = preview_change_set_name(&spec.name);
        let Some(change_set) = self
            .change_sets
            .create_and_wait(spec, &preview, ChangeSetKind::Update)
            .await?
        else {
            info!(stack = %spec.name, "nothing to update, skipping review");
            return Ok(Some(current.clone()));
        };

        let decision = self.confirm.confirm(&format_change_set(&change_set)).await;

        // Cleanup is unconditional, including the rejection and error paths.
        if let Err(err) = self.change_sets.delete(&spec.name, &preview).await {
            warn!(stack = %spec.name, change_set = %preview, error = %err, "failed to delete preview change set");
        }

        if decision? {
            Ok(None)
        } else {
            Err(CfError::ReviewerRejected(spec.name.clone()))
        }
    }

    async fn create_directly(&self, spec: &StackSpec) -> Result<StackState> {
        // Rollback stays disabled so a failed create remains inspectable.
        self.api.create_stack(spec, true).await?;
        self.expect_stack(&spec.name).await
    }

    async fn update_directly(&self, spec: &StackSpec) -> Result<StackState> {
        match self.api.update_stack(spec).await? {
            UpdateOutcome::Started => info!(stack = %spec.name, "update submitted"),
            UpdateOutcome::NoChanges => {
                info!(stack = %spec.name, "no updates to perform")
            }
        }
        self.expect_stack(&spec.name).await
    }

    async fn apply_change_set(&self, spec: &StackSpec, kind: ChangeSetKind) -> Result<StackState> {
        let name = generated_change_set_name();
        match self.change_sets.create_and_wait(spec, &name, kind).await? {
            None => {
                info!(stack = %spec.name, "change set is empty, nothing to apply");
                self.expect_stack(&spec.name).await
            }
            Some(_) => {
                self.change_sets.execute(&spec.name, &name).await?;
                self.expect_stack(&spec.name).await
            }
        }
    }

    /// Poll the stack to a terminal status.
    async fn wait_for_stack(
        &self,
        name: &str,
        not_found_is_success: bool,
    ) -> Result<Option<StackState>> {
        let api = Arc::clone(&self.api);
        let stack = name.to_string();
        self.poller
            .until_terminal(
                "stack",
                name,
                move || {
                    let api = Arc::clone(&api);
                    let stack = stack.clone();
                    async move { api.describe_stack(&stack).await }
                },
                classify_stack,
                not_found_is_success,
            )
            .await
    }

    /// Poll a stack that is expected to exist to a stable terminal status.
    async fn expect_stack(&self, name: &str) -> Result<StackState> {
        self.wait_for_stack(name, false)
            .await?
            .ok_or_else(|| CfError::NotFound {
                resource: "stack",
                name: name.to_string(),
            })
    }
}

async fn read_template(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(body) => Ok(body),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(CfError::TemplateNotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(err.into()),
    }
}

/// Resolve a `Path` template into its inline body, failing fast before any
/// remote call when the file is absent.
async fn resolve_template(mut request: StackRequest) -> Result<StackRequest> {
    if let TemplateSource::Path(path) = &request.template {
        let body = read_template(path).await?;
        request.template = TemplateSource::Body(body);
    }
    Ok(request)
}

fn to_spec(request: &StackRequest) -> Result<StackSpec> {
    let template = match &request.template {
        TemplateSource::Body(body) => ResolvedTemplate::Body(body.clone()),
        TemplateSource::Url(url) => ResolvedTemplate::Url(url.clone()),
        TemplateSource::Path(path) => {
            return Err(CfError::InvalidRequest(format!(
                "unresolved template path: {}",
                path.display()
            )))
        }
    };
    Ok(StackSpec {
        name: request.name.clone(),
        template,
        parameters: request.parameters.clone(),
        capabilities: request.capabilities.clone(),
    })
}
