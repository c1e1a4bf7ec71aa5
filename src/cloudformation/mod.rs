//! CloudFormation stack lifecycle orchestration.
//!
//! The entry point is [`StackManager`]: `upsert` decides between creating a
//! stack, updating it directly, or going through a change set (with an
//! optional interactive review gate), and `delete` tears a stack down after
//! emptying any S3 buckets named by its outputs.
//!
//! All state is re-derived from the provider on each call; nothing is
//! cached or persisted locally.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;

use crate::error::CfError;
use crate::poll::PollVerdict;

mod api;
mod changeset;
mod stack;

pub use api::{CloudFormationApi, SdkCloudFormation, UpdateOutcome};
pub use changeset::ChangeSetManager;
pub use stack::StackManager;

/// Prefix for auto-generated change set names; a timestamp suffix keeps
/// names unique across concurrent or prior runs.
const CHANGE_SET_PREFIX: &str = "cf-utils-cloudformation-upsert-stack-";

/// Stack output keys ending in this suffix are treated as S3 bucket names
/// that must be emptied before the stack can be deleted.
const BUCKET_OUTPUT_SUFFIX: &str = "Bucket";

/// Marker that a template relies on a serverless transform. Transformed
/// resources cannot be diffed by a direct update, forcing the change-set
/// path.
const TRANSFORM_MARKER: &str = "AWS::Serverless";

/// Where a stack template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// A template file on the local filesystem, read before any remote call.
    Path(PathBuf),
    /// An inline template body.
    Body(String),
    /// An S3 HTTPS URL to an already-staged template.
    Url(String),
}

/// Template form accepted by the provider: inline body or S3 URL, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTemplate {
    Body(String),
    Url(String),
}

/// IAM capabilities a stack may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Iam,
    NamedIam,
    AutoExpand,
}

/// S3 location used to stage templates that are too large to inline or that
/// the caller wants versioned alongside other deployment artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBucket {
    pub bucket: String,
    pub prefix: Option<String>,
}

/// Per-call options for [`StackManager::upsert`].
#[derive(Debug, Clone, Default)]
pub struct UpsertOptions {
    /// Present the computed change set to the operator and require approval
    /// before mutating the stack.
    pub review: bool,
    /// Stage the template to this bucket and submit its URL instead of an
    /// inline body.
    pub artifact_store: Option<ArtifactBucket>,
    /// Overrides transform detection. Set internally when recursing after
    /// artifact staging, where the template body can no longer be read
    /// locally.
    pub contains_transforms: Option<bool>,
}

/// A request to create or update a named stack.
#[derive(Debug, Clone)]
pub struct StackRequest {
    pub name: String,
    pub template: TemplateSource,
    /// Ordered (key, value) parameter pairs; keys unique within a request.
    pub parameters: Vec<(String, String)>,
    pub capabilities: Vec<Capability>,
    pub options: UpsertOptions,
}

impl StackRequest {
    pub fn new(name: impl Into<String>, template: TemplateSource) -> Self {
        Self {
            name: name.into(),
            template,
            parameters: Vec::new(),
            capabilities: Vec::new(),
            options: UpsertOptions::default(),
        }
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn review(mut self, review: bool) -> Self {
        self.options.review = review;
        self
    }

    pub fn artifact_store(mut self, store: ArtifactBucket) -> Self {
        self.options.artifact_store = Some(store);
        self
    }
}

/// Request form handed to the provider once the template has been resolved.
#[derive(Debug, Clone)]
pub struct StackSpec {
    pub name: String,
    pub template: ResolvedTemplate,
    pub parameters: Vec<(String, String)>,
    pub capabilities: Vec<Capability>,
}

/// A stack as observed by a single describe call. Fetched fresh on every
/// poll and never cached beyond it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackState {
    pub name: String,
    pub stack_id: Option<String>,
    pub status: String,
    pub status_reason: Option<String>,
    pub outputs: BTreeMap<String, String>,
}

/// Whether a change set targets a new or an existing stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSetKind {
    Create,
    Update,
}

impl ChangeSetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSetKind::Create => "CREATE",
            ChangeSetKind::Update => "UPDATE",
        }
    }
}

/// One resource-level entry of a computed change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub action: String,
    pub logical_id: String,
    pub resource_type: String,
    pub replacement: Option<String>,
}

/// A change set as observed by a single describe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetState {
    pub stack_name: String,
    pub name: String,
    pub status: String,
    pub status_reason: Option<String>,
    pub changes: Vec<ResourceChange>,
}

/// Name for an auto-generated (non-review) change set, unique per
/// invocation.
pub fn generated_change_set_name() -> String {
    format!("{}{}", CHANGE_SET_PREFIX, Utc::now().timestamp())
}

/// Fixed name for the preview change set used by the review gate.
pub fn preview_change_set_name(stack_name: &str) -> String {
    format!("cf-utils-{stack_name}-preview")
}

/// Whether a template body relies on a serverless transform.
pub fn template_contains_transforms(body: &str) -> bool {
    body.contains(TRANSFORM_MARKER)
}

/// Classify an observed stack status.
///
/// `ROLLBACK_COMPLETE`, `UPDATE_ROLLBACK_COMPLETE` and any `*_FAILED` status
/// are terminal failures carrying the full stack detail; the remaining
/// `*_COMPLETE` statuses are terminal successes; everything else means the
/// operation is still in flight.
pub(crate) fn classify_stack(state: StackState) -> PollVerdict<StackState> {
    let status = state.status.as_str();
    if status == "ROLLBACK_COMPLETE"
        || status == "UPDATE_ROLLBACK_COMPLETE"
        || status.ends_with("_FAILED")
    {
        return PollVerdict::Failed(CfError::StackOperationFailed {
            name: state.name.clone(),
            status: state.status.clone(),
            reason: state.status_reason.clone(),
            detail: Box::new(state),
        });
    }
    if status.ends_with("_COMPLETE") {
        return PollVerdict::Done(state);
    }
    PollVerdict::Pending(state.status)
}

/// Reasons the provider gives a FAILED change set when there is nothing to
/// change. Both phrasings occur in the wild.
const NO_CHANGE_REASONS: [&str; 2] = ["No updates are to be performed", "didn't contain changes"];

/// Classify an observed change-set status.
///
/// A FAILED change set whose reason says there is nothing to diff is a
/// successful no-op (`Done(None)`), not an error.
pub(crate) fn classify_change_set(state: ChangeSetState) -> PollVerdict<Option<ChangeSetState>> {
    match state.status.as_str() {
        "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "DELETE_COMPLETE" => {
            PollVerdict::Done(Some(state))
        }
        "FAILED" => {
            let reason = state.status_reason.as_deref().unwrap_or("");
            if NO_CHANGE_REASONS.iter().any(|m| reason.contains(m)) {
                PollVerdict::Done(None)
            } else {
                PollVerdict::Failed(CfError::ChangeSetFailed {
                    stack_name: state.stack_name,
                    name: state.name,
                    status: state.status,
                    reason: state.status_reason,
                })
            }
        }
        _ => PollVerdict::Pending(state.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(status: &str) -> StackState {
        StackState {
            name: "s".into(),
            stack_id: None,
            status: status.into(),
            status_reason: None,
            outputs: BTreeMap::new(),
        }
    }

    fn change_set(status: &str, reason: Option<&str>) -> ChangeSetState {
        ChangeSetState {
            stack_name: "s".into(),
            name: "cs".into(),
            status: status.into(),
            status_reason: reason.map(str::to_string),
            changes: Vec::new(),
        }
    }

    #[test]
    fn test_transform_detection() {
        assert!(template_contains_transforms(
            "Transform: AWS::Serverless-2016-10-31\nResources: {}"
        ));
        assert!(!template_contains_transforms("Resources: {}"));
    }

    #[test]
    fn test_change_set_names() {
        assert!(generated_change_set_name().starts_with(CHANGE_SET_PREFIX));
        assert_eq!(preview_change_set_name("api"), "cf-utils-api-preview");
    }

    #[test]
    fn test_stack_classification() {
        assert!(matches!(
            classify_stack(stack("CREATE_COMPLETE")),
            PollVerdict::Done(_)
        ));
        assert!(matches!(
            classify_stack(stack("UPDATE_COMPLETE")),
            PollVerdict::Done(_)
        ));
        assert!(matches!(
            classify_stack(stack("CREATE_IN_PROGRESS")),
            PollVerdict::Pending(_)
        ));
        assert!(matches!(
            classify_stack(stack("REVIEW_IN_PROGRESS")),
            PollVerdict::Pending(_)
        ));
        for status in ["ROLLBACK_COMPLETE", "UPDATE_ROLLBACK_COMPLETE", "CREATE_FAILED"] {
            assert!(matches!(
                classify_stack(stack(status)),
                PollVerdict::Failed(CfError::StackOperationFailed { .. })
            ));
        }
    }

    #[test]
    fn test_failed_stack_keeps_detail() {
        let mut failed = stack("CREATE_FAILED");
        failed.status_reason = Some("resource limit exceeded".into());
        match classify_stack(failed) {
            PollVerdict::Failed(CfError::StackOperationFailed { detail, reason, .. }) => {
                assert_eq!(detail.status, "CREATE_FAILED");
                assert_eq!(reason.as_deref(), Some("resource limit exceeded"));
            }
            _ => panic!("expected terminal failure"),
        }
    }

    #[test]
    fn test_change_set_classification() {
        assert!(matches!(
            classify_change_set(change_set("CREATE_COMPLETE", None)),
            PollVerdict::Done(Some(_))
        ));
        assert!(matches!(
            classify_change_set(change_set("CREATE_IN_PROGRESS", None)),
            PollVerdict::Pending(_)
        ));
        assert!(matches!(
            classify_change_set(change_set("FAILED", Some("Access denied"))),
            PollVerdict::Failed(CfError::ChangeSetFailed { .. })
        ));
    }

    #[test]
    fn test_empty_change_set_is_a_no_op() {
        for reason in [
            "No updates are to be performed.",
            "The submitted information didn't contain changes. Submit different information to create a change set.",
        ] {
            assert!(matches!(
                classify_change_set(change_set("FAILED", Some(reason))),
                PollVerdict::Done(None)
            ));
        }
    }
}
