//! Change-set creation, polling and cleanup.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::poll::Poller;

use super::{classify_change_set, ChangeSetKind, ChangeSetState, CloudFormationApi, StackSpec};

/// Drives a change set from creation to a terminal status.
///
/// Executing a change set is fire-and-forget: after [`execute`] the caller
/// polls the underlying *stack*, not the change set, to learn the outcome.
///
/// [`execute`]: ChangeSetManager::execute
#[derive(Clone)]
pub struct ChangeSetManager {
    api: Arc<dyn CloudFormationApi>,
    poller: Poller,
}

impl ChangeSetManager {
    pub fn new(api: Arc<dyn CloudFormationApi>, poller: Poller) -> Self {
        Self { api, poller }
    }

    /// Create a change set and wait for it to reach a terminal status.
    ///
    /// Returns `Ok(None)` when the provider reports there is nothing to
    /// change; the dead FAILED change set is deleted before returning, so
    /// every change set this manager creates is either executed or deleted
    /// by its caller's flow.
    pub async fn create_and_wait(
        &self,
        spec: &StackSpec,
        change_set_name: &str,
        kind: ChangeSetKind,
    ) -> Result<Option<ChangeSetState>> {
        info!(
            stack = %spec.name,
            change_set = change_set_name,
            kind = kind.as_str(),
            "creating change set"
        );
        self.api
            .create_change_set(spec, change_set_name, kind)
            .await?;

        let outcome = self.wait(&spec.name, change_set_name).await?;
        if outcome.is_none() {
            info!(
                stack = %spec.name,
                change_set = change_set_name,
                "change set is empty, discarding it"
            );
            self.delete(&spec.name, change_set_name).await?;
        }
        Ok(outcome)
    }

    /// Poll a change set to a terminal status. `Ok(None)` is the empty
    /// no-op terminal.
    pub async fn wait(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<Option<ChangeSetState>> {
        let api = Arc::clone(&self.api);
        let stack = stack_name.to_string();
        let name = change_set_name.to_string();

        let terminal = self
            .poller
            .until_terminal(
                "change set",
                change_set_name,
                move || {
                    let api = Arc::clone(&api);
                    let stack = stack.clone();
                    let name = name.clone();
                    async move { api.describe_change_set(&stack, &name).await }
                },
                classify_change_set,
                false,
            )
            .await?;

        Ok(terminal.flatten())
    }

    pub async fn execute(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        info!(
            stack = stack_name,
            change_set = change_set_name,
            "executing change set"
        );
        self.api
            .execute_change_set(stack_name, change_set_name)
            .await
    }

    pub async fn delete(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        debug!(
            stack = stack_name,
            change_set = change_set_name,
            "deleting change set"
        );
        self.api
            .delete_change_set(stack_name, change_set_name)
            .await
    }
}

/// Render a change set as a reviewable summary, one resource per line.
pub(crate) fn format_change_set(change_set: &ChangeSetState) -> String {
    let mut lines = vec![format!(
        "Change set '{}' for stack '{}':",
        change_set.name, change_set.stack_name
    )];
    for change in &change_set.changes {
        let replacement = match change.replacement.as_deref() {
            Some(value) if value != "False" => format!(" (replacement: {value})"),
            _ => String::new(),
        };
        lines.push(format!(
            "  {:<8} {} [{}]{}",
            change.action, change.logical_id, change.resource_type, replacement
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudformation::ResourceChange;

    #[test]
    fn test_format_change_set() {
        let change_set = ChangeSetState {
            stack_name: "api".into(),
            name: "cf-utils-api-preview".into(),
            status: "CREATE_COMPLETE".into(),
            status_reason: None,
            changes: vec![
                ResourceChange {
                    action: "Modify".into(),
                    logical_id: "Table".into(),
                    resource_type: "AWS::DynamoDB::Table".into(),
                    replacement: Some("True".into()),
                },
                ResourceChange {
                    action: "Add".into(),
                    logical_id: "Queue".into(),
                    resource_type: "AWS::SQS::Queue".into(),
                    replacement: None,
                },
            ],
        };

        let rendered = format_change_set(&change_set);
        assert!(rendered.contains("cf-utils-api-preview"));
        assert!(rendered.contains("Modify"));
        assert!(rendered.contains("Table [AWS::DynamoDB::Table] (replacement: True)"));
        assert!(rendered.contains("Queue [AWS::SQS::Queue]"));
        assert!(!rendered.contains("Queue [AWS::SQS::Queue] (replacement"));
    }
}
