//! Error types shared across the helper modules.

use std::path::PathBuf;

use aws_sdk_cloudformation::error::DisplayErrorContext;
use thiserror::Error;

use crate::cloudformation::StackState;

/// Errors that can occur while driving AWS deployments.
#[derive(Debug, Error)]
pub enum CfError {
    /// A resource that the current phase requires was not found.
    ///
    /// Absence is absorbed where it is an expected observation (pre-create,
    /// post-delete confirmation); this variant only surfaces when a resource
    /// vanished where the workflow needed it to exist.
    #[error("{resource} '{name}' not found")]
    NotFound {
        resource: &'static str,
        name: String,
    },

    /// A stack reached a terminal failure status while being polled.
    ///
    /// Carries the full stack description so callers can inspect the remote
    /// status payload without another describe round trip.
    #[error("stack operation on '{name}' ended in {status}: {}", reason.as_deref().unwrap_or("no reason reported"))]
    StackOperationFailed {
        name: String,
        status: String,
        reason: Option<String>,
        detail: Box<StackState>,
    },

    /// A change set reached a terminal failure status for a reason other
    /// than "there is nothing to change".
    #[error("change set '{name}' on stack '{stack_name}' ended in {status}: {}", reason.as_deref().unwrap_or("no reason reported"))]
    ChangeSetFailed {
        stack_name: String,
        name: String,
        status: String,
        reason: Option<String>,
    },

    /// The operator declined a reviewed change set. No mutation occurred.
    #[error("update to stack '{0}' was rejected by reviewer")]
    ReviewerRejected(String),

    /// A referenced template file does not exist locally. Raised before any
    /// remote call is made.
    #[error("template file not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    /// The request itself is malformed (e.g. artifact staging without a
    /// local template path).
    #[error("invalid stack request: {0}")]
    InvalidRequest(String),

    /// Any AWS error that the calling phase could not classify. Propagated
    /// unchanged, never silently swallowed.
    #[error("{context} failed: {message}")]
    Aws {
        context: &'static str,
        message: String,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CfError {
    /// Wrap an unclassified AWS SDK error, keeping the full error chain in
    /// the message for diagnostics.
    pub(crate) fn aws(context: &'static str, err: impl std::error::Error) -> Self {
        Self::Aws {
            context,
            message: DisplayErrorContext(&err).to_string(),
        }
    }
}

/// Result type alias for [`CfError`].
pub type Result<T> = std::result::Result<T, CfError>;
