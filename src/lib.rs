//! AWS deployment helpers built around the CloudFormation stack lifecycle.
//!
//! The centrepiece is [`cloudformation::StackManager`], which drives the
//! upsert/create/update/delete workflow for a named stack: it decides
//! between direct mutation and the change-set path (templates carrying a
//! serverless transform always diff through a change set), optionally gates
//! updates behind an interactive review of the computed change set, and
//! polls the provider until the operation settles. Stack deletion empties
//! any S3 buckets named by `*Bucket` outputs first, since a non-empty
//! bucket blocks the delete.
//!
//! Around that core sit thin wrappers for the other services deployment
//! tooling touches: S3 staging and bucket emptying, Lambda code pushes,
//! CloudWatch log-group cleanup, Parameter Store CRUD, EC2 key pairs,
//! Cognito user provisioning, Glue partitions and IoT policy rotation.
//!
//! Credentials and region are threaded explicitly: build a [`CfConfig`],
//! load an `SdkConfig` from it, and hand both to the constructors. No
//! global client state is held, and no state is cached between calls.

pub mod cloudformation;
pub mod cognito;
pub mod config;
pub mod confirm;
pub mod ec2;
pub mod error;
pub mod glue;
pub mod iot;
pub mod lambda;
pub mod logs;
pub mod poll;
pub mod s3;
pub mod ssm;

pub use cloudformation::{
    ArtifactBucket, Capability, ChangeSetKind, ChangeSetManager, ChangeSetState,
    CloudFormationApi, ResourceChange, SdkCloudFormation, StackManager, StackRequest, StackState,
    TemplateSource, UpdateOutcome, UpsertOptions,
};
pub use config::CfConfig;
pub use confirm::{Confirm, TerminalConfirm};
pub use error::{CfError, Result};
pub use poll::{PollVerdict, Poller};
pub use s3::{ObjectStore, S3ObjectStore};
