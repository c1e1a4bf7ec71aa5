//! S3 helpers: bucket emptying and artifact upload.

use std::path::Path;

use aws_config::SdkConfig;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{CfError, Result};

/// DeleteObjects caps a single request at this many keys.
const DELETE_BATCH_SIZE: usize = 1000;

/// Object storage operations consumed by the stack lifecycle: the bucket
/// emptier invoked before stack deletion and the artifact upload used to
/// stage templates.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Delete every object version and delete marker in a bucket. A bucket
    /// that does not exist counts as already empty.
    async fn empty_bucket(&self, bucket: &str) -> Result<()>;

    /// Upload a local file and return the HTTPS URL of the stored object.
    async fn upload(&self, bucket: &str, key: &str, path: &Path) -> Result<String>;
}

/// Real implementation backed by the AWS SDK client.
pub struct S3ObjectStore {
    client: Client,
    region: String,
}

impl S3ObjectStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
            region: config
                .region()
                .map(|region| region.to_string())
                .unwrap_or_else(|| "us-east-1".to_string()),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        object_url(bucket, &self.region, key)
    }
}

fn is_missing_bucket(err: &impl ProvideErrorMetadata) -> bool {
    err.code() == Some("NoSuchBucket")
}

fn object_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn empty_bucket(&self, bucket: &str) -> Result<()> {
        // Versioned delete: pagination for a single listing is inherently
        // sequential, each page carrying the previous page's markers.
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;
        let mut deleted = 0usize;

        loop {
            let page = match self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.clone())
                .set_version_id_marker(version_marker.clone())
                .send()
                .await
            {
                Ok(page) => page,
                Err(err) if is_missing_bucket(&err) => {
                    debug!(bucket, "bucket does not exist, nothing to empty");
                    return Ok(());
                }
                Err(err) => return Err(CfError::aws("ListObjectVersions", err)),
            };

            let mut targets: Vec<ObjectIdentifier> = Vec::new();
            for version in page.versions() {
                if let Some(key) = version.key() {
                    targets.push(
                        ObjectIdentifier::builder()
                            .key(key)
                            .set_version_id(version.version_id().map(str::to_string))
                            .build()
                            .map_err(|err| CfError::aws("DeleteObjects", err))?,
                    );
                }
            }
            for marker in page.delete_markers() {
                if let Some(key) = marker.key() {
                    targets.push(
                        ObjectIdentifier::builder()
                            .key(key)
                            .set_version_id(marker.version_id().map(str::to_string))
                            .build()
                            .map_err(|err| CfError::aws("DeleteObjects", err))?,
                    );
                }
            }

            deleted += targets.len();
            for chunk in targets.chunks(DELETE_BATCH_SIZE) {
                let delete = Delete::builder()
                    .set_objects(Some(chunk.to_vec()))
                    .quiet(true)
                    .build()
                    .map_err(|err| CfError::aws("DeleteObjects", err))?;
                self.client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|err| CfError::aws("DeleteObjects", err))?;
            }

            if page.is_truncated() == Some(true) {
                key_marker = page.next_key_marker().map(str::to_string);
                version_marker = page.next_version_id_marker().map(str::to_string);
            } else {
                break;
            }
        }

        info!(bucket, deleted, "bucket emptied");
        Ok(())
    }

    async fn upload(&self, bucket: &str, key: &str, path: &Path) -> Result<String> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|err| CfError::aws("PutObject", err))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| CfError::aws("PutObject", err))?;

        let url = self.object_url(bucket, key);
        info!(bucket, key, url = %url, "uploaded artifact");
        Ok(url)
    }
}
