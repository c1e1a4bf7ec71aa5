//! Glue catalog helpers.

use aws_config::SdkConfig;
use aws_sdk_glue::types::{PartitionInput, StorageDescriptor};
use aws_sdk_glue::Client;
use tracing::{debug, info};

use crate::error::{CfError, Result};

/// Thin wrapper over the Glue data catalog API.
pub struct CatalogOps {
    client: Client,
}

impl CatalogOps {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Register a partition on a table, deriving the partition's storage
    /// descriptor (format, serde, columns) from the table itself and its
    /// location from the table location plus the partition values.
    ///
    /// Returns `false` when the partition already exists.
    pub async fn create_partition(
        &self,
        database: &str,
        table: &str,
        values: &[String],
    ) -> Result<bool> {
        let fetched = self
            .client
            .get_table()
            .database_name(database)
            .name(table)
            .send()
            .await
            .map_err(|err| CfError::aws("GetTable", err))?;

        let descriptor = fetched
            .table()
            .and_then(|t| t.storage_descriptor())
            .map(|base| {
                let location = base
                    .location()
                    .map(|root| format!("{}/{}", root.trim_end_matches('/'), values.join("/")));
                StorageDescriptor::builder()
                    .set_columns(Some(base.columns().to_vec()))
                    .set_location(location)
                    .set_input_format(base.input_format().map(str::to_string))
                    .set_output_format(base.output_format().map(str::to_string))
                    .set_serde_info(base.serde_info().cloned())
                    .build()
            });

        let input = PartitionInput::builder()
            .set_values(Some(values.to_vec()))
            .set_storage_descriptor(descriptor)
            .build();

        match self
            .client
            .create_partition()
            .database_name(database)
            .table_name(table)
            .partition_input(input)
            .send()
            .await
        {
            Ok(_) => {
                info!(database, table, values = ?values, "partition created");
                Ok(true)
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_already_exists_exception()) =>
            {
                debug!(database, table, values = ?values, "partition already exists");
                Ok(false)
            }
            Err(err) => Err(CfError::aws("CreatePartition", err)),
        }
    }
}
