//! Azure Blob Storage upload through OpenDAL.
//!
//! The connection string is handed to OpenDAL's `azblob` service as is, so
//! account-key, SAS and `UseDevelopmentStorage=true` strings all work. Each
//! upload is a single whole-object write that creates or overwrites the blob
//! at its key.
//!
//! OpenDAL is async; the pipeline is not. The client owns a current-thread
//! tokio runtime and blocks on each write.

use std::time::Duration;

use opendal::Operator;
use opendal::services::Azblob;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob storage request failed: {0}")]
    Storage(#[from] opendal::Error),
    #[error("failed to start upload runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
}

/// Object storage that can write a whole object at a key, overwriting.
pub trait BlobStore {
    fn put_blob(&self, container: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BlobError>;
}

pub struct AzureBlobClient {
    connection_string: String,
    timeout: Duration,
    runtime: Runtime,
}

impl AzureBlobClient {
    /// Parse `conn` and check that an operator for `container` can be built.
    /// Nothing is sent over the network here.
    pub fn from_connection_string(conn: &str, container: &str, timeout: Duration) -> Result<Self, BlobError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(BlobError::Runtime)?;

        let client = Self {
            connection_string: conn.to_string(),
            timeout,
            runtime,
        };
        client.operator(container)?;
        Ok(client)
    }

    fn operator(&self, container: &str) -> Result<Operator, BlobError> {
        let builder = Azblob::from_connection_string(&self.connection_string)?.container(container);
        Ok(Operator::new(builder)?.finish())
    }
}

impl BlobStore for AzureBlobClient {
    fn put_blob(&self, container: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BlobError> {
        let operator = self.operator(container)?;
        let write = async {
            tokio::time::timeout(
                self.timeout,
                operator.write_with(key, body).content_type(content_type),
            )
            .await
        };

        match self.runtime.block_on(write) {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(BlobError::Timeout(self.timeout)),
        }
    }
}
