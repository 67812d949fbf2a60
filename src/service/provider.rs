use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::ApnsConnection;
use crate::error::{ApnsError, Result};

/// Hands out a connection for one send.
///
/// The service borrows a connection per send and never owns one; pooling and
/// load-balancing policy live behind this seam.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn checkout(&self) -> Result<Arc<ApnsConnection>>;
}

/// Provider backed by a single connection. Suited to tests and deployments
/// where an external layer already manages reconnection.
pub struct SingleConnectionProvider {
    connection: Arc<ApnsConnection>,
}

impl SingleConnectionProvider {
    pub fn new(connection: Arc<ApnsConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ConnectionProvider for SingleConnectionProvider {
    async fn checkout(&self) -> Result<Arc<ApnsConnection>> {
        if !self.connection.is_alive() {
            return Err(ApnsError::ConnectionClosed);
        }
        Ok(Arc::clone(&self.connection))
    }
}
