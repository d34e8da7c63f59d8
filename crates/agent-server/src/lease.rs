use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agent_mcp::ToolProviderConnection;
use tracing::{debug, warn};

use crate::error::RequestError;

/// Scoped ownership of one request's tool-provider connection.
///
/// The connection is closed at most once: by the first [`release`] call, or
/// by a background close when the last handle is dropped unreleased.
///
/// [`release`]: ConnectionLease::release
pub struct ConnectionLease {
    request_id: String,
    connection: Arc<dyn ToolProviderConnection>,
    released: AtomicBool,
}

impl ConnectionLease {
    pub fn new(request_id: impl Into<String>, connection: Arc<dyn ToolProviderConnection>) -> Self {
        Self {
            request_id: request_id.into(),
            connection,
            released: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> Arc<dyn ToolProviderConnection> {
        self.connection.clone()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Close the connection if nobody has yet. Close errors are logged.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.connection.close().await {
            Ok(()) => debug!("[{}] Tool provider connection closed", self.request_id),
            Err(e) => log_cleanup_failure(&self.request_id, e.to_string()),
        }
    }
}

fn log_cleanup_failure(request_id: &str, reason: String) {
    let error = RequestError::Cleanup(reason);
    warn!(stage = error.stage(), "[{}] {}", request_id, error);
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if *self.released.get_mut() {
            return;
        }

        let request_id = std::mem::take(&mut self.request_id);
        let connection = self.connection.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("[{}] Lease dropped unreleased, closing in background", request_id);
                handle.spawn(async move {
                    if let Err(e) = connection.close().await {
                        log_cleanup_failure(&request_id, e.to_string());
                    }
                });
            }
            Err(_) => log_cleanup_failure(
                &request_id,
                "lease dropped outside a runtime, connection left open".to_string(),
            ),
        }
    }
}
