//! Listen-key keepalive loop
//!
//! Scheduling is pure; the REST renewal itself runs off the connection task
//! so a slow endpoint never stalls frame dispatch.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Credentials, ListenKeyApi};

#[derive(Debug, Clone)]
pub struct KeepaliveLoop {
    listen_key: String,
    interval: Duration,
    fired: u64,
}

impl KeepaliveLoop {
    pub fn new(listen_key: impl Into<String>, interval: Duration) -> Self {
        KeepaliveLoop {
            listen_key: listen_key.into(),
            interval,
            fired: 0,
        }
    }

    pub fn listen_key(&self) -> &str {
        &self.listen_key
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of renewals requested so far
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Timer fired: returns the key to renew and the delay until the next tick.
    /// Re-arms regardless of how the previous renewal went.
    pub fn on_fire(&mut self) -> (String, Duration) {
        self.fired += 1;
        (self.listen_key.clone(), self.interval)
    }
}

/// Renew a listen key. Failures are logged and left to the next tick.
pub async fn renew<A>(api: Arc<A>, name: String, listen_key: String, credentials: Credentials)
where
    A: ListenKeyApi + ?Sized,
{
    match api.keepalive(&listen_key, &credentials).await {
        Ok(()) => tracing::debug!(connection = %name, "listen key renewed"),
        Err(e) => tracing::warn!(
            connection = %name,
            "listen key keepalive failed, retrying next tick: {}",
            e
        ),
    }
}
