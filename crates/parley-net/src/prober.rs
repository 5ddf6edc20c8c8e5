//! Endpoint probing: find the first candidate that currently accepts a
//! handshake.
//!
//! Candidates are tried sequentially in priority order. Every probe
//! connection is closed before [`EndpointProber::probe`] returns, whether it
//! succeeded or not.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::endpoint::Endpoint;
use crate::error::NetError;
use crate::transport::{CLOSE_NORMAL, Connector, Socket};

/// Run one handshake against `endpoint`, bounded by `timeout` on `clock`.
pub async fn handshake<C: Connector>(
    connector: &C,
    clock: &dyn Clock,
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<C::Socket, NetError> {
    tokio::select! {
        result = connector.connect(endpoint) => result,
        () = clock.sleep(timeout) => Err(NetError::HandshakeTimeout {
            endpoint: endpoint.url(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Probes candidate endpoints through a shared connector.
pub struct EndpointProber<C> {
    connector: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<C: Connector> EndpointProber<C> {
    /// Create a prober using `connector` for handshakes and `clock` for timeouts.
    pub fn new(connector: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self { connector, clock }
    }

    /// Return the first candidate whose handshake succeeds within
    /// `per_attempt_timeout`, or `None` if all fail.
    pub async fn probe(
        &self,
        candidates: &[Endpoint],
        per_attempt_timeout: Duration,
    ) -> Option<Endpoint> {
        for candidate in candidates {
            match handshake(
                self.connector.as_ref(),
                self.clock.as_ref(),
                candidate,
                per_attempt_timeout,
            )
            .await
            {
                Ok(mut socket) => {
                    socket.close(CLOSE_NORMAL).await;
                    tracing::info!(endpoint = %candidate, "Probe succeeded");
                    return Some(candidate.clone());
                }
                Err(e) => {
                    tracing::debug!(endpoint = %candidate, error = %e, "Probe failed");
                }
            }
        }
        tracing::warn!(candidates = candidates.len(), "No candidate endpoint reachable");
        None
    }
}
