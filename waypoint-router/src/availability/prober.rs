//! Probe primitives for checking endpoint reachability.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;

use waypoint_core::domain::EndpointId;

/// Failure of a single reachability probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The endpoint id has no registered probe address.
    #[error("no probe address registered for `{0}`")]
    UnknownEndpoint(EndpointId),
    /// The endpoint did not accept a connection.
    #[error("endpoint unreachable: {0}")]
    Unreachable(#[from] std::io::Error),
}

/// Asynchronous reachability probe for a single endpoint.
///
/// Implementations report success or failure only; the availability
/// cache bounds every probe with its own timeout, so a probe may run
/// arbitrarily long without stalling a filter call.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probes `endpoint`, resolving with `Ok` once it is reachable.
    async fn probe(&self, endpoint: &EndpointId) -> Result<(), ProbeError>;
}

/// Probes endpoints with a plain TCP connect against a configured
/// address table.
#[derive(Debug)]
pub struct TcpProber {
    addresses: HashMap<EndpointId, SocketAddr>,
}

impl TcpProber {
    /// Creates a prober for the given endpoint address table.
    pub fn new(addresses: HashMap<EndpointId, SocketAddr>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, endpoint: &EndpointId) -> Result<(), ProbeError> {
        let addr = self
            .addresses
            .get(endpoint)
            .copied()
            .ok_or_else(|| ProbeError::UnknownEndpoint(endpoint.clone()))?;
        TcpStream::connect(addr).await?;
        Ok(())
    }
}
