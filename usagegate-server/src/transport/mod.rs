//! Transport layer for the control-plane server
//!
//! Transports parse protocol-specific requests, forward them to the
//! control-plane actor and serialize the authoritative decision back.
//! Currently the HTTP/JSON transport is the only wire surface the calling
//! edge functions use.

pub mod http;


use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::actor::ControlPlaneHandle;
use crate::config::LimitsTable;
use crate::metrics::Metrics;

/// Common interface for transport implementations
#[async_trait]
pub trait Transport {
    /// Bind to the configured address and serve requests against the given
    /// control-plane handle. Runs until an error occurs or the server
    /// shuts down.
    async fn start(
        self,
        handle: ControlPlaneHandle,
        limits: LimitsTable,
        metrics: Arc<Metrics>,
    ) -> Result<()>;
}
