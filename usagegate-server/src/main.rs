mod actor;
mod config;
mod metrics;
mod store;
mod transport;
mod types;

#[cfg(test)]
mod actor_tests;

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::transport::{Transport, http::HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("usagegate={}", config.log_level).parse()?),
        )
        .init();

    // Spawn the control-plane actor over the configured store
    let handle = store::create_control_plane(&config);
    let metrics = Arc::new(Metrics::new());

    let mut transport_tasks = JoinSet::new();

    if let Some(http_config) = &config.http {
        let handle = handle.clone();
        let limits = config.limits.clone();
        let metrics = Arc::clone(&metrics);
        let host = http_config.host.clone();
        let port = http_config.port;

        transport_tasks.spawn(async move {
            tracing::info!("Starting HTTP transport on {}:{}", host, port);
            let transport = HttpTransport::new(&host, port)?;
            transport.start(handle, limits, metrics).await
        });
    }

    tracing::info!(
        "Usagegate server started: store capacity {}, initial grant {}, buffer size {}",
        config.store.capacity,
        config.store.initial_grant,
        config.buffer_size
    );

    // Wait for all transport tasks to complete (they run indefinitely)
    while let Some(result) = transport_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {
                tracing::info!("Transport task completed successfully");
            }
            Ok(Err(e)) => {
                tracing::error!("Transport task failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Transport task panicked: {}", e);
                return Err(anyhow::anyhow!("Transport task panicked"));
            }
        }
    }

    Ok(())
}
