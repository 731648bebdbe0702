//! The route manager process.
//!
//! Builds the routing tables from configuration, serves the internal API in a
//! background task and runs the periodic broadcast loop.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

use routemgr_routing::TableCoordinator;

use crate::config::RouteManagerConfig;
use crate::state::ManagerState;
use crate::transport::Transport;

pub struct RouteManager {
    /// Validated configuration.
    config: RouteManagerConfig,
    /// State shared with the API handlers.
    state: Arc<ManagerState>,
    /// The API server task, once started.
    api_task: Option<JoinHandle<()>>,
}

impl RouteManager {
    /// Validate `config` and seed the routing tables. Outbound requests go
    /// through `transport`.
    pub fn new(config: RouteManagerConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let coordinator = TableCoordinator::new(config.shards.clone())?;
        let state = Arc::new(ManagerState::new(
            coordinator,
            transport,
            config.hold_down_time(),
        ));
        tracing::info!(shards = config.shards.len(), "route manager created");
        Ok(Self {
            config,
            state,
            api_task: None,
        })
    }

    pub fn state(&self) -> &Arc<ManagerState> {
        &self.state
    }

    /// Bind the internal API on `0.0.0.0:private_port` and serve it in the
    /// background. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.private_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let api_state = self.state.clone();
        self.api_task = Some(tokio::spawn(async move {
            if let Err(e) = crate::api::start_api_server(listener, api_state).await {
                tracing::error!(error = %e, "internal API server error");
            }
        }));
        Ok(local_addr)
    }

    /// Run broadcast cycles forever, the first one immediately.
    pub async fn run(&self) {
        let interval = self.config.broadcast_interval();
        tracing::info!(interval_ms = self.config.broadcast_interval_ms, "entering broadcast loop");
        loop {
            self.state.broadcast_cycle().await;
            tokio::time::sleep(interval).await;
        }
    }

    /// Stop serving the internal API.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down route manager");
        if let Some(task) = self.api_task.take() {
            task.abort();
            let _ = task.await;
        }
        tracing::info!("route manager shut down");
        Ok(())
    }
}
