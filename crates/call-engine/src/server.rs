//! # Relay Server
//!
//! Owns the relay's lifecycle: opens the user database, builds the
//! coordinator and HTTP application, binds the listener, runs the
//! maintenance sweeper and shuts everything down again.
//!
//! ```no_run
//! use skyrelay_call_engine::config::RelayConfig;
//! use skyrelay_call_engine::server::RelayServerBuilder;
//!
//! # async fn example() -> skyrelay_call_engine::error::Result<()> {
//! let mut config = RelayConfig::default();
//! config.server.bind_address = "127.0.0.1:0".parse().unwrap();
//!
//! let mut server = RelayServerBuilder::new()
//!     .with_config(config)
//!     .with_in_memory_database()
//!     .build()
//!     .await?;
//!
//! let addr = server.start().await?;
//! println!("relay listening on {}", addr);
//!
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use skyrelay_users_core::UsersConfig;

use crate::api::{AppState, create_router};
use crate::config::RelayConfig;
use crate::coordinator::SignallingCoordinator;
use crate::error::{CallEngineError, Result};

pub struct RelayServer {
    config: RelayConfig,
    state: AppState,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    http_handle: Option<JoinHandle<()>>,
    maintenance_handle: Option<JoinHandle<()>>,
}

impl RelayServer {
    /// Build a server from `config`, opening the user database it names
    pub async fn new(config: RelayConfig) -> Result<Self> {
        let users = skyrelay_users_core::init(config.users.clone()).await?;
        let coordinator = SignallingCoordinator::new(config.signalling.clone());
        info!(
            "Signalling coordinator ready (offline policy {:?}, group policy {:?})",
            config.signalling.offline_policy, config.signalling.group_end_policy
        );

        Ok(Self {
            config,
            state: AppState::new(coordinator, users),
            local_addr: None,
            shutdown_tx: None,
            http_handle: None,
            maintenance_handle: None,
        })
    }

    /// Bind the listener and start serving in the background.
    /// Returns the bound address, which matters when binding port 0.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr {
            return Ok(addr);
        }

        let listener = TcpListener::bind(self.config.server.bind_address).await?;
        let addr = listener.local_addr()?;

        let app = create_router(self.state.clone(), self.config.server.static_dir.as_deref());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let http_handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                error!("HTTP server failed: {}", e);
            }
        });

        self.maintenance_handle = Some(self.state.coordinator.spawn_maintenance());
        self.http_handle = Some(http_handle);
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(addr);

        if let Some(dir) = &self.config.server.static_dir {
            info!("Serving static files from {}", dir.display());
        }
        info!("SkyRelay listening on {}", addr);
        Ok(addr)
    }

    /// Serve until `shutdown` resolves, then stop
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }

    /// Stop accepting connections and cancel background work
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping relay server...");

        if let Some(handle) = self.maintenance_handle.take() {
            handle.abort();
            let _ = handle.await;
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Open WebSockets keep graceful shutdown waiting; don't hang on them
        if let Some(mut handle) = self.http_handle.take() {
            if tokio::time::timeout(std::time::Duration::from_secs(5), &mut handle).await.is_err() {
                handle.abort();
            }
        }

        self.local_addr = None;
        info!("Relay server stopped");
        Ok(())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &SignallingCoordinator {
        &self.state.coordinator
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for [`RelayServer`]
#[derive(Debug, Default)]
pub struct RelayServerBuilder {
    config: Option<RelayConfig>,
    database_url: Option<String>,
}

impl RelayServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_in_memory_database(mut self) -> Self {
        self.database_url = Some(UsersConfig::in_memory().database_url);
        self
    }

    pub async fn build(self) -> Result<RelayServer> {
        let mut config = self
            .config
            .ok_or_else(|| CallEngineError::internal("Configuration not provided"))?;
        if let Some(url) = self.database_url {
            config.users.database_url = url;
        }
        RelayServer::new(config).await
    }
}
