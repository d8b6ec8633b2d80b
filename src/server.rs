use crate::config::ServerConfig;
use crate::core_fs::PathSandbox;
use crate::core_ftpcommand::handlers::initialize_command_handlers;
use crate::core_log::{EventSink, LogSink};
use crate::core_network::network::{self, HandlerTable};
use anyhow::{Context, Result};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// A bound FTP server. Binding and serving are split so callers (and tests
/// binding port 0) can learn the address before the accept loop starts.
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    sandbox: PathSandbox,
    handlers: HandlerTable,
    events: Arc<dyn EventSink>,
}

impl Server {
    /// Creates the storage root if needed and binds the control listener.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.root_dir)
            .await
            .with_context(|| format!("Failed to create root directory: {}", config.root_dir))?;
        let sandbox = PathSandbox::new(&config.root_dir)
            .with_context(|| format!("Invalid root directory: {}", config.root_dir))?;

        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!(
            "Server listening on {} with root {:?}",
            listener.local_addr()?,
            sandbox.root()
        );

        Ok(Self {
            listener,
            config: Arc::new(config),
            sandbox,
            handlers: Arc::new(initialize_command_handlers()),
            events: Arc::new(LogSink),
        })
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Runs the accept loop until the listener fails.
    pub async fn serve(self) -> Result<()> {
        network::accept_connections(
            self.listener,
            self.config,
            self.sandbox,
            self.handlers,
            self.events,
        )
        .await
        .context("Accept loop failed")
    }
}

/// Runs the FTP server with the provided configuration.
pub async fn run(config: ServerConfig) -> Result<()> {
    info!("Starting server with config: {:?}", config);

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {:#}", e);
            return Err(e);
        }
    };
    server.serve().await
}
