mod core_cli;

use crate::core_cli::{Cli, Commands};
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use sandftp::core_log::logger::init_logger;
use sandftp::{server, ClientConfig, Config, FtpClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    init_logger(args.verbose);

    // Built-in defaults unless a configuration file is given
    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    match args.command {
        Commands::Serve { host, port, root } => {
            let mut server_config = config.server;
            if let Some(host) = host {
                server_config.host = host;
            }
            if let Some(port) = port {
                server_config.port = port;
            }
            if let Some(root) = root {
                server_config.root_dir = root;
            }
            server::run(server_config).await
        }
        Commands::Probe {
            host,
            port,
            user,
            password,
            path,
        } => {
            let mut client_config = config.client;
            if let Some(host) = host {
                client_config.host = host;
            }
            if let Some(port) = port {
                client_config.port = port;
            }
            probe(client_config, &user, &password, path.as_deref()).await
        }
    }
}

/// Walks through a short session and logs what the server said at each step.
async fn probe(config: ClientConfig, user: &str, password: &str, path: Option<&str>) -> Result<()> {
    let target = format!("{}:{}", config.host, config.port);
    let mut client = FtpClient::new(config);

    let welcome = client
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", target))?;
    info!("Welcome: {}", welcome.text);

    client
        .login(user, password)
        .await
        .with_context(|| format!("Login as {} failed", user))?;
    info!("Logged in as {}", user);

    info!("System: {}", client.syst().await?);
    info!("Current directory: {}", client.pwd().await?);

    let listing = client.list(path).await.context("LIST failed")?;
    for line in listing.lines() {
        info!("  {}", line);
    }

    client.quit().await?;
    info!("Probe of {} finished", target);
    Ok(())
}
