use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    send_fs_error, send_missing_argument, send_response, ControlWriter,
};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the RNFR (Rename From) FTP command.
///
/// Remembers the source for the RNTO that must follow. Any failure clears a
/// previously remembered source.
pub async fn handle_rnfr_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    let mut session = session.lock().await;
    session.rename_from = None;
    if arg.trim().is_empty() {
        return send_missing_argument(&writer, "RNFR").await;
    }
    info!("Received RNFR command with argument: {}", arg);

    let (virtual_path, path) = match session
        .virtual_path(&arg)
        .and_then(|v| session.sandbox.resolve_virtual(&v).map(|real| (v, real)))
    {
        Ok(paths) => paths,
        Err(e) => return send_fs_error(&writer, &e).await,
    };

    if path == session.sandbox.root() {
        warn!("Refusing to rename the storage root");
        send_response(&writer, b"550 Cannot rename the root directory.\r\n").await?;
        return Ok(CommandOutcome::Continue);
    }
    if !session.store.exists(&path).await {
        warn!("RNFR source does not exist: {:?}", path);
        send_response(&writer, b"550 File or directory not found.\r\n").await?;
        return Ok(CommandOutcome::Continue);
    }

    session.rename_from = Some(virtual_path);
    send_response(&writer, b"350 Requested file action pending further information.\r\n").await?;
    Ok(CommandOutcome::Continue)
}
