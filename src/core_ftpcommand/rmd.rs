use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    send_fs_error, send_missing_argument, send_response, ControlWriter,
};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the RMD FTP command. Only empty directories can be removed.
pub async fn handle_rmd_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    if arg.trim().is_empty() {
        return send_missing_argument(&writer, "RMD").await;
    }
    let session = session.lock().await;
    info!("Received RMD command with argument: {}", arg);

    let path = match session.resolve(&arg) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    // Also catches links that point back at the root.
    if path == session.sandbox.root() {
        warn!("Refusing to remove the storage root");
        send_response(&writer, b"550 Cannot remove the root directory.\r\n").await?;
        return Ok(CommandOutcome::Continue);
    }
    if let Err(e) = session.store.remove_dir(&path).await {
        return send_fs_error(&writer, &e).await;
    }

    info!("RMD succeeded for {:?}", path);
    send_response(&writer, b"250 Directory removed.\r\n").await?;
    Ok(CommandOutcome::Continue)
}
