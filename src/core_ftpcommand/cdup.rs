use crate::config::ServerConfig;
use crate::core_fs::PathSandbox;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{send_fs_error, send_response, ControlWriter};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the CDUP FTP command. The root is its own parent, so CDUP at `/`
/// succeeds and stays put.
pub async fn handle_cdup_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    let mut session = session.lock().await;
    let parent = PathSandbox::parent(&session.current_dir);

    let dir_path = match session.sandbox.resolve_virtual(&parent) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    if !session.store.is_dir(&dir_path).await {
        warn!("Parent directory vanished: {:?}", dir_path);
        send_response(&writer, b"550 Cannot go up.\r\n").await?;
        return Ok(CommandOutcome::Continue);
    }

    if let Err(e) = session.set_current_dir(&parent) {
        return send_fs_error(&writer, &e).await;
    }
    info!("Moved up to: {}", session.current_dir);
    send_response(&writer, b"200 Directory changed to parent.\r\n").await?;
    Ok(CommandOutcome::Continue)
}
