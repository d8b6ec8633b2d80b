use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    send_fs_error, send_missing_argument, send_response, ControlWriter,
};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the CWD FTP command.
pub async fn handle_cwd_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    if arg.trim().is_empty() {
        return send_missing_argument(&writer, "CWD").await;
    }
    let mut session = session.lock().await;
    info!("Received CWD command with argument: {}", arg);

    let dir_path = match session.resolve(&arg) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };

    if !session.store.is_dir(&dir_path).await {
        warn!("Failed to change directory to: {:?}", dir_path);
        send_response(&writer, b"550 Failed to change directory.\r\n").await?;
        return Ok(CommandOutcome::Continue);
    }

    if let Err(e) = session.set_current_dir(&arg) {
        return send_fs_error(&writer, &e).await;
    }
    info!("Directory successfully changed to: {}", session.current_dir);
    send_response(&writer, b"250 Directory successfully changed.\r\n").await?;
    Ok(CommandOutcome::Continue)
}
