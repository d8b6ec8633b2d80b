use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    send_fs_error, send_missing_argument, send_response, ControlWriter,
};
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the DELE FTP command. Directories are refused; use RMD.
pub async fn handle_dele_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    if arg.trim().is_empty() {
        return send_missing_argument(&writer, "DELE").await;
    }
    let session = session.lock().await;
    info!("Received DELE command with argument: {}", arg);

    let path = match session.resolve(&arg) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    if let Err(e) = session.store.delete_file(&path).await {
        return send_fs_error(&writer, &e).await;
    }

    info!("DELE succeeded for {:?}", path);
    send_response(&writer, b"250 Requested file action okay, completed.\r\n").await?;
    Ok(CommandOutcome::Continue)
}
