use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    send_fs_error, send_missing_argument, send_response, ControlWriter,
};
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the SIZE FTP command: byte size of a regular file.
pub async fn handle_size_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    if arg.trim().is_empty() {
        return send_missing_argument(&writer, "SIZE").await;
    }
    let session = session.lock().await;
    info!("Received SIZE command with argument: {}", arg);

    let path = match session.resolve(&arg) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    match session.store.size(&path).await {
        Ok(size) => {
            send_response(&writer, format!("213 {}\r\n", size).as_bytes()).await?;
        }
        Err(e) => return send_fs_error(&writer, &e).await,
    }
    Ok(CommandOutcome::Continue)
}
