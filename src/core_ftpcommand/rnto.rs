use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    send_fs_error, send_missing_argument, send_response, ControlWriter,
};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the RNTO (Rename To) FTP command.
///
/// Consumes the source remembered by RNFR, whatever the outcome.
pub async fn handle_rnto_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    let mut session = session.lock().await;
    let Some(rename_from) = session.rename_from.take() else {
        warn!("RNTO received without a preceding RNFR");
        send_response(&writer, b"503 Bad sequence of commands.\r\n").await?;
        return Ok(CommandOutcome::Continue);
    };
    if arg.trim().is_empty() {
        return send_missing_argument(&writer, "RNTO").await;
    }
    info!("Received RNTO command: {} -> {}", rename_from, arg);

    let from = match session.sandbox.resolve_virtual(&rename_from) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    let to = match session.resolve(&arg) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    if let Err(e) = session.store.rename(&from, &to).await {
        return send_fs_error(&writer, &e).await;
    }

    info!("Renamed {:?} to {:?}", from, to);
    send_response(&writer, b"250 Requested file action okay, completed.\r\n").await?;
    Ok(CommandOutcome::Continue)
}
