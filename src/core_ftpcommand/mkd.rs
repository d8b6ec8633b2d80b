use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    send_fs_error, send_missing_argument, send_response, ControlWriter,
};
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the MKD (Make Directory) FTP command.
pub async fn handle_mkd_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    if arg.trim().is_empty() {
        return send_missing_argument(&writer, "MKD").await;
    }
    let session = session.lock().await;
    info!("Received MKD command with argument: {}", arg);

    let (virtual_path, dir_path) = match session
        .virtual_path(&arg)
        .and_then(|v| session.sandbox.resolve_virtual(&v).map(|real| (v, real)))
    {
        Ok(paths) => paths,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    if let Err(e) = session.store.make_dir(&dir_path).await {
        return send_fs_error(&writer, &e).await;
    }

    info!("Directory created: {:?}", dir_path);
    let response = format!("257 \"{}\" directory created\r\n", virtual_path);
    send_response(&writer, response.as_bytes()).await?;
    Ok(CommandOutcome::Continue)
}
