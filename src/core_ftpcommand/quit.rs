use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{send_response, ControlWriter};
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the QUIT FTP command.
///
/// Replies 221 and tells the session loop to stop; the connection itself is
/// torn down by the caller.
pub async fn handle_quit_command(
    writer: ControlWriter,
    session: Arc<Mutex<Session>>,
) -> std::io::Result<CommandOutcome> {
    info!("Received QUIT command. Closing connection.");
    session.lock().await.close_passive();
    send_response(&writer, b"221 Goodbye.\r\n").await?;
    Ok(CommandOutcome::Quit)
}
