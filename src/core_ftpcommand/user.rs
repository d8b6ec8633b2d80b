use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{send_missing_argument, send_response, ControlWriter};
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the USER FTP command.
///
/// Any user name is accepted; the reply always asks for a password, and a
/// new USER drops whatever login the session had.
pub async fn handle_user_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    username: String,
) -> Result<CommandOutcome, std::io::Error> {
    if username.trim().is_empty() {
        return send_missing_argument(&writer, "USER").await;
    }
    info!("Received USER command with username: {}", username);

    {
        let mut session = session.lock().await;
        session.username = Some(username.clone());
        session.is_authenticated = false;
    }

    let response: &[u8] = if username.eq_ignore_ascii_case("anonymous") {
        b"331 Anonymous login okay, send your complete email address as password.\r\n"
    } else {
        b"331 User name okay, need password.\r\n"
    };
    send_response(&writer, response).await?;
    Ok(CommandOutcome::Continue)
}
