use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{send_response, ControlWriter};
use crate::core_log::FtpEvent;
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the PASS FTP command. Every password is accepted once USER has
/// named the account.
pub async fn handle_pass_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    _password: String,
) -> Result<CommandOutcome, std::io::Error> {
    let mut session = session.lock().await;
    let username = match session.username.clone() {
        Some(username) => username,
        None => {
            warn!("PASS received before USER");
            send_response(&writer, b"503 Login with USER first.\r\n").await?;
            return Ok(CommandOutcome::Continue);
        }
    };

    session.is_authenticated = true;
    info!("User {} logged in", username);
    session.events.emit(&FtpEvent::LoggedIn { user: username });
    send_response(&writer, b"230 User logged in, proceed.\r\n").await?;
    Ok(CommandOutcome::Continue)
}
