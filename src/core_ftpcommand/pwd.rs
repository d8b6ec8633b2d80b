// src/core_ftpcommand/pwd.rs
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{send_response, ControlWriter};
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn handle_pwd_command(
    writer: ControlWriter,
    session: Arc<Mutex<Session>>,
) -> std::io::Result<CommandOutcome> {
    let current_dir = session.lock().await.current_dir.clone();
    let response = format!("257 \"{}\" is the current directory.\r\n", current_dir);
    send_response(&writer, response.as_bytes()).await?;
    Ok(CommandOutcome::Continue)
}
