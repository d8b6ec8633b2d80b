use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{send_missing_argument, send_response, ControlWriter};
use crate::session::{Session, TransferType};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the TYPE FTP command.
///
/// Only ASCII (`A`) and Image (`I`) are supported. Bytes are moved unchanged
/// in both modes.
pub async fn handle_type_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    let primary_type = match arg.split_whitespace().next() {
        Some(primary_type) => primary_type,
        None => return send_missing_argument(&writer, "TYPE").await,
    };

    let response = match TransferType::from_code(primary_type) {
        Some(transfer_type) => {
            session.lock().await.transfer_type = transfer_type;
            format!("200 Type set to {}\r\n", transfer_type.code())
        }
        None => "504 Command not implemented for that parameter.\r\n".to_string(),
    };

    send_response(&writer, response.as_bytes()).await?;
    Ok(CommandOutcome::Continue)
}
