use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{send_response, ControlWriter};
use log::info;

/// Handles the SYST (System) FTP command.
pub async fn handle_syst_command(writer: ControlWriter) -> Result<CommandOutcome, std::io::Error> {
    info!("Responding to SYST command with system type.");
    send_response(&writer, b"215 UNIX Type: L8\r\n").await?;
    Ok(CommandOutcome::Continue)
}
