use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{send_response, ControlWriter};

pub async fn handle_noop_command(writer: ControlWriter) -> Result<CommandOutcome, std::io::Error> {
    send_response(&writer, b"200 OK, n00p n00p !\r\n").await?;
    Ok(CommandOutcome::Continue)
}
