use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    accept_data_connection, claim_passive, close_data_connection, send_fs_error,
    send_missing_argument, send_response, ControlWriter,
};
use crate::core_log::FtpEvent;
use crate::session::Session;
use log::{error, info};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// Handles the RETR (Retrieve) FTP command.
///
/// The file is opened before the 150 goes out, so a missing or unreadable
/// file is reported as 550 without touching the data channel. Bytes are sent
/// unchanged in both transfer types.
pub async fn handle_retr_command(
    writer: ControlWriter,
    config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, io::Error> {
    if arg.trim().is_empty() {
        return send_missing_argument(&writer, "RETR").await;
    }
    let mut session = session.lock().await;
    info!("Received RETR command with argument: {}", arg);

    let Some(listener) = claim_passive(&writer, &mut session, "RETR").await? else {
        return Ok(CommandOutcome::Continue);
    };

    let file_path = match session.resolve(&arg) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    let mut file = match session.store.open_read(&file_path).await {
        Ok(file) => file,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    let virtual_path = session.virtual_path(&arg).unwrap_or_default();

    send_response(&writer, b"150 Opening data connection.\r\n").await?;
    let Some(mut data_stream) =
        accept_data_connection(&writer, listener, config.data_timeout()).await?
    else {
        return Ok(CommandOutcome::Continue);
    };
    session.events.emit(&FtpEvent::TransferStarted {
        command: "RETR".into(),
        path: virtual_path.clone(),
    });

    let mut buffer = vec![0; config.buffer_size];
    let mut sent: u64 = 0;
    loop {
        let bytes_read = match file.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Error reading file {:?}: {}", file_path, e);
                send_response(&writer, b"451 Requested action aborted. Local error in processing.\r\n")
                    .await?;
                return Ok(CommandOutcome::Continue);
            }
        };
        if let Err(e) = data_stream.write_all(&buffer[..bytes_read]).await {
            error!("Error writing to data stream: {}", e);
            send_response(&writer, b"426 Connection closed; transfer aborted.\r\n").await?;
            return Ok(CommandOutcome::Continue);
        }
        sent += bytes_read as u64;
    }
    close_data_connection(data_stream).await;

    info!("File sent successfully: {:?} ({} bytes)", file_path, sent);
    session.events.emit(&FtpEvent::TransferFinished {
        command: "RETR".into(),
        path: virtual_path,
        bytes: sent,
    });
    send_response(&writer, b"226 Transfer complete.\r\n").await?;
    Ok(CommandOutcome::Continue)
}
