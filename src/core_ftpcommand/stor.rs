use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    accept_data_connection, claim_passive, send_fs_error, send_missing_argument, send_response,
    ControlWriter,
};
use crate::core_log::FtpEvent;
use crate::session::Session;
use log::{error, info};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// Handles the STOR (Store File) FTP command.
///
/// The upload lands in a temporary sibling and replaces the target only after
/// the data connection closed cleanly. An aborted upload leaves any existing
/// file untouched.
pub async fn handle_stor_command(
    writer: ControlWriter,
    config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> io::Result<CommandOutcome> {
    if arg.trim().is_empty() {
        return send_missing_argument(&writer, "STOR").await;
    }
    let mut session = session.lock().await;
    info!("Received STOR command with argument: {}", arg);

    let Some(listener) = claim_passive(&writer, &mut session, "STOR").await? else {
        return Ok(CommandOutcome::Continue);
    };

    let file_path = match session.resolve(&arg) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    let mut staged = match session.store.stage_upload(&file_path).await {
        Ok(staged) => staged,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    let virtual_path = session.virtual_path(&arg).unwrap_or_default();

    send_response(&writer, b"150 File status okay; about to open data connection.\r\n").await?;
    let Some(mut data_stream) =
        accept_data_connection(&writer, listener, config.data_timeout()).await?
    else {
        return Ok(CommandOutcome::Continue);
    };
    session.events.emit(&FtpEvent::TransferStarted {
        command: "STOR".into(),
        path: virtual_path.clone(),
    });

    let mut buffer = vec![0; config.buffer_size];
    let mut received: u64 = 0;
    loop {
        let bytes_read = match data_stream.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Error reading from data stream: {}", e);
                send_response(&writer, b"426 Connection closed; transfer aborted.\r\n").await?;
                return Ok(CommandOutcome::Continue);
            }
        };
        if let Err(e) = staged.file().write_all(&buffer[..bytes_read]).await {
            error!("Error writing to file: {}", e);
            send_response(&writer, b"451 Requested action aborted. Local error in processing.\r\n")
                .await?;
            return Ok(CommandOutcome::Continue);
        }
        received += bytes_read as u64;
    }
    drop(data_stream);

    if let Err(e) = staged.commit().await {
        return send_fs_error(&writer, &e).await;
    }

    info!("File stored successfully: {:?} ({} bytes)", file_path, received);
    session.events.emit(&FtpEvent::TransferFinished {
        command: "STOR".into(),
        path: virtual_path,
        bytes: received,
    });
    send_response(&writer, b"226 Transfer complete.\r\n").await?;
    Ok(CommandOutcome::Continue)
}
