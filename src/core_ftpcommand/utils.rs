use crate::core_fs::FsError;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_network::pasv::PassiveListener;
use crate::session::Session;
use log::{debug, error, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Write side of the control connection, shared by the session loop and
/// the handlers.
pub type ControlWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Sends a response message to the client via the writer.
pub async fn send_response(writer: &ControlWriter, message: &[u8]) -> io::Result<()> {
    let mut writer = writer.lock().await;
    writer.write_all(message).await?;
    writer.flush().await?;
    debug!("Sent: {}", String::from_utf8_lossy(message).trim_end());
    Ok(())
}

/// Replies with the code mapped from a filesystem failure.
pub async fn send_fs_error(writer: &ControlWriter, err: &FsError) -> io::Result<CommandOutcome> {
    warn!("{}", err);
    send_response(writer, format!("{}\r\n", err.to_ftp_response()).as_bytes()).await?;
    Ok(CommandOutcome::Continue)
}

pub async fn send_missing_argument(writer: &ControlWriter, verb: &str) -> io::Result<CommandOutcome> {
    warn!("{} command received with no arguments", verb);
    send_response(writer, b"501 Syntax error in parameters or arguments.\r\n").await?;
    Ok(CommandOutcome::Continue)
}

/// Claims the session's passive listener for one transfer, replying 425 when
/// there is none.
pub async fn claim_passive(
    writer: &ControlWriter,
    session: &mut Session,
    verb: &str,
) -> io::Result<Option<PassiveListener>> {
    match session.take_passive() {
        Some(listener) => Ok(Some(listener)),
        None => {
            warn!("{} without a passive data channel", verb);
            send_response(writer, b"425 Use PASV or EPSV first.\r\n").await?;
            Ok(None)
        }
    }
}

/// Accepts the data connection after the 150 reply went out. On failure the
/// client gets a 425 and `None` comes back.
pub async fn accept_data_connection(
    writer: &ControlWriter,
    listener: PassiveListener,
    wait: Duration,
) -> io::Result<Option<TcpStream>> {
    match listener.accept(wait).await {
        Ok(stream) => Ok(Some(stream)),
        Err(e) => {
            error!("Failed to accept data connection: {}", e);
            send_response(writer, b"425 Can't open data connection.\r\n").await?;
            Ok(None)
        }
    }
}

/// Shuts the data stream down; the socket closes when it is dropped.
pub async fn close_data_connection(mut stream: TcpStream) {
    if let Err(e) = stream.shutdown().await {
        debug!("Data stream shutdown: {}", e);
    }
}
