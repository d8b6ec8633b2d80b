use crate::config::ServerConfig;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    accept_data_connection, claim_passive, close_data_connection, send_fs_error, send_response,
    ControlWriter,
};
use crate::core_log::FtpEvent;
use crate::session::Session;
use log::{error, info};
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Drops leading `ls`-style flags such as `-la`; whatever remains is the path.
fn listing_target(arg: &str) -> &str {
    let mut rest = arg.trim();
    while rest.starts_with('-') {
        rest = match rest.split_once(char::is_whitespace) {
            Some((_, tail)) => tail.trim_start(),
            None => "",
        };
    }
    rest
}

/// Handles the LIST FTP command.
///
/// Sends a long-format listing of the target directory (the current one when
/// no path is given) over the pending passive data connection.
pub async fn handle_list_command(
    writer: ControlWriter,
    config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, io::Error> {
    let mut session = session.lock().await;
    let target = listing_target(&arg);
    info!("Received LIST command with argument: {:?}", target);

    let Some(listener) = claim_passive(&writer, &mut session, "LIST").await? else {
        return Ok(CommandOutcome::Continue);
    };

    let dir_path = match session.resolve(target) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    let listing = match session.store.list(&dir_path).await {
        Ok(listing) => listing,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    let virtual_path = session.virtual_path(target).unwrap_or_default();

    send_response(&writer, b"150 Here comes the directory listing.\r\n").await?;
    let Some(mut data_stream) =
        accept_data_connection(&writer, listener, config.data_timeout()).await?
    else {
        return Ok(CommandOutcome::Continue);
    };
    session.events.emit(&FtpEvent::TransferStarted {
        command: "LIST".into(),
        path: virtual_path.clone(),
    });

    if let Err(e) = data_stream.write_all(listing.as_bytes()).await {
        error!("Error writing listing to data stream: {}", e);
        send_response(&writer, b"426 Connection closed; transfer aborted.\r\n").await?;
        return Ok(CommandOutcome::Continue);
    }
    close_data_connection(data_stream).await;

    session.events.emit(&FtpEvent::TransferFinished {
        command: "LIST".into(),
        path: virtual_path,
        bytes: listing.len() as u64,
    });
    send_response(&writer, b"226 Directory send OK.\r\n").await?;
    Ok(CommandOutcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_target_skips_flags() {
        assert_eq!(listing_target(""), "");
        assert_eq!(listing_target("-la"), "");
        assert_eq!(listing_target("-l -a docs"), "docs");
        assert_eq!(listing_target("  pub/files "), "pub/files");
        assert_eq!(listing_target("my dir"), "my dir");
    }
}
