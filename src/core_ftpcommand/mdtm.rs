use crate::config::ServerConfig;
use crate::constants::MDTM_FORMAT;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{
    send_fs_error, send_missing_argument, send_response, ControlWriter,
};
use crate::session::Session;
use chrono::NaiveDateTime;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Splits `MDTM YYYYMMDDHHMMSS path` into the timestamp and the path. A
/// single argument is always a path to query.
fn parse_set_request(arg: &str) -> Option<(NaiveDateTime, &str)> {
    let (stamp, path) = arg.split_once(char::is_whitespace)?;
    let path = path.trim();
    if stamp.len() != 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) || path.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, MDTM_FORMAT)
        .ok()
        .map(|when| (when, path))
}

/// Handles the MDTM FTP command. Times are UTC in both directions.
pub async fn handle_mdtm_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    let arg = arg.trim();
    if arg.is_empty() {
        return send_missing_argument(&writer, "MDTM").await;
    }
    let session = session.lock().await;
    info!("Received MDTM command with argument: {}", arg);

    if let Some((when, target)) = parse_set_request(arg) {
        let path = match session.resolve(target) {
            Ok(path) => path,
            Err(e) => return send_fs_error(&writer, &e).await,
        };
        if let Err(e) = session.store.set_modified(&path, when).await {
            return send_fs_error(&writer, &e).await;
        }
        send_response(&writer, b"213 Modification time set.\r\n").await?;
        return Ok(CommandOutcome::Continue);
    }

    let path = match session.resolve(arg) {
        Ok(path) => path,
        Err(e) => return send_fs_error(&writer, &e).await,
    };
    match session.store.modified(&path).await {
        Ok(modified) => {
            let response = format!("213 {}\r\n", modified.format(MDTM_FORMAT));
            send_response(&writer, response.as_bytes()).await?;
        }
        Err(e) => return send_fs_error(&writer, &e).await,
    }
    Ok(CommandOutcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_request() {
        let (when, path) = parse_set_request("20240102030405 notes.txt").unwrap();
        assert_eq!(when.format(MDTM_FORMAT).to_string(), "20240102030405");
        assert_eq!(path, "notes.txt");

        assert!(parse_set_request("notes.txt").is_none());
        assert!(parse_set_request("my notes.txt").is_none());
        assert!(parse_set_request("20241399000000 notes.txt").is_none());
        assert!(parse_set_request("20240102030405").is_none());
    }
}
