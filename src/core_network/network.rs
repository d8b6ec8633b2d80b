use crate::config::ServerConfig;
use crate::constants::ACCEPT_RETRY_DELAY_MS;
use crate::core_fs::PathSandbox;
use crate::core_ftpcommand::ftpcommand::{Command, FtpCommand};
use crate::core_ftpcommand::handlers::{CommandHandler, CommandOutcome};
use crate::core_ftpcommand::utils::{send_response, ControlWriter};
use crate::core_log::{EventSink, FtpEvent};
use crate::core_network::framing::CommandFramer;
use crate::session::Session;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

pub type HandlerTable = Arc<HashMap<FtpCommand, Arc<CommandHandler>>>;

async fn back_off_after_accept_error(e: &io::Error) {
    error!("Failed to accept connection: {}", e);
    tokio::time::sleep(Duration::from_millis(ACCEPT_RETRY_DELAY_MS)).await;
}

/// Accepts control connections forever, one spawned task per connection.
/// Sessions share nothing but the read-only config, sandbox and handlers.
pub async fn accept_connections(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    sandbox: PathSandbox,
    handlers: HandlerTable,
    events: Arc<dyn EventSink>,
) -> io::Result<()> {
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                back_off_after_accept_error(&e).await;
                continue;
            }
        };
        info!("New connection from {}", addr);

        let config = Arc::clone(&config);
        let sandbox = sandbox.clone();
        let handlers = Arc::clone(&handlers);
        let events = Arc::clone(&events);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, config, sandbox, handlers, events).await {
                warn!("Connection error for {}: {}", addr, e);
            }
            info!("Connection closed for {}", addr);
        });
    }
}

/// Runs one control session to completion: banner, then one command at a
/// time until QUIT, peer disconnect or a control channel failure.
pub async fn handle_connection(
    socket: TcpStream,
    config: Arc<ServerConfig>,
    sandbox: PathSandbox,
    handlers: HandlerTable,
    events: Arc<dyn EventSink>,
) -> io::Result<()> {
    let peer = socket.peer_addr()?;
    let local_ip = socket.local_addr()?.ip();
    let (read_half, write_half) = socket.into_split();
    let writer: ControlWriter = Arc::new(Mutex::new(write_half));
    let mut framer = CommandFramer::new(read_half);

    let session = Arc::new(Mutex::new(Session::new(
        sandbox,
        local_ip,
        peer,
        Arc::clone(&events),
    )));
    events.emit(&FtpEvent::Connected {
        peer: peer.to_string(),
    });

    let result = run_session(&mut framer, &writer, &config, &session, &handlers).await;

    session.lock().await.close_passive();
    events.emit(&FtpEvent::Disconnected {
        peer: peer.to_string(),
    });
    result
}

async fn run_session(
    framer: &mut CommandFramer<tokio::net::tcp::OwnedReadHalf>,
    writer: &ControlWriter,
    config: &Arc<ServerConfig>,
    session: &Arc<Mutex<Session>>,
    handlers: &HandlerTable,
) -> io::Result<()> {
    send_response(writer, format!("220 {}\r\n", config.banner).as_bytes()).await?;

    while let Some(line) = framer.next_command().await? {
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        let (peer, authenticated) = {
            let session = session.lock().await;
            session
                .events
                .emit(&FtpEvent::command_received(session.peer, &line));
            (session.peer, session.is_authenticated)
        };

        let Some(verb) = FtpCommand::from_str(&command.verb) else {
            warn!("Unknown command from {}: {}", peer, command.verb);
            send_response(writer, b"500 Unknown command.\r\n").await?;
            continue;
        };
        if verb.requires_auth() && !authenticated {
            send_response(writer, b"530 Not logged in.\r\n").await?;
            continue;
        }

        let Some(handler) = handlers.get(&verb) else {
            send_response(writer, b"502 Command not implemented.\r\n").await?;
            continue;
        };
        let outcome = handler(
            Arc::clone(writer),
            Arc::clone(config),
            Arc::clone(session),
            command.argument.unwrap_or_default(),
        )
        .await?;

        if outcome == CommandOutcome::Quit {
            debug!("Session with {} ended by QUIT", peer);
            return Ok(());
        }
    }

    debug!("Client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_accept_errors_are_throttled() {
        let err = io::Error::new(io::ErrorKind::Other, "too many open files");
        let started = Instant::now();
        for _ in 0..3 {
            back_off_after_accept_error(&err).await;
        }
        assert!(started.elapsed() >= Duration::from_millis(3 * ACCEPT_RETRY_DELAY_MS));
    }
}
