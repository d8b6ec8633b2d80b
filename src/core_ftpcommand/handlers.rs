use crate::config::ServerConfig;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::utils::ControlWriter;
use crate::core_ftpcommand::{
    cdup, cwd, dele, list, mdtm, mkd, noop, pass, pwd, quit, retr, rmd, rnfr, rnto, size, stor,
    syst, type_, user,
};
use crate::core_network::pasv;
use crate::session::Session;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

/// Tells the session loop whether to keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Quit,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = io::Result<CommandOutcome>> + Send>>;

pub type CommandHandler = Box<
    dyn Fn(
            ControlWriter,
            Arc<ServerConfig>,
            Arc<TokioMutex<Session>>,
            String, // Argument, empty when absent
        ) -> HandlerFuture
        + Send
        + Sync,
>;

/// Boxes an async handler into the dispatch table's uniform shape.
fn handler<F, Fut>(f: F) -> Arc<CommandHandler>
where
    F: Fn(ControlWriter, Arc<ServerConfig>, Arc<TokioMutex<Session>>, String) -> Fut
        + Send
        + Sync
        + 'static,
    Fut: Future<Output = io::Result<CommandOutcome>> + Send + 'static,
{
    let boxed: CommandHandler = Box::new(
        move |writer: ControlWriter,
              config: Arc<ServerConfig>,
              session: Arc<TokioMutex<Session>>,
              arg: String|
              -> HandlerFuture { Box::pin(f(writer, config, session, arg)) },
    );
    Arc::new(boxed)
}

pub fn initialize_command_handlers() -> HashMap<FtpCommand, Arc<CommandHandler>> {
    let mut handlers: HashMap<FtpCommand, Arc<CommandHandler>> = HashMap::new();

    handlers.insert(FtpCommand::USER, handler(user::handle_user_command));
    handlers.insert(FtpCommand::PASS, handler(pass::handle_pass_command));
    handlers.insert(
        FtpCommand::SYST,
        handler(|writer, _config, _session, _arg| syst::handle_syst_command(writer)),
    );
    handlers.insert(
        FtpCommand::PWD,
        handler(|writer, _config, session, _arg| pwd::handle_pwd_command(writer, session)),
    );
    handlers.insert(FtpCommand::CWD, handler(cwd::handle_cwd_command));
    handlers.insert(FtpCommand::CDUP, handler(cdup::handle_cdup_command));
    handlers.insert(FtpCommand::TYPE, handler(type_::handle_type_command));
    handlers.insert(
        FtpCommand::NOOP,
        handler(|writer, _config, _session, _arg| noop::handle_noop_command(writer)),
    );
    handlers.insert(
        FtpCommand::QUIT,
        handler(|writer, _config, session, _arg| quit::handle_quit_command(writer, session)),
    );

    // Passive data channel negotiation
    handlers.insert(FtpCommand::PASV, handler(pasv::handle_pasv_command));
    handlers.insert(FtpCommand::EPSV, handler(pasv::handle_epsv_command));

    // Transfers over the data channel
    handlers.insert(FtpCommand::LIST, handler(list::handle_list_command));
    handlers.insert(FtpCommand::RETR, handler(retr::handle_retr_command));
    handlers.insert(FtpCommand::STOR, handler(stor::handle_stor_command));

    handlers.insert(FtpCommand::DELE, handler(dele::handle_dele_command));
    handlers.insert(FtpCommand::MKD, handler(mkd::handle_mkd_command));
    handlers.insert(FtpCommand::RMD, handler(rmd::handle_rmd_command));
    handlers.insert(FtpCommand::RNFR, handler(rnfr::handle_rnfr_command));
    handlers.insert(FtpCommand::RNTO, handler(rnto::handle_rnto_command));
    handlers.insert(FtpCommand::SIZE, handler(size::handle_size_command));
    handlers.insert(FtpCommand::MDTM, handler(mdtm::handle_mdtm_command));

    handlers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_verb_has_a_handler() {
        let handlers = initialize_command_handlers();
        for verb in [
            "USER", "PASS", "SYST", "PWD", "CWD", "CDUP", "TYPE", "NOOP", "QUIT", "PASV", "EPSV",
            "LIST", "RETR", "STOR", "DELE", "MKD", "RMD", "RNFR", "RNTO", "SIZE", "MDTM",
        ] {
            let command = FtpCommand::from_str(verb).unwrap();
            assert!(handlers.contains_key(&command), "{verb}");
        }
    }
}
