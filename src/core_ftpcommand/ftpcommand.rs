#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
pub enum FtpCommand {
    USER,
    PASS,
    SYST,
    PWD,
    CWD,
    CDUP,
    TYPE,
    NOOP,
    QUIT,
    PASV,
    EPSV,
    LIST,
    RETR,
    STOR,
    DELE,
    MKD,
    RMD,
    RNFR,
    RNTO,
    SIZE,
    MDTM,
}

impl FtpCommand {
    pub fn from_str(cmd: &str) -> Option<FtpCommand> {
        match cmd.to_ascii_uppercase().as_str() {
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "SYST" => Some(FtpCommand::SYST),
            "PWD" => Some(FtpCommand::PWD),
            "CWD" => Some(FtpCommand::CWD),
            "CDUP" => Some(FtpCommand::CDUP),
            "TYPE" => Some(FtpCommand::TYPE),
            "NOOP" => Some(FtpCommand::NOOP),
            "QUIT" => Some(FtpCommand::QUIT),
            "PASV" => Some(FtpCommand::PASV),
            "EPSV" => Some(FtpCommand::EPSV),
            "LIST" => Some(FtpCommand::LIST),
            "RETR" => Some(FtpCommand::RETR),
            "STOR" => Some(FtpCommand::STOR),
            "DELE" => Some(FtpCommand::DELE),
            "MKD" => Some(FtpCommand::MKD),
            "RMD" => Some(FtpCommand::RMD),
            "RNFR" => Some(FtpCommand::RNFR),
            "RNTO" => Some(FtpCommand::RNTO),
            "SIZE" => Some(FtpCommand::SIZE),
            "MDTM" => Some(FtpCommand::MDTM),
            _ => None,
        }
    }

    /// Everything that touches the filesystem or a data channel needs a login.
    pub fn requires_auth(&self) -> bool {
        !matches!(
            self,
            FtpCommand::USER
                | FtpCommand::PASS
                | FtpCommand::SYST
                | FtpCommand::NOOP
                | FtpCommand::QUIT
                | FtpCommand::TYPE
        )
    }
}

/// One parsed control line: the verb, uppercased, and whatever followed the
/// first run of whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: String,
    pub argument: Option<String>,
}

impl Command {
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim_start()),
            None => (line, ""),
        };
        Some(Command {
            verb: verb.to_ascii_uppercase(),
            argument: (!rest.is_empty()).then(|| rest.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            Command::parse("stor my file.txt"),
            Some(Command {
                verb: "STOR".into(),
                argument: Some("my file.txt".into())
            })
        );
        assert_eq!(
            Command::parse("PWD"),
            Some(Command {
                verb: "PWD".into(),
                argument: None
            })
        );
        assert_eq!(
            Command::parse("CWD    docs"),
            Some(Command {
                verb: "CWD".into(),
                argument: Some("docs".into())
            })
        );
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn test_verbs_are_case_insensitive() {
        assert_eq!(FtpCommand::from_str("epsv"), Some(FtpCommand::EPSV));
        assert_eq!(FtpCommand::from_str("Retr"), Some(FtpCommand::RETR));
        assert_eq!(FtpCommand::from_str("SITE"), None);
    }

    #[test]
    fn test_auth_policy() {
        for open in ["USER", "PASS", "SYST", "NOOP", "QUIT", "TYPE"] {
            assert!(!FtpCommand::from_str(open).unwrap().requires_auth(), "{open}");
        }
        for guarded in ["PWD", "CWD", "CDUP", "PASV", "EPSV", "LIST", "RETR", "STOR", "DELE", "MKD", "RMD", "RNFR", "RNTO", "SIZE", "MDTM"] {
            assert!(FtpCommand::from_str(guarded).unwrap().requires_auth(), "{guarded}");
        }
    }
}
