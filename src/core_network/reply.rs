use std::fmt;

/// A server reply as seen by the client: the three-digit code, the text of
/// the final line, and the raw frame exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
    pub raw: String,
}

impl Reply {
    /// Parses a complete frame. The code comes from the terminating
    /// `nnn <text>` line when there is one, else from the first line that
    /// starts with three digits.
    pub fn parse(raw: &str) -> Option<Reply> {
        let lines: Vec<&str> = raw
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .collect();

        let line = lines
            .iter()
            .rev()
            .find(|line| is_code_line(line.as_bytes(), b' '))
            .or_else(|| lines.iter().find(|line| has_code(line.as_bytes())))
            .copied()?;

        let code = line[..3].parse::<u16>().ok()?;
        let text = line.get(4..).unwrap_or("").trim().to_string();
        Some(Reply {
            code,
            text,
            raw: raw.to_string(),
        })
    }

    /// Anything below 400 is a positive (or intermediate) reply.
    pub fn is_positive(&self) -> bool {
        self.code < 400
    }

    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    pub fn is(&self, codes: &[u16]) -> bool {
        codes.contains(&self.code)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

pub(crate) fn has_code(line: &[u8]) -> bool {
    line.len() >= 3 && line[..3].iter().all(u8::is_ascii_digit)
}

/// `nnn` followed by `sep`: a space marks a final line, a dash an opening one.
pub(crate) fn is_code_line(line: &[u8], sep: u8) -> bool {
    has_code(line) && line.get(3) == Some(&sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let reply = Reply::parse("220 Ready\r\n").unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.text, "Ready");
        assert_eq!(reply.raw, "220 Ready\r\n");
        assert!(reply.is_positive());
    }

    #[test]
    fn test_multi_line_uses_final_line() {
        let reply = Reply::parse("230-Welcome\r\n230-Rules apply\r\n230 Login ok\r\n").unwrap();
        assert_eq!(reply.code, 230);
        assert_eq!(reply.text, "Login ok");
    }

    #[test]
    fn test_unterminated_falls_back_to_first_code() {
        let reply = Reply::parse("421-Going away").unwrap();
        assert_eq!(reply.code, 421);
        assert!(!reply.is_positive());

        let reply = Reply::parse("550").unwrap();
        assert_eq!(reply.code, 550);
        assert_eq!(reply.text, "");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Reply::parse("").is_none());
        assert!(Reply::parse("hello world\r\n").is_none());
        assert!(Reply::parse("2x0 nope\r\n").is_none());
    }

    #[test]
    fn test_classes() {
        assert!(Reply::parse("150 Opening\r\n").unwrap().is_preliminary());
        assert!(Reply::parse("350 Pending\r\n").unwrap().is_positive());
        assert!(!Reply::parse("530 No\r\n").unwrap().is_positive());
        assert!(Reply::parse("125 Go\r\n").unwrap().is(&[150, 125]));
    }
}
