//! Terminal type (RFC 1091).
//!
//! ```text
//! server: IAC SB 24 SEND IAC SE
//! client: IAC SB 24 IS <name> IAC SE
//! ```
//!
//! Only one name is ever reported, so the RFC's cycling through a list of
//! types does not apply.

use super::{OptionError, SubNegotiationCommand};
use crate::protocol::{TelnetOption, TelnetSequence};

/// Terminal type this client reports unless configured otherwise
pub const DEFAULT_TERMINAL_TYPE: &str = "ansi";

/// Terminal Type option: answers SEND requests with a fixed name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalTypeOption {
    terminal_type: String,
}

impl TerminalTypeOption {
    pub fn new(terminal_type: impl Into<String>) -> Self {
        Self {
            terminal_type: terminal_type.into(),
        }
    }

    /// The name reported to the server
    pub fn terminal_type(&self) -> &str {
        &self.terminal_type
    }

    /// Decode the verb of an incoming TERMINAL-TYPE sub-negotiation
    pub fn parse_request(data: &[u8]) -> Result<SubNegotiationCommand, OptionError> {
        let Some(&verb) = data.first() else {
            return Err(OptionError::InvalidData(
                "empty terminal type sub-negotiation".to_string(),
            ));
        };
        SubNegotiationCommand::from_byte(verb).ok_or(OptionError::UnsupportedCommand(verb))
    }

    /// Build `IAC SB TERMINAL-TYPE IS <name> IAC SE`
    pub fn is_reply(&self) -> TelnetSequence {
        let mut data = Vec::with_capacity(self.terminal_type.len() + 1);
        data.push(SubNegotiationCommand::Is as u8);
        data.extend_from_slice(self.terminal_type.as_bytes());
        TelnetSequence::SubNegotiation {
            option: TelnetOption::TERMINAL_TYPE,
            data,
        }
    }
}

impl Default for TerminalTypeOption {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINAL_TYPE)
    }
}
