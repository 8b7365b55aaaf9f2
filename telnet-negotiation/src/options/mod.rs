//! Payloads for the two options this client answers with data.
//!
//! - terminal type (RFC 1091): `SB 24 SEND` is answered by `SB 24 IS <name>`
//! - window size (RFC 1073): sent unasked, right after `WILL NAWS`

pub mod naws;
pub mod terminal_type;

pub use naws::WindowSize;
pub use terminal_type::TerminalTypeOption;

/// First payload byte of a SEND/IS style sub-negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubNegotiationCommand {
    Is = 0,
    Send = 1,
}

impl SubNegotiationCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SubNegotiationCommand::Is),
            1 => Some(SubNegotiationCommand::Send),
            _ => None,
        }
    }
}

/// A sub-negotiation payload the client cannot act on
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("malformed payload: {0}")]
    InvalidData(String),
    #[error("unknown sub-negotiation verb {0}")]
    UnsupportedCommand(u8),
}
