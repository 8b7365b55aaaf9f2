//! # Telnet Option Negotiation
//!
//! The game server is the only peer this client ever talks to, and it asks for
//! the same handful of options on every connection. Rather than tracking
//! per-option state (RFC 1143), every request is answered independently from a
//! fixed policy table:
//!
//! ```text
//! DO TERMINAL-TYPE        -> WILL TERMINAL-TYPE
//! DO NAWS                 -> WILL NAWS, SB NAWS <width> <height> SE
//! DO ECHO                 -> WONT ECHO        (the server echoes)
//! DO <other>              -> WONT <other>
//! WILL SUPPRESS-GO-AHEAD  -> DO SUPPRESS-GO-AHEAD
//! WILL ECHO               -> DO ECHO
//! WILL <other>            -> DONT <other>
//! SB TERMINAL-TYPE SEND   -> SB TERMINAL-TYPE IS <name> SE
//! ```
//!
//! Everything else (DONT, WONT, simple commands, other sub-negotiations) gets
//! no reply. Unknown options are never an error.
//!
//! The inbound chunk is only inspected, never modified: stripping telnet bytes
//! is left to whoever consumes the stream next.

use crate::options::{SubNegotiationCommand, TerminalTypeOption, WindowSize};
use crate::parser::SequenceScanner;
use crate::protocol::{TelnetCommand, TelnetOption, TelnetSequence};
use tracing::{debug, trace};

/// What this client reports about itself during negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationPolicy {
    /// Name sent in reply to `SB TERMINAL-TYPE SEND`
    pub terminal_type: TerminalTypeOption,
    /// Size advertised right after `WILL NAWS`
    pub window_size: WindowSize,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            terminal_type: TerminalTypeOption::default(),
            window_size: WindowSize::default(),
        }
    }
}

impl NegotiationPolicy {
    /// Replies for a single inbound sequence, in wire order
    pub fn respond(&self, sequence: &TelnetSequence) -> Vec<TelnetSequence> {
        match sequence {
            TelnetSequence::Negotiation { command, option } => match (command, option) {
                (TelnetCommand::DO, TelnetOption::TERMINAL_TYPE) => vec![
                    TelnetSequence::negotiation(TelnetCommand::WILL, TelnetOption::TERMINAL_TYPE),
                ],
                (TelnetCommand::DO, TelnetOption::NAWS) => vec![
                    TelnetSequence::negotiation(TelnetCommand::WILL, TelnetOption::NAWS),
                    self.window_size.to_subnegotiation(),
                ],
                (TelnetCommand::DO, other) => {
                    vec![TelnetSequence::negotiation(TelnetCommand::WONT, *other)]
                }
                (TelnetCommand::WILL, TelnetOption::SUPPRESS_GO_AHEAD | TelnetOption::ECHO) => {
                    vec![TelnetSequence::negotiation(TelnetCommand::DO, *option)]
                }
                (TelnetCommand::WILL, other) => {
                    vec![TelnetSequence::negotiation(TelnetCommand::DONT, *other)]
                }
                _ => Vec::new(),
            },

            TelnetSequence::SubNegotiation {
                option: TelnetOption::TERMINAL_TYPE,
                data,
            } => match TerminalTypeOption::parse_request(data) {
                Ok(SubNegotiationCommand::Send) => vec![self.terminal_type.is_reply()],
                Ok(SubNegotiationCommand::Is) => Vec::new(),
                Err(e) => {
                    debug!("ignoring terminal type sub-negotiation: {e}");
                    Vec::new()
                }
            },

            TelnetSequence::SubNegotiation { .. }
            | TelnetSequence::Command(_)
            | TelnetSequence::EscapedData(_) => Vec::new(),
        }
    }
}

/// Reply bytes produced for one inbound chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiationReply {
    bytes: Vec<u8>,
}

impl NegotiationReply {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn push(&mut self, sequence: &TelnetSequence) {
        self.bytes.extend_from_slice(&sequence.to_bytes());
    }
}

/// Per-connection negotiator
///
/// The only state kept between chunks is the scanner position inside an
/// unfinished IAC sequence, so a request split across two reads is answered
/// once, when its last byte arrives.
#[derive(Debug, Clone, Default)]
pub struct OptionNegotiator {
    policy: NegotiationPolicy,
    scanner: SequenceScanner,
}

impl OptionNegotiator {
    /// Create a negotiator with the default policy ("ansi", 80×24)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: NegotiationPolicy) -> Self {
        Self {
            policy,
            scanner: SequenceScanner::new(),
        }
    }

    pub fn policy(&self) -> &NegotiationPolicy {
        &self.policy
    }

    /// Scan an inbound chunk and build the bytes to send back
    pub fn negotiate(&mut self, chunk: &[u8]) -> NegotiationReply {
        let mut reply = NegotiationReply::default();

        for sequence in self.scanner.scan(chunk) {
            trace!(?sequence, "received");
            for response in self.policy.respond(&sequence) {
                debug!(?sequence, ?response, "negotiation reply");
                reply.push(&response);
            }
        }

        reply
    }

    /// Forget any partially received sequence (new connection)
    pub fn reset(&mut self) {
        self.scanner.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_do_terminal_type() {
        let mut negotiator = OptionNegotiator::new();
        let reply = negotiator.negotiate(&[255, 253, 24]);
        assert_eq!(reply.as_bytes(), &[255, 251, 24]);
    }

    #[test]
    fn test_do_naws_sends_size_immediately() {
        let mut negotiator = OptionNegotiator::new();
        let reply = negotiator.negotiate(&[255, 253, 31]);
        assert_eq!(
            reply.as_bytes(),
            &[255, 251, 31, 255, 250, 31, 0, 80, 0, 24, 255, 240]
        );
    }

    #[test]
    fn test_do_echo_and_unknown_are_refused() {
        let mut negotiator = OptionNegotiator::new();
        assert_eq!(negotiator.negotiate(&[255, 253, 1]).as_bytes(), &[255, 252, 1]);
        assert_eq!(negotiator.negotiate(&[255, 253, 3]).as_bytes(), &[255, 252, 3]);
        assert_eq!(negotiator.negotiate(&[255, 253, 200]).as_bytes(), &[255, 252, 200]);
    }

    #[test]
    fn test_will_policy() {
        let mut negotiator = OptionNegotiator::new();
        assert_eq!(negotiator.negotiate(&[255, 251, 3]).as_bytes(), &[255, 253, 3]);
        assert_eq!(negotiator.negotiate(&[255, 251, 1]).as_bytes(), &[255, 253, 1]);
        assert_eq!(negotiator.negotiate(&[255, 251, 86]).as_bytes(), &[255, 254, 86]);
    }

    #[test]
    fn test_dont_wont_and_commands_are_silent() {
        let mut negotiator = OptionNegotiator::new();
        assert!(negotiator.negotiate(&[255, 254, 1, 255, 252, 3, 255, 249]).is_empty());
    }

    #[test]
    fn test_terminal_type_send() {
        let mut negotiator = OptionNegotiator::new();
        let reply = negotiator.negotiate(&[255, 250, 24, 1, 255, 240]);
        assert_eq!(
            reply.as_bytes(),
            &[255, 250, 24, 0, b'a', b'n', b's', b'i', 255, 240]
        );
    }

    #[test]
    fn test_other_subnegotiations_are_scanned_past() {
        let mut negotiator = OptionNegotiator::new();
        let reply = negotiator.negotiate(&[255, 250, 201, b'x', b'y', 255, 240, 255, 253, 24]);
        assert_eq!(reply.as_bytes(), &[255, 251, 24]);
    }

    #[test]
    fn test_replies_follow_request_order() {
        let mut negotiator = OptionNegotiator::new();
        let reply = negotiator.negotiate(b"Welcome\xff\xfb\x01\r\n\xff\xfd\x18");
        assert_eq!(reply.as_bytes(), &[255, 253, 1, 255, 251, 24]);
    }

    #[test]
    fn test_split_request_answered_once() {
        let mut negotiator = OptionNegotiator::new();
        assert!(negotiator.negotiate(&[b'a', 255, 253]).is_empty());
        let reply = negotiator.negotiate(&[24, b'b']);
        assert_eq!(reply.as_bytes(), &[255, 251, 24]);
    }

    #[test]
    fn test_custom_policy() {
        let policy = NegotiationPolicy {
            terminal_type: TerminalTypeOption::new("vt100"),
            window_size: WindowSize::new(132, 43),
        };
        let mut negotiator = OptionNegotiator::with_policy(policy);
        let reply = negotiator.negotiate(&[255, 253, 31]);
        assert_eq!(
            reply.as_bytes(),
            &[255, 251, 31, 255, 250, 31, 0, 132, 0, 43, 255, 240]
        );
        assert_eq!(negotiator.policy().terminal_type.terminal_type(), "vt100");
    }
}
