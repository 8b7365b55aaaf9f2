//! # IAC Sequence Scanner
//!
//! Finds the telnet sequences (RFC 854/855) in an inbound byte stream. Only
//! the sequences are reported; data bytes are skipped, since the negotiator
//! never alters the stream it inspects.
//!
//! The scanner is a byte-at-a-time state machine, so a sequence cut off at
//! the end of one chunk is completed by the next one:
//!
//! ```text
//! Text --IAC--> Iac --WILL/WONT/DO/DONT/SB--> AwaitOption
//!                 \--other command--> Text (Command)
//!                  \--IAC--> Text (EscapedData)
//! AwaitOption --opt--> Text (Negotiation)   or   Sub (after SB)
//! Sub --IAC--> Sub{after_iac} --SE--> Text (SubNegotiation)
//! ```
//!
//! An SB payload longer than [`MAX_SEQUENCE_LEN`] is abandoned and scanning
//! resumes as text, so a lost `IAC SE` cannot hide later requests.

use crate::protocol::{IAC, MAX_SEQUENCE_LEN, TelnetCommand, TelnetOption, TelnetSequence};
use tracing::{debug, trace};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Scan {
    #[default]
    Text,
    Iac,
    AwaitOption(TelnetCommand),
    Sub {
        option: TelnetOption,
        payload: Vec<u8>,
        after_iac: bool,
    },
}

/// Stateful scanner; one per connection
#[derive(Debug, Clone, Default)]
pub struct SequenceScanner {
    scan: Scan,
}

impl SequenceScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequences completed by this chunk, in stream order
    ///
    /// # Example
    /// ```
    /// use telnet_negotiation::parser::SequenceScanner;
    ///
    /// let mut scanner = SequenceScanner::new();
    /// // "hi", IAC WILL ECHO, "!"
    /// let found = scanner.scan(&[104, 105, 255, 251, 1, 33]);
    /// assert_eq!(found.len(), 1);
    /// ```
    pub fn scan(&mut self, chunk: &[u8]) -> Vec<TelnetSequence> {
        chunk.iter().filter_map(|&byte| self.step(byte)).collect()
    }

    fn step(&mut self, byte: u8) -> Option<TelnetSequence> {
        let (next, found) = match std::mem::take(&mut self.scan) {
            Scan::Text if byte == IAC => (Scan::Iac, None),
            Scan::Text => (Scan::Text, None),

            Scan::Iac if byte == IAC => (Scan::Text, Some(TelnetSequence::EscapedData(IAC))),
            Scan::Iac => match TelnetCommand::from_byte(byte) {
                Some(command) if command.requires_option() => (Scan::AwaitOption(command), None),
                Some(command) => (Scan::Text, Some(TelnetSequence::Command(command))),
                None => {
                    trace!(byte, "IAC followed by a non-command byte");
                    (Scan::Text, None)
                }
            },

            Scan::AwaitOption(TelnetCommand::SB) => (
                Scan::Sub {
                    option: TelnetOption::from_byte(byte),
                    payload: Vec::new(),
                    after_iac: false,
                },
                None,
            ),
            Scan::AwaitOption(command) => (
                Scan::Text,
                Some(TelnetSequence::negotiation(command, TelnetOption::from_byte(byte))),
            ),

            Scan::Sub {
                option,
                payload,
                after_iac: true,
            } if byte == TelnetCommand::SE.to_byte() => (
                Scan::Text,
                Some(TelnetSequence::SubNegotiation {
                    option,
                    data: payload,
                }),
            ),
            Scan::Sub {
                option,
                mut payload,
                after_iac,
            } => {
                // After IAC: IAC IAC is a literal 255, anything else is
                // malformed and kept as payload
                let after_iac = !after_iac && byte == IAC;
                if !after_iac {
                    payload.push(byte);
                }
                if payload.len() > MAX_SEQUENCE_LEN {
                    debug!(?option, len = payload.len(), "unterminated sub-negotiation, dropping");
                    (Scan::Text, None)
                } else {
                    (
                        Scan::Sub {
                            option,
                            payload,
                            after_iac,
                        },
                        None,
                    )
                }
            }
        };

        self.scan = next;
        if let Some(sequence) = &found {
            trace!(?sequence, "sequence complete");
        }
        found
    }

    /// True while a sequence is open at the end of the last chunk
    pub fn is_mid_sequence(&self) -> bool {
        self.scan != Scan::Text
    }

    /// Forget any open sequence (new connection)
    pub fn reset(&mut self) {
        self.scan = Scan::Text;
    }
}
