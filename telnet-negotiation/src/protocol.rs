//! # Wire-level telnet vocabulary
//!
//! Byte values from RFC 854 (commands) and RFC 855 (option framing), plus
//! the option codes a MUD server is likely to offer. Three shapes appear on
//! the wire:
//!
//! ```text
//! IAC <cmd>                      e.g. IAC GA
//! IAC WILL|WONT|DO|DONT <opt>    option negotiation
//! IAC SB <opt> <payload> IAC SE  payload 255s are sent doubled
//! ```

/// Marks the next byte as a command; a literal 255 travels as `IAC IAC`
pub const IAC: u8 = 255;

/// Longest unfinished sequence (SB payload included) any stage keeps
/// waiting for its end before giving up on it
pub const MAX_SEQUENCE_LEN: usize = 4096;

/// Command bytes 240..=254
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TelnetCommand {
    /// Ends an SB payload
    SE = 240,
    NOP = 241,
    /// Data Mark
    DM = 242,
    BRK = 243,
    /// Interrupt Process
    IP = 244,
    /// Abort Output
    AO = 245,
    /// Are You There
    AYT = 246,
    /// Erase Character
    EC = 247,
    /// Erase Line
    EL = 248,
    /// Go Ahead; many MUDs send it after a prompt
    GA = 249,
    /// Opens an SB payload for the option that follows
    SB = 250,
    WILL = 251,
    WONT = 252,
    DO = 253,
    DONT = 254,
}

/// Indexed by `byte - 240`
const COMMANDS: [TelnetCommand; 15] = [
    TelnetCommand::SE,
    TelnetCommand::NOP,
    TelnetCommand::DM,
    TelnetCommand::BRK,
    TelnetCommand::IP,
    TelnetCommand::AO,
    TelnetCommand::AYT,
    TelnetCommand::EC,
    TelnetCommand::EL,
    TelnetCommand::GA,
    TelnetCommand::SB,
    TelnetCommand::WILL,
    TelnetCommand::WONT,
    TelnetCommand::DO,
    TelnetCommand::DONT,
];

impl TelnetCommand {
    /// `None` for anything outside 240..=254 (including IAC itself)
    ///
    /// # Example
    /// ```
    /// use telnet_negotiation::protocol::TelnetCommand;
    ///
    /// assert_eq!(TelnetCommand::from_byte(253), Some(TelnetCommand::DO));
    /// assert_eq!(TelnetCommand::from_byte(255), None);
    /// ```
    pub fn from_byte(byte: u8) -> Option<Self> {
        byte.checked_sub(240)
            .and_then(|index| COMMANDS.get(usize::from(index)))
            .copied()
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// WILL, WONT, DO or DONT
    pub fn is_negotiation_command(self) -> bool {
        (251..=254).contains(&self.to_byte())
    }

    /// The command is followed by an option byte (negotiations and SB)
    pub fn requires_option(self) -> bool {
        self == TelnetCommand::SB || self.is_negotiation_command()
    }
}

/// An option code. Codes without a name are kept as [`TelnetOption::Other`]
/// so every byte maps to something the negotiator can refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TelnetOption {
    BINARY,
    ECHO,
    SUPPRESS_GO_AHEAD,
    STATUS,
    TIMING_MARK,
    /// RFC 1091
    TERMINAL_TYPE,
    END_OF_RECORD,
    /// RFC 1073
    NAWS,
    TERMINAL_SPEED,
    LINEMODE,
    NEW_ENVIRON,
    CHARSET,
    MSDP,
    MSSP,
    MCCP2,
    GMCP,
    Other(u8),
}

const NAMED_OPTIONS: [(u8, TelnetOption); 16] = [
    (0, TelnetOption::BINARY),
    (1, TelnetOption::ECHO),
    (3, TelnetOption::SUPPRESS_GO_AHEAD),
    (5, TelnetOption::STATUS),
    (6, TelnetOption::TIMING_MARK),
    (24, TelnetOption::TERMINAL_TYPE),
    (25, TelnetOption::END_OF_RECORD),
    (31, TelnetOption::NAWS),
    (32, TelnetOption::TERMINAL_SPEED),
    (34, TelnetOption::LINEMODE),
    (39, TelnetOption::NEW_ENVIRON),
    (42, TelnetOption::CHARSET),
    (69, TelnetOption::MSDP),
    (70, TelnetOption::MSSP),
    (86, TelnetOption::MCCP2),
    (201, TelnetOption::GMCP),
];

impl TelnetOption {
    /// Total: unnamed codes become `Other`
    pub fn from_byte(byte: u8) -> Self {
        NAMED_OPTIONS
            .iter()
            .find(|(code, _)| *code == byte)
            .map_or(TelnetOption::Other(byte), |(_, option)| *option)
    }

    pub fn to_byte(self) -> u8 {
        if let TelnetOption::Other(code) = self {
            return code;
        }
        NAMED_OPTIONS
            .iter()
            .find(|(_, option)| *option == self)
            .map_or(0, |(code, _)| *code)
    }
}

/// One complete telnet sequence, as found inbound or built for a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetSequence {
    /// `IAC <cmd>` for commands that take no option
    Command(TelnetCommand),
    Negotiation {
        command: TelnetCommand,
        option: TelnetOption,
    },
    /// `data` holds the payload with IAC doubling already undone
    SubNegotiation { option: TelnetOption, data: Vec<u8> },
    /// `IAC IAC`
    EscapedData(u8),
}

impl TelnetSequence {
    pub fn negotiation(command: TelnetCommand, option: TelnetOption) -> Self {
        TelnetSequence::Negotiation { command, option }
    }

    /// Wire bytes, doubling any 255 in an SB payload
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            TelnetSequence::Command(command) => vec![IAC, command.to_byte()],
            TelnetSequence::Negotiation { command, option } => {
                vec![IAC, command.to_byte(), option.to_byte()]
            }
            TelnetSequence::SubNegotiation { option, data } => {
                let mut wire = vec![IAC, TelnetCommand::SB.to_byte(), option.to_byte()];
                for &byte in data {
                    wire.push(byte);
                    if byte == IAC {
                        wire.push(IAC);
                    }
                }
                wire.extend_from_slice(&[IAC, TelnetCommand::SE.to_byte()]);
                wire
            }
            TelnetSequence::EscapedData(byte) => vec![IAC, *byte],
        }
    }
}
