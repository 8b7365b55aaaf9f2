//! Vendor control-code decoder.
//!
//! The game server mixes three things into one byte stream: telnet
//! sequences, ANSI escapes and its own control codes. This pass pulls the
//! vendor codes out, tracks the connection mode and extracts stats records.
//! Everything else comes out as clean bytes for the ANSI decoder.
//!
//! ## Vendor sequences
//!
//! A byte in `155..=254` starts a sequence that runs up to the next 255,
//! which must appear within the look-ahead window. Without a terminator the
//! byte is ordinary data. The sequence is classified by its first byte.
//!
//! `ESC - x` is the short form used for screen control.
//!
//! ## Stats records
//!
//! The header `[167, 163, 156, 255]` is followed by the record text, ended by
//! CR or LF. Bytes of 155 and above inside the record are skipped.
//!
//! ## Telnet
//!
//! IAC sequences pass through untouched. Their command bytes sit in the
//! vendor range and must not be read as the start of a vendor sequence.

use crate::stats::GameStats;
use serde::Serialize;
use telnet_negotiation::MAX_SEQUENCE_LEN;
use tracing::{debug, trace};

pub const STATS_HEADER: [u8; 4] = [167, 163, 156, 255];
pub const CLIENT_MODE_REQUEST: [u8; 5] = [0x1B, 0x06, 0x1B, 0x2D, 0x54];
pub const DEFAULT_LOOKAHEAD: usize = 20;

const VENDOR_FIRST: u8 = 155;
const TERMINATOR: u8 = 255;
const ESC: u8 = 0x1B;
const CR: u8 = 0x0D;
const LF: u8 = 0x0A;

const IAC: u8 = 255;
const SB: u8 = 250;
const SE: u8 = 240;
const WILL: u8 = 251;
const DONT: u8 = 254;

/// Longest stats record text accepted before the record is abandoned
const MAX_RECORD: usize = 512;

/// Connection phase. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    #[default]
    Telnet,
    ClientMode,
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalColor {
    Blue,
    Green,
    BrightGreen,
    Cyan,
    Magenta,
    Red,
    Magic,
    Combat,
    Event,
    Yellow,
}

impl LogicalColor {
    /// Foreground palette index used when painting this colour
    pub fn palette_index(self) -> usize {
        match self {
            LogicalColor::Blue | LogicalColor::Magic => 4,
            LogicalColor::Green => 2,
            LogicalColor::BrightGreen => 10,
            LogicalColor::Cyan => 6,
            LogicalColor::Magenta => 5,
            LogicalColor::Red | LogicalColor::Combat | LogicalColor::Event => 1,
            LogicalColor::Yellow => 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum VendorCommand {
    PromptStart,
    ClearScreen,
    ReverseOn,
    ReverseOff,
    ClearToEndOfLine,
    ColorSet { color: LogicalColor },
    /// Palette indices, already offset from the wire values
    ColorDirect { fg: u8, bg: u8 },
    ModeEnter { mode: ConnectionMode },
    FesStart,
    DreamwordMarker,
    ClientModeStart,
    Unknown { code: u8 },
}

/// A command and where it sat in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedCommand {
    /// Length of `clean` when the command was found
    pub offset: usize,
    pub command: VendorCommand,
}

/// Result of decoding one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorOutput {
    /// Bytes left for the ANSI decoder
    pub clean: Vec<u8>,
    /// In stream order, so offsets never decrease
    pub commands: Vec<PlacedCommand>,
    /// Set when a complete stats record replaced the stats: the number of
    /// commands that came before the last such record
    pub stats_updated: Option<usize>,
}

impl VendorOutput {
    fn push(&mut self, command: VendorCommand) {
        self.commands.push(PlacedCommand {
            offset: self.clean.len(),
            command,
        });
    }

    /// The commands without their offsets
    pub fn command_list(&self) -> Vec<VendorCommand> {
        self.commands.iter().map(|placed| placed.command).collect()
    }
}

#[derive(Debug, Clone)]
pub struct VendorDecoder {
    mode: ConnectionMode,
    lookahead: usize,
    /// Record text collected so far, when inside a stats record
    record: Option<Vec<u8>>,
    /// Bytes of a sequence that could not be decided at the end of a chunk
    held: Vec<u8>,
}

impl Default for VendorDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VendorDecoder {
    pub fn new() -> Self {
        Self::with_lookahead(DEFAULT_LOOKAHEAD)
    }

    pub fn with_lookahead(lookahead: usize) -> Self {
        Self {
            mode: ConnectionMode::Telnet,
            lookahead: lookahead.max(1),
            record: None,
            held: Vec::new(),
        }
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Bytes asking the server to switch the connection into client mode
    pub const fn client_mode_request() -> &'static [u8] {
        &CLIENT_MODE_REQUEST
    }

    /// Decode one chunk. `stats` is replaced when a complete, valid record
    /// arrives and left alone otherwise.
    pub fn decode(&mut self, input: &[u8], stats: &mut GameStats) -> VendorOutput {
        let mut bytes = std::mem::take(&mut self.held);
        bytes.extend_from_slice(input);

        let mut out = VendorOutput {
            clean: Vec::with_capacity(bytes.len()),
            ..VendorOutput::default()
        };
        self.scan(&bytes, stats, &mut out);
        out
    }

    /// Give up waiting for the terminator of a held vendor sequence.
    ///
    /// Used when the server has gone quiet: its start byte becomes data and
    /// the bytes after it are decoded again. Held IAC and `ESC -` sequences
    /// are kept, since those always complete.
    pub fn release_undecided(&mut self, stats: &mut GameStats) -> VendorOutput {
        let mut out = VendorOutput::default();
        match self.held.first() {
            Some(&first) if first >= VENDOR_FIRST && first != TERMINATOR => {
                let held = std::mem::take(&mut self.held);
                trace!(len = held.len(), "releasing undecided vendor byte");
                out.clean.push(first);
                self.scan(&held[1..], stats, &mut out);
            }
            _ => {}
        }
        out
    }

    fn scan(&mut self, bytes: &[u8], stats: &mut GameStats, out: &mut VendorOutput) {
        let mut i = 0;

        while i < bytes.len() {
            if self.record.is_some() {
                i = self.collect_record(bytes, i, stats, out);
                continue;
            }

            let byte = bytes[i];
            match byte {
                IAC => match telnet_sequence_len(&bytes[i..]) {
                    Some(len) => {
                        out.clean.extend_from_slice(&bytes[i..i + len]);
                        i += len;
                    }
                    None => {
                        self.hold(&bytes[i..], &mut out.clean);
                        break;
                    }
                },
                VENDOR_FIRST..=254 => {
                    if bytes[i..].starts_with(&STATS_HEADER) {
                        trace!("stats record header");
                        out.push(VendorCommand::FesStart);
                        self.record = Some(Vec::new());
                        i += STATS_HEADER.len();
                        continue;
                    }

                    let window_end = (i + 1 + self.lookahead).min(bytes.len());
                    match bytes[i + 1..window_end].iter().position(|&b| b == TERMINATOR) {
                        Some(offset) => {
                            let end = i + 1 + offset;
                            self.classify(&bytes[i..end], out);
                            i = end + 1;
                        }
                        None if bytes.len() - (i + 1) < self.lookahead => {
                            self.hold(&bytes[i..], &mut out.clean);
                            break;
                        }
                        None => {
                            out.clean.push(byte);
                            i += 1;
                        }
                    }
                }
                ESC => match bytes.get(i + 1) {
                    None => {
                        self.hold(&bytes[i..], &mut out.clean);
                        break;
                    }
                    Some(b'-') => {
                        let Some(&code) = bytes.get(i + 2) else {
                            self.hold(&bytes[i..], &mut out.clean);
                            break;
                        };
                        if !self.escape_code(code, out) {
                            out.clean.extend_from_slice(&bytes[i..i + 3]);
                        }
                        i += 3;
                    }
                    Some(_) => {
                        out.clean.push(ESC);
                        i += 1;
                    }
                },
                _ => {
                    out.clean.push(byte);
                    i += 1;
                }
            }
        }
    }

    /// End of stream: release held bytes as data and drop an unterminated
    /// record
    pub fn finish(&mut self) -> Vec<u8> {
        if let Some(record) = self.record.take() {
            debug!(len = record.len(), "dropping unterminated stats record");
        }
        std::mem::take(&mut self.held)
    }

    /// Collect record text starting at `i`; returns the next index to scan
    fn collect_record(
        &mut self,
        bytes: &[u8],
        mut i: usize,
        stats: &mut GameStats,
        out: &mut VendorOutput,
    ) -> usize {
        let Some(record) = self.record.as_mut() else {
            return i;
        };

        while i < bytes.len() {
            let byte = bytes[i];
            i += 1;
            match byte {
                CR | LF => {
                    let text: String = record.iter().copied().map(char::from).collect();
                    self.record = None;
                    self.apply_record(&text, stats, out);
                    return i;
                }
                b if b >= VENDOR_FIRST => {}
                b => {
                    record.push(b);
                    if record.len() > MAX_RECORD {
                        debug!(len = record.len(), "stats record too long, dropping");
                        self.record = None;
                        return i;
                    }
                }
            }
        }
        i
    }

    fn apply_record(&mut self, text: &str, stats: &mut GameStats, out: &mut VendorOutput) {
        match GameStats::from_record(text) {
            Ok(parsed) => {
                debug!(record = text, "stats record applied");
                *stats = parsed;
                out.stats_updated = Some(out.commands.len());
                self.enter_mode(ConnectionMode::Game, out);
            }
            Err(error) => debug!(%error, record = text, "stats record rejected"),
        }
    }

    /// Classify a sequence without its terminator
    fn classify(&mut self, sequence: &[u8], out: &mut VendorOutput) {
        let code = sequence[0];
        trace!(code, len = sequence.len(), "vendor sequence");

        let command = match code {
            155 => VendorCommand::PromptStart,
            156 => VendorCommand::ColorSet {
                color: LogicalColor::Blue,
            },
            157 if sequence.get(1) == Some(&156) => {
                out.push(VendorCommand::ColorSet {
                    color: LogicalColor::BrightGreen,
                });
                self.enter_mode(ConnectionMode::Game, out);
                return;
            }
            157 => VendorCommand::ColorSet {
                color: LogicalColor::Green,
            },
            158 => VendorCommand::ColorSet {
                color: LogicalColor::Cyan,
            },
            159 => VendorCommand::ColorSet {
                color: LogicalColor::Magenta,
            },
            160 => VendorCommand::ColorSet {
                color: LogicalColor::Red,
            },
            161 => VendorCommand::ColorSet {
                color: LogicalColor::Magic,
            },
            162 => VendorCommand::ColorSet {
                color: LogicalColor::Combat,
            },
            163 => VendorCommand::ColorSet {
                color: LogicalColor::Event,
            },
            164 => VendorCommand::ColorSet {
                color: LogicalColor::Yellow,
            },
            167 if sequence[1..].starts_with(&[163, 156]) => VendorCommand::FesStart,
            170 => VendorCommand::DreamwordMarker,
            250 => {
                out.push(VendorCommand::ClientModeStart);
                self.enter_mode(ConnectionMode::ClientMode, out);
                return;
            }
            254 => match sequence {
                [_, fg, bg, ..] if *fg >= VENDOR_FIRST && *bg >= VENDOR_FIRST => {
                    VendorCommand::ColorDirect {
                        fg: fg - VENDOR_FIRST,
                        bg: bg - VENDOR_FIRST,
                    }
                }
                _ => VendorCommand::Unknown { code },
            },
            _ => VendorCommand::Unknown { code },
        };
        out.push(command);
    }

    /// Handle `ESC - code`. Returns false when the code is not ours.
    fn escape_code(&mut self, code: u8, out: &mut VendorOutput) -> bool {
        match code {
            b'C' => {
                out.push(VendorCommand::ClearScreen);
                self.enter_mode(ConnectionMode::ClientMode, out);
            }
            b'R' => out.push(VendorCommand::ReverseOn),
            b'r' => out.push(VendorCommand::ReverseOff),
            b'K' => out.push(VendorCommand::ClearToEndOfLine),
            b'T' => {}
            _ => return false,
        }
        true
    }

    fn enter_mode(&mut self, mode: ConnectionMode, out: &mut VendorOutput) {
        if mode > self.mode {
            debug!(from = ?self.mode, to = ?mode, "connection mode changed");
            self.mode = mode;
            out.push(VendorCommand::ModeEnter { mode });
        }
    }

    fn hold(&mut self, tail: &[u8], clean: &mut Vec<u8>) {
        if tail.len() > MAX_SEQUENCE_LEN {
            debug!(len = tail.len(), "undecided bytes too long, passing through");
            clean.extend_from_slice(tail);
        } else {
            self.held = tail.to_vec();
        }
    }
}

/// Length of the telnet sequence at the start of `bytes`, or None when it is
/// cut off
fn telnet_sequence_len(bytes: &[u8]) -> Option<usize> {
    match *bytes.get(1)? {
        WILL..=DONT => (bytes.len() >= 3).then_some(3),
        SB => {
            let mut j = 2;
            while j + 1 < bytes.len() {
                if bytes[j] == IAC {
                    if bytes[j + 1] == SE {
                        return Some(j + 2);
                    }
                    j += 2;
                } else {
                    j += 1;
                }
            }
            None
        }
        _ => Some(2),
    }
}
