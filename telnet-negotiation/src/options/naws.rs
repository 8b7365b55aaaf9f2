//! Window size report (RFC 1073): `IAC SB 31 <w hi> <w lo> <h hi> <h lo> IAC SE`.
//!
//! One fixed size is advertised as soon as the server asks `DO NAWS`;
//! resizes are not tracked.

use crate::protocol::{TelnetOption, TelnetSequence};

/// Columns by rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u16,
    pub height: u16,
}

impl WindowSize {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Payload before IAC doubling, both values big-endian
    pub fn encode(self) -> [u8; 4] {
        let [width_high, width_low] = self.width.to_be_bytes();
        let [height_high, height_low] = self.height.to_be_bytes();
        [width_high, width_low, height_high, height_low]
    }

    /// Build `IAC SB NAWS <size> IAC SE`
    pub fn to_subnegotiation(self) -> TelnetSequence {
        TelnetSequence::SubNegotiation {
            option: TelnetOption::NAWS,
            data: self.encode().to_vec(),
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl std::fmt::Display for WindowSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}
