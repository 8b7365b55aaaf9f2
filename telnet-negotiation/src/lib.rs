//! Client-side telnet negotiation for MUD connections.
//!
//! Every option request from the server gets exactly one answer drawn from a
//! fixed [`NegotiationPolicy`]: terminal type and window size are accepted
//! and reported (RFC 1091, RFC 1073), the server may echo and suppress
//! go-ahead, and every other option is refused.
//!
//! - `protocol`: command and option bytes, [`TelnetSequence`]
//! - `parser`: IAC sequence scanner that survives split reads
//! - `negotiation`: the policy table and [`OptionNegotiator`]
//! - `options`: terminal type and NAWS payloads
//! - `stream`: [`TelnetStream`], which answers negotiation as it reads

pub mod negotiation;
pub mod options;
pub mod parser;
pub mod protocol;
pub mod stream;

pub use negotiation::{NegotiationPolicy, NegotiationReply, OptionNegotiator};
pub use options::{OptionError, TerminalTypeOption, WindowSize};
pub use protocol::{IAC, MAX_SEQUENCE_LEN, TelnetCommand, TelnetOption, TelnetSequence};
pub use stream::TelnetStream;
