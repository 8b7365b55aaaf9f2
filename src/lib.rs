//! # mudlink
//!
//! Client-side decoding for a legacy multi-user game that speaks telnet,
//! ANSI and its own vendor control codes over one byte stream.
//!
//! Pipeline per inbound chunk:
//!
//! 1. telnet negotiation (`telnet_negotiation::OptionNegotiator`), answered
//!    before the next chunk is read
//! 2. [`vendor::VendorDecoder`]: vendor codes, connection mode, stats records
//! 3. [`ansi::AnsiDecoder`]: display segments
//! 4. optional plain-text stats matching
//!
//! [`session::Session`] drives the pipeline and reports to an
//! [`sink::EventSink`].

pub mod ansi;
pub mod config;
pub mod display;
pub mod errors;
pub mod events;
pub mod session;
pub mod sink;
pub mod stats;
pub mod vendor;
