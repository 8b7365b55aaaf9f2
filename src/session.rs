//! One logical connection: negotiator, vendor decoder, ANSI decoder and the
//! game stats they feed.

use crate::ansi::AnsiDecoder;
use crate::config::ClientConfig;
use crate::display::{DisplayAttributes, DisplaySegment};
use crate::events::{SessionEvent, SessionStatus, StatsSource};
use crate::sink::EventSink;
use crate::stats::GameStats;
use crate::vendor::{ConnectionMode, DEFAULT_LOOKAHEAD, VendorDecoder, VendorOutput};
use telnet_negotiation::{NegotiationPolicy, NegotiationReply, OptionNegotiator};
use tracing::{debug, trace};

/// Longest unfinished line kept for the stats matcher
const MAX_LINE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub policy: NegotiationPolicy,
    pub lookahead: usize,
    /// Run the plain-text stats matcher over decoded text
    pub text_stats_fallback: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            policy: NegotiationPolicy::default(),
            lookahead: DEFAULT_LOOKAHEAD,
            text_stats_fallback: true,
        }
    }
}

impl From<&ClientConfig> for SessionOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            policy: config.negotiation_policy(),
            lookahead: config.vendor.lookahead,
            text_stats_fallback: config.display.text_stats_fallback,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    negotiator: OptionNegotiator,
    vendor: VendorDecoder,
    ansi: AnsiDecoder,
    stats: GameStats,
    text_stats_fallback: bool,
    /// Decoded text after the last newline
    line: String,
    /// Length of `line` when `flush_pending` last matched it
    idle_matched: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            negotiator: OptionNegotiator::with_policy(options.policy),
            vendor: VendorDecoder::with_lookahead(options.lookahead),
            ansi: AnsiDecoder::new(),
            stats: GameStats::default(),
            text_stats_fallback: options.text_stats_fallback,
            line: String::new(),
            idle_matched: 0,
        }
    }

    /// Run one inbound chunk through the whole pipeline.
    ///
    /// The returned reply must reach the server before the next chunk is
    /// read.
    pub fn process(&mut self, chunk: &[u8], sink: &mut dyn EventSink) -> NegotiationReply {
        let reply = self.negotiator.negotiate(chunk);
        if !reply.is_empty() {
            debug!(bytes = reply.len(), "negotiation reply");
        }
        self.decode(chunk, sink);
        reply
    }

    /// Decode a chunk whose negotiation is handled elsewhere
    /// (by a `TelnetStream`)
    pub fn decode(&mut self, chunk: &[u8], sink: &mut dyn EventSink) {
        let vendor = self.vendor.decode(chunk, &mut self.stats);
        trace!(
            clean = vendor.clean.len(),
            commands = vendor.commands.len(),
            "vendor pass"
        );
        self.emit_output(vendor, sink);
        self.match_complete_lines(sink);
    }

    /// The server has gone quiet: show text still waiting on an undecided
    /// vendor byte and match the unfinished line (usually a prompt).
    ///
    /// The line is kept, so once its newline arrives it is matched again
    /// as a whole.
    pub fn flush_pending(&mut self, sink: &mut dyn EventSink) {
        let vendor = self.vendor.release_undecided(&mut self.stats);
        self.emit_output(vendor, sink);
        self.match_complete_lines(sink);

        if self.line.len() > self.idle_matched {
            let line = std::mem::take(&mut self.line);
            self.match_text(&line, sink);
            self.idle_matched = line.len();
            self.line = line;
        }
    }

    /// End of stream: flush what the decoders still hold
    pub fn finish(&mut self, sink: &mut dyn EventSink) {
        let released = self.vendor.finish();
        let segments = self.ansi.decode(&released);
        self.ansi.finish();
        self.emit_segments(segments, sink);
        let line = std::mem::take(&mut self.line);
        self.idle_matched = 0;
        self.match_text(&line, sink);
    }

    /// Report a connection status change
    pub fn status(&self, status: SessionStatus, sink: &mut dyn EventSink) {
        sink.emit(SessionEvent::status(status));
    }

    pub fn mode(&self) -> ConnectionMode {
        self.vendor.mode()
    }

    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    pub fn attributes(&self) -> &DisplayAttributes {
        self.ansi.attributes()
    }

    /// Emit segments and vendor commands interleaved in stream order
    fn emit_output(&mut self, vendor: VendorOutput, sink: &mut dyn EventSink) {
        let VendorOutput {
            clean,
            commands,
            stats_updated,
        } = vendor;

        let count = commands.len();
        let mut start = 0;
        for (index, placed) in commands.into_iter().enumerate() {
            if stats_updated == Some(index) {
                self.emit_stats(StatsSource::Record, sink);
            }
            self.emit_text(&clean[start..placed.offset], sink);
            start = placed.offset;
            sink.emit(SessionEvent::Vendor {
                command: placed.command,
            });
        }
        if stats_updated == Some(count) {
            self.emit_stats(StatsSource::Record, sink);
        }
        self.emit_text(&clean[start..], sink);
    }

    fn emit_text(&mut self, clean: &[u8], sink: &mut dyn EventSink) {
        if !clean.is_empty() {
            let segments = self.ansi.decode(clean);
            self.emit_segments(segments, sink);
        }
    }

    fn emit_segments(&mut self, segments: Vec<DisplaySegment>, sink: &mut dyn EventSink) {
        for segment in segments {
            if self.text_stats_fallback {
                match &segment {
                    DisplaySegment::Text { content, .. } => self.line.push_str(content),
                    DisplaySegment::Newline => self.line.push('\n'),
                    _ => {}
                }
            }
            sink.emit(SessionEvent::Segment { segment });
        }
    }

    /// Match every finished line, keeping the unfinished tail for later
    fn match_complete_lines(&mut self, sink: &mut dyn EventSink) {
        match self.line.rfind('\n') {
            Some(end) => {
                let rest = self.line.split_off(end + 1);
                let complete = std::mem::replace(&mut self.line, rest);
                self.idle_matched = 0;
                self.match_text(&complete, sink);
            }
            None if self.line.len() > MAX_LINE => {
                debug!(len = self.line.len(), "no newline in sight, matching partial line");
                let line = std::mem::take(&mut self.line);
                self.idle_matched = 0;
                self.match_text(&line, sink);
            }
            None => {}
        }
    }

    fn match_text(&mut self, text: &str, sink: &mut dyn EventSink) {
        if !text.is_empty() && self.stats.apply_text(text) {
            self.emit_stats(StatsSource::Text, sink);
        }
    }

    fn emit_stats(&self, source: StatsSource, sink: &mut dyn EventSink) {
        sink.emit(SessionEvent::StatsUpdated {
            stats: self.stats.clone(),
            source,
        });
    }
}
