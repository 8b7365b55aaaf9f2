//! ANSI/VT100 display decoder.
//!
//! Turns the clean byte stream left by the vendor decoder into
//! [`DisplaySegment`]s. The decoder strips telnet sequences again on its own:
//! it may be fed bytes that never went through the vendor pass, and the two
//! passes sit at different points of the pipeline.
//!
//! `ESC - x` is left in the text untouched. Those are vendor codes and the
//! vendor decoder runs first; anything still here was not one of its codes.
//!
//! A sequence cut off by the end of a chunk (IAC sequence or CSI) is held and
//! completed by the next call. Plain text is always flushed at the end of a call.

use crate::display::{CursorMotion, DisplayAttributes, DisplaySegment};
use telnet_negotiation::MAX_SEQUENCE_LEN;
use tracing::{debug, trace};

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;
const TAB: u8 = 0x09;
const LF: u8 = 0x0A;
const CR: u8 = 0x0D;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Remove telnet sequences.
///
/// Returns the data bytes and the tail of `bytes` holding an unfinished
/// sequence (empty when the input ends cleanly).
pub fn strip_telnet(bytes: &[u8]) -> (Vec<u8>, &[u8]) {
    let mut clean = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != IAC {
            clean.push(bytes[i]);
            i += 1;
            continue;
        }

        let Some(&command) = bytes.get(i + 1) else {
            return (clean, &bytes[i..]);
        };
        match command {
            IAC => {
                clean.push(IAC);
                i += 2;
            }
            DO | DONT | WILL | WONT => {
                if i + 2 >= bytes.len() {
                    return (clean, &bytes[i..]);
                }
                i += 3;
            }
            SB => {
                let mut j = i + 2;
                loop {
                    if j + 1 >= bytes.len() {
                        return (clean, &bytes[i..]);
                    }
                    if bytes[j] == IAC {
                        if bytes[j + 1] == SE {
                            i = j + 2;
                            break;
                        }
                        // IAC IAC inside the payload
                        j += 2;
                    } else {
                        j += 1;
                    }
                }
            }
            _ => i += 2,
        }
    }

    (clean, &[])
}

/// Per-session ANSI decoder
#[derive(Debug, Clone, Default)]
pub struct AnsiDecoder {
    attributes: DisplayAttributes,
    /// Raw bytes of an unfinished telnet sequence
    held_telnet: Vec<u8>,
    /// Stripped bytes of an unfinished escape sequence
    held_escape: Vec<u8>,
}

impl AnsiDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attributes(&self) -> &DisplayAttributes {
        &self.attributes
    }

    /// Decode one chunk into display segments
    pub fn decode(&mut self, input: &[u8]) -> Vec<DisplaySegment> {
        let mut raw = std::mem::take(&mut self.held_telnet);
        raw.extend_from_slice(input);
        let (clean, tail) = strip_telnet(&raw);
        self.held_telnet = hold(tail, "telnet");

        let mut bytes = std::mem::take(&mut self.held_escape);
        bytes.extend_from_slice(&clean);

        let mut segments = Vec::new();
        let mut text = String::new();
        let mut i = 0;

        while i < bytes.len() {
            let byte = bytes[i];
            match byte {
                ESC => match bytes.get(i + 1) {
                    None => {
                        self.held_escape = hold(&bytes[i..], "escape");
                        break;
                    }
                    Some(b'[') => {
                        let params_start = i + 2;
                        let mut end = params_start;
                        while end < bytes.len() && (0x30..=0x3F).contains(&bytes[end]) {
                            end += 1;
                        }
                        let Some(&final_byte) = bytes.get(end) else {
                            self.held_escape = hold(&bytes[i..], "escape");
                            break;
                        };
                        // Parameter bytes are all ASCII
                        let params = String::from_utf8_lossy(&bytes[params_start..end]);
                        self.flush_text(&mut text, &mut segments);
                        self.dispatch_csi(&params, final_byte, &mut segments);
                        i = end + 1;
                    }
                    Some(b'-') => {
                        let Some(&code) = bytes.get(i + 2) else {
                            self.held_escape = hold(&bytes[i..], "escape");
                            break;
                        };
                        text.push(char::from(ESC));
                        text.push('-');
                        text.push(char::from(code));
                        i += 3;
                    }
                    Some(&other) => {
                        trace!(other, "ignoring two-byte escape");
                        i += 2;
                    }
                },
                BEL => {
                    self.flush_text(&mut text, &mut segments);
                    segments.push(DisplaySegment::Bell);
                    i += 1;
                }
                CR => i += 1,
                LF => {
                    self.flush_text(&mut text, &mut segments);
                    segments.push(DisplaySegment::Newline);
                    i += 1;
                }
                TAB | 0x20..=0x7E | 0x80..=0xFF => {
                    // Latin-1: every byte maps to the code point of the same value
                    text.push(char::from(byte));
                    i += 1;
                }
                _ => i += 1,
            }
        }

        self.flush_text(&mut text, &mut segments);
        segments
    }

    /// Drop any sequence still waiting for its end (end of stream)
    pub fn finish(&mut self) {
        let dropped = self.held_telnet.len() + self.held_escape.len();
        if dropped > 0 {
            debug!(dropped, "discarding unfinished sequences at end of stream");
        }
        self.held_telnet.clear();
        self.held_escape.clear();
    }

    fn flush_text(&self, text: &mut String, segments: &mut Vec<DisplaySegment>) {
        if !text.is_empty() {
            segments.push(DisplaySegment::text(std::mem::take(text), &self.attributes));
        }
    }

    fn dispatch_csi(&mut self, params: &str, final_byte: u8, segments: &mut Vec<DisplaySegment>) {
        let cursor_move = |motion, default: &str| DisplaySegment::CursorMove {
            motion,
            params: if params.is_empty() {
                default.to_string()
            } else {
                params.to_string()
            },
        };

        match final_byte {
            b'm' => self.attributes.apply_sgr_params(params),
            b'H' | b'f' => segments.push(cursor_move(CursorMotion::Position, "1;1")),
            b'J' => {
                if params.is_empty() || params == "2" {
                    segments.push(DisplaySegment::ClearScreen);
                }
            }
            b'K' => segments.push(DisplaySegment::ClearLine),
            b'A' => segments.push(cursor_move(CursorMotion::Up, "1")),
            b'B' => segments.push(cursor_move(CursorMotion::Down, "1")),
            b'C' => segments.push(cursor_move(CursorMotion::Forward, "1")),
            b'D' => segments.push(cursor_move(CursorMotion::Back, "1")),
            other => trace!(final_byte = other, params, "ignoring CSI sequence"),
        }
    }
}

fn hold(tail: &[u8], kind: &str) -> Vec<u8> {
    if tail.len() > MAX_SEQUENCE_LEN {
        debug!(kind, len = tail.len(), "unfinished sequence too long, dropping");
        return Vec::new();
    }
    tail.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{PALETTE, Rgb};

    fn text(content: &str, fg: Rgb, bg: Rgb) -> DisplaySegment {
        DisplaySegment::Text {
            content: content.to_string(),
            foreground: fg,
            background: bg,
        }
    }

    #[test]
    fn test_red_then_reset() {
        let mut decoder = AnsiDecoder::new();
        let segments = decoder.decode(b"\x1b[31mHello\x1b[0m world\n");

        assert_eq!(
            segments,
            vec![
                text("Hello", PALETTE[1], PALETTE[0]),
                text(" world", PALETTE[7], PALETTE[0]),
                DisplaySegment::Newline,
            ]
        );
        assert_eq!(segments[0], text("Hello", Rgb::new(0xaa, 0, 0), Rgb::new(0, 0, 0)));
    }

    #[test]
    fn test_strip_telnet() {
        let (clean, tail) = strip_telnet(&[b'a', IAC, WILL, 1, b'b', IAC, IAC, IAC, 241, b'c']);
        assert_eq!(clean, vec![b'a', b'b', IAC, b'c']);
        assert!(tail.is_empty());

        let (clean, tail) = strip_telnet(&[b'x', IAC, SB, 24, 1, IAC, SE, b'y']);
        assert_eq!(clean, b"xy");
        assert!(tail.is_empty());

        let (clean, tail) = strip_telnet(&[b'x', IAC, SB, 31, 0, 80]);
        assert_eq!(clean, b"x");
        assert_eq!(tail, &[IAC, SB, 31, 0, 80]);
    }

    #[test]
    fn test_literal_iac_is_text() {
        let mut decoder = AnsiDecoder::new();
        let segments = decoder.decode(&[b'a', IAC, IAC]);
        assert_eq!(
            segments,
            vec![text("a\u{ff}", PALETTE[7], PALETTE[0])]
        );
    }

    #[test]
    fn test_bell_flushes_text_first() {
        let mut decoder = AnsiDecoder::new();
        let segments = decoder.decode(b"ab\x07cd");
        assert_eq!(
            segments,
            vec![
                text("ab", PALETTE[7], PALETTE[0]),
                DisplaySegment::Bell,
                text("cd", PALETTE[7], PALETTE[0]),
            ]
        );
    }

    #[test]
    fn test_crlf_is_one_newline() {
        let mut decoder = AnsiDecoder::new();
        let segments = decoder.decode(b"one\r\ntwo\r\n");
        assert_eq!(
            segments,
            vec![
                text("one", PALETTE[7], PALETTE[0]),
                DisplaySegment::Newline,
                text("two", PALETTE[7], PALETTE[0]),
                DisplaySegment::Newline,
            ]
        );
    }

    #[test]
    fn test_cursor_and_erase_sequences() {
        let mut decoder = AnsiDecoder::new();
        let segments = decoder.decode(b"\x1b[H\x1b[5;10f\x1b[2J\x1b[1J\x1b[J\x1b[0K\x1b[3A\x1b[C");
        assert_eq!(
            segments,
            vec![
                DisplaySegment::CursorMove {
                    motion: CursorMotion::Position,
                    params: "1;1".to_string()
                },
                DisplaySegment::CursorMove {
                    motion: CursorMotion::Position,
                    params: "5;10".to_string()
                },
                DisplaySegment::ClearScreen,
                DisplaySegment::ClearScreen,
                DisplaySegment::ClearLine,
                DisplaySegment::CursorMove {
                    motion: CursorMotion::Up,
                    params: "3".to_string()
                },
                DisplaySegment::CursorMove {
                    motion: CursorMotion::Forward,
                    params: "1".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_unknown_csi_final_is_consumed() {
        let mut decoder = AnsiDecoder::new();
        let segments = decoder.decode(b"a\x1b[?25lb");
        assert_eq!(
            segments,
            vec![
                text("a", PALETTE[7], PALETTE[0]),
                text("b", PALETTE[7], PALETTE[0]),
            ]
        );
    }

    #[test]
    fn test_escape_dash_is_kept_verbatim() {
        let mut decoder = AnsiDecoder::new();
        let segments = decoder.decode(b"x\x1b-Cy");
        assert_eq!(segments, vec![text("x\u{1b}-Cy", PALETTE[7], PALETTE[0])]);
    }

    #[test]
    fn test_high_bytes_and_tab_are_text() {
        let mut decoder = AnsiDecoder::new();
        let segments = decoder.decode(&[b'a', 0x09, 0xE9, 0x01, b'b']);
        assert_eq!(segments, vec![text("a\t\u{e9}b", PALETTE[7], PALETTE[0])]);
    }

    #[test]
    fn test_attributes_persist_across_calls() {
        let mut decoder = AnsiDecoder::new();
        assert!(decoder.decode(b"\x1b[1;32m").is_empty());
        let segments = decoder.decode(b"go");
        assert_eq!(segments, vec![text("go", PALETTE[10], PALETTE[0])]);
        assert!(decoder.attributes().bold);
    }

    #[test]
    fn test_split_csi_resumes() {
        let mut decoder = AnsiDecoder::new();
        let first = decoder.decode(b"ab\x1b[3");
        assert_eq!(first, vec![text("ab", PALETTE[7], PALETTE[0])]);
        let second = decoder.decode(b"4mcd");
        assert_eq!(second, vec![text("cd", PALETTE[4], PALETTE[0])]);
    }

    #[test]
    fn test_split_telnet_sequence_resumes() {
        let mut decoder = AnsiDecoder::new();
        assert_eq!(decoder.decode(&[b'a', IAC]), vec![text("a", PALETTE[7], PALETTE[0])]);
        assert_eq!(decoder.decode(&[DO, 24, b'b']), vec![text("b", PALETTE[7], PALETTE[0])]);
    }

    #[test]
    fn test_finish_discards_held_bytes() {
        let mut decoder = AnsiDecoder::new();
        decoder.decode(b"\x1b[");
        decoder.finish();
        assert_eq!(decoder.decode(b"31m"), vec![text("31m", PALETTE[7], PALETTE[0])]);
    }
}
