//! Where session events go.
//!
//! A sink never fails the session: write errors are logged and the event is
//! dropped.

use crate::display::{CursorMotion, DisplaySegment, PALETTE, Rgb};
use crate::events::{SessionEvent, SessionStatus};
use crate::stats::GameStats;
use crate::vendor::VendorCommand;
use crossterm::{
    QueueableCommand,
    cursor::{MoveDown, MoveLeft, MoveRight, MoveTo, MoveUp},
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use tracing::warn;

pub trait EventSink {
    fn emit(&mut self, event: SessionEvent);
}

/// Collects events in order
impl EventSink for Vec<SessionEvent> {
    fn emit(&mut self, event: SessionEvent) {
        self.push(event);
    }
}

/// One JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &SessionEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: SessionEvent) {
        if let Err(e) = self.write_event(&event) {
            warn!(error = %e, "failed to write event");
        }
    }
}

/// Paints segments to a terminal with crossterm.
///
/// Vendor colours override the ANSI colours of the text that follows them
/// until the end of the line or a screen clear. Vendor reverse video stays
/// on until switched off.
#[derive(Debug)]
pub struct TerminalSink<W> {
    writer: W,
    reverse: bool,
    vendor_fg: Option<Rgb>,
    vendor_bg: Option<Rgb>,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            reverse: false,
            vendor_fg: None,
            vendor_bg: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn render(&mut self, event: &SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::Segment { segment } => self.render_segment(segment)?,
            SessionEvent::Vendor { command } => self.render_command(command)?,
            SessionEvent::StatsUpdated { stats, .. } => self.render_stats(stats)?,
            SessionEvent::Status { status, .. } => self.render_status(status)?,
        }
        self.writer.flush()
    }

    fn render_segment(&mut self, segment: &DisplaySegment) -> io::Result<()> {
        if matches!(segment, DisplaySegment::Newline | DisplaySegment::ClearScreen) {
            self.clear_vendor_colours();
        }

        let writer = &mut self.writer;
        match segment {
            DisplaySegment::Text {
                content,
                foreground,
                background,
            } => {
                let fg = self.vendor_fg.unwrap_or(*foreground);
                let bg = self.vendor_bg.unwrap_or(*background);
                let (fg, bg) = if self.reverse { (bg, fg) } else { (fg, bg) };
                writer.queue(SetForegroundColor(fg.into()))?;
                writer.queue(SetBackgroundColor(bg.into()))?;
                writer.queue(Print(content))?;
                writer.queue(ResetColor)?;
            }
            DisplaySegment::Newline => {
                writer.queue(Print("\r\n"))?;
            }
            DisplaySegment::ClearScreen => {
                writer.queue(Clear(ClearType::All))?;
                writer.queue(MoveTo(0, 0))?;
            }
            DisplaySegment::ClearLine => {
                writer.queue(Clear(ClearType::UntilNewLine))?;
            }
            DisplaySegment::CursorMove { motion, params } => {
                queue_cursor_move(writer, *motion, params)?;
            }
            DisplaySegment::Bell => {
                writer.queue(Print('\x07'))?;
            }
        }
        Ok(())
    }

    fn render_command(&mut self, command: &VendorCommand) -> io::Result<()> {
        match command {
            VendorCommand::ClearScreen => {
                self.clear_vendor_colours();
                self.writer.queue(Clear(ClearType::All))?;
                self.writer.queue(MoveTo(0, 0))?;
            }
            VendorCommand::ClearToEndOfLine => {
                self.writer.queue(Clear(ClearType::UntilNewLine))?;
            }
            VendorCommand::ReverseOn => self.reverse = true,
            VendorCommand::ReverseOff => self.reverse = false,
            VendorCommand::ColorSet { color } => {
                self.vendor_fg = Some(PALETTE[color.palette_index()]);
            }
            VendorCommand::ColorDirect { fg, bg } => {
                // Out-of-range indices leave that half alone
                if let Some(&colour) = PALETTE.get(usize::from(*fg)) {
                    self.vendor_fg = Some(colour);
                }
                if let Some(&colour) = PALETTE[..8].get(usize::from(*bg)) {
                    self.vendor_bg = Some(colour);
                }
            }
            VendorCommand::PromptStart
            | VendorCommand::ModeEnter { .. }
            | VendorCommand::FesStart
            | VendorCommand::DreamwordMarker
            | VendorCommand::ClientModeStart
            | VendorCommand::Unknown { .. } => {}
        }
        Ok(())
    }

    fn clear_vendor_colours(&mut self) {
        self.vendor_fg = None;
        self.vendor_bg = None;
    }

    fn render_stats(&mut self, stats: &GameStats) -> io::Result<()> {
        let mut line = format!(
            "[Sta {}/{} Str {}/{} Dex {}/{} Mag {}/{} Pts {}",
            stats.stamina,
            stats.max_stamina,
            stats.strength,
            stats.max_strength,
            stats.dexterity,
            stats.max_dexterity,
            stats.magic,
            stats.max_magic,
            stats.score,
        );
        for (set, name) in [
            (stats.blind, "blind"),
            (stats.deaf, "deaf"),
            (stats.crippled, "crippled"),
            (stats.dumb, "dumb"),
        ] {
            if set {
                line.push(' ');
                line.push_str(name);
            }
        }
        if !stats.weather.is_empty() {
            line.push(' ');
            line.push_str(&stats.weather);
        }
        line.push(']');

        self.writer.queue(SetForegroundColor(Color::DarkCyan))?;
        self.writer.queue(Print(line))?;
        self.writer.queue(ResetColor)?;
        self.writer.queue(Print("\r\n"))?;
        Ok(())
    }

    fn render_status(&mut self, status: &SessionStatus) -> io::Result<()> {
        let message = match status {
            SessionStatus::Connected { peer } => format!("*** Connected to {peer}"),
            SessionStatus::Error { message } => format!("*** Error: {message}"),
            SessionStatus::Closed => "*** Connection closed".to_string(),
        };
        self.writer.queue(SetAttribute(Attribute::Bold))?;
        self.writer.queue(Print(message))?;
        self.writer.queue(SetAttribute(Attribute::Reset))?;
        self.writer.queue(Print("\r\n"))?;
        Ok(())
    }
}

impl<W: Write> EventSink for TerminalSink<W> {
    fn emit(&mut self, event: SessionEvent) {
        if let Err(e) = self.render(&event) {
            warn!(error = %e, "failed to render event");
        }
    }
}

/// `ESC [ n A` style parameters: a count, defaulting to 1
fn count_param(params: &str) -> u16 {
    params
        .split(';')
        .next()
        .and_then(|n| n.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

fn queue_cursor_move<W: Write>(writer: &mut W, motion: CursorMotion, params: &str) -> io::Result<()> {
    match motion {
        CursorMotion::Position => {
            // 1-based row;col on the wire, 0-based column,row for crossterm
            let mut fields = params.split(';').map(|f| f.parse::<u16>().unwrap_or(1).max(1));
            let row = fields.next().unwrap_or(1);
            let col = fields.next().unwrap_or(1);
            writer.queue(MoveTo(col - 1, row - 1))?;
        }
        CursorMotion::Up => {
            writer.queue(MoveUp(count_param(params)))?;
        }
        CursorMotion::Down => {
            writer.queue(MoveDown(count_param(params)))?;
        }
        CursorMotion::Forward => {
            writer.queue(MoveRight(count_param(params)))?;
        }
        CursorMotion::Back => {
            writer.queue(MoveLeft(count_param(params)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplayAttributes;
    use crate::session::Session;
    use crate::vendor::LogicalColor;

    fn rendered(events: Vec<SessionEvent>) -> String {
        let mut sink = TerminalSink::new(Vec::new());
        for event in events {
            sink.emit(event);
        }
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_json_lines() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.emit(SessionEvent::Segment {
            segment: DisplaySegment::Bell,
        });
        sink.emit(SessionEvent::Vendor {
            command: VendorCommand::FesStart,
        });

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"event":"segment","segment":{"type":"bell"}}"#,
                r#"{"event":"vendor","command":{"command":"fes_start"}}"#,
            ]
        );
    }

    #[test]
    fn test_terminal_text_uses_rgb_colours() {
        let mut attrs = DisplayAttributes::default();
        attrs.apply_sgr(31);
        let output = rendered(vec![
            SessionEvent::Segment {
                segment: DisplaySegment::text("hp", &attrs),
            },
            SessionEvent::Segment {
                segment: DisplaySegment::Newline,
            },
        ]);

        assert!(output.contains("\x1b[38;2;170;0;0m"));
        assert!(output.contains("\x1b[48;2;0;0;0m"));
        assert!(output.contains("hp"));
        assert!(output.ends_with("\r\n"));
    }

    #[test]
    fn test_vendor_reverse_swaps_colours() {
        let output = rendered(vec![
            SessionEvent::Vendor {
                command: VendorCommand::ReverseOn,
            },
            SessionEvent::Segment {
                segment: DisplaySegment::Text {
                    content: "x".to_string(),
                    foreground: PALETTE[7],
                    background: PALETTE[0],
                },
            },
        ]);
        assert!(output.contains("\x1b[38;2;0;0;0m"));
        assert!(output.contains("\x1b[48;2;170;170;170m"));
    }

    fn plain(content: &str) -> SessionEvent {
        SessionEvent::Segment {
            segment: DisplaySegment::text(content, &DisplayAttributes::default()),
        }
    }

    #[test]
    fn test_clear_screen_lands_between_text() {
        let mut session = Session::default();
        let mut events: Vec<SessionEvent> = Vec::new();
        session.decode(b"hello\x1b-Cworld", &mut events);

        let output = rendered(events);
        let clear = output.find("\x1b[2J").unwrap();
        assert!(output.find("hello").unwrap() < clear);
        assert!(output.find("world").unwrap() > clear);
        assert!(!output.contains("helloworld"));
    }

    #[test]
    fn test_reverse_only_covers_text_between_codes() {
        let mut session = Session::default();
        let mut events: Vec<SessionEvent> = Vec::new();
        session.decode(b"a\x1b-Rb\x1b-rc", &mut events);

        let output = rendered(events);
        let reversed = "\x1b[38;2;0;0;0m\x1b[48;2;170;170;170mb";
        assert!(output.contains(reversed));
        assert!(output.contains("\x1b[38;2;170;170;170m\x1b[48;2;0;0;0ma"));
        assert!(output.contains("\x1b[38;2;170;170;170m\x1b[48;2;0;0;0mc"));
    }

    #[test]
    fn test_vendor_colour_until_newline() {
        let output = rendered(vec![
            SessionEvent::Vendor {
                command: VendorCommand::ColorSet {
                    color: LogicalColor::Red,
                },
            },
            plain("hit"),
            SessionEvent::Segment {
                segment: DisplaySegment::Newline,
            },
            plain("calm"),
        ]);

        assert!(output.contains("\x1b[38;2;170;0;0m\x1b[48;2;0;0;0mhit"));
        assert!(output.contains("\x1b[38;2;170;170;170m\x1b[48;2;0;0;0mcalm"));
    }

    #[test]
    fn test_vendor_direct_colour() {
        let output = rendered(vec![
            SessionEvent::Vendor {
                command: VendorCommand::ColorDirect { fg: 11, bg: 1 },
            },
            plain("gold"),
            SessionEvent::Vendor {
                command: VendorCommand::ColorDirect { fg: 99, bg: 12 },
            },
            plain("same"),
        ]);

        assert!(output.contains("\x1b[38;2;255;255;85m\x1b[48;2;170;0;0mgold"));
        assert!(output.contains("\x1b[38;2;255;255;85m\x1b[48;2;170;0;0msame"));
    }

    #[test]
    fn test_stats_line() {
        let stats = GameStats {
            stamina: 80,
            max_stamina: 120,
            deaf: true,
            weather: "sunny".to_string(),
            ..GameStats::default()
        };
        let output = rendered(vec![SessionEvent::StatsUpdated {
            stats,
            source: crate::events::StatsSource::Text,
        }]);
        assert!(output.contains("[Sta 80/120 Str 0/0 Dex 0/0 Mag 0/0 Pts 0 deaf sunny]"));
    }

    #[test]
    fn test_count_param() {
        assert_eq!(count_param(""), 1);
        assert_eq!(count_param("0"), 1);
        assert_eq!(count_param("7"), 7);
    }

    /// Writer that always fails
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_write_errors_do_not_panic() {
        let mut sink = TerminalSink::new(Broken);
        sink.emit(SessionEvent::Segment {
            segment: DisplaySegment::Bell,
        });
        let mut json = JsonLinesSink::new(Broken);
        json.emit(SessionEvent::Segment {
            segment: DisplaySegment::Bell,
        });
    }
}
