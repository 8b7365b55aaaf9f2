//! Display attributes, the 16-colour palette and the segments handed to
//! renderers.

use serde::{Serialize, Serializer};
use std::fmt;

/// A concrete colour value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Formats as `#rrggbb`
impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<Rgb> for crossterm::style::Color {
    fn from(rgb: Rgb) -> Self {
        crossterm::style::Color::Rgb {
            r: rgb.r,
            g: rgb.g,
            b: rgb.b,
        }
    }
}

/// Standard ANSI colours 0-7 followed by their bright variants 8-15
pub const PALETTE: [Rgb; 16] = [
    Rgb::new(0x00, 0x00, 0x00),
    Rgb::new(0xaa, 0x00, 0x00),
    Rgb::new(0x00, 0xaa, 0x00),
    Rgb::new(0xaa, 0x55, 0x00),
    Rgb::new(0x00, 0x00, 0xaa),
    Rgb::new(0xaa, 0x00, 0xaa),
    Rgb::new(0x00, 0xaa, 0xaa),
    Rgb::new(0xaa, 0xaa, 0xaa),
    Rgb::new(0x55, 0x55, 0x55),
    Rgb::new(0xff, 0x55, 0x55),
    Rgb::new(0x55, 0xff, 0x55),
    Rgb::new(0xff, 0xff, 0x55),
    Rgb::new(0x55, 0x55, 0xff),
    Rgb::new(0xff, 0x55, 0xff),
    Rgb::new(0x55, 0xff, 0xff),
    Rgb::new(0xff, 0xff, 0xff),
];

pub const DEFAULT_FOREGROUND: u8 = 7;
pub const DEFAULT_BACKGROUND: u8 = 0;

/// Current SGR state for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayAttributes {
    /// Palette index 0-15
    pub foreground: u8,
    /// Palette index 0-7
    pub background: u8,
    pub bold: bool,
    pub reverse: bool,
}

impl Default for DisplayAttributes {
    fn default() -> Self {
        Self {
            foreground: DEFAULT_FOREGROUND,
            background: DEFAULT_BACKGROUND,
            bold: false,
            reverse: false,
        }
    }
}

impl DisplayAttributes {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply one SGR code. Unrecognized codes are ignored.
    pub fn apply_sgr(&mut self, code: u16) {
        match code {
            0 => self.reset(),
            1 => self.bold = true,
            7 => self.reverse = true,
            22 => self.bold = false,
            27 => self.reverse = false,
            30..=37 => self.foreground = (code - 30) as u8,
            39 => self.foreground = DEFAULT_FOREGROUND,
            40..=47 => self.background = (code - 40) as u8,
            49 => self.background = DEFAULT_BACKGROUND,
            90..=97 => self.foreground = (code - 90) as u8 + 8,
            _ => {}
        }
    }

    /// Apply the parameter string of an `ESC [ ... m` sequence.
    ///
    /// An empty string means reset; an empty field counts as 0 and a
    /// non-numeric field is skipped.
    pub fn apply_sgr_params(&mut self, params: &str) {
        if params.is_empty() {
            self.reset();
            return;
        }
        for field in params.split(';') {
            if field.is_empty() {
                self.apply_sgr(0);
            } else if let Ok(code) = field.parse::<u16>() {
                self.apply_sgr(code);
            }
        }
    }

    /// Effective (foreground, background) colours.
    ///
    /// Bold brightens a base colour; reverse swaps the two after that.
    pub fn resolve(&self) -> (Rgb, Rgb) {
        let fg_index = if self.bold && self.foreground < 8 {
            self.foreground + 8
        } else {
            self.foreground
        };
        let fg = PALETTE[usize::from(fg_index & 0x0f)];
        let bg = PALETTE[usize::from(self.background & 0x07)];
        if self.reverse { (bg, fg) } else { (fg, bg) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorMotion {
    /// `ESC [ row ; col H`
    Position,
    Up,
    Down,
    Forward,
    Back,
}

/// One display event, in stream order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplaySegment {
    Text {
        content: String,
        foreground: Rgb,
        background: Rgb,
    },
    Newline,
    ClearScreen,
    ClearLine,
    CursorMove {
        motion: CursorMotion,
        params: String,
    },
    Bell,
}

impl DisplaySegment {
    /// Build a text segment coloured from the given attributes
    pub fn text(content: impl Into<String>, attributes: &DisplayAttributes) -> Self {
        let (foreground, background) = attributes.resolve();
        DisplaySegment::Text {
            content: content.into(),
            foreground,
            background,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_hex() {
        assert_eq!(PALETTE[1].to_string(), "#aa0000");
        assert_eq!(PALETTE[7].to_string(), "#aaaaaa");
        assert_eq!(PALETTE[15].to_string(), "#ffffff");
    }

    #[test]
    fn test_sgr_codes() {
        let mut attrs = DisplayAttributes::default();
        attrs.apply_sgr_params("1;34;47");
        assert_eq!(attrs.foreground, 4);
        assert_eq!(attrs.background, 7);
        assert!(attrs.bold);

        attrs.apply_sgr_params("22;93");
        assert!(!attrs.bold);
        assert_eq!(attrs.foreground, 11);

        attrs.apply_sgr_params("39;49");
        assert_eq!(attrs, DisplayAttributes::default());
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut attrs = DisplayAttributes::default();
        attrs.apply_sgr_params("1;7;31;44;95");
        attrs.apply_sgr_params("0");
        assert_eq!(attrs, DisplayAttributes::default());

        attrs.apply_sgr_params("1;7;33");
        attrs.apply_sgr_params("");
        assert_eq!(attrs, DisplayAttributes::default());
    }

    #[test]
    fn test_unknown_codes_are_ignored() {
        let mut attrs = DisplayAttributes::default();
        attrs.apply_sgr_params("4;5;38;x;107");
        assert_eq!(attrs, DisplayAttributes::default());
    }

    #[test]
    fn test_bold_brightens_base_colours_only() {
        let mut attrs = DisplayAttributes::default();
        attrs.apply_sgr_params("1;31");
        assert_eq!(attrs.resolve().0, PALETTE[9]);

        attrs.apply_sgr_params("91");
        assert_eq!(attrs.resolve().0, PALETTE[9]);
    }

    #[test]
    fn test_reverse_swaps_resolved_colours() {
        let mut attrs = DisplayAttributes::default();
        attrs.apply_sgr_params("1;7;32;44");
        assert_eq!(attrs.resolve(), (PALETTE[4], PALETTE[10]));
        assert_eq!(attrs.foreground, 2);
    }

    #[test]
    fn test_segment_serialization() {
        let segment = DisplaySegment::text("hi", &DisplayAttributes::default());
        let json = serde_json::to_string(&segment).unwrap();
        assert_eq!(
            json,
            r##"{"type":"text","content":"hi","foreground":"#aaaaaa","background":"#000000"}"##
        );
        assert_eq!(
            serde_json::to_string(&DisplaySegment::Bell).unwrap(),
            r#"{"type":"bell"}"#
        );
    }
}
