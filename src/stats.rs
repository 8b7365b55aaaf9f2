//! Player statistics: the binary-framed FES record and the textual fallback
//! matcher.
//!
//! A record replaces every field at once or nothing at all. The text matcher
//! updates whichever fields it recognises and leaves the rest alone.

use serde::Serialize;
use thiserror::Error;

/// Weather letters used by the stats record
const WEATHER_LETTERS: [(char, &str); 6] = [
    ('s', "sunny"),
    ('r', "raining"),
    ('c', "cloudy"),
    ('f', "foggy"),
    ('t', "stormy"),
    ('b', "snowing"),
];

/// Weather words recognised in plain text
const WEATHER_WORDS: [&str; 6] = ["sunny", "cloudy", "raining", "snowing", "foggy", "stormy"];

const RECORD_INTEGERS: usize = 9;
const RECORD_FLAGS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("stats record has {found} integers, need 9")]
    TooFewIntegers { found: usize },
    #[error("stats record value out of range: {0}")]
    IntegerOverflow(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameStats {
    pub stamina: u32,
    pub max_stamina: u32,
    pub strength: u32,
    pub max_strength: u32,
    pub dexterity: u32,
    pub max_dexterity: u32,
    pub magic: u32,
    pub max_magic: u32,
    pub score: u64,
    pub blind: bool,
    pub deaf: bool,
    pub crippled: bool,
    pub dumb: bool,
    /// Empty until reported
    pub weather: String,
}

impl GameStats {
    /// Parse the text of a stats record.
    ///
    /// Grammar: the first nine digit runs are stamina, max stamina, strength,
    /// max strength, dexterity, max dexterity, magic, max magic and score.
    /// Up to four following `Y`/`N` tokens are blind, deaf, crippled and dumb.
    /// The last single letter after those is the weather.
    pub fn from_record(text: &str) -> Result<Self, StatsError> {
        let runs = digit_runs(text);
        if runs.len() < RECORD_INTEGERS {
            return Err(StatsError::TooFewIntegers { found: runs.len() });
        }

        let mut values = [0u32; RECORD_INTEGERS - 1];
        for (value, &(start, end)) in values.iter_mut().zip(&runs) {
            *value = parse_u32(&text[start..end])
                .ok_or_else(|| StatsError::IntegerOverflow(text[start..end].to_string()))?;
        }
        let (score_start, rest_start) = runs[RECORD_INTEGERS - 1];
        let score_text = &text[score_start..rest_start];
        let score = score_text
            .parse::<u64>()
            .map_err(|_| StatsError::IntegerOverflow(score_text.to_string()))?;

        let tokens: Vec<&str> = text[rest_start..].split_whitespace().collect();
        let mut flags = [false; RECORD_FLAGS];
        let mut found_flags = 0;
        let mut after_flags = 0;
        for (index, token) in tokens.iter().enumerate() {
            if found_flags == RECORD_FLAGS {
                break;
            }
            if let Some(flag) = yes_no(token) {
                flags[found_flags] = flag;
                found_flags += 1;
                after_flags = index + 1;
            }
        }

        let weather = tokens[after_flags..]
            .iter()
            .rev()
            .find_map(|token| single_letter(token))
            .map(weather_from_letter)
            .unwrap_or_default();

        let [
            stamina,
            max_stamina,
            strength,
            max_strength,
            dexterity,
            max_dexterity,
            magic,
            max_magic,
        ] = values;
        let [blind, deaf, crippled, dumb] = flags;

        Ok(Self {
            stamina,
            max_stamina,
            strength,
            max_strength,
            dexterity,
            max_dexterity,
            magic,
            max_magic,
            score,
            blind,
            deaf,
            crippled,
            dumb,
            weather,
        })
    }

    /// Update fields from `Sta:n/m`, `Str:n/m`, `Dex:n/m`, `Mag:n`, `Pts:n`
    /// and weather words found anywhere in `text`.
    ///
    /// Returns true if at least one field matched.
    pub fn apply_text(&mut self, text: &str) -> bool {
        let mut matched = false;

        if let Some((current, max)) = find_pair(text, "Sta:") {
            self.stamina = current;
            self.max_stamina = max;
            matched = true;
        }
        if let Some((current, max)) = find_pair(text, "Str:") {
            self.strength = current;
            self.max_strength = max;
            matched = true;
        }
        if let Some((current, max)) = find_pair(text, "Dex:") {
            self.dexterity = current;
            self.max_dexterity = max;
            matched = true;
        }
        if let Some(magic) = find_single(text, "Mag:").and_then(|n| u32::try_from(n).ok()) {
            self.magic = magic;
            matched = true;
        }
        if let Some(score) = find_single(text, "Pts:") {
            self.score = score;
            matched = true;
        }
        if let Some(weather) = find_weather_word(text) {
            self.weather = weather.to_string();
            matched = true;
        }

        matched
    }
}

/// Map a record weather letter to its name; unknown letters stay as given,
/// lower-cased
pub fn weather_from_letter(letter: char) -> String {
    let letter = letter.to_ascii_lowercase();
    WEATHER_LETTERS
        .iter()
        .find(|(code, _)| *code == letter)
        .map_or_else(|| letter.to_string(), |(_, name)| (*name).to_string())
}

/// Byte ranges of maximal ASCII digit runs, at most `RECORD_INTEGERS`
fn digit_runs(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut runs = Vec::with_capacity(RECORD_INTEGERS);
    let mut i = 0;
    while i < bytes.len() && runs.len() < RECORD_INTEGERS {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            runs.push((start, i));
        } else {
            i += 1;
        }
    }
    runs
}

fn parse_u32(digits: &str) -> Option<u32> {
    digits.parse().ok()
}

fn yes_no(token: &str) -> Option<bool> {
    match token {
        "Y" | "y" => Some(true),
        "N" | "n" => Some(false),
        _ => None,
    }
}

fn single_letter(token: &str) -> Option<char> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
        _ => None,
    }
}

/// Leading decimal number of `text` and the remainder after it
fn take_number(text: &str) -> Option<(u64, &str)> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let value = text[..end].parse().ok()?;
    Some((value, &text[end..]))
}

/// First `<label><n>` in `text`, spaces allowed after the label
fn find_single(text: &str, label: &str) -> Option<u64> {
    text.match_indices(label).find_map(|(at, _)| {
        let after = text[at + label.len()..].trim_start_matches(' ');
        take_number(after).map(|(value, _)| value)
    })
}

/// First `<label><n>/<m>` in `text`, spaces allowed after the label
fn find_pair(text: &str, label: &str) -> Option<(u32, u32)> {
    text.match_indices(label).find_map(|(at, _)| {
        let after = text[at + label.len()..].trim_start_matches(' ');
        let (current, rest) = take_number(after)?;
        let (max, _) = take_number(rest.strip_prefix('/')?)?;
        Some((u32::try_from(current).ok()?, u32::try_from(max).ok()?))
    })
}

/// First whole word in `text` that names a weather
fn find_weather_word(text: &str) -> Option<&'static str> {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .find_map(|word| {
            WEATHER_WORDS
                .iter()
                .find(|weather| word.eq_ignore_ascii_case(weather))
                .copied()
        })
}
