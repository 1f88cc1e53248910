//! Escaped-string codec for translation catalog files.
//!
//! A catalog stores each translatable string as a quoted literal: the text is
//! wrapped in double quotes, with backslash escapes for quotes, backslashes,
//! the usual control-character mnemonics (`\b`, `\f`, `\n`, `\r`, `\t`), and
//! `\uHHHH` for anything that is not printable. The format predates this
//! implementation and is UTF-16 based: `\u` escapes carry a single 16-bit
//! code unit, and supplementary characters appear either verbatim or as a
//! surrogate pair of `\u` escapes.
//!
//! [`encode`] is total; [`decode`] rejects malformed escapes and reports an
//! unterminated literal to the caller as a resumable [`Continuation`] so that
//! literals spanning multiple input lines can be stitched back together.

use icu_properties::{maps, GeneralCategory};
use thiserror::Error;

const HEX_DIGITS: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Errors raised while decoding a quoted literal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("invalid unicode escape digit '{0}'")]
    InvalidHexDigit(char),
    #[error("input ends inside an escape sequence")]
    TruncatedEscape,
    #[error("decoded text contains an unpaired surrogate")]
    LoneSurrogate,
}

/// Outcome of scanning one line of input for the rest of a quoted literal.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// The closing quote was found. `rest` is the unconsumed remainder of the
    /// line after it, so the caller can keep scanning for further literals.
    Literal { value: String, rest: String },
    /// The line ended before the closing quote. Feed the next line to
    /// [`Continuation::resume`], or treat the literal as unterminated if
    /// there is no next line.
    Unterminated(Continuation),
}

/// Accumulated state of a literal that is still waiting for its closing
/// quote. A pending continuation at end of input is the caller's signal that
/// the literal was never terminated; dropping it is how that decision is made
/// explicit rather than looping for more input.
#[derive(Debug, PartialEq, Eq)]
pub struct Continuation {
    units: Vec<u16>,
}

impl Continuation {
    /// Resumes scanning on the next raw line. The line break that interrupted
    /// the literal is part of its value.
    pub fn resume(mut self, line: &str) -> Result<Decoded, CodecError> {
        self.units.push(u16::from(b'\n'));
        scan(self.units, line)
    }

    /// True when nothing has been accumulated yet.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Decodes a quoted literal from `after_quote`, which must begin immediately
/// after the opening double quote (the quote itself already consumed by the
/// caller).
pub fn decode(after_quote: &str) -> Result<Decoded, CodecError> {
    scan(Vec::new(), after_quote)
}

/// Scanner state between two input characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    /// Plain literal text; looking for the closing quote.
    Body,
    /// A backslash was consumed; the next character selects the escape.
    Escape,
    /// Inside a `\u` sequence, `seen` of the four hex digits consumed.
    Hex { seen: u8, value: u16 },
}

/// Result of feeding one character to the scanner.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue(ScanState),
    /// The closing quote was consumed.
    Terminated,
}

impl ScanState {
    fn step(self, ch: char, units: &mut Vec<u16>) -> Result<Step, CodecError> {
        match self {
            ScanState::Body => Ok(step_body(ch, units)),
            ScanState::Escape => step_escape(ch, units).map(Step::Continue),
            ScanState::Hex { seen, value } => {
                step_hex(ch, seen, value, units).map(Step::Continue)
            }
        }
    }
}

fn step_body(ch: char, units: &mut Vec<u16>) -> Step {
    match ch {
        '"' => Step::Terminated,
        '\\' => Step::Continue(ScanState::Escape),
        _ => {
            push_char(units, ch);
            Step::Continue(ScanState::Body)
        }
    }
}

fn step_escape(ch: char, units: &mut Vec<u16>) -> Result<ScanState, CodecError> {
    let unit = match ch {
        't' => b'\t',
        'b' => 0x08,
        'f' => 0x0C,
        'n' => b'\n',
        'r' => b'\r',
        '"' => b'"',
        '\\' => b'\\',
        'u' => return Ok(ScanState::Hex { seen: 0, value: 0 }),
        other => return Err(CodecError::InvalidEscape(other)),
    };
    units.push(u16::from(unit));
    Ok(ScanState::Body)
}

fn step_hex(ch: char, seen: u8, value: u16, units: &mut Vec<u16>) -> Result<ScanState, CodecError> {
    let digit = ch.to_digit(16).ok_or(CodecError::InvalidHexDigit(ch))?;
    let value = (value << 4) | digit as u16;
    if seen == 3 {
        units.push(value);
        Ok(ScanState::Body)
    } else {
        Ok(ScanState::Hex {
            seen: seen + 1,
            value,
        })
    }
}

fn push_char(units: &mut Vec<u16>, ch: char) {
    let mut buf = [0u16; 2];
    units.extend_from_slice(ch.encode_utf16(&mut buf));
}

fn scan(mut units: Vec<u16>, line: &str) -> Result<Decoded, CodecError> {
    let mut state = ScanState::Body;
    for (idx, ch) in line.char_indices() {
        match state.step(ch, &mut units)? {
            Step::Continue(next) => state = next,
            Step::Terminated => {
                let value = String::from_utf16(&units).map_err(|_| CodecError::LoneSurrogate)?;
                let rest = line[idx + ch.len_utf8()..].to_string();
                return Ok(Decoded::Literal { value, rest });
            }
        }
    }
    if state != ScanState::Body {
        return Err(CodecError::TruncatedEscape);
    }
    Ok(Decoded::Unterminated(Continuation { units }))
}

/// Encodes `input` as a quoted literal. Never fails; every string has an
/// encoded form.
pub fn encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push('"');
    for ch in input.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ if is_printable(ch) => out.push(ch),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ if u32::from(ch) > 0xFFFF => {
                // The historical per-code-unit scan classified surrogate
                // halves as printable, so supplementary characters were never
                // escaped in existing catalogs.
                out.push(ch);
            }
            _ => {
                let unit = ch as u32;
                out.push('\\');
                out.push('u');
                out.push(HEX_DIGITS[(unit >> 12 & 0xF) as usize]);
                out.push(HEX_DIGITS[(unit >> 8 & 0xF) as usize]);
                out.push(HEX_DIGITS[(unit >> 4 & 0xF) as usize]);
                out.push(HEX_DIGITS[(unit & 0xF) as usize]);
            }
        }
    }
    out.push('"');
    out
}

/// True when `ch` may appear verbatim in an encoded literal: not an ISO
/// control character, assigned a Unicode meaning, and not part of the
/// Specials block (U+FFF0..=U+FFFF, which holds the replacement character and
/// interlinear annotation controls).
pub fn is_printable(ch: char) -> bool {
    if ch.is_control() {
        return false;
    }
    if ('\u{FFF0}'..='\u{FFFF}').contains(&ch) {
        return false;
    }
    maps::general_category().get(ch) != GeneralCategory::Unassigned
}

/// Width of an encoded form in UTF-16 code units. Catalog line-length limits
/// predate this implementation and count code units, not bytes or characters.
pub fn encoded_width(encoded: &str) -> usize {
    encoded.encode_utf16().count()
}
