//! Reading and writing of translation catalog files.
//!
//! A catalog is UTF-8 text made of `#` comment lines, blank separator lines,
//! and entry lines. Entry lines carry a prefix — `k:` for a key, `v:` for its
//! value, or `v0:`..`v9:` for numbered value variants — followed by a quoted
//! literal in the form produced by [`harvester_codec::encode`]. Two or more
//! consecutive lines with the same prefix concatenate with an intervening
//! `\n`, which is how long multi-line strings stay within the historical
//! line-length limit.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead, Write};

use harvester_codec as codec;
use thiserror::Error;

/// Quoted forms at or above this width (in UTF-16 code units) are split into
/// one line per newline-delimited segment. The limit is part of the on-disk
/// format; changing it would reorder existing catalogs under diff.
const SPLIT_THRESHOLD: usize = 77;

const HEADER: &[&str] = &[
    "# This file consists of UTF-8 text. Do not save it as anything else.",
    "#",
    "# Key-value pairs are defined as one or more lines prefixed with 'k:' for the",
    "# key, followed by one or more lines prefixed with 'v:' or 'v#:', where # is a",
    "# digit (0-9), for the value. These prefixes are followed by a quoted string.",
    "# When two or more lines with the same prefix are present in a row, they will",
    "# be concatenated together with an intervening \\n character.",
    "#",
    "# Do NOT modify the 'k' values. They are the values as seen in the code.",
    "#",
    "# Replace the 'v' values with the appropriate translation.",
];

/// Errors raised while parsing a catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error while reading catalog: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: entry must start with 'k:', 'v:', or 'v<digit>:'")]
    BadPrefix { line: usize },
    #[error("line {line}: expected a quoted string after the prefix")]
    MissingQuote { line: usize },
    #[error("line {line}: quoted string is never terminated")]
    UnterminatedValue { line: usize },
    #[error("line {line}: unexpected text after the closing quote")]
    TrailingText { line: usize },
    #[error("line {line}: value line appears before any key")]
    ValueWithoutKey { line: usize },
    #[error("line {line}: {source}")]
    Codec {
        line: usize,
        source: codec::CodecError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Prefix {
    Key,
    Value,
    Variant(u8),
}

/// One key with its translated value and any numbered variants.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Entry {
    value: String,
    variants: BTreeMap<u8, String>,
}

impl Entry {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn variant(&self, digit: u8) -> Option<&str> {
        self.variants.get(&digit).map(String::as_str)
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

/// An in-memory catalog, keyed by the source-code string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<String, Entry>,
}

impl Catalog {
    /// Parses catalog text. Comment and blank lines are skipped; any other
    /// malformed line aborts the parse.
    pub fn parse<R: BufRead>(reader: R) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog::default();
        let mut run: Option<(Prefix, String)> = None;
        let mut current_key: Option<String> = None;
        let mut last_line = 0;
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            last_line = line_no;
            let line = line?;
            let trimmed = line.trim_end_matches('\r');
            if trimmed.is_empty() || trimmed.starts_with('#') {
                catalog.flush(run.take(), &mut current_key, line_no)?;
                continue;
            }
            let (prefix, payload) = split_prefix(trimmed, line_no)?;
            let text = decode_payload(payload, line_no)?;
            match run.take() {
                Some((active, mut joined)) if active == prefix => {
                    joined.push('\n');
                    joined.push_str(&text);
                    run = Some((active, joined));
                }
                other => {
                    catalog.flush(other, &mut current_key, line_no)?;
                    run = Some((prefix, text));
                }
            }
        }
        catalog.flush(run.take(), &mut current_key, last_line)?;
        Ok(catalog)
    }

    fn flush(
        &mut self,
        run: Option<(Prefix, String)>,
        current_key: &mut Option<String>,
        line: usize,
    ) -> Result<(), CatalogError> {
        let Some((prefix, text)) = run else {
            return Ok(());
        };
        match prefix {
            Prefix::Key => {
                self.entries.entry(text.clone()).or_default();
                *current_key = Some(text);
            }
            Prefix::Value | Prefix::Variant(_) => {
                let key = current_key
                    .as_ref()
                    .ok_or(CatalogError::ValueWithoutKey { line })?;
                let entry = self.entries.entry(key.clone()).or_default();
                match prefix {
                    Prefix::Value => entry.value = text,
                    Prefix::Variant(digit) => {
                        entry.variants.insert(digit, text);
                    }
                    Prefix::Key => unreachable!(),
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of numbered variants across all entries.
    pub fn variant_count(&self) -> usize {
        self.entries.values().map(Entry::variant_count).sum()
    }
}

fn split_prefix(line: &str, line_no: usize) -> Result<(Prefix, &str), CatalogError> {
    if let Some(payload) = line.strip_prefix("k:") {
        return Ok((Prefix::Key, payload));
    }
    if let Some(payload) = line.strip_prefix("v:") {
        return Ok((Prefix::Value, payload));
    }
    if let Some(tail) = line.strip_prefix('v') {
        let mut chars = tail.chars();
        if let (Some(digit), Some(':')) = (chars.next(), chars.next()) {
            if let Some(value) = digit.to_digit(10) {
                return Ok((Prefix::Variant(value as u8), chars.as_str()));
            }
        }
    }
    Err(CatalogError::BadPrefix { line: line_no })
}

fn decode_payload(payload: &str, line_no: usize) -> Result<String, CatalogError> {
    let after_quote = payload
        .strip_prefix('"')
        .ok_or(CatalogError::MissingQuote { line: line_no })?;
    match codec::decode(after_quote) {
        Ok(codec::Decoded::Literal { value, rest }) => {
            if rest.trim().is_empty() {
                Ok(value)
            } else {
                Err(CatalogError::TrailingText { line: line_no })
            }
        }
        Ok(codec::Decoded::Unterminated(_)) => {
            Err(CatalogError::UnterminatedValue { line: line_no })
        }
        Err(source) => Err(CatalogError::Codec {
            line: line_no,
            source,
        }),
    }
}

/// Writes a template catalog: every key paired with itself as the value, for
/// translators to replace. Keys arrive in a `BTreeSet`, so output order is
/// stable and deduplicated.
pub fn write_template<W: Write>(out: &mut W, keys: &BTreeSet<String>) -> io::Result<()> {
    for line in HEADER {
        writeln!(out, "{line}")?;
    }
    for key in keys {
        writeln!(out)?;
        write_pair(out, key)?;
    }
    Ok(())
}

fn write_pair<W: Write>(out: &mut W, key: &str) -> io::Result<()> {
    let quoted = codec::encode(key);
    if codec::encoded_width(&quoted) < SPLIT_THRESHOLD {
        writeln!(out, "k:{quoted}")?;
        writeln!(out, "v:{quoted}")?;
    } else {
        // All k: lines first, then all v: lines, each run re-joining with \n
        // when read back.
        let parts: Vec<&str> = key.split('\n').collect();
        for part in &parts {
            writeln!(out, "k:{}", codec::encode(part))?;
        }
        for part in &parts {
            writeln!(out, "v:{}", codec::encode(part))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_str(text: &str) -> Result<Catalog, CatalogError> {
        Catalog::parse(Cursor::new(text))
    }

    #[test]
    fn parses_simple_pairs() {
        let catalog = parse_str("k:\"Name\"\nv:\"Nom\"\n\nk:\"Notes\"\nv:\"Remarques\"\n")
            .expect("parse");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("Name").map(Entry::value), Some("Nom"));
        assert_eq!(catalog.get("Notes").map(Entry::value), Some("Remarques"));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let catalog = parse_str("# header\n#\n\nk:\"A\"\nv:\"B\"\n").expect("parse");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn joins_consecutive_same_prefix_lines() {
        let catalog =
            parse_str("k:\"first\"\nk:\"second\"\nv:\"premier\"\nv:\"second\"\n").expect("parse");
        let entry = catalog.get("first\nsecond").expect("joined key");
        assert_eq!(entry.value(), "premier\nsecond");
    }

    #[test]
    fn blank_line_ends_a_run() {
        let catalog = parse_str("k:\"a\"\nv:\"x\"\n\nk:\"b\"\nv:\"y\"\n").expect("parse");
        assert!(catalog.contains_key("a"));
        assert!(catalog.contains_key("b"));
        assert!(!catalog.contains_key("a\nb"));
    }

    #[test]
    fn numbered_variants_attach_to_current_key() {
        let catalog = parse_str("k:\"Level\"\nv:\"Niveau\"\nv1:\"Niveaux\"\n").expect("parse");
        let entry = catalog.get("Level").expect("entry");
        assert_eq!(entry.value(), "Niveau");
        assert_eq!(entry.variant(1), Some("Niveaux"));
        assert_eq!(catalog.variant_count(), 1);
    }

    #[test]
    fn rejects_value_before_key() {
        let err = parse_str("v:\"orphan\"\n").expect_err("must fail");
        assert!(matches!(err, CatalogError::ValueWithoutKey { .. }));
    }

    #[test]
    fn rejects_bad_prefix() {
        let err = parse_str("x:\"nope\"\n").expect_err("must fail");
        assert!(matches!(err, CatalogError::BadPrefix { line: 1 }));
    }

    #[test]
    fn rejects_missing_quote() {
        let err = parse_str("k:bare\n").expect_err("must fail");
        assert!(matches!(err, CatalogError::MissingQuote { line: 1 }));
    }

    #[test]
    fn rejects_trailing_text() {
        let err = parse_str("k:\"a\" junk\n").expect_err("must fail");
        assert!(matches!(err, CatalogError::TrailingText { line: 1 }));
    }

    #[test]
    fn rejects_unterminated_value() {
        let err = parse_str("k:\"never closed\n").expect_err("must fail");
        assert!(matches!(err, CatalogError::UnterminatedValue { line: 1 }));
    }

    #[test]
    fn reports_codec_errors_with_line_numbers() {
        let err = parse_str("k:\"ok\"\nv:\"bad \\q escape\"\n").expect_err("must fail");
        match err {
            CatalogError::Codec { line, source } => {
                assert_eq!(line, 2);
                assert_eq!(source, codec::CodecError::InvalidEscape('q'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
