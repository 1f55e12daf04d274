///! ADIF tag tokenizer
///!
///! Splits ADIF text into records and records into `<NAME:LENGTH>` fields.
///! The optional data-type indicator (`<NAME:LENGTH:TYPE>`) is accepted and ignored.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static EOH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<eoh>").unwrap());
static EOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<eor>").unwrap());
static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^:>]+):([^:>]*)(?::[^>]*)?>([^<]*)").unwrap());

/// One `<NAME:LENGTH>` tag and the text that follows it up to the next tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField<'a> {
    /// Field name, trimmed and lower-cased
    pub name: String,
    /// Declared value length in bytes
    pub length: usize,
    /// Everything between the closing `>` and the next `<`
    pub segment: &'a str,
}

impl<'a> RawField<'a> {
    /// The first `length` bytes of the segment, or `None` if the segment is too short.
    pub fn value(&self) -> Option<Cow<'a, str>> {
        let bytes = self.segment.as_bytes();
        if bytes.len() < self.length {
            return None;
        }
        Some(String::from_utf8_lossy(&bytes[..self.length]))
    }
}

/// Drop everything up to and including `<EOH>`. Text without a header is returned as is.
pub fn strip_header(text: &str) -> &str {
    match EOH_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Split on `<EOR>` into trimmed, non-empty record chunks.
pub fn split_records(text: &str) -> Vec<&str> {
    EOR_RE
        .split(text)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Tokenize one record chunk. Tags with an unparseable length are skipped.
pub fn tokenize(record: &str) -> Vec<RawField<'_>> {
    FIELD_RE
        .captures_iter(record)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().trim().to_lowercase();
            let length = caps.get(2)?.as_str().trim().parse::<usize>().ok()?;
            let segment = caps.get(3)?.as_str();
            Some(RawField { name, length, segment })
        })
        .collect()
}
