use std::collections::HashMap;
use std::collections::hash_map;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::parser::ParseError;

const CRLF: &[u8] = b"\r\n";

/// Case-insensitive header (field line) table.
///
/// Names are lower-cased on every insert and lookup. Two write modes exist:
/// [`Headers::set`] joins repeated names with `", "` the way HTTP folds
/// multi-value fields, while [`Headers::replace`] overwrites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Inserts a value, appending to any existing value as `"old, new"`.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.entry(name.to_ascii_lowercase()) {
            hash_map::Entry::Occupied(mut entry) => {
                let joined = entry.get_mut();
                joined.push_str(", ");
                joined.push_str(value);
            }
            hash_map::Entry::Vacant(entry) => {
                entry.insert(value.to_string());
            }
        }
    }

    /// Stores a value, discarding whatever was there before.
    pub fn replace(&mut self, name: &str, value: &str) {
        self.fields
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates `(lower-cased name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses at most one field line from the front of `buf`.
    ///
    /// Returns `(consumed, done)`:
    ///
    /// - `(0, false)` when no CRLF is present yet; the caller must supply more bytes.
    /// - `(2, true)` when the line is empty, i.e. the header section ends here.
    /// - `(line_len + 2, false)` after a field line was stored with [`Headers::set`].
    ///
    /// # Errors
    ///
    /// A line without a colon, with an empty name, with whitespace between the
    /// name and the colon, or with a name outside `ALPHA / DIGIT / "-"` is a
    /// [`ParseError::MalformedHeader`].
    pub fn parse_line(&mut self, buf: &[u8]) -> Result<(usize, bool), ParseError> {
        let Some(end) = find_crlf(buf) else {
            return Ok((0, false));
        };
        if end == 0 {
            return Ok((CRLF.len(), true));
        }

        let line = buf[..end].trim_ascii();
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| malformed(line, "missing ':' between field name and value"))?;
        if colon == 0 {
            return Err(malformed(line, "empty field name"));
        }

        let name = &line[..colon];
        if name.iter().any(u8::is_ascii_whitespace) {
            return Err(malformed(line, "whitespace between field name and ':'"));
        }
        if !is_token(name) {
            return Err(malformed(line, "invalid character in field name"));
        }

        // values may carry obs-text; non-UTF-8 bytes become U+FFFD
        let value = String::from_utf8_lossy(line[colon + 1..].trim_ascii());
        // is_token guarantees ASCII
        let name = String::from_utf8_lossy(name);

        self.set(&name, &value);
        Ok((end + CRLF.len(), false))
    }

    /// Serializes every field as `name: value\r\n`, then the blank line that
    /// closes the block.
    pub async fn write_to<W>(&self, w: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        w.write_all(&self.to_bytes()).await
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (name, value) in &self.fields {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(CRLF);
        }
        buf.extend_from_slice(CRLF);
        buf
    }
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

fn is_token(name: &[u8]) -> bool {
    !name.is_empty()
        && name
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'-')
}

fn malformed(line: &[u8], reason: &'static str) -> ParseError {
    ParseError::MalformedHeader {
        line: String::from_utf8_lossy(line).into_owned(),
        reason,
    }
}
