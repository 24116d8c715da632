use std::fmt;

use crate::http::headers::Headers;

/// The first line of a request: `<method> <target> HTTP/<version>`.
///
/// `version` holds only the number after `HTTP/`, which the parser
/// restricts to `"1.1"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    /// Alphabetic method token (e.g. "GET")
    pub method: String,
    /// The request target exactly as sent (e.g. "/search?q=rust")
    pub target: String,
    /// Protocol version number, always "1.1" once parsed
    pub version: String,
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} HTTP/{}", self.method, self.target, self.version)
    }
}

/// Progress of a [`Request`] through the parser. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParserState {
    Init,
    ParsingHeaders,
    ParsingBody,
    Done,
}

/// A request being parsed, or fully parsed once [`Request::is_done`] is true.
///
/// Built with [`Request::new`] and filled in by [`Request::parse`]; see
/// [`crate::http::parser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub(crate) state: ParserState,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    pub fn new() -> Self {
        Self {
            request_line: RequestLine::default(),
            headers: Headers::new(),
            body: Vec::new(),
            state: ParserState::Init,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn target(&self) -> &str {
        &self.request_line.target
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The declared `Content-Length`, or 0 when missing or not a number.
    pub fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Request line:")?;
        writeln!(f, "- Method: {}", self.request_line.method)?;
        writeln!(f, "- Target: {}", self.request_line.target)?;
        writeln!(f, "- Version: {}", self.request_line.version)?;
        writeln!(f, "Headers:")?;
        let mut fields: Vec<_> = self.headers.iter().collect();
        fields.sort_unstable();
        for (name, value) in fields {
            writeln!(f, "- {}: {}", name, value)?;
        }
        writeln!(f, "Body:")?;
        write!(f, "{}", String::from_utf8_lossy(&self.body))
    }
}
