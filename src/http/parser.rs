use std::fmt;

use crate::http::headers::find_crlf;
use crate::http::request::{ParserState, Request, RequestLine};

const SUPPORTED_VERSION: &str = "1.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The buffer ended before the message was fully framed.
    /// Only returned by [`parse_http_request`].
    Incomplete,
    /// The request line does not split into method, target and version.
    MalformedRequestLine(String),
    /// The version token is not exactly `HTTP/1.1`.
    UnsupportedVersion(String),
    /// The method contains something other than ASCII letters.
    InvalidMethod(String),
    /// A header line violates the field-line grammar.
    MalformedHeader { line: String, reason: &'static str },
    /// `Content-Length` is not a non-negative integer.
    InvalidContentLength(String),
    /// More body bytes arrived than `Content-Length` announced.
    BodyTooLong { expected: usize, received: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete => write!(f, "incomplete HTTP request"),
            Self::MalformedRequestLine(line) => write!(f, "malformed request line: '{line}'"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported HTTP version: '{v}'"),
            Self::InvalidMethod(m) => write!(f, "method must be all letters, got '{m}'"),
            Self::MalformedHeader { line, reason } => {
                write!(f, "malformed header line '{line}': {reason}")
            }
            Self::InvalidContentLength(v) => write!(f, "invalid Content-Length: '{v}'"),
            Self::BodyTooLong { expected, received } => write!(
                f,
                "too many bytes in body: expected {expected}, received {received}"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

impl Request {
    /// Feeds the unconsumed bytes of the connection buffer to the parser.
    ///
    /// Returns how many bytes of `buf` were consumed. The caller must drop
    /// those bytes before the next call, which only ever sees new input.
    /// Running out of input is not an error: the parser stops and waits for
    /// the next call. Once [`ParserState::Done`] is reached nothing more is
    /// consumed.
    pub fn parse(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let mut read = 0;

        loop {
            match self.state {
                ParserState::Init => {
                    let Some((line, n)) = parse_request_line(&buf[read..])? else {
                        break;
                    };
                    self.request_line = line;
                    read += n;
                    self.state = ParserState::ParsingHeaders;
                }

                ParserState::ParsingHeaders => {
                    let (n, done) = self.headers.parse_line(&buf[read..])?;
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if done {
                        self.state = ParserState::ParsingBody;
                    }
                }

                ParserState::ParsingBody => {
                    // No Content-Length means no body
                    let Some(declared) = self.headers.get("content-length") else {
                        self.state = ParserState::Done;
                        break;
                    };
                    let expected: usize = declared
                        .parse()
                        .map_err(|_| ParseError::InvalidContentLength(declared.to_string()))?;
                    if expected == 0 {
                        self.state = ParserState::Done;
                        break;
                    }

                    let available = &buf[read..];
                    self.body.extend_from_slice(available);
                    read += available.len();

                    if self.body.len() > expected {
                        return Err(ParseError::BodyTooLong {
                            expected,
                            received: self.body.len(),
                        });
                    }
                    if self.body.len() == expected {
                        self.state = ParserState::Done;
                    }
                    break;
                }

                ParserState::Done => break,
            }
        }

        Ok(read)
    }
}

/// Parses the request line at the front of `buf`.
///
/// `Ok(None)` means the terminating CRLF has not arrived yet. On success the
/// consumed length includes the CRLF.
pub fn parse_request_line(buf: &[u8]) -> Result<Option<(RequestLine, usize)>, ParseError> {
    let Some(end) = find_crlf(buf) else {
        return Ok(None);
    };
    // the target may hold arbitrary bytes; method and version are checked below
    let line = String::from_utf8_lossy(&buf[..end]);

    let fields: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = fields.as_slice() else {
        return Err(ParseError::MalformedRequestLine(line.to_string()));
    };

    let version = match version.split('/').collect::<Vec<_>>().as_slice() {
        ["HTTP", number] if *number == SUPPORTED_VERSION => number.to_string(),
        _ => return Err(ParseError::UnsupportedVersion(version.to_string())),
    };

    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ParseError::InvalidMethod(method.to_string()));
    }

    let request_line = RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        version,
    };
    Ok(Some((request_line, end + 2)))
}

/// Parses one complete request held entirely in `buf`.
///
/// Returns the request and the number of bytes it occupied, or
/// [`ParseError::Incomplete`] if `buf` ends before the message does.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let mut request = Request::new();
    let consumed = request.parse(buf)?;

    if !request.is_done() {
        return Err(ParseError::Incomplete);
    }
    Ok((request, consumed))
}
