use rawhttp::http::parser::{ParseError, parse_http_request, parse_request_line};
use rawhttp::http::request::{ParserState, Request};

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.request_line.method, "GET");
    assert_eq!(parsed.request_line.target, "/");
    assert_eq!(parsed.request_line.version, "1.1");
    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(parsed.state(), ParserState::Done);
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_request_line_consumes_crlf() {
    let line = b"GET /path HTTP/1.1\r\n";
    let (parsed, consumed) = parse_request_line(line).unwrap().unwrap();

    assert_eq!(parsed.method, "GET");
    assert_eq!(parsed.target, "/path");
    assert_eq!(parsed.version, "1.1");
    assert_eq!(consumed, line.len());
}

#[test]
fn test_parse_request_line_needs_crlf() {
    assert!(parse_request_line(b"GET /path HTTP/1.1").unwrap().is_none());
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.request_line.method, "POST");
    assert_eq!(parsed.body, b"hello".to_vec());
    assert!(parsed.is_done());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_multiple_headers() {
    let req = b"GET /path HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test-client\r\nAccept: */*\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.headers.get("host").unwrap(), "example.com");
    assert_eq!(parsed.headers.get("user-agent").unwrap(), "test-client");
    assert_eq!(parsed.headers.get("Accept").unwrap(), "*/*");
}

#[test]
fn test_parse_request_with_path_and_query_string() {
    let req = b"GET /search?q=rust HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.request_line.target, "/search?q=rust");
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    let result = parse_http_request(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
    let result = parse_http_request(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_unsupported_version() {
    let result = parse_http_request(b"GET /path HTTP/2.0\r\n\r\n");
    assert!(matches!(result, Err(ParseError::UnsupportedVersion(v)) if v == "HTTP/2.0"));

    let result = parse_http_request(b"GET /path HTTPS/1.1\r\n\r\n");
    assert!(matches!(result, Err(ParseError::UnsupportedVersion(_))));

    let result = parse_http_request(b"GET /path HTTP/1/1\r\n\r\n");
    assert!(matches!(result, Err(ParseError::UnsupportedVersion(_))));
}

#[test]
fn test_parse_invalid_method() {
    let result = parse_http_request(b"GE7 /path HTTP/1.1\r\n\r\n");

    assert!(matches!(result, Err(ParseError::InvalidMethod(m)) if m == "GE7"));
}

#[test]
fn test_parse_any_alphabetic_method() {
    let (parsed, _) = parse_http_request(b"brew /pot HTTP/1.1\r\n\r\n").unwrap();

    assert_eq!(parsed.request_line.method, "brew");
}

#[test]
fn test_parse_wrong_field_count() {
    for line in [
        &b"/coffee HTTP/1.1\r\n\r\n"[..],
        b"GET  /coffee HTTP/1.1\r\n\r\n",
        b"GET /coffee HTTP/1.1 extra\r\n\r\n",
    ] {
        let result = parse_http_request(line);
        assert!(
            matches!(result, Err(ParseError::MalformedRequestLine(_))),
            "{:?}",
            String::from_utf8_lossy(line)
        );
    }
}

#[test]
fn test_parse_malformed_header() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n";
    let result = parse_http_request(req);

    assert!(matches!(result, Err(ParseError::MalformedHeader { .. })));
}

#[test]
fn test_parse_body_too_long() {
    let req = b"POST /x HTTP/1.1\r\nContent-Length: 4\r\n\r\nhello";
    let result = parse_http_request(req);

    assert!(matches!(
        result,
        Err(ParseError::BodyTooLong {
            expected: 4,
            received: 5
        })
    ));
}

#[test]
fn test_parse_invalid_content_length() {
    for cl in ["abc", "-1", "1.5"] {
        let req = format!("POST /x HTTP/1.1\r\nContent-Length: {}\r\n\r\nhello", cl);
        let result = parse_http_request(req.as_bytes());
        assert!(matches!(result, Err(ParseError::InvalidContentLength(_))), "{}", cl);
    }
}

#[test]
fn test_parse_request_with_empty_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.body.len(), 0);
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_without_content_length_ignores_trailing_bytes() {
    let req = b"GET / HTTP/1.1\r\n\r\nleftover";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert!(parsed.body.is_empty());
    assert_eq!(consumed, req.len() - b"leftover".len());
}

#[test]
fn test_parse_request_with_binary_body() {
    let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.body, vec![0, 1, 2, 3]);
}

#[test]
fn test_incremental_parse_stops_without_error() {
    let mut req = Request::new();

    assert_eq!(req.parse(b"GET / HT").unwrap(), 0);
    assert_eq!(req.state(), ParserState::Init);

    assert_eq!(req.parse(b"GET / HTTP/1.1\r\nHost: a").unwrap(), 16);
    assert_eq!(req.state(), ParserState::ParsingHeaders);

    assert_eq!(req.parse(b"Host: a\r\n\r\n").unwrap(), 11);
    assert!(req.is_done());

    // nothing is consumed once done
    assert_eq!(req.parse(b"more").unwrap(), 0);
}

#[test]
fn test_incremental_body_accumulates() {
    let mut req = Request::new();

    let head = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhe";
    assert_eq!(req.parse(head).unwrap(), head.len());
    assert_eq!(req.state(), ParserState::ParsingBody);
    assert_eq!(req.body, b"he".to_vec());

    assert_eq!(req.parse(b"llo").unwrap(), 3);
    assert!(req.is_done());
    assert_eq!(req.body, b"hello".to_vec());
}

#[test]
fn test_header_lookup_is_case_insensitive() {
    let req = b"GET / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.header("content-type"), Some("application/json"));
    assert_eq!(parsed.header("CONTENT-TYPE"), Some("application/json"));
}

#[test]
fn test_parse_non_utf8_target_and_header_value() {
    let req = b"GET /caf\xe9 HTTP/1.1\r\nX-Name: caf\xe9\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.request_line.method, "GET");
    assert_eq!(parsed.request_line.target, "/caf\u{FFFD}");
    assert_eq!(parsed.header("x-name"), Some("caf\u{FFFD}"));
    assert_eq!(consumed, req.len());
}
