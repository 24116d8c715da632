//! Tests for the demo routes served by the `rawhttp` binary

use std::path::PathBuf;

use rawhttp::config::Config;
use rawhttp::digest;
use rawhttp::http::parser::parse_http_request;
use rawhttp::http::writer::ResponseWriter;
use rawhttp::routes::{
    BAD_REQUEST_PAGE, BodyDigest, DemoHandler, INTERNAL_ERROR_PAGE, SUCCESS_PAGE, chunked_headers,
};
use rawhttp::server::Handler;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

fn config(video_path: PathBuf) -> Config {
    Config {
        video_path,
        ..Config::default()
    }
}

async fn serve(handler: &DemoHandler, target: &str) -> String {
    let raw = format!("GET {} HTTP/1.1\r\nHost: localhost:42069\r\n\r\n", target);
    let (req, _) = parse_http_request(raw.as_bytes()).unwrap();

    let mut w = ResponseWriter::new(Vec::new());
    handler.handle(&mut w, &req).await.unwrap();
    String::from_utf8_lossy(&w.into_inner()).into_owned()
}

#[tokio::test]
async fn test_default_route_is_success_page() {
    let handler = DemoHandler::new(&Config::default()).unwrap();

    let response = serve(&handler, "/").await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("content-type: text/html\r\n"));
    assert!(response.contains(&format!("content-length: {}\r\n", SUCCESS_PAGE.len())));
    assert!(response.ends_with(SUCCESS_PAGE));
}

#[tokio::test]
async fn test_problem_routes() {
    let handler = DemoHandler::new(&Config::default()).unwrap();

    let response = serve(&handler, "/yourproblem").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(response.ends_with(BAD_REQUEST_PAGE));

    let response = serve(&handler, "/myproblem").await;
    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(response.ends_with(INTERNAL_ERROR_PAGE));
}

#[tokio::test]
async fn test_missing_video_is_internal_error() {
    let handler = DemoHandler::new(&config(PathBuf::from("/nonexistent/vim.mp4"))).unwrap();

    let response = serve(&handler, "/video").await;

    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(response.ends_with(INTERNAL_ERROR_PAGE));
}

#[tokio::test]
async fn test_video_is_streamed_in_chunks() {
    let data: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 251) as u8).collect();
    let path = std::env::temp_dir().join(format!("rawhttp-video-{}.mp4", std::process::id()));
    std::fs::write(&path, &data).unwrap();

    let handler = DemoHandler::new(&config(path.clone())).unwrap();
    let (req, _) = parse_http_request(b"GET /video HTTP/1.1\r\n\r\n").unwrap();
    let mut w = ResponseWriter::new(Vec::new());
    handler.handle(&mut w, &req).await.unwrap();
    std::fs::remove_file(&path).unwrap();

    let out = w.into_inner();
    let head_end = out.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    let head = String::from_utf8_lossy(&out[..head_end]);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("content-type: video/mp4\r\n"));
    assert!(head.contains("transfer-encoding: chunked\r\n"));

    // a regular file fills every 1024-byte read but the last
    let mut expected = Vec::new();
    for chunk in data.chunks(1024) {
        expected.extend_from_slice(format!("{:X}\r\n", chunk.len()).as_bytes());
        expected.extend_from_slice(chunk);
        expected.extend_from_slice(b"\r\n");
    }
    expected.extend_from_slice(b"0\r\n");
    let body = &out[head_end..];
    assert!(body.starts_with(&expected));

    let trailers = String::from_utf8_lossy(&body[expected.len()..]);
    assert!(trailers.contains(&format!(
        "x-content-sha256: {}\r\n",
        digest::hex(&digest::digest(&data))
    )));
    assert!(trailers.contains("x-content-length: 3000\r\n"));
}

#[tokio::test]
async fn test_httpbin_prefix_is_proxied() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = format!("http://{}", listener.local_addr().unwrap());
    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 256];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = tokio::io::AsyncReadExt::read(&mut stream, &mut buf).await.unwrap();
            head.extend_from_slice(&buf[..n]);
        }
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
            .await
            .unwrap();
        String::from_utf8(head).unwrap()
    });

    let cfg = Config {
        upstream,
        ..Config::default()
    };
    let handler = DemoHandler::new(&cfg).unwrap();

    let response = serve(&handler, "/httpbin/stream/1").await;

    assert!(task.await.unwrap().starts_with("GET /stream/1 HTTP/1.1\r\n"));
    assert!(response.contains("transfer-encoding: chunked\r\n"));
    assert!(response.contains("\r\n\r\n2\r\nok\r\n0\r\n"));
    assert!(response.contains("x-content-length: 2\r\n"));
}

#[test]
fn test_chunked_headers_announce_trailers() {
    let headers = chunked_headers("text/plain");

    assert_eq!(headers.get("transfer-encoding"), Some("chunked"));
    assert_eq!(headers.get("trailers"), Some("X-Content-SHA256, X-Content-Length"));
    assert_eq!(headers.get("content-length"), None);
}

#[test]
fn test_body_digest_trailers() {
    let mut digest = BodyDigest::new();
    assert!(digest.is_empty());
    digest.update(b"hello ");
    digest.update(b"world");
    assert_eq!(digest.len(), 11);

    let trailers = digest.trailers();

    assert_eq!(
        trailers.get("x-content-sha256"),
        Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
    );
    assert_eq!(trailers.get("x-content-length"), Some("11"));
}
