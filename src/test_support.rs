//! Minimal HTTP/1.1 responder for exercising the remote backend in tests.

use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Response for a request line such as `POST /optimize`
pub(crate) type Handler = fn(&str) -> (u16, &'static str, Vec<u8>);

/// Serve `handler` on an ephemeral port; returns the base URL
pub(crate) async fn serve(handler: Handler) -> String {
    serve_with(handler, 0).await
}

/// Like `serve`, but every response declares more body than it sends
pub(crate) async fn serve_truncated(handler: Handler) -> String {
    serve_with(handler, 64).await
}

async fn serve_with(handler: Handler, missing: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(respond(socket, handler, missing));
        }
    });

    format!("http://{}", addr)
}

async fn respond(mut socket: TcpStream, handler: Handler, missing: usize) {
    let head = read_request(&mut socket).await;
    let request_line = head.lines().next().unwrap_or_default();
    let request_line = request_line.rsplit_once(' ').map(|(l, _)| l).unwrap_or(request_line);

    let (code, content_type, body) = handler(request_line);
    let reason = StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        code,
        reason,
        content_type,
        body.len() + missing
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(&body).await;
    let _ = socket.shutdown().await;
}

/// Read one full request and return its header block
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let header_end = find(&buf, b"\r\n\r\n").map(|i| i + 4);
        if let Some(end) = header_end {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let complete = match content_length(&head) {
                Some(len) => buf.len() >= end + len,
                None if head.contains("transfer-encoding: chunked") => buf.ends_with(b"0\r\n\r\n"),
                None => true,
            };
            if complete {
                return String::from_utf8_lossy(&buf[..end]).into_owned();
            }
        }

        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return String::from_utf8_lossy(&buf).into_owned(),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn content_length(head: &str) -> Option<usize> {
    head.lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
