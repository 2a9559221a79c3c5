//! Scripted HTTP/1.1 server for exercising the streaming client in tests.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// One canned response, served to one connection.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    /// Body pieces, each written after its delay.
    pub chunks: Vec<(Duration, String)>,
    /// How long to keep the connection open after the last chunk.
    pub hold_open: Duration,
}

impl MockResponse {
    /// An event stream whose chunks are all sent immediately.
    pub fn stream(chunks: &[&str]) -> Self {
        Self {
            status: 200,
            chunks: chunks
                .iter()
                .map(|c| (Duration::ZERO, c.to_string()))
                .collect(),
            hold_open: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            chunks: vec![(Duration::ZERO, body.to_string())],
            hold_open: Duration::ZERO,
        }
    }

    async fn write_to(&self, socket: &mut TcpStream) -> std::io::Result<()> {
        let reason = match self.status {
            200 => "OK",
            400 => "Bad Request",
            401 => "Unauthorized",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            _ => "Unknown",
        };

        let head = if self.status == 200 {
            // no content-length: the client reads until the connection closes
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n"
                .to_string()
        } else {
            let body_len: usize = self.chunks.iter().map(|(_, c)| c.len()).sum();
            format!(
                "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                self.status, reason, body_len
            )
        };
        socket.write_all(head.as_bytes()).await?;
        socket.flush().await?;

        for (delay, chunk) in &self.chunks {
            if !delay.is_zero() {
                sleep(*delay).await;
            }
            socket.write_all(chunk.as_bytes()).await?;
            socket.flush().await?;
        }

        if !self.hold_open.is_zero() {
            sleep(self.hold_open).await;
        }
        socket.shutdown().await
    }
}

/// Serves `responses` in order, one per accepted connection.
///
/// Returns the server's base URL (`http://127.0.0.1:<port>`).
pub async fn serve(responses: Vec<MockResponse>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock server");
    let addr = listener.local_addr().expect("mock server has no address");

    let handle = tokio::spawn(async move {
        for response in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            if read_request(&mut socket).await.is_err() {
                continue;
            }
            // the client may hang up early; that is not a server failure
            let _ = response.write_to(&mut socket).await;
        }
    });

    (format!("http://{}", addr), handle)
}

/// Reads one request (head plus `content-length` body) off the socket.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(buf);
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(head_end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + body_len {
                return Ok(buf);
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
