//! A one-shot HTTP server speaking just enough HTTP/1.1 for the stream tests
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tokio::time::Instant;

pub const OK_HEAD: &str = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n";

pub struct StubStream {
    /// Base URL to use as the connection endpoint
    pub endpoint: String,
    /// The raw request the server received
    pub request: oneshot::Receiver<String>,
}

/// Accepts one connection, answers with `head` and `chunks`, then closes it,
/// or keeps it open when `hold_open` is set.
pub async fn serve_once(
    head: &'static str,
    chunks: Vec<&'static str>,
    hold_open: bool,
) -> StubStream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (request_tx, request_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let _ = request_tx.send(request);

        socket.write_all(head.as_bytes()).await.unwrap();
        for chunk in chunks {
            socket.write_all(chunk.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            sleep(Duration::from_millis(10)).await;
        }

        if hold_open {
            sleep(Duration::from_secs(60)).await;
        }
    });

    StubStream {
        endpoint: format!("http://{}/1.1", addr),
        request: request_rx,
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buffer[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= end + 4 + length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(10)).await;
    }
}
