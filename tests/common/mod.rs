#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use batchdl::{DownloadEvent, DownloadRegistry};

/// Accept a single connection, swallow the request head and hand the socket
/// to `handler`, which writes the raw response. Returns the URL to fetch.
pub async fn serve_once<F, Fut>(handler: F) -> String
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        handler(stream).await;
    });
    format!("http://{}/file.bin", addr)
}

async fn read_request_head(stream: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        head.extend_from_slice(&buf[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            return;
        }
    }
}

pub async fn write_all(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).await.unwrap();
    stream.flush().await.unwrap();
}

pub fn head_with_length(length: usize) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        length
    )
}

pub const HEAD_WITHOUT_LENGTH: &str = "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n";

pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Next routed event, failing the test instead of hanging.
pub async fn next(registry: &mut DownloadRegistry) -> Option<DownloadEvent> {
    tokio::time::timeout(Duration::from_secs(10), registry.next_event())
        .await
        .expect("timed out waiting for a download event")
}

/// Relay everything until idle.
pub async fn drain(registry: &mut DownloadRegistry) -> Vec<DownloadEvent> {
    let mut events: Vec<DownloadEvent> = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), registry.drain(&mut events))
        .await
        .expect("downloads did not settle");
    events
}

pub fn percents(events: &[DownloadEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}
