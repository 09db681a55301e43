//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// A request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub target: String,
    pub body: String,
}

impl MockRequest {
    /// Request path without the query string.
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    /// Decoded value of query parameter `name`.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.target.split_once('?')?.1;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Requests received so far, in arrival order.
pub type RequestLog = Arc<Mutex<Vec<MockRequest>>>;

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` maps every request to `(status, body)`. Returns the bound address and
/// the request log.
pub async fn start_programmable_backend<F>(f: F) -> (SocketAddr, RequestLog)
where
    F: Fn(&MockRequest) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let requests = log.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        let mut socket = BufReader::new(socket);
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(&request);
                        requests.lock().unwrap().push(request);

                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
                             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let socket = socket.get_mut();
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, log)
}

async fn read_request(socket: &mut BufReader<TcpStream>) -> Option<MockRequest> {
    let mut request_line = String::new();
    socket.read_line(&mut request_line).await.ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if socket.read_line(&mut header).await.ok()? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    socket.read_exact(&mut body).await.ok()?;

    Some(MockRequest {
        method,
        target,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// What a mock websocket connection did.
#[derive(Debug, Clone)]
pub struct WsConnection {
    pub accepted_at: Instant,
    pub first_message: Option<String>,
}

/// Connections accepted so far, in order.
pub type ConnectionLog = Arc<Mutex<Vec<WsConnection>>>;

/// Start a websocket server on an ephemeral port.
///
/// Connection `n` (0-based) waits for the subscribe message, sends
/// `script(n)` as text frames, then closes. Returns the `ws://` URL and the log.
pub async fn start_ws_server<F>(script: F) -> (String, ConnectionLog)
where
    F: Fn(usize) -> Vec<String> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let log: ConnectionLog = Arc::new(Mutex::new(Vec::new()));

    let connections = log.clone();
    tokio::spawn(async move {
        let mut count = 0usize;
        while let Ok((stream, _)) = listener.accept().await {
            let accepted_at = Instant::now();
            let index = count;
            count += 1;

            let Ok(mut ws) = accept_async(stream).await else {
                continue;
            };
            let first = tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
            let first_message = match first {
                Ok(Some(Ok(Message::Text(text)))) => Some(text.as_str().to_string()),
                _ => None,
            };
            connections.lock().unwrap().push(WsConnection {
                accepted_at,
                first_message,
            });

            for frame in script(index) {
                if ws.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws.close(None).await;
        }
    });

    (url, log)
}

/// Poll `check` every 10ms until it holds or `limit` passes.
pub async fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
