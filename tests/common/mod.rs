//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Read until the end of the request head and return it.
async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

async fn respond(socket: &mut TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line(status),
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a mock backend that returns a fixed 200 response.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// Start a mock backend whose status and body are computed per request from
/// the raw request head.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let (status, body) = f(head).await;
                respond(&mut socket, status, &body).await;
            });
        }
    });
    addr
}

/// Start a backend that hands each connection, after its request head, to `f`.
pub async fn start_socket_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                read_head(&mut socket).await;
                f(socket).await;
            });
        }
    });
    addr
}

/// Start a backend that never answers. Each connection reports on the
/// returned channel once the proxy side closes it.
pub async fn start_silent_backend() -> (SocketAddr, tokio::sync::mpsc::UnboundedReceiver<()>) {
    let (closed_tx, closed_rx) = tokio::sync::mpsc::unbounded_channel();
    let addr = start_socket_backend(move |mut socket| {
        let closed_tx = closed_tx.clone();
        async move {
            let mut buf = [0u8; 64];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            let _ = closed_tx.send(());
        }
    })
    .await;
    (addr, closed_rx)
}

/// Start a backend that answers 200 with a chunked body: `first`, a pause
/// of `gap`, then `last`.
pub async fn start_chunked_backend(gap: Duration) -> SocketAddr {
    start_socket_backend(move |mut socket| async move {
        let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n5\r\nfirst\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
        tokio::time::sleep(gap).await;
        let _ = socket.write_all(b"4\r\nlast\r\n0\r\n\r\n").await;
        let _ = socket.shutdown().await;
    })
    .await
}

/// Start a backend that answers with the request head it received.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|head| async move { (200, head) }).await
}

/// Start a backend that waits before answering.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    start_programmable_backend(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, "late".to_string())
    })
    .await
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A log event emitted by the proxy.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the message or any field mentions `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.message.contains(needle) || self.fields.iter().any(|(_, v)| v.contains(needle))
    }
}

struct EventVisitor<'a>(&'a mut CapturedEvent);

impl Visit for EventVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_str(field, &format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.message = value.to_string();
        } else {
            self.0.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

/// Tracing layer that records the proxy's dispatch events.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Install the capture as the thread's default subscriber. Events are
    /// recorded until the returned guard is dropped.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("lb_proxy::proxy") {
            return;
        }
        let mut captured = CapturedEvent {
            level: *metadata.level(),
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut EventVisitor(&mut captured));
        self.events.lock().unwrap().push(captured);
    }
}

/// A proxy serving on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: lb_proxy::Shutdown,
    pub config_updates: tokio::sync::mpsc::UnboundedSender<lb_proxy::ProxyConfig>,
    pub handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config that balances across the given mock backends.
pub fn balanced_config(backends: &[SocketAddr]) -> lb_proxy::ProxyConfig {
    let mut config = lb_proxy::ProxyConfig::default();
    config.server.listen_addr = "127.0.0.1:0".to_string();
    config.load_balancing.enabled = true;
    config.load_balancing.backends = backends.iter().map(|a| format!("http://{a}")).collect();
    config
}

/// Start the proxy server. The listener is bound before returning.
pub async fn start_proxy(config: lb_proxy::ProxyConfig) -> RunningProxy {
    let shutdown = lb_proxy::Shutdown::new();
    let (config_updates, updates_rx) = tokio::sync::mpsc::unbounded_channel();
    let server = lb_proxy::HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.signal();

    let handle = tokio::spawn(async move { server.run(listener, updates_rx, server_shutdown).await });

    RunningProxy {
        addr,
        shutdown,
        config_updates,
        handle,
    }
}

/// Client that opens a fresh connection per request.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
