//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use ghostframe::{HttpServer, ProxyConfig, Shutdown};

/// A canned upstream response.
#[derive(Clone)]
pub struct MockResponse {
    pub status_line: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    pub delay: Duration,
    /// Pause between body chunks; zero writes the body in one go.
    pub chunk_delay: Duration,
}

impl MockResponse {
    pub fn new(status_line: &'static str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_line,
            headers: vec![("Content-Type", content_type.to_string())],
            body: body.into(),
            delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
        }
    }

    #[allow(dead_code)]
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    #[allow(dead_code)]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Send the body in three chunks with `delay` between them.
    #[allow(dead_code)]
    pub fn trickled(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    fn head(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {}\r\n", self.status_line);
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));
        head.into_bytes()
    }

    async fn write_to(&self, socket: &mut TcpStream) -> std::io::Result<()> {
        socket.write_all(&self.head()).await?;
        if self.chunk_delay.is_zero() {
            return socket.write_all(&self.body).await;
        }
        let chunk = self.body.len().div_ceil(3).max(1);
        for part in self.body.chunks(chunk) {
            socket.flush().await?;
            tokio::time::sleep(self.chunk_delay).await;
            socket.write_all(part).await?;
        }
        Ok(())
    }
}

/// Start a mock upstream that answers every request with `response`.
///
/// Each received request head is forwarded on the returned channel.
pub async fn start_mock_upstream(response: MockResponse) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let response = response.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let mut read = 0;
                        while read < buf.len() {
                            match socket.read(&mut buf[read..]).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    read += n;
                                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                }
                            }
                        }
                        let _ = tx.send(String::from_utf8_lossy(&buf[..read]).into_owned());

                        tokio::time::sleep(response.delay).await;
                        let _ = response.write_to(&mut socket).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, rx)
}

/// Config suitable for tests: no system proxy, short timeouts.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.use_system_proxy = false;
    config.timeouts.connect_secs = 2;
    config.timeouts.upstream_secs = 5;
    config
}

/// Start the proxy on an ephemeral port and return its address.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config).unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    (addr, shutdown)
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
