use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tallgrass_protocol::{ServerFrame, parse_server_frame};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How to retry after the socket drops
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: Option<usize>,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Never reconnect; the first drop ends the connection
    pub fn none() -> Self {
        Self {
            max_attempts: Some(0),
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    fn allows(&self, attempt: usize) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

/// A websocket to the server that reconnects on its own.
///
/// The last `|hello|` line sent is replayed after a reconnect so the server
/// knows who is on the new socket.
pub struct Connection {
    ws_stream: WsStream,
    url: String,
    reconnect_policy: ReconnectPolicy,
    hello: Option<String>,
    reconnects: u64,
}

impl Connection {
    pub async fn connect(url: String, policy: ReconnectPolicy) -> Result<Self> {
        let ws_stream = Self::establish_connection(&url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        Ok(Self {
            ws_stream,
            url,
            reconnect_policy: policy,
            hello: None,
            reconnects: 0,
        })
    }

    async fn establish_connection(url: &str) -> Result<WsStream> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| "WebSocket handshake failed")?;
        Ok(ws_stream)
    }

    async fn reconnect(&mut self) -> Result<()> {
        let mut attempt = 1;

        loop {
            if !self.reconnect_policy.allows(attempt) {
                anyhow::bail!("Failed to reconnect after {} attempts to {}", attempt - 1, self.url);
            }

            tokio::time::sleep(self.reconnect_policy.delay_for(attempt)).await;

            match Self::establish_connection(&self.url).await {
                Ok(ws_stream) => {
                    self.ws_stream = ws_stream;
                    self.reconnects += 1;
                    tracing::info!(url = %self.url, attempt, "Reconnected");
                    if let Some(hello) = self.hello.clone() {
                        self.send(hello).await?;
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = ?self.reconnect_policy.max_attempts,
                        error = %e,
                        "Reconnection attempt failed"
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// Next frame from the server; reconnects transparently on drop and skips
    /// frames that do not parse
    pub async fn recv(&mut self) -> Result<ServerFrame> {
        loop {
            match self.ws_stream.next().await {
                Some(Ok(Message::Text(text))) => match parse_server_frame(&text) {
                    Ok(frame) => return Ok(frame),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unparseable server frame");
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    self.ws_stream
                        .send(Message::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    self.reconnect()
                        .await
                        .context("Connection lost and reconnection failed")?;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "WebSocket error, attempting reconnect");
                    self.reconnect()
                        .await
                        .context("WebSocket error and reconnection failed")?;
                }
            }
        }
    }

    /// How many times the socket has been replaced
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    pub async fn send(&mut self, message: String) -> Result<()> {
        if message.starts_with("|hello|") {
            self.hello = Some(message.clone());
        }
        self.ws_stream
            .send(Message::Text(message))
            .await
            .context("Failed to send message")?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.ws_stream.close(None).await.context("Failed to close websocket")
    }
}
