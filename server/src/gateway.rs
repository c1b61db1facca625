//! Websocket gateway
//!
//! One task per socket. Text frames carry one command per line; replies
//! and battle broadcasts arrive through the player's outbox and are written
//! by a separate sender task.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tallgrass_protocol::{parse_client_command, ClientCommand, PlayerId, ServerFrame};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::hub::Hub;

/// Accept connections until the listener fails
pub async fn serve(listener: TcpListener, hub: Arc<Hub>) -> Result<()> {
    let local = listener.local_addr().context("Listener has no local address")?;
    info!(addr = %local, "Listening for websocket connections");

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, hub).await {
                        warn!(addr = %addr, error = %e, "Connection error");
                    }
                });
            }
            Err(e) => warn!(error = %e, "Accept error"),
        }
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, hub: Arc<Hub>) -> Result<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    debug!(addr = %addr, "WebSocket connection opened");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<ServerFrame>();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = outgoing.recv().await {
            if ws_sender.send(Message::Text(frame.to_wire_format())).await.is_err() {
                break;
            }
        }
    });

    let mut player: Option<PlayerId> = None;

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    match parse_client_command(line) {
                        Ok(ClientCommand::Hello(id)) => {
                            if let Some(previous) = player.replace(id)
                                && previous != id
                            {
                                hub.disconnect(previous, &outbox).await;
                            }
                            hub.connect(id, outbox.clone()).await;
                        }
                        Ok(command) => match player {
                            Some(id) => hub.handle(id, command).await,
                            None => warn!(addr = %addr, "Command before hello, ignored"),
                        },
                        Err(e) => warn!(addr = %addr, error = %e, "Rejected client frame"),
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(addr = %addr, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    if let Some(id) = player {
        hub.disconnect(id, &outbox).await;
    }
    send_task.abort();
    debug!(addr = %addr, "WebSocket connection closed");

    Ok(())
}
