//! Async websocket client for the encounter and battle protocol.
//!
//! [`connect`] opens the socket and splits it into a cloneable [`Sender`]
//! and a [`Receiver`] that dispatches server messages to a [`Handler`].
//! An [`Explorer`] sits on the movement loop and proposes encounters
//! through the sender without blocking.
//!
//! ```ignore
//! let (sender, mut receiver) = tallgrass_client::connect("ws://127.0.0.1:7878", ReconnectPolicy::default()).await?;
//! sender.hello(PlayerId(1)).await?;
//!
//! let mut explorer = Explorer::new(PlayerId(1), sender.clone(), receiver.flags().clone());
//! explorer.enter_zone("route1", route1_index, now_ms());
//!
//! tokio::spawn(async move { receiver.run(&mut MyHandler).await });
//! ```

mod connection;
mod explorer;
mod handler;
mod receiver;
mod sender;
mod state;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use receiver::Inbound;

pub use connection::{Connection, ReconnectPolicy};
pub use explorer::{Explorer, StepOutcome};
pub use handler::Handler;
pub use receiver::Receiver;
pub use sender::Sender;
pub use state::{BattleView, EncounterFlags};

pub use async_trait::async_trait;
pub use tallgrass_protocol::{ClientCommand, ServerFrame, ServerMessage};

const OUTGOING_CAPACITY: usize = 64;
const INCOMING_CAPACITY: usize = 64;

/// Connect to a server and spawn the task that owns the socket
pub async fn connect(url: &str, policy: ReconnectPolicy) -> Result<(Sender, Receiver)> {
    let connection = Connection::connect(url.to_string(), policy).await?;

    let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_CAPACITY);
    let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_CAPACITY);
    tokio::spawn(pump(connection, outgoing_rx, incoming_tx));

    let flags = Arc::new(EncounterFlags::default());
    Ok((Sender::new(outgoing_tx), Receiver::new(incoming_rx, flags)))
}

/// Move lines between the socket and the channels until either side closes
async fn pump(
    mut connection: Connection,
    mut outgoing: mpsc::Receiver<String>,
    incoming: mpsc::Sender<Result<Inbound>>,
) {
    let mut reconnects = connection.reconnects();

    loop {
        tokio::select! {
            message = outgoing.recv() => {
                let Some(message) = message else {
                    debug!("All senders dropped, closing connection");
                    if let Err(e) = connection.close().await {
                        warn!(error = %e, "Failed to close connection");
                    }
                    break;
                };
                if let Err(e) = connection.send(message).await {
                    error!(error = %e, "Failed to send to server");
                }
            }
            frame = connection.recv() => {
                if connection.reconnects() != reconnects {
                    reconnects = connection.reconnects();
                    if incoming.send(Ok(Inbound::Reconnected)).await.is_err() {
                        break;
                    }
                }
                let failed = frame.is_err();
                if incoming.send(frame.map(Inbound::Frame)).await.is_err() || failed {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tallgrass_protocol::EncounterFailReason;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    use super::*;

    #[tokio::test]
    async fn test_pump_reports_reconnect_before_new_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let answer = ServerFrame::new(None, vec![ServerMessage::EncounterFailed(EncounterFailReason::Cooldown)]);
        let wire = answer.to_wire_format();

        let server = tokio::spawn(async move {
            // First socket dies right after the hello
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let hello = ws.next().await.unwrap().unwrap();
            drop(ws);

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let replayed = ws.next().await.unwrap().unwrap();
            ws.send(Message::Text(wire)).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if message.is_close() {
                    break;
                }
            }
            (hello, replayed)
        });

        let policy = ReconnectPolicy {
            max_attempts: Some(3),
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
        };
        let connection = Connection::connect(url, policy).await.unwrap();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(4);
        let (incoming_tx, mut incoming_rx) = mpsc::channel(4);
        let task = tokio::spawn(pump(connection, outgoing_rx, incoming_tx));

        outgoing_tx.send("|hello|9".to_string()).await.unwrap();

        assert!(matches!(incoming_rx.recv().await, Some(Ok(Inbound::Reconnected))));
        match incoming_rx.recv().await {
            Some(Ok(Inbound::Frame(frame))) => assert_eq!(frame, answer),
            other => panic!("expected a frame, got {:?}", other),
        }

        // Dropping every sender closes the socket and ends the pump
        drop(outgoing_tx);
        task.await.unwrap();
        assert!(incoming_rx.recv().await.is_none());

        let (hello, replayed) = server.await.unwrap();
        assert_eq!(hello, Message::Text("|hello|9".to_string()));
        assert_eq!(replayed, hello);
    }
}
