//! Relay connection adapter
//!
//! A [`Transport`] owns at most one bidirectional text connection and reports
//! what happens to it through an [`EventSink`]. It has no knowledge of the
//! signaling protocol. [`WebSocketTransport`] is the implementation used
//! against a real relay server.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures_util::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace};

/// Events raised by a transport to its owner, in connection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open and `send` will write.
    Opened,
    /// The connection ended or could not be established. The reason is opaque.
    Closed(String),
    /// One text frame arrived.
    Text(String),
}

pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// A bidirectional text message transport.
///
/// None of these calls block: the outcome of `connect` and `close` is reported
/// through the event sink given to `connect`.
pub trait Transport: Send + 'static {
    /// Start connecting to `address`, replacing any previous connection.
    fn connect(&mut self, address: &str, events: EventSink);

    /// Write one text frame. Dropped if the connection is not open.
    fn send(&mut self, text: String);

    /// Begin shutting the connection down.
    fn close(&mut self);
}

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// WebSocket transport over `tokio-tungstenite`.
///
/// Each connection runs on its own task which owns both halves of the socket.
#[derive(Default)]
pub struct WebSocketTransport {
    connection: Option<Connection>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.open.load(Ordering::Acquire))
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, address: &str, events: EventSink) {
        if let Some(old) = self.connection.take() {
            // A replaced connection must not report its close to the new owner.
            old.task.abort();
        }

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_connection(
            address.to_string(),
            outbound_rx,
            open.clone(),
            events,
        ));

        self.connection = Some(Connection {
            outbound,
            open,
            task,
        });
    }

    fn send(&mut self, text: String) {
        match &self.connection {
            Some(c) if c.open.load(Ordering::Acquire) => {
                if c.outbound.send(Message::Text(text)).is_err() {
                    debug!("Connection task gone, dropping outbound frame");
                }
            }
            _ => debug!("Relay connection not open, dropping outbound frame"),
        }
    }

    fn close(&mut self) {
        if let Some(c) = self.connection.take() {
            c.open.store(false, Ordering::Release);
            if c.outbound.send(Message::Close(None)).is_err() {
                c.task.abort();
            }
        }
    }
}

async fn run_connection(
    address: String,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    open: Arc<AtomicBool>,
    events: EventSink,
) {
    info!("Connecting to signaling server {}", address);

    let ws_stream = match connect_async(address.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            let _ = events.send(TransportEvent::Closed(format!("connect failed: {e}")));
            return;
        }
    };

    info!("Connected to signaling server");
    open.store(true, Ordering::Release);
    let _ = events.send(TransportEvent::Opened);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Text(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    trace!("Ignoring {} byte binary frame", data.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    // Writes the queued close reply to finish the handshake.
                    let _ = ws_sender.close().await;
                    break match frame {
                        Some(f) => format!("closed by relay: {:?} {}", f.code, f.reason),
                        None => "closed by relay".to_string(),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break e.to_string(),
                None => break "connection ended".to_string(),
            },

            message = outbound.recv() => match message {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if let Err(e) = ws_sender.send(message).await {
                        break e.to_string();
                    }
                    if closing {
                        break "closed locally".to_string();
                    }
                }
                None => {
                    let _ = ws_sender.close().await;
                    break "closed locally".to_string();
                }
            },
        }
    };

    open.store(false, Ordering::Release);
    info!("Signaling connection closed: {}", reason);
    let _ = events.send(TransportEvent::Closed(reason));
}
