//! Signaling client
//!
//! [`SignalingClient`] is a cheap handle to an orchestrator task that owns the
//! transport, the connection state and the reconnect timer. Commands from the
//! handle, events from the transport and the timer are all handled on that one
//! task, so state transitions happen strictly in the order they arrive.
//!
//! ```text
//!  Disconnected --connect()--> Connecting --opened--> Connected
//!       ^                          |                      |
//!       +---------- closed --------+------- closed -------+
//! ```
//!
//! After a close the consumer is told, and one retry is scheduled according to
//! the [`ReconnectPolicy`].

use std::{
    future::pending,
    pin::Pin,
    sync::{Arc, Weak},
};

use tokio::{
    sync::{mpsc, watch},
    time::{sleep, Sleep},
};
use tracing::{debug, info, warn};

use crate::config::SignalingConfig;
use crate::error::SignalingError;
use crate::model::payload::{decode, decode_signal, encode};
use crate::model::signal::{IceCandidate, SessionDescription, Signal};
use crate::model::state::ConnectionState;
use crate::reconnect::ReconnectPolicy;
use crate::transport::{EventSink, Transport, TransportEvent, WebSocketTransport};

/// Receives the client's notifications.
///
/// Callbacks run on the orchestrator task and should return quickly. Calling
/// back into the [`SignalingClient`] from a callback is fine: it only queues a
/// command.
pub trait SignalingConsumer: Send + Sync {
    fn on_connected(&self);
    fn on_disconnected(&self);
    fn on_remote_description(&self, description: SessionDescription);
    fn on_remote_candidate(&self, candidate: IceCandidate);
}

#[derive(Debug)]
enum Command {
    Connect,
    Send(String),
    Shutdown,
}

/// Handle to a running signaling client.
///
/// Dropping every handle has the same effect as [`SignalingClient::shutdown`].
#[derive(Clone)]
pub struct SignalingClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl SignalingClient {
    /// Spawn the orchestrator on the current tokio runtime.
    ///
    /// Only a weak reference to `consumer` is kept; the owner decides how long
    /// it lives. The client starts `Disconnected` and does nothing until
    /// [`connect`](Self::connect) is called.
    pub fn new<T, C>(config: SignalingConfig, transport: T, consumer: &Arc<C>) -> Self
    where
        T: Transport,
        C: SignalingConsumer + 'static,
    {
        let consumer: Weak<C> = Arc::downgrade(consumer);
        Self::with_consumer(config, transport, consumer)
    }

    /// Like [`new`](Self::new), for consumers already behind a trait object,
    /// e.g. `Arc::downgrade(&arc_dyn_consumer)`.
    pub fn with_consumer<T>(
        config: SignalingConfig,
        transport: T,
        consumer: Weak<dyn SignalingConsumer>,
    ) -> Self
    where
        T: Transport,
    {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);

        let orchestrator = Orchestrator {
            address: config.address().to_string(),
            policy: config.reconnect(),
            transport,
            consumer,
            state: state_tx,
            events,
            attempts: 0,
            reconnect: None,
        };
        tokio::spawn(orchestrator.run(commands_rx, events_rx));

        Self { commands, state }
    }

    /// Client over [`WebSocketTransport`].
    pub fn websocket<C>(config: SignalingConfig, consumer: &Arc<C>) -> Self
    where
        C: SignalingConsumer + 'static,
    {
        Self::new(config, WebSocketTransport::new(), consumer)
    }

    /// Start connecting. A no-op while already connecting or connected.
    pub fn connect(&self) -> Result<(), SignalingError> {
        self.command(Command::Connect)
    }

    /// Encode and send a signal.
    ///
    /// Nothing is queued across reconnects: if the connection is not open when
    /// the frame reaches the transport, it is dropped.
    pub fn send(&self, signal: impl Into<Signal>) -> Result<(), SignalingError> {
        let text = encode(&signal.into())?.to_text()?;
        self.command(Command::Send(text))
    }

    pub fn send_description(&self, description: &SessionDescription) -> Result<(), SignalingError> {
        self.send(description.clone())
    }

    pub fn send_candidate(&self, candidate: &IceCandidate) -> Result<(), SignalingError> {
        self.send(candidate.clone())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the client reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<(), SignalingError> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| SignalingError::Shutdown)
    }

    /// Cancel any pending reconnect, close the connection and stop the
    /// orchestrator. No notifications are delivered afterwards.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    fn command(&self, command: Command) -> Result<(), SignalingError> {
        self.commands
            .send(command)
            .map_err(|_| SignalingError::Shutdown)
    }
}

struct Orchestrator<T> {
    address: String,
    policy: ReconnectPolicy,
    transport: T,
    consumer: Weak<dyn SignalingConsumer>,
    state: watch::Sender<ConnectionState>,
    events: EventSink,
    /// Consecutive retries since the last successful open.
    attempts: u32,
    /// The single pending retry, if any.
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl<T: Transport> Orchestrator<T> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect) => {
                        // Only a connect that actually starts an attempt begins a fresh round.
                        if self.current() == ConnectionState::Disconnected {
                            self.attempts = 0;
                        }
                        self.connect();
                    }
                    Some(Command::Send(text)) => self.transport.send(text),
                    Some(Command::Shutdown) | None => break,
                },

                Some(event) = events.recv() => self.handle_event(event),

                _ = reconnect_elapsed(&mut self.reconnect) => {
                    self.reconnect = None;
                    info!("Trying to reconnect to signaling server...");
                    self.connect();
                }
            }
        }

        debug!("Shutting down signaling client");
        self.reconnect = None;
        self.transport.close();
        self.state.send_replace(ConnectionState::Disconnected);
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn connect(&mut self) {
        if self.current() != ConnectionState::Disconnected {
            debug!("connect() ignored while {}", self.current());
            return;
        }

        // An explicit connect supersedes a pending retry.
        self.reconnect = None;
        self.state.send_replace(ConnectionState::Connecting);
        self.transport.connect(&self.address, self.events.clone());
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                if self.current() != ConnectionState::Connecting {
                    debug!("Ignoring open while {}", self.current());
                    return;
                }
                self.attempts = 0;
                self.state.send_replace(ConnectionState::Connected);
                self.notify(|c| c.on_connected());
            }

            TransportEvent::Closed(reason) => {
                if self.current() == ConnectionState::Disconnected {
                    debug!("Ignoring close while disconnected: {}", reason);
                    return;
                }
                info!("Disconnected from signaling server: {}", reason);
                self.state.send_replace(ConnectionState::Disconnected);
                self.notify(|c| c.on_disconnected());
                self.schedule_reconnect();
            }

            TransportEvent::Text(text) => self.handle_text(&text),
        }
    }

    fn handle_text(&self, text: &str) {
        let signal = match decode(text).and_then(|envelope| decode_signal(&envelope)) {
            Ok(signal) => signal,
            Err(e) => {
                debug!("Dropping signaling frame: {}", e);
                return;
            }
        };

        match signal {
            Signal::Description(description) => {
                debug!("Received remote {:?} description", description.kind);
                self.notify(|c| c.on_remote_description(description));
            }
            Signal::Candidate(candidate) => {
                debug!("Received remote candidate for mid {}", candidate.sdp_mid);
                self.notify(|c| c.on_remote_candidate(candidate));
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect.is_some() {
            return;
        }

        match self.policy.delay_for(self.attempts) {
            Some(delay) => {
                self.attempts = self.attempts.saturating_add(1);
                info!("Reconnecting in {:?} (attempt {})", delay, self.attempts);
                self.reconnect = Some(Box::pin(sleep(delay)));
            }
            None => warn!(
                "Giving up on signaling server after {} attempts",
                self.attempts
            ),
        }
    }

    fn notify(&self, f: impl FnOnce(&dyn SignalingConsumer)) {
        if let Some(consumer) = self.consumer.upgrade() {
            f(consumer.as_ref());
        }
    }
}

async fn reconnect_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(t) => t.as_mut().await,
        None => pending::<()>().await,
    }
}
