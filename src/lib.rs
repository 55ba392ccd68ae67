//! Signaling channel for establishing a direct WebRTC connection
//!
//! Two peers exchange session descriptions and ICE candidates through a relay
//! server. [`SignalingClient`] owns the relay connection, encodes and decodes
//! the handshake messages, keeps reconnecting when the connection drops, and
//! reports everything to a [`SignalingConsumer`].

pub mod client;
pub mod config;
pub mod error;
pub mod interop;
pub mod model;
pub mod reconnect;
pub mod transport;

pub use client::{SignalingClient, SignalingConsumer};
pub use config::SignalingConfig;
pub use error::{CodecError, ConfigError, InteropError, SignalingError};
pub use model::signal::{IceCandidate, SdpKind, SessionDescription, Signal};
pub use model::state::ConnectionState;
pub use reconnect::{ReconnectPolicy, RECONNECT_DELAY};
pub use transport::{Transport, TransportEvent, WebSocketTransport};
