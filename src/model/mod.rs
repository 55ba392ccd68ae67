//! Data models for the signaling channel
//!
//! This module contains the handshake values carried between peers, the
//! wire envelope that wraps them, and the connection state of the client.

pub mod payload;
pub mod signal;
pub mod state;
