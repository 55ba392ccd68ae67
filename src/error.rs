//! Error types for the signaling client

use thiserror::Error;

use crate::model::payload::Tag;

/// Failures while converting between handshake values and wire text.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A value could not be serialised; nothing is sent.
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The text is not a well-formed envelope or payload.
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The second-stage decode was asked for a payload the tag does not carry.
    #[error("envelope tagged {found:?} cannot be decoded as {expected:?}")]
    TagMismatch { expected: Tag, found: Tag },
}

/// Invalid relay server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid relay address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },

    /// `wss` lands here unless the crate is built with the `tls` feature.
    #[error("unsupported relay scheme {0}:// (ws:// always, wss:// needs the `tls` feature)")]
    UnsupportedScheme(String),
}

/// Errors surfaced to callers of [`crate::client::SignalingClient`].
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The orchestrator task has stopped; the client was shut down.
    #[error("signaling client has been shut down")]
    Shutdown,
}

/// Failures converting between the wire values and `str0m` types.
#[derive(Debug, Error)]
pub enum InteropError {
    #[error("expected an {expected:?} description")]
    KindMismatch {
        expected: crate::model::signal::SdpKind,
    },

    #[error("unparsable session description: {0}")]
    Sdp(String),

    #[error("unparsable ice candidate: {0}")]
    Candidate(String),
}
