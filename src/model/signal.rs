//! Handshake values exchanged through the relay
//!
//! These are produced and consumed by the negotiation layer unmodified; the
//! signaling client only carries them between peers.

use serde::{Deserialize, Serialize};

/// Whether a session description proposes or accepts a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A session description as it travels inside an `sdp` envelope.
///
/// Serialises as `{"type": "offer" | "answer", "sdp": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One connectivity candidate for a media section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: String,
    pub sdp_m_line_index: u32,
}

/// A decoded inbound message, or an outbound message before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Description(SessionDescription),
    Candidate(IceCandidate),
}

impl From<SessionDescription> for Signal {
    fn from(d: SessionDescription) -> Self {
        Signal::Description(d)
    }
}

impl From<IceCandidate> for Signal {
    fn from(c: IceCandidate) -> Self {
        Signal::Candidate(c)
    }
}
