//! Wire envelope and the message codec
//!
//! Every frame on the relay connection is a UTF-8 JSON object
//! `{"type": "sdp" | "candidate", "payload": "<json string>"}`. The payload is
//! itself JSON encoded into a string, so decoding happens in two stages: the
//! envelope first, then the payload the tag names.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::model::signal::{IceCandidate, SessionDescription, Signal};

/// Which payload an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Sdp,
    Candidate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub tag: Tag,
    pub payload: String,
}

impl Envelope {
    /// Serialise to the text frame sent on the connection.
    pub fn to_text(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|source| CodecError::Encode {
            what: "envelope",
            source,
        })
    }
}

pub fn encode_description(description: &SessionDescription) -> Result<Envelope, CodecError> {
    let payload = serde_json::to_string(description).map_err(|source| CodecError::Encode {
        what: "session description",
        source,
    })?;

    Ok(Envelope {
        tag: Tag::Sdp,
        payload,
    })
}

pub fn encode_candidate(candidate: &IceCandidate) -> Result<Envelope, CodecError> {
    let payload = serde_json::to_string(candidate).map_err(|source| CodecError::Encode {
        what: "ice candidate",
        source,
    })?;

    Ok(Envelope {
        tag: Tag::Candidate,
        payload,
    })
}

pub fn encode(signal: &Signal) -> Result<Envelope, CodecError> {
    match signal {
        Signal::Description(d) => encode_description(d),
        Signal::Candidate(c) => encode_candidate(c),
    }
}

/// First stage: parse a text frame into an envelope.
///
/// The payload is not inspected, so a structurally valid envelope with a
/// nonsensical payload still decodes here.
pub fn decode(text: &str) -> Result<Envelope, CodecError> {
    serde_json::from_str(text).map_err(|source| CodecError::Decode {
        what: "envelope",
        source,
    })
}

pub fn decode_description(envelope: &Envelope) -> Result<SessionDescription, CodecError> {
    if envelope.tag != Tag::Sdp {
        return Err(CodecError::TagMismatch {
            expected: Tag::Sdp,
            found: envelope.tag,
        });
    }

    serde_json::from_str(&envelope.payload).map_err(|source| CodecError::Decode {
        what: "session description",
        source,
    })
}

pub fn decode_candidate(envelope: &Envelope) -> Result<IceCandidate, CodecError> {
    if envelope.tag != Tag::Candidate {
        return Err(CodecError::TagMismatch {
            expected: Tag::Candidate,
            found: envelope.tag,
        });
    }

    serde_json::from_str(&envelope.payload).map_err(|source| CodecError::Decode {
        what: "ice candidate",
        source,
    })
}

/// Second stage, dispatched on the envelope tag.
pub fn decode_signal(envelope: &Envelope) -> Result<Signal, CodecError> {
    match envelope.tag {
        Tag::Sdp => decode_description(envelope).map(Signal::Description),
        Tag::Candidate => decode_candidate(envelope).map(Signal::Candidate),
    }
}
