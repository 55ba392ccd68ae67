//! Conversions between the signaled values and `str0m`
//!
//! The negotiation side of a peer is typically a `str0m::Rtc`. These helpers
//! turn its offers, answers and candidates into the values carried by the
//! signaling client, and back.

use str0m::{
    change::{SdpAnswer, SdpOffer},
    Candidate,
};

use crate::error::InteropError;
use crate::model::signal::{IceCandidate, SdpKind, SessionDescription};

impl From<&SdpOffer> for SessionDescription {
    fn from(offer: &SdpOffer) -> Self {
        SessionDescription::offer(offer.to_sdp_string())
    }
}

impl From<&SdpAnswer> for SessionDescription {
    fn from(answer: &SdpAnswer) -> Self {
        SessionDescription::answer(answer.to_sdp_string())
    }
}

impl SessionDescription {
    pub fn to_offer(&self) -> Result<SdpOffer, InteropError> {
        if self.kind != SdpKind::Offer {
            return Err(InteropError::KindMismatch {
                expected: SdpKind::Offer,
            });
        }
        SdpOffer::from_sdp_string(&self.sdp).map_err(|e| InteropError::Sdp(e.to_string()))
    }

    pub fn to_answer(&self) -> Result<SdpAnswer, InteropError> {
        if self.kind != SdpKind::Answer {
            return Err(InteropError::KindMismatch {
                expected: SdpKind::Answer,
            });
        }
        SdpAnswer::from_sdp_string(&self.sdp).map_err(|e| InteropError::Sdp(e.to_string()))
    }
}

impl IceCandidate {
    /// Wrap a local `str0m` candidate for the media section `sdp_mid`.
    pub fn from_str0m(
        candidate: &Candidate,
        sdp_mid: impl Into<String>,
        sdp_m_line_index: u32,
    ) -> Self {
        IceCandidate {
            candidate: candidate.to_sdp_string(),
            sdp_mid: sdp_mid.into(),
            sdp_m_line_index,
        }
    }

    pub fn to_str0m(&self) -> Result<Candidate, InteropError> {
        Candidate::from_sdp_string(&self.candidate)
            .map_err(|e| InteropError::Candidate(e.to_string()))
    }
}
