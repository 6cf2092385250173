//! Boundary for encoding resource state into a negotiated media type.

use bytes::Bytes;
use thiserror::Error;

use crate::{MediaType, RequestContext, ResourceState};

/// Failures reported by codecs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The state could not be encoded.
    #[error("failed to encode {media_type}: {message}")]
    Encode {
        /// Target media type.
        media_type: MediaType,
        /// Codec-specific detail.
        message: String,
    },
    /// The payload could not be decoded.
    #[error("failed to decode {media_type}: {message}")]
    Decode {
        /// Source media type.
        media_type: MediaType,
        /// Codec-specific detail.
        message: String,
    },
}

/// Encodes and decodes [`ResourceState`] for one media type.
pub trait ResourceCodec: Send + Sync {
    /// The media type this codec produces.
    fn media_type(&self) -> MediaType;

    /// Encodes `state`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] when the state cannot be represented.
    fn encode(&self, ctx: &RequestContext, state: &ResourceState) -> Result<Bytes, CodecError>;

    /// Decodes a payload into state.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] when the payload is malformed.
    fn decode(&self, payload: &[u8]) -> Result<ResourceState, CodecError>;
}

/// `application/json` codec backed by `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ResourceCodec for JsonCodec {
    fn media_type(&self) -> MediaType {
        MediaType::json()
    }

    fn encode(&self, _ctx: &RequestContext, state: &ResourceState) -> Result<Bytes, CodecError> {
        serde_json::to_vec(state)
            .map(Bytes::from)
            .map_err(|error| CodecError::Encode {
                media_type: self.media_type(),
                message: error.to_string(),
            })
    }

    fn decode(&self, payload: &[u8]) -> Result<ResourceState, CodecError> {
        serde_json::from_slice(payload).map_err(|error| CodecError::Decode {
            media_type: self.media_type(),
            message: error.to_string(),
        })
    }
}
