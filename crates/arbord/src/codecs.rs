//! Media type to codec lookup.

use std::sync::Arc;

use arbor_spi::{JsonCodec, MediaType, ResourceCodec};
use dashmap::DashMap;

/// Registry of codecs keyed by the media type they produce.
///
/// `application/json` is always available.
pub struct CodecManager {
    codecs: DashMap<MediaType, Arc<dyn ResourceCodec>>,
}

impl CodecManager {
    /// Creates a manager holding the JSON codec.
    #[must_use]
    pub fn new() -> Self {
        let manager = Self {
            codecs: DashMap::new(),
        };
        manager.register(Arc::new(JsonCodec));
        manager
    }

    /// Registers `codec`, replacing any codec for the same media type.
    pub fn register(&self, codec: Arc<dyn ResourceCodec>) {
        self.codecs.insert(codec.media_type(), codec);
    }

    /// Codec for `media_type`, if one is registered.
    #[must_use]
    pub fn get(&self, media_type: &MediaType) -> Option<Arc<dyn ResourceCodec>> {
        self.codecs
            .get(media_type)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` when `media_type` can be produced.
    #[must_use]
    pub fn supports(&self, media_type: &MediaType) -> bool {
        self.codecs.contains_key(media_type)
    }
}

impl Default for CodecManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodecManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let media_types: Vec<String> = self
            .codecs
            .iter()
            .map(|entry| entry.key().to_string())
            .collect();
        formatter
            .debug_struct("CodecManager")
            .field("media_types", &media_types)
            .finish()
    }
}
