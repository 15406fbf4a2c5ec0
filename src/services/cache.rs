use async_trait::async_trait;
use std::time::Duration;

use crate::models::PhotoRecord;
use crate::services::appwrite::{AppwriteError, PhotoSource};

/// In-memory TTL cache in front of a photo source
///
/// Only enrichment data goes through here. Exclusion inputs (signals, blocks) are never
/// cached, since a stale exclusion set would re-show rejected profiles.
pub struct CachedPhotoSource<S> {
    inner: S,
    cache: moka::future::Cache<String, Vec<PhotoRecord>>,
}

impl<S: PhotoSource> CachedPhotoSource<S> {
    /// Create a new cache with the given capacity and time-to-live
    pub fn new(inner: S, max_entries: u64, ttl: Duration) -> Self {
        let cache = moka::future::CacheBuilder::new(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl<S: PhotoSource> PhotoSource for CachedPhotoSource<S> {
    async fn photos_for(&self, user_id: &str) -> Result<Vec<PhotoRecord>, AppwriteError> {
        if let Some(photos) = self.cache.get(user_id).await {
            tracing::trace!("Photo cache hit: {}", user_id);
            return Ok(photos);
        }

        tracing::trace!("Photo cache miss: {}", user_id);
        let photos = self.inner.photos_for(user_id).await?;
        self.cache.insert(user_id.to_string(), photos.clone()).await;
        Ok(photos)
    }
}
