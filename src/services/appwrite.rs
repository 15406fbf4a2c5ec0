use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::PhotoRecord;

/// Errors that can occur when interacting with Appwrite
#[derive(Debug, Error)]
pub enum AppwriteError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key or token")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Read-only access to the photo records of a user
///
/// Photos only enrich a discovery result, so callers treat every error as "no photos".
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn photos_for(&self, user_id: &str) -> Result<Vec<PhotoRecord>, AppwriteError>;
}

/// Photo source used when no media backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPhotos;

#[async_trait]
impl PhotoSource for NoPhotos {
    async fn photos_for(&self, _user_id: &str) -> Result<Vec<PhotoRecord>, AppwriteError> {
        Ok(Vec::new())
    }
}

/// Appwrite API client for the photo collection
pub struct AppwriteClient {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    photos_collection: String,
    client: Client,
}

impl AppwriteClient {
    /// Create a new Appwrite client
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        photos_collection: String,
        timeout: Duration,
    ) -> Result<Self, AppwriteError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            project_id,
            database_id,
            photos_collection,
            client,
        })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            self.photos_collection
        )
    }
}

#[async_trait]
impl PhotoSource for AppwriteClient {
    /// List photo documents owned by a user, ordered by position
    async fn photos_for(&self, user_id: &str) -> Result<Vec<PhotoRecord>, AppwriteError> {
        let queries = vec![
            format!("equal(\"userId\", \"{}\")", user_id),
            "orderAsc(\"position\")".to_string(),
        ];
        let queries_json = serde_json::to_string(&queries)
            .map_err(|e| AppwriteError::InvalidResponse(e.to_string()))?;
        let full_url = format!("{}?query={}", self.documents_url(), urlencoding::encode(&queries_json));

        tracing::debug!("Fetching photos for user: {}", user_id);

        let response = self
            .client
            .get(&full_url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppwriteError::Unauthorized);
        }
        if !status.is_success() {
            return Err(AppwriteError::ApiError(format!(
                "Failed to fetch photos: {}",
                status
            )));
        }

        let json: Value = response.json().await?;

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| AppwriteError::InvalidResponse("Missing documents array".into()))?;

        let mut photos: Vec<PhotoRecord> = documents
            .iter()
            .filter_map(|doc| {
                let data = doc.get("data").unwrap_or(doc);
                serde_json::from_value(data.clone()).ok()
            })
            .filter(|p: &PhotoRecord| p.user_id == user_id)
            .collect();
        photos.sort_by_key(|p| p.position);

        Ok(photos)
    }
}
