//! File repository implementations

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared_types::FileMetadata;

use crate::collaborators::{FileRepository, RepositoryError};

/// Reads files from the file service over HTTP.
///
/// `GET {base}/files/{id}` returns metadata, `GET {base}/files/{id}/content`
/// the raw text. A 404 on either reads as absent.
#[derive(Debug, Clone)]
pub struct HttpFileRepository {
    client: Client,
    base_url: String,
}

impl HttpFileRepository {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RepositoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, url: String) -> Result<Option<reqwest::Response>, RepositoryError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(RepositoryError::InvalidResponse(format!("status {} from {}", status, url))),
        }
    }
}

#[async_trait]
impl FileRepository for HttpFileRepository {
    async fn find_by_id(&self, file_id: &str) -> Result<Option<FileMetadata>, RepositoryError> {
        match self.fetch(format!("{}/files/{}", self.base_url, file_id)).await? {
            Some(response) => response
                .json::<FileMetadata>()
                .await
                .map(Some)
                .map_err(|e| RepositoryError::InvalidResponse(e.to_string())),
            None => Ok(None),
        }
    }

    async fn get_content(&self, file_id: &str) -> Result<Option<String>, RepositoryError> {
        match self.fetch(format!("{}/files/{}/content", self.base_url, file_id)).await? {
            Some(response) => response
                .text()
                .await
                .map(Some)
                .map_err(|e| RepositoryError::InvalidResponse(e.to_string())),
            None => Ok(None),
        }
    }
}

/// In-memory files, for local runs and tests
#[derive(Debug, Default)]
pub struct MemoryFileRepository {
    files: RwLock<HashMap<String, (FileMetadata, String)>>,
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<String>>(&self, metadata: FileMetadata, content: S) {
        self.files
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(metadata.id.clone(), (metadata, content.into()));
    }
}

#[async_trait]
impl FileRepository for MemoryFileRepository {
    async fn find_by_id(&self, file_id: &str) -> Result<Option<FileMetadata>, RepositoryError> {
        let files = self.files.read().unwrap_or_else(|p| p.into_inner());
        Ok(files.get(file_id).map(|(metadata, _)| metadata.clone()))
    }

    async fn get_content(&self, file_id: &str) -> Result<Option<String>, RepositoryError> {
        let files = self.files.read().unwrap_or_else(|p| p.into_inner());
        Ok(files.get(file_id).map(|(_, content)| content.clone()))
    }
}
