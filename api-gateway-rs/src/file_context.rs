//! File context aggregation
//!
//! Resolves the files attached to a command into delimited text blocks.
//! Only files owned by the requesting user with a text-representable media
//! type are included. A failed lookup excludes that file and never fails the
//! batch.

use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use shared_types::{FileContext, FileMetadata};
use tracing::{debug, info, warn};

use crate::collaborators::FileRepository;

const TEXT_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/yaml",
    "application/x-yaml",
    "application/toml",
    "application/javascript",
    "application/x-javascript",
    "application/typescript",
    "application/x-sh",
    "application/x-python",
    "application/sql",
    "application/graphql",
];

/// Whether a media type can be forwarded as text
pub fn is_text_mime_type(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.starts_with("text/")
        || TEXT_MIME_TYPES.contains(&essence.as_str())
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
}

#[derive(Clone)]
pub struct FileContextAggregator {
    repository: Arc<dyn FileRepository>,
}

impl FileContextAggregator {
    pub fn new(repository: Arc<dyn FileRepository>) -> Self {
        Self { repository }
    }

    /// Loads the owned, text-representable files among `file_ids`.
    ///
    /// Output order follows the order in which files survived filtering,
    /// not completion order of the fetches.
    pub async fn load_file_contexts(&self, user_id: &str, file_ids: &[String]) -> Vec<FileContext> {
        if file_ids.is_empty() {
            return Vec::new();
        }

        let lookups = join_all(file_ids.iter().map(|id| self.fetch_metadata(id))).await;
        let eligible: Vec<FileMetadata> = lookups
            .into_iter()
            .flatten()
            .filter(|metadata| self.is_eligible(user_id, metadata))
            .collect();

        let contents = join_all(eligible.iter().map(|metadata| self.fetch_content(metadata))).await;
        let contexts: Vec<FileContext> = contents.into_iter().flatten().collect();

        debug!(
            user_id = %user_id,
            requested = file_ids.len(),
            loaded = contexts.len(),
            "File contexts loaded"
        );
        contexts
    }

    async fn fetch_metadata(&self, file_id: &str) -> Option<FileMetadata> {
        match self.repository.find_by_id(file_id).await {
            Ok(Some(metadata)) => Some(metadata),
            Ok(None) => {
                info!(file_id = %file_id, "File not found, skipping");
                None
            }
            Err(err) => {
                counter!("gateway.file_context.failures", 1, "stage" => "metadata");
                warn!(file_id = %file_id, error = %err, "Failed to load file metadata, skipping");
                None
            }
        }
    }

    fn is_eligible(&self, user_id: &str, metadata: &FileMetadata) -> bool {
        if metadata.user_id != user_id {
            info!(file_id = %metadata.id, "File not owned by requesting user, skipping");
            return false;
        }
        if !is_text_mime_type(&metadata.mime_type) {
            info!(file_id = %metadata.id, mime_type = %metadata.mime_type, "Unsupported file type, skipping");
            return false;
        }
        true
    }

    async fn fetch_content(&self, metadata: &FileMetadata) -> Option<FileContext> {
        match self.repository.get_content(&metadata.id).await {
            Ok(Some(content)) => Some(FileContext {
                file_id: metadata.id.clone(),
                filename: metadata.filename.clone(),
                content,
            }),
            Ok(None) => {
                info!(file_id = %metadata.id, "File content missing, skipping");
                None
            }
            Err(err) => {
                counter!("gateway.file_context.failures", 1, "stage" => "content");
                warn!(file_id = %metadata.id, error = %err, "Failed to load file content, skipping");
                None
            }
        }
    }
}
