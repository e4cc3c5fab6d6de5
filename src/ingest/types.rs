// src/ingest/types.rs
use crate::error::FetchError;

/// One listing entry. `id` is the canonical absolute URL of the deal.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub media_ref: String, // absolute image URL
    pub description: Option<String>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, title: impl Into<String>, media_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            media_ref: media_ref.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Produces the current listing, newest first.
///
/// Implementations must return the whole batch or an error, never a truncated
/// list: a short batch could move the cursor past unseen items.
#[async_trait::async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Candidate>, FetchError>;
    fn name(&self) -> &'static str;
}
