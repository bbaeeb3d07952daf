#![forbid(unsafe_code)]

//! Seam between the replacement matcher and whatever video catalog it
//! searches. The production implementation lives in [`crate::youtube`]; tests
//! plug in fixed-response doubles.

use thiserror::Error;

use crate::duration::DurationBucket;

/// One search hit. Only lives for the duration of a single matcher run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    /// `None` when the catalog could not tell us how long the video is.
    pub duration: Option<u64>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration: Option<u64>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("catalog request failed: {0}")]
    Transport(String),
    #[error("could not decode catalog response: {0}")]
    Decode(#[from] std::io::Error),
}

/// Search capability handed to the matcher.
pub trait Catalog {
    /// Returns at most `max_results` candidates for `query`, restricted to
    /// videos in `bucket`.
    fn search(
        &self,
        query: &str,
        bucket: DurationBucket,
        max_results: usize,
    ) -> Result<Vec<Candidate>, CatalogError>;

    /// Looks up the duration of a single video.
    fn duration_of(&self, id: &str) -> Result<Option<u64>, CatalogError>;

    /// Public URL a dataset record should point at for `id`.
    fn watch_url(&self, id: &str) -> String;
}
