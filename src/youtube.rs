#![forbid(unsafe_code)]

//! Blocking client for the handful of YouTube Data API v3 endpoints the
//! refresher needs: `search.list` to find candidates and `videos.list` to
//! learn their durations.
//!
//! Each `search.list` call costs 100 quota units, `videos.list` costs 1, so
//! durations for a whole result page are fetched in one batched request.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::catalog::{Candidate, Catalog, CatalogError};
use crate::duration::{DurationBucket, parse_iso8601_duration};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// `search.list` response, trimmed to the fields we read.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
}

/// `videos.list?part=contentDetails` response.
#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

pub struct YouTubeCatalog {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

impl YouTubeCatalog {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_BASE)
    }

    /// Points the client at a different API root; used to talk to local
    /// fixtures.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build();
        Self {
            agent,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    fn call(&self, request: ureq::Request) -> Result<ureq::Response, CatalogError> {
        request
            .query("key", &self.api_key)
            .call()
            .map_err(classify_ureq_error)
    }

    /// Fetches durations for up to 50 ids in one request. Ids the API does not
    /// return, or returns without a parseable duration, are absent from the map.
    fn durations(&self, ids: &[&str]) -> Result<HashMap<String, u64>, CatalogError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let joined = ids.join(",");
        let request = self
            .agent
            .get(&self.endpoint("videos"))
            .query("part", "contentDetails")
            .query("id", &joined);
        let response: VideosResponse = self.call(request)?.into_json()?;
        Ok(durations_from_response(response))
    }
}

impl Catalog for YouTubeCatalog {
    fn search(
        &self,
        query: &str,
        bucket: DurationBucket,
        max_results: usize,
    ) -> Result<Vec<Candidate>, CatalogError> {
        let max_results = max_results.to_string();
        let request = self
            .agent
            .get(&self.endpoint("search"))
            .query("part", "snippet")
            .query("type", "video")
            .query("q", query)
            .query("videoDuration", bucket.as_str())
            .query("maxResults", &max_results);
        let response: SearchResponse = self.call(request)?.into_json()?;
        let mut candidates = candidates_from_response(response);
        debug!("search {query:?} ({bucket}) returned {} hit(s)", candidates.len());

        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        match self.durations(&ids) {
            Ok(durations) => {
                for candidate in &mut candidates {
                    candidate.duration = durations.get(&candidate.id).copied();
                }
            }
            Err(err) => {
                warn!("duration lookup failed for {query:?}: {err}");
            }
        }
        Ok(candidates)
    }

    fn duration_of(&self, id: &str) -> Result<Option<u64>, CatalogError> {
        Ok(self.durations(&[id])?.get(id).copied())
    }

    fn watch_url(&self, id: &str) -> String {
        watch_url(id)
    }
}

pub fn watch_url(id: &str) -> String {
    format!("{WATCH_URL_PREFIX}{id}")
}

fn candidates_from_response(response: SearchResponse) -> Vec<Candidate> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            // Channels and playlists can leak into results without a videoId.
            let id = item.id.video_id?;
            Some(Candidate::new(id, item.snippet.title, None))
        })
        .collect()
}

fn durations_from_response(response: VideosResponse) -> HashMap<String, u64> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let raw = item.content_details?.duration?;
            let seconds = parse_iso8601_duration(&raw)?;
            Some((item.id, seconds))
        })
        .collect()
}

fn classify_ureq_error(error: ureq::Error) -> CatalogError {
    match error {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_string()
                .ok()
                .and_then(|body| api_error_message(&body))
                .unwrap_or_else(|| "no error message".to_string());
            CatalogError::Status { status, message }
        }
        ureq::Error::Transport(transport) => CatalogError::Transport(transport.to_string()),
    }
}

/// Pulls `error.message` out of a Google API error body.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}
