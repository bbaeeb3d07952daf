#![forbid(unsafe_code)]

//! Replacement search for videos that are no longer available.
//!
//! The matcher runs one catalog query per configured suffix (a generic
//! " short film" query and one naming the trusted publisher), then either
//! accepts a trusted-publisher upload with the exact same title on the spot or
//! falls back to the best fuzzy title match within the duration tolerance.

use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::catalog::{Candidate, Catalog};
use crate::duration::bucket;
use crate::text::{normalize, token_sort_ratio};

pub const DEFAULT_SEARCH_SUFFIXES: [&str; 2] = [" short film", " Omeleto"];
pub const DEFAULT_TRUSTED_PUBLISHER: &str = "Omeleto";
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 80.0;
pub const DEFAULT_DURATION_TOLERANCE: u64 = 15;
pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Separates a title from the uploader attribution, e.g. "Title | Omeleto".
const ATTRIBUTION_SEPARATOR: char = '|';

#[derive(Debug, Clone)]
pub struct MatcherSettings {
    pub search_suffixes: Vec<String>,
    pub trusted_publisher: String,
    /// Minimum token-sort similarity (0–100) for a fuzzy match.
    pub similarity_threshold: f64,
    /// Maximum allowed difference in seconds between original and candidate.
    pub duration_tolerance: u64,
    pub max_results: usize,
    /// Sleep after each search query.
    pub pause: Duration,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            search_suffixes: DEFAULT_SEARCH_SUFFIXES
                .iter()
                .map(|suffix| suffix.to_string())
                .collect(),
            trusted_publisher: DEFAULT_TRUSTED_PUBLISHER.to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            duration_tolerance: DEFAULT_DURATION_TOLERANCE,
            max_results: DEFAULT_MAX_RESULTS,
            pause: DEFAULT_PAUSE,
        }
    }
}

/// An accepted replacement for an unavailable video.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub video_id: String,
    pub url: String,
    pub duration: Option<u64>,
    pub trusted_publisher: bool,
}

/// Running best fuzzy match across all suffix queries.
struct BestMatch {
    score: f64,
    candidate: Candidate,
    duration: u64,
    trusted_publisher: bool,
}

pub struct ReplacementMatcher<'a> {
    catalog: &'a dyn Catalog,
    settings: &'a MatcherSettings,
}

impl<'a> ReplacementMatcher<'a> {
    pub fn new(catalog: &'a dyn Catalog, settings: &'a MatcherSettings) -> Self {
        Self { catalog, settings }
    }

    /// Looks for a replacement for a video titled `title` that ran for
    /// `duration` seconds.
    pub fn find_replacement(&self, title: &str, duration: u64) -> Option<Replacement> {
        let settings = self.settings;
        let target_bucket = bucket(duration);
        let normalized_title = normalize(title);
        let publisher = normalize(&settings.trusted_publisher);
        let variants: Vec<String> = settings
            .search_suffixes
            .iter()
            .map(|suffix| normalize(&format!("{title}{suffix}")))
            .collect();

        let mut best: Option<BestMatch> = None;

        for suffix in &settings.search_suffixes {
            let query = format!("{title}{suffix}");
            let candidates = match self.catalog.search(&query, target_bucket, settings.max_results)
            {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!("search for {query:?} failed, skipping: {err}");
                    Vec::new()
                }
            };

            for candidate in candidates {
                let candidate_norm = normalize(&candidate.title);
                let candidate_duration = self.resolve_duration(&candidate);
                let delta = candidate_duration.map(|d| d.abs_diff(duration));

                if is_trusted_exact_match(&normalized_title, &candidate, &candidate_norm, &publisher)
                    && delta.is_some_and(|delta| delta < settings.duration_tolerance)
                {
                    debug!("trusted upload {:?} accepted for {title:?}", candidate.title);
                    return Some(Replacement {
                        url: self.catalog.watch_url(&candidate.id),
                        video_id: candidate.id,
                        duration: candidate_duration,
                        trusted_publisher: true,
                    });
                }

                let score = variants
                    .iter()
                    .map(|variant| token_sort_ratio(&candidate_norm, variant))
                    .fold(0.0, f64::max);
                if score < settings.similarity_threshold {
                    debug!("{:?} scored {score:.1}, below threshold", candidate.title);
                    continue;
                }
                let (Some(candidate_duration), Some(delta)) = (candidate_duration, delta) else {
                    debug!("{:?} has no known duration", candidate.title);
                    continue;
                };
                if delta > settings.duration_tolerance {
                    debug!("{:?} is {delta}s off", candidate.title);
                    continue;
                }

                if best.as_ref().is_none_or(|current| score > current.score) {
                    best = Some(BestMatch {
                        score,
                        trusted_publisher: candidate_norm.contains(&publisher),
                        candidate,
                        duration: candidate_duration,
                    });
                }
            }

            if !settings.pause.is_zero() {
                thread::sleep(settings.pause);
            }
        }

        best.map(|best| Replacement {
            url: self.catalog.watch_url(&best.candidate.id),
            video_id: best.candidate.id,
            duration: Some(best.duration),
            trusted_publisher: best.trusted_publisher,
        })
    }

    /// Uses the duration attached to the search hit, asking the catalog only
    /// when the hit came back without one.
    fn resolve_duration(&self, candidate: &Candidate) -> Option<u64> {
        if candidate.duration.is_some() {
            return candidate.duration;
        }
        match self.catalog.duration_of(&candidate.id) {
            Ok(duration) => duration,
            Err(err) => {
                warn!("duration lookup for {} failed: {err}", candidate.id);
                None
            }
        }
    }
}

/// True when the candidate is the publisher's own upload of exactly this
/// title, e.g. "The Letter | Omeleto" for "The Letter".
fn is_trusted_exact_match(
    normalized_title: &str,
    candidate: &Candidate,
    candidate_norm: &str,
    publisher: &str,
) -> bool {
    let Some(stripped) = strip_attribution(&candidate.title) else {
        return false;
    };
    !publisher.is_empty()
        && normalize(stripped) == normalized_title
        && candidate_norm.contains(publisher)
}

/// Drops the trailing " | Publisher" segment. `None` when the title carries
/// no attribution separator.
fn strip_attribution(title: &str) -> Option<&str> {
    title
        .split_once(ATTRIBUTION_SEPARATOR)
        .map(|(head, _)| head.trim_end())
}
