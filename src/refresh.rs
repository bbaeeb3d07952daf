#![forbid(unsafe_code)]

//! Drives a refresh run: coalesces identical records into groups, probes each
//! group's URL once, searches for replacements where needed and records every
//! decision in the change report.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::catalog::Catalog;
use crate::dataset::{Record, VideoStatus, extract_video_id};
use crate::liveness::{Availability, LivenessCheck};
use crate::matcher::{MatcherSettings, Replacement, ReplacementMatcher};

const PROGRESS_TITLE_CHARS: usize = 45;

/// Identity under which records share one lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub title: String,
    pub url: String,
    pub duration: u64,
}

/// Records that share a [`GroupKey`], as indices into the record list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub key: GroupKey,
    pub members: Vec<usize>,
}

/// Groups records by `(title, url, duration)`, in order of first occurrence.
pub fn group_records(records: &[Record]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut positions: HashMap<GroupKey, usize> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        let key = GroupKey {
            title: record.title().to_string(),
            url: record.url().to_string(),
            duration: record.duration(),
        };
        match positions.get(&key) {
            Some(&position) => groups[position].members.push(index),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push(Group {
                    key,
                    members: vec![index],
                });
            }
        }
    }
    groups
}

/// One line of the change report. Field names follow the report format
/// downstream tooling already reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub title: String,
    pub old_url: String,
    pub new_url: String,
    pub video_status: VideoStatus,
    pub occurrences: usize,
    pub question_ids: Vec<Value>,
    pub length_difference: Option<u64>,
    #[serde(rename = "is_from_omeleto")]
    pub trusted_publisher: bool,
}

/// How to treat groups whose URL could not be probed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LivenessMode {
    /// Treat "could not check" as unavailable.
    #[default]
    Compatible,
    /// Leave unchecked groups untouched and out of the report.
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub groups: usize,
    pub live: usize,
    pub replaced: usize,
    pub unavailable: usize,
    pub unchecked: usize,
    /// Groups for which the matcher actually ran.
    pub searched: usize,
}

pub struct Refresher<'a> {
    liveness: &'a dyn LivenessCheck,
    catalog: Option<&'a dyn Catalog>,
    settings: &'a MatcherSettings,
    mode: LivenessMode,
}

impl<'a> Refresher<'a> {
    /// `catalog` is `None` when no catalog access is configured; replacement
    /// search is then skipped for the whole run.
    pub fn new(
        liveness: &'a dyn LivenessCheck,
        catalog: Option<&'a dyn Catalog>,
        settings: &'a MatcherSettings,
    ) -> Self {
        Self {
            liveness,
            catalog,
            settings,
            mode: LivenessMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: LivenessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Processes every group sequentially, mutating `records` in place, and
    /// returns the report plus run counters.
    pub fn run(&self, records: &mut [Record]) -> (Vec<ReportEntry>, RefreshSummary) {
        let groups = group_records(records);
        let mut summary = RefreshSummary {
            groups: groups.len(),
            ..RefreshSummary::default()
        };
        let mut report = Vec::new();
        info!(
            "checking {} record(s) in {} group(s)",
            records.len(),
            groups.len()
        );

        for group in &groups {
            let GroupKey {
                title,
                url,
                duration,
            } = &group.key;

            match self.liveness.availability(url) {
                Availability::Live => {
                    debug!("still live: {url}");
                    summary.live += 1;
                    continue;
                }
                Availability::Unchecked(reason) if self.mode == LivenessMode::Strict => {
                    warn!("could not check {url} ({reason}); leaving it untouched");
                    summary.unchecked += 1;
                    continue;
                }
                Availability::Unchecked(_) | Availability::Unavailable => {}
            }

            let replacement = self.search(title, url, *duration);
            if self.catalog.is_some() {
                summary.searched += 1;
            }
            let entry = apply_decision(records, group, replacement);
            match entry.video_status {
                VideoStatus::Replaced => {
                    summary.replaced += 1;
                    println!("[REPLACED] {}…", progress_title(title));
                }
                VideoStatus::Unavailable => {
                    summary.unavailable += 1;
                    println!("[UNAVAILABLE] {}…", progress_title(title));
                }
            }
            report.push(entry);
        }

        (report, summary)
    }

    fn search(&self, title: &str, url: &str, duration: u64) -> Option<Replacement> {
        let catalog = self.catalog?;
        match extract_video_id(url) {
            Some(id) => debug!("searching replacement for {id} ({title:?})"),
            None => debug!("unrecognized url form {url:?}; searching by title anyway"),
        }
        ReplacementMatcher::new(catalog, self.settings).find_replacement(title, duration)
    }
}

/// Writes one decision back into every member record and builds the matching
/// report entry.
fn apply_decision(
    records: &mut [Record],
    group: &Group,
    replacement: Option<Replacement>,
) -> ReportEntry {
    let GroupKey {
        title,
        url,
        duration,
    } = &group.key;
    let question_ids: Vec<Value> = group
        .members
        .iter()
        .map(|&index| records[index].identifier())
        .collect();
    let length_difference = replacement
        .as_ref()
        .and_then(|found| found.duration)
        .map(|candidate| duration.abs_diff(candidate));

    match replacement {
        Some(found) => {
            for &index in &group.members {
                let record = &mut records[index];
                record.set_url(&found.url);
                record.set_status(VideoStatus::Replaced);
                if let Some(seconds) = found.duration {
                    record.set_duration(seconds);
                }
            }
            ReportEntry {
                title: title.clone(),
                old_url: url.clone(),
                new_url: found.url,
                video_status: VideoStatus::Replaced,
                occurrences: group.members.len(),
                question_ids,
                length_difference,
                trusted_publisher: found.trusted_publisher,
            }
        }
        None => {
            for &index in &group.members {
                records[index].set_status(VideoStatus::Unavailable);
            }
            ReportEntry {
                title: title.clone(),
                old_url: url.clone(),
                new_url: String::new(),
                video_status: VideoStatus::Unavailable,
                occurrences: group.members.len(),
                question_ids,
                length_difference,
                trusted_publisher: false,
            }
        }
    }
}

fn progress_title(title: &str) -> String {
    title.chars().take(PROGRESS_TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Candidate, CatalogError};
    use crate::dataset::records_from_value;
    use crate::duration::DurationBucket;
    use serde_json::json;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::time::Duration;

    /// Liveness double: URLs in `live` are live, `unchecked` cannot be probed,
    /// everything else is gone.
    #[derive(Default)]
    struct StubLiveness {
        live: HashSet<String>,
        unchecked: HashSet<String>,
        probes: Cell<usize>,
    }

    impl StubLiveness {
        fn live(urls: &[&str]) -> Self {
            Self {
                live: urls.iter().map(|url| url.to_string()).collect(),
                ..Self::default()
            }
        }
    }

    impl LivenessCheck for StubLiveness {
        fn availability(&self, url: &str) -> Availability {
            self.probes.set(self.probes.get() + 1);
            if self.live.contains(url) {
                Availability::Live
            } else if self.unchecked.contains(url) {
                Availability::Unchecked("missing tool".into())
            } else {
                Availability::Unavailable
            }
        }
    }

    /// Returns the same candidates for every query and counts searches.
    #[derive(Default)]
    struct StubCatalog {
        by_title_prefix: Vec<(String, Vec<Candidate>)>,
        searches: Cell<usize>,
    }

    impl Catalog for StubCatalog {
        fn search(
            &self,
            query: &str,
            _bucket: DurationBucket,
            _max_results: usize,
        ) -> Result<Vec<Candidate>, CatalogError> {
            self.searches.set(self.searches.get() + 1);
            Ok(self
                .by_title_prefix
                .iter()
                .find(|(prefix, _)| query.starts_with(prefix.as_str()))
                .map(|(_, candidates)| candidates.clone())
                .unwrap_or_default())
        }

        fn duration_of(&self, _id: &str) -> Result<Option<u64>, CatalogError> {
            Ok(None)
        }

        fn watch_url(&self, id: &str) -> String {
            format!("https://www.youtube.com/watch?v={id}")
        }
    }

    fn settings() -> MatcherSettings {
        MatcherSettings {
            pause: Duration::ZERO,
            ..MatcherSettings::default()
        }
    }

    fn sample_records() -> Vec<Record> {
        records_from_value(json!([
            {"question_id": "q1", "movie_title": "The Letter", "video_url": "https://youtu.be/dead1", "video_length": 600},
            {"question_id": "q2", "movie_title": "Night Swim", "video_url": "https://youtu.be/live1", "video_length": 300},
            {"question_id": "q3", "movie_title": "The Letter", "video_url": "https://youtu.be/dead1", "video_length": 600, "note": "kept"},
            {"id": 4, "movie_title": "Lost Film", "video_url": "https://example.com/lost", "video_length": 900},
            {"question_id": "q5", "movie_title": "The Letter", "video_url": "https://youtu.be/dead1", "video_length": 601}
        ]))
        .unwrap()
    }

    fn letter_catalog() -> StubCatalog {
        StubCatalog {
            by_title_prefix: vec![(
                "The Letter".to_string(),
                vec![Candidate::new("new1", "The Letter | Omeleto", Some(605))],
            )],
            ..StubCatalog::default()
        }
    }

    #[test]
    fn group_records_preserves_first_occurrence_order() {
        let records = sample_records();
        let groups = group_records(&records);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].members, vec![0, 2]);
        assert_eq!(groups[1].members, vec![1]);
        assert_eq!(groups[2].members, vec![3]);
        assert_eq!(groups[3].members, vec![4]);
        assert_eq!(groups[3].key.duration, 601);
    }

    #[test]
    fn replaced_and_unavailable_groups_update_every_member() {
        let mut records = sample_records();
        let original = records.clone();
        let liveness = StubLiveness::live(&["https://youtu.be/live1"]);
        let catalog = letter_catalog();
        let settings = settings();
        let refresher = Refresher::new(&liveness, Some(&catalog), &settings);

        let (report, summary) = refresher.run(&mut records);

        assert_eq!(liveness.probes.get(), 4);
        assert_eq!(
            summary,
            RefreshSummary {
                groups: 4,
                live: 1,
                replaced: 2,
                unavailable: 1,
                unchecked: 0,
                searched: 3,
            }
        );

        let first = &report[0];
        assert_eq!(first.video_status, VideoStatus::Replaced);
        assert_eq!(first.new_url, "https://www.youtube.com/watch?v=new1");
        assert_eq!(first.occurrences, 2);
        assert_eq!(first.question_ids, vec![json!("q1"), json!("q3")]);
        assert_eq!(first.length_difference, Some(5));
        assert!(first.trusted_publisher);
        for index in [0, 2] {
            assert_eq!(records[index].status(), Some("replaced"));
            assert_eq!(records[index].url(), first.new_url);
            assert_eq!(records[index].duration(), 605);
        }

        // The live record is untouched.
        assert_eq!(records[1], original[1]);

        let lost = &report[1];
        assert_eq!(lost.title, "Lost Film");
        assert_eq!(lost.video_status, VideoStatus::Unavailable);
        assert_eq!(lost.new_url, "");
        assert_eq!(lost.length_difference, None);
        assert_eq!(lost.question_ids, vec![json!(4)]);
        assert_eq!(records[3].status(), Some("unavailable"));
        assert_eq!(records[3].url(), "https://example.com/lost");

        // Same title and URL but a different duration is its own group.
        let third = &report[2];
        assert_eq!(third.question_ids, vec![json!("q5")]);
        assert_eq!(third.length_difference, Some(4));
    }

    #[test]
    fn occurrences_and_live_groups_account_for_every_record() {
        let mut records = sample_records();
        let total = records.len();
        let liveness = StubLiveness::live(&["https://youtu.be/live1"]);
        let catalog = letter_catalog();
        let settings = settings();
        let (report, summary) =
            Refresher::new(&liveness, Some(&catalog), &settings).run(&mut records);

        let reported: usize = report.iter().map(|entry| entry.occurrences).sum();
        let live_records = 1;
        assert_eq!(reported + live_records, total);
        assert_eq!(report.len() + summary.live, summary.groups);
    }

    #[test]
    fn without_catalog_everything_dead_is_unavailable() {
        let mut records = sample_records();
        let liveness = StubLiveness::live(&["https://youtu.be/live1"]);
        let settings = settings();
        let (report, summary) = Refresher::new(&liveness, None, &settings).run(&mut records);

        assert_eq!(summary.searched, 0);
        assert_eq!(summary.replaced, 0);
        assert_eq!(report.len(), 3);
        for entry in &report {
            assert_eq!(entry.video_status, VideoStatus::Unavailable);
            assert_eq!(entry.length_difference, None);
            assert!(!entry.trusted_publisher);
        }
        assert_eq!(records[0].url(), "https://youtu.be/dead1");
        assert_eq!(records[0].duration(), 600);
    }

    #[test]
    fn all_live_produces_empty_report_and_untouched_records() {
        let mut records = sample_records();
        let original = records.clone();
        let liveness = StubLiveness::live(&[
            "https://youtu.be/dead1",
            "https://youtu.be/live1",
            "https://example.com/lost",
        ]);
        let catalog = letter_catalog();
        let settings = settings();
        let (report, summary) =
            Refresher::new(&liveness, Some(&catalog), &settings).run(&mut records);

        assert!(report.is_empty());
        assert_eq!(summary.live, 4);
        assert_eq!(catalog.searches.get(), 0);
        assert_eq!(records, original);
    }

    #[test]
    fn unchecked_groups_depend_on_mode() {
        let liveness = StubLiveness {
            unchecked: ["https://example.com/lost".to_string()].into_iter().collect(),
            live: [
                "https://youtu.be/dead1".to_string(),
                "https://youtu.be/live1".to_string(),
            ]
            .into_iter()
            .collect(),
            ..StubLiveness::default()
        };
        let settings = settings();

        let mut records = sample_records();
        let (report, summary) = Refresher::new(&liveness, None, &settings).run(&mut records);
        assert_eq!(report.len(), 1);
        assert_eq!(summary.unchecked, 0);
        assert_eq!(records[3].status(), Some("unavailable"));

        let mut records = sample_records();
        let (report, summary) = Refresher::new(&liveness, None, &settings)
            .with_mode(LivenessMode::Strict)
            .run(&mut records);
        assert!(report.is_empty());
        assert_eq!(summary.unchecked, 1);
        assert_eq!(records[3].status(), None);
    }

    #[test]
    fn report_entry_serializes_with_report_keys() {
        let entry = ReportEntry {
            title: "The Letter".into(),
            old_url: "https://youtu.be/dead1".into(),
            new_url: String::new(),
            video_status: VideoStatus::Unavailable,
            occurrences: 1,
            question_ids: vec![Value::Null],
            length_difference: None,
            trusted_publisher: false,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "title": "The Letter",
                "old_url": "https://youtu.be/dead1",
                "new_url": "",
                "video_status": "unavailable",
                "occurrences": 1,
                "question_ids": [null],
                "length_difference": null,
                "is_from_omeleto": false
            })
        );
    }

    #[test]
    fn progress_title_truncates_on_char_boundary() {
        let long = "é".repeat(60);
        assert_eq!(progress_title(&long).chars().count(), 45);
        assert_eq!(progress_title("short"), "short");
    }
}
