#![forbid(unsafe_code)]

//! Loading and saving the annotation dataset.
//!
//! Records are kept as raw JSON objects so every field we do not know about
//! survives a load/save cycle untouched and in its original order. Only
//! `video_url`, `video_length` and `video_status` are ever written back.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

pub const TITLE_FIELD: &str = "movie_title";
pub const URL_FIELD: &str = "video_url";
pub const LENGTH_FIELD: &str = "video_length";
pub const STATUS_FIELD: &str = "video_status";
const ID_FIELDS: [&str; 2] = ["question_id", "id"];

/// Values stored in `video_status`. An absent status means the record was
/// never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Replaced,
    Unavailable,
}

impl VideoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Replaced => "replaced",
            VideoStatus::Unavailable => "unavailable",
        }
    }
}

/// One annotation entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Missing or null titles read as the empty string.
    pub fn title(&self) -> &str {
        self.str_field(TITLE_FIELD)
    }

    pub fn url(&self) -> &str {
        self.str_field(URL_FIELD)
    }

    /// Seconds, accepting integers, floats (truncated) and numeric strings.
    /// Anything else counts as 0.
    pub fn duration(&self) -> u64 {
        match self.fields.get(LENGTH_FIELD) {
            Some(Value::Number(number)) => number
                .as_u64()
                .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
                .unwrap_or(0),
            Some(Value::String(text)) => text.trim().parse::<u64>().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn status(&self) -> Option<&str> {
        self.fields.get(STATUS_FIELD).and_then(Value::as_str)
    }

    /// `question_id`, falling back to `id`; `Null` when neither is set.
    pub fn identifier(&self) -> Value {
        ID_FIELDS
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .find(|value| is_truthy(value))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set_url(&mut self, url: &str) {
        self.fields
            .insert(URL_FIELD.to_string(), Value::String(url.to_string()));
    }

    pub fn set_duration(&mut self, seconds: u64) {
        self.fields
            .insert(LENGTH_FIELD.to_string(), Value::from(seconds));
    }

    pub fn set_status(&mut self, status: VideoStatus) {
        self.fields.insert(
            STATUS_FIELD.to_string(),
            Value::String(status.as_str().to_string()),
        );
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    fn str_field(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or("")
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64() != Some(0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Reads the dataset, failing when the top level is not an array of objects.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    records_from_value(value).with_context(|| format!("reading records from {}", path.display()))
}

pub fn records_from_value(value: Value) -> Result<Vec<Record>> {
    let Value::Array(items) = value else {
        bail!("the dataset must be a JSON array of objects");
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(Record::new(fields)),
            other => bail!("entry {index} is not an object: {other}"),
        })
        .collect()
}

pub fn records_to_value(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Record::into_value).collect())
}

/// Pretty-prints `data` to a temporary sibling and renames it into place so a
/// crash never leaves a half-written file behind.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, data)
            .with_context(|| format!("serializing {}", path.display()))?;
        writer.write_all(b"\n")?;
        writer
            .flush()
            .with_context(|| format!("writing {}", tmp_path.display()))?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("moving {} into place", path.display()))?;
    Ok(())
}

/// Pulls the catalog id out of `youtu.be/<id>` and `youtube.com/watch?v=<id>`
/// links.
pub fn extract_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if host == "youtu.be" {
        let id = parsed.path().trim_start_matches('/');
        return (!id.is_empty()).then(|| id.to_string());
    }
    if host.contains("youtube") && parsed.path() == "/watch" {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());
    }
    None
}
