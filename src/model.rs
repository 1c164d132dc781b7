//! Records served by the local platform REST API.
//!
//! Experiments and simulations share most of their shape; the [`Record`]
//! trait is what the selector, sorter, bucketizer and exporter work against.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of an experiment or simulation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Created,
    #[serde(alias = "in progress")]
    InProgress,
    Done,
    Canceled,
    Failed,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Created,
        Status::InProgress,
        Status::Done,
        Status::Canceled,
        Status::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::InProgress => "in_progress",
            Status::Done => "done",
            Status::Canceled => "canceled",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(' ', "_");
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

/// Which endpoint a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Experiment,
    Simulation,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Experiment => "experiment",
            RecordKind::Simulation => "simulation",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            RecordKind::Experiment => "experiments",
            RecordKind::Simulation => "simulations",
        }
    }
}

/// Anything with a creation timestamp can be charted.
pub trait Timestamped {
    fn created(&self) -> DateTime<Utc>;
}

impl Timestamped for DateTime<Utc> {
    fn created(&self) -> DateTime<Utc> {
        *self
    }
}

/// Common view over experiments and simulations.
pub trait Record: Timestamped {
    const KIND: RecordKind;

    fn id(&self) -> &str;
    fn status(&self) -> Status;
    fn updated(&self) -> DateTime<Utc>;
    fn data_path(&self) -> &str;
    fn tags(&self) -> &BTreeMap<String, String>;

    /// Parent experiment, for records that have one.
    fn experiment_id(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(rename = "experiment_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub status: Status,
    #[serde(with = "timestamp")]
    pub created: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated: DateTime<Utc>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub data_path: String,
    #[serde(default, deserialize_with = "tags")]
    pub tags: BTreeMap<String, String>,
    /// Simulation counts per status, as reported by the backend.
    #[serde(default, deserialize_with = "progress")]
    pub progress: BTreeMap<String, u64>,
}

impl Experiment {
    /// Number of simulations of this experiment in the given status.
    pub fn progress_count(&self, status: Status) -> u64 {
        self.progress.get(status.as_str()).copied().unwrap_or(0)
    }

    /// One-line progress text shown in the experiment table.
    pub fn progress_label(&self) -> String {
        if self.progress.is_empty() {
            return String::new();
        }
        format!(
            "Done:{} Created:{} In progress:{}",
            self.progress_count(Status::Done),
            self.progress_count(Status::Created),
            self.progress_count(Status::InProgress)
        )
    }
}

impl Timestamped for Experiment {
    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

impl Record for Experiment {
    const KIND: RecordKind = RecordKind::Experiment;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        self.status
    }

    fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    fn data_path(&self) -> &str {
        &self.data_path
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    #[serde(rename = "simulation_uid", alias = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub experiment_id: String,
    #[serde(default)]
    pub status: Status,
    #[serde(with = "timestamp")]
    pub created: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated: DateTime<Utc>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub data_path: String,
    #[serde(default, deserialize_with = "tags")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_details: Option<serde_json::Value>,
}

impl Simulation {
    /// Command line the simulation was launched with, if the backend kept it.
    pub fn command(&self) -> Option<&str> {
        self.extra_details.as_ref()?.get("command")?.as_str()
    }
}

impl Timestamped for Simulation {
    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

impl Record for Simulation {
    const KIND: RecordKind = RecordKind::Simulation;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        self.status
    }

    fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    fn data_path(&self) -> &str {
        &self.data_path
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    fn experiment_id(&self) -> Option<&str> {
        Some(&self.experiment_id)
    }
}

/// Timestamp parsing shared by the wire format and the CLI.
///
/// The backend has emitted RFC 3339, HTTP dates and naive ISO date-times
/// over time; naive values are taken as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    const NAIVE_FORMATS: [&str; 3] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn tags<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProgressWire {
    Map(BTreeMap<String, u64>),
    List(Vec<BTreeMap<String, u64>>),
}

fn progress<'de, D>(deserializer: D) -> Result<BTreeMap<String, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let merged = match Option::<ProgressWire>::deserialize(deserializer)? {
        None => BTreeMap::new(),
        Some(ProgressWire::Map(map)) => map,
        Some(ProgressWire::List(maps)) => {
            let mut merged = BTreeMap::new();
            for (status, count) in maps.into_iter().flatten() {
                *merged.entry(status).or_insert(0) += count;
            }
            merged
        }
    };
    Ok(merged)
}
