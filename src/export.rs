use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::{
    model::{Record, RecordKind},
    traits::Clock,
};

/// Column names of [`ExportRow`], in field order.
pub const EXPORT_HEADERS: [&str; 8] = [
    "kind",
    "id",
    "experiment_id",
    "status",
    "created",
    "updated",
    "data_path",
    "tags",
];

/// One CSV line; tags are written as a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub kind: &'static str,
    pub id: String,
    pub experiment_id: String,
    pub status: String,
    pub created: String,
    pub updated: String,
    pub data_path: String,
    pub tags: String,
}

impl ExportRow {
    pub fn from_record<R: Record>(record: &R) -> Result<Self> {
        let tags = serde_json::to_string(record.tags())
            .with_context(|| format!("Failed to encode tags of {}", record.id()))?;
        Ok(Self {
            kind: R::KIND.label(),
            id: record.id().to_string(),
            experiment_id: record.experiment_id().unwrap_or_default().to_string(),
            status: record.status().to_string(),
            created: record.created().to_rfc3339_opts(SecondsFormat::Secs, true),
            updated: record.updated().to_rfc3339_opts(SecondsFormat::Secs, true),
            data_path: record.data_path().to_string(),
            tags,
        })
    }
}

/// `idm_monitor_<kind>_<YYYYmmdd_HHMMSS>.csv`
pub fn export_filename(kind: RecordKind, at: DateTime<Utc>) -> String {
    format!(
        "idm_monitor_{}_{}.csv",
        kind.plural(),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Write `records` as CSV, header included, in the given order.
pub fn write_csv<R: Record, W: io::Write>(records: &[R], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    // serialize() only emits the header alongside the first row.
    if records.is_empty() {
        wtr.write_record(EXPORT_HEADERS)
            .context("Failed to write CSV header")?;
    }
    for record in records {
        wtr.serialize(ExportRow::from_record(record)?)
            .context("Failed to serialize record")?;
    }
    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

/// Export `records` into a timestamped file inside `output_dir`.
///
/// Returns the path of the created file.
pub async fn export_to_csv<R, C>(records: Vec<R>, output_dir: &Path, clock: &C) -> Result<PathBuf>
where
    R: Record + Send + 'static,
    C: Clock + ?Sized,
{
    let output_path = output_dir.join(export_filename(R::KIND, clock.now_utc()));
    let path = output_path.clone();
    let count = records.len();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv(&records, io::BufWriter::new(file))
    })
    .await
    .context("CSV export task failed")??;

    tracing::info!(
        "Exported {} {} to {}",
        count,
        R::KIND.plural(),
        output_path.display()
    );
    Ok(output_path)
}
