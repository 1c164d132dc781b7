//! Table ordering: a list of sortable columns with exactly one active.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};

use crate::{
    error::SortError,
    model::{Record, Status},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Status,
    ExperimentId,
    Created,
    Updated,
    DataPath,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Id,
        Column::Status,
        Column::ExperimentId,
        Column::Created,
        Column::Updated,
        Column::DataPath,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Status => "status",
            Column::ExperimentId => "experiment_id",
            Column::Created => "created",
            Column::Updated => "updated",
            Column::DataPath => "data_path",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = SortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Column::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| SortError::UnknownColumnName(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    pub column: Column,
    pub direction: SortDirection,
    pub active: bool,
}

/// Sortable columns of one table. Exactly one column is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    columns: Vec<SortColumn>,
}

impl SortSpec {
    pub fn new(
        columns: &[Column],
        active: Column,
        direction: SortDirection,
    ) -> Result<Self, SortError> {
        if columns.is_empty() {
            return Err(SortError::NoColumns);
        }
        if !columns.contains(&active) {
            return Err(SortError::UnknownColumn(active));
        }
        let columns = columns
            .iter()
            .map(|&column| SortColumn {
                column,
                direction,
                active: column == active,
            })
            .collect();
        Ok(Self { columns })
    }

    /// Experiment table, newest first.
    pub fn experiments() -> Self {
        Self {
            columns: Self::defaults(&[
                Column::Id,
                Column::Status,
                Column::DataPath,
                Column::Created,
                Column::Updated,
            ]),
        }
    }

    /// Simulation table, newest first.
    pub fn simulations() -> Self {
        Self {
            columns: Self::defaults(&[
                Column::Id,
                Column::Status,
                Column::ExperimentId,
                Column::DataPath,
                Column::Created,
                Column::Updated,
            ]),
        }
    }

    fn defaults(columns: &[Column]) -> Vec<SortColumn> {
        columns
            .iter()
            .map(|&column| SortColumn {
                column,
                direction: SortDirection::Desc,
                active: column == Column::Created,
            })
            .collect()
    }

    pub fn columns(&self) -> &[SortColumn] {
        &self.columns
    }

    pub fn active(&self) -> &SortColumn {
        self.columns
            .iter()
            .find(|c| c.active)
            .expect("sort spec always has exactly one active column")
    }

    /// Header click: make `column` the only active one and flip its
    /// direction. Returns the new direction.
    pub fn click(&mut self, column: Column) -> Result<SortDirection, SortError> {
        if !self.columns.iter().any(|c| c.column == column) {
            return Err(SortError::UnknownColumn(column));
        }
        let mut direction = SortDirection::default();
        for entry in &mut self.columns {
            entry.active = entry.column == column;
            if entry.active {
                entry.direction = entry.direction.toggled();
                direction = entry.direction;
            }
        }
        Ok(direction)
    }
}

/// Comparable value of one cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnValue<'a> {
    Missing,
    Text(&'a str),
    Status(Status),
    Time(DateTime<Utc>),
}

pub fn column_value<R: Record>(record: &R, column: Column) -> ColumnValue<'_> {
    match column {
        Column::Id => ColumnValue::Text(record.id()),
        Column::Status => ColumnValue::Status(record.status()),
        Column::ExperimentId => record
            .experiment_id()
            .map_or(ColumnValue::Missing, ColumnValue::Text),
        Column::Created => ColumnValue::Time(record.created()),
        Column::Updated => ColumnValue::Time(record.updated()),
        Column::DataPath => ColumnValue::Text(record.data_path()),
    }
}

/// Rows ordered by the active column.
///
/// Always a stable ascending sort; descending is that result reversed, so
/// ties come out in reverse input order.
pub fn sort<'a, R: Record>(records: &'a [R], spec: &SortSpec) -> Vec<&'a R> {
    let active = spec.active();
    let mut rows: Vec<&R> = records.iter().collect();
    rows.sort_by(|a, b| column_value(*a, active.column).cmp(&column_value(*b, active.column)));
    if active.direction == SortDirection::Desc {
        rows.reverse();
    }
    rows
}
