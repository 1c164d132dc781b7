//! Date-range filter and the memoized record selector.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{error::FilterError, model::Timestamped};

/// Inclusive `[start, end]` window on record creation time.
///
/// Both bounds absent means "no filtering". A filter with only one bound is
/// treated the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Filter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Filter {
    pub const fn none() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Bounded filter; rejects `start > end`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::Inverted { start, end });
        }
        Ok(Self {
            start: Some(start),
            end: Some(end),
        })
    }

    /// The window, when both bounds are set.
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.start.zip(self.end)
    }

    pub fn is_active(&self) -> bool {
        self.bounds().is_some()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        match self.bounds() {
            Some((start, end)) => start <= at && at <= end,
            None => true,
        }
    }
}

/// Visible subset of `records` under `filter`.
///
/// Without both bounds the input `Arc` itself is returned, so callers can
/// compare results with [`Arc::ptr_eq`].
pub fn select<R>(records: &Arc<Vec<R>>, filter: &Filter) -> Arc<Vec<R>>
where
    R: Timestamped + Clone,
{
    let Some((start, end)) = filter.bounds() else {
        return Arc::clone(records);
    };
    Arc::new(
        records
            .iter()
            .filter(|r| {
                let created = r.created();
                start <= created && created <= end
            })
            .cloned()
            .collect(),
    )
}

/// [`select`] with a one-entry cache keyed on the records pointer and the
/// filter bounds.
#[derive(Debug)]
pub struct RecordSelector<R> {
    last: Option<Memo<R>>,
}

#[derive(Debug)]
struct Memo<R> {
    // Holding the input keeps its allocation alive, so the pointer comparison
    // can never match a different list that reused the address.
    input: Arc<Vec<R>>,
    filter: Filter,
    output: Arc<Vec<R>>,
}

impl<R> Default for RecordSelector<R> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<R> RecordSelector<R>
where
    R: Timestamped + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, records: &Arc<Vec<R>>, filter: &Filter) -> Arc<Vec<R>> {
        if let Some(memo) = &self.last {
            if Arc::ptr_eq(&memo.input, records) && memo.filter == *filter {
                return Arc::clone(&memo.output);
            }
        }

        let output = select(records, filter);
        tracing::trace!(
            input = records.len(),
            output = output.len(),
            "Recomputed visible records"
        );
        self.last = Some(Memo {
            input: Arc::clone(records),
            filter: *filter,
            output: Arc::clone(&output),
        });
        output
    }

    /// Drop the cached result.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}
