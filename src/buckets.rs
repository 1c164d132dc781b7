//! Hourly histogram of record creation times for the chart series.

use chrono::{DateTime, Utc};

use crate::model::Timestamped;

const SECS_PER_HOUR: i64 = 3600;

/// Spans longer than this (about ten years) are almost always a placeholder
/// timestamp rather than real activity.
pub const LARGE_SPAN_HOURS: usize = 24 * 366 * 10;

/// One hour-wide slot of the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub hour_start: DateTime<Utc>,
    pub count: usize,
}

/// Hours since the Unix epoch, floored (also for pre-1970 instants).
pub fn epoch_hour(at: DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(SECS_PER_HOUR)
}

/// Start of the hour containing `at`.
pub fn floor_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    hour_start(epoch_hour(at))
}

fn hour_start(epoch_hour: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(epoch_hour * SECS_PER_HOUR, 0).unwrap_or_default()
}

/// Contiguous hourly counts from the earliest to the latest record.
///
/// Buckets are ordered chronologically and gaps are zero-filled. The span is
/// measured between the floored first and last hours, so it is always a whole
/// number of hours and a sub-hour spread of records yields a single bucket.
pub fn bucketize<T: Timestamped>(records: &[T]) -> Vec<Bucket> {
    let hours: Vec<i64> = records.iter().map(|r| epoch_hour(r.created())).collect();
    let (Some(&first), Some(&last)) = (hours.iter().min(), hours.iter().max()) else {
        return Vec::new();
    };

    let span = (last - first) as usize;
    if span >= LARGE_SPAN_HOURS {
        tracing::warn!(
            buckets = span + 1,
            first = %hour_start(first),
            last = %hour_start(last),
            "Chart spans an unusually long range"
        );
    }
    let mut buckets: Vec<Bucket> = (0..=span as i64)
        .map(|offset| Bucket {
            hour_start: hour_start(first + offset),
            count: 0,
        })
        .collect();

    for hour in hours {
        buckets[(hour - first) as usize].count += 1;
    }
    buckets
}

/// Number of buckets [`bucketize`] would produce, without allocating them.
pub fn bucket_count<T: Timestamped>(records: &[T]) -> usize {
    let hours = records.iter().map(|r| epoch_hour(r.created()));
    match (hours.clone().min(), hours.max()) {
        (Some(first), Some(last)) => (last - first) as usize + 1,
        _ => 0,
    }
}

/// Sum of all bucket counts.
pub fn total(buckets: &[Bucket]) -> usize {
    buckets.iter().map(|b| b.count).sum()
}
