// src/events/history.rs - Time-bucketed temperature history for charts
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::Sample;

/// One averaged point of the temperature chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub time: DateTime<Utc>,
    pub temperature: f64,
}

/// Average `samples` into `points` equal buckets spanning `[start, end)`.
///
/// Each non-empty bucket yields one point stamped at the mean time of its
/// samples; empty buckets are skipped rather than interpolated.
pub fn bucket_average(
    samples: &[Sample],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    points: usize,
) -> Vec<HistoryPoint> {
    let span_ms = (end - start).num_milliseconds();
    if points == 0 || span_ms <= 0 {
        return Vec::new();
    }

    // (temperature sum, offset sum in ms, count)
    let mut buckets = vec![(0.0f64, 0i64, 0i64); points];
    for sample in samples {
        if sample.timestamp < start || sample.timestamp >= end {
            continue;
        }
        let offset = (sample.timestamp - start).num_milliseconds();
        let index = ((offset as i128 * points as i128) / span_ms as i128) as usize;
        let bucket = &mut buckets[index.min(points - 1)];
        bucket.0 += sample.temperature;
        bucket.1 += offset;
        bucket.2 += 1;
    }

    buckets
        .into_iter()
        .filter(|(_, _, count)| *count > 0)
        .map(|(sum, offsets, count)| HistoryPoint {
            time: start + Duration::milliseconds(offsets / count),
            temperature: sum / count as f64,
        })
        .collect()
}
