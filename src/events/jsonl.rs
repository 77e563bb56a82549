// src/events/jsonl.rs - Append-only JSON-lines recorder
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{EventSink, FaultEvent, Sample, SinkError, TransitionEvent};

const SAMPLES_PREFIX: &str = "samples-";
const TRANSITIONS_FILE: &str = "transitions.jsonl";
const FAULTS_FILE: &str = "faults.jsonl";

/// Writes one JSON object per line under `data_dir`. Samples go to one file
/// per UTC day, so a history query only reads the days it covers.
#[derive(Debug, Clone)]
pub struct JsonLinesRecorder {
    data_dir: PathBuf,
}

impl JsonLinesRecorder {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).await?;
        tracing::info!("Recording events under {}", data_dir.display());
        Ok(Self { data_dir })
    }

    pub fn samples_path(&self, day: NaiveDate) -> PathBuf {
        self.data_dir.join(format!("{}{}.jsonl", SAMPLES_PREFIX, day.format("%Y-%m-%d")))
    }

    pub fn transitions_path(&self) -> PathBuf {
        self.data_dir.join(TRANSITIONS_FILE)
    }

    pub fn faults_path(&self) -> PathBuf {
        self.data_dir.join(FAULTS_FILE)
    }

    async fn append<T: Serialize>(&self, path: PathBuf, record: &T) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for JsonLinesRecorder {
    async fn record_sample(&self, sample: &Sample) -> Result<(), SinkError> {
        self.append(self.samples_path(sample.timestamp.date_naive()), sample).await
    }

    async fn record_transition(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        self.append(self.transitions_path(), event).await
    }

    async fn record_fault(&self, event: &FaultEvent) -> Result<(), SinkError> {
        self.append(self.faults_path(), event).await
    }

    async fn samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>, SinkError> {
        let mut samples = Vec::new();
        if end <= start {
            return Ok(samples);
        }
        let mut day = start.date_naive();
        let last = end.date_naive();
        while day <= last {
            let contents = match fs::read_to_string(self.samples_path(day)).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(e) => return Err(e.into()),
            };
            for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<Sample>(line) {
                    Ok(sample) if sample.timestamp >= start && sample.timestamp < end => samples.push(sample),
                    Ok(_) => {}
                    // A torn final line after a power cut should not hide the rest of the history.
                    Err(e) => tracing::warn!("Skipping unreadable sample line: {}", e),
                }
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{Action, ControlState};
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_and_query_samples() {
        let dir = tempdir().unwrap();
        let recorder = JsonLinesRecorder::open(dir.path().join("data")).await.unwrap();
        let base = Utc::now();
        for i in 0..4 {
            let sample = Sample { timestamp: base + Duration::seconds(i * 30), temperature: 20.0 + i as f64 };
            recorder.record_sample(&sample).await.unwrap();
        }
        let all = recorder
            .samples_between(base, base + Duration::seconds(120))
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
        let later = recorder
            .samples_between(base + Duration::seconds(60), base + Duration::seconds(120))
            .await
            .unwrap();
        assert_eq!(later.iter().map(|s| s.temperature).collect::<Vec<_>>(), vec![22.0, 23.0]);
    }

    #[tokio::test]
    async fn test_samples_rotate_per_day() {
        let dir = tempdir().unwrap();
        let recorder = JsonLinesRecorder::open(dir.path()).await.unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        for (secs, temperature) in [(-86_400, 18.0), (-60, 20.0), (60, 21.0)] {
            let sample = Sample { timestamp: midnight + Duration::seconds(secs), temperature };
            recorder.record_sample(&sample).await.unwrap();
        }
        let day_before = midnight.date_naive().pred_opt().unwrap();
        assert!(recorder.samples_path(day_before).exists());
        assert!(recorder.samples_path(midnight.date_naive()).exists());

        // An unreadable file outside the window is never opened.
        let stale = recorder.samples_path(day_before.pred_opt().unwrap());
        std::fs::create_dir(&stale).unwrap();

        let window = recorder
            .samples_between(midnight - Duration::minutes(5), midnight + Duration::minutes(5))
            .await
            .unwrap();
        let temps: Vec<f64> = window.iter().map(|s| s.temperature).collect();
        assert_eq!(temps, vec![20.0, 21.0]);
    }

    #[tokio::test]
    async fn test_empty_history_when_no_file() {
        let dir = tempdir().unwrap();
        let recorder = JsonLinesRecorder::open(dir.path()).await.unwrap();
        let now = Utc::now();
        assert!(recorder.samples_between(now - Duration::hours(1), now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transition_lines_are_json() {
        let dir = tempdir().unwrap();
        let recorder = JsonLinesRecorder::open(dir.path()).await.unwrap();
        let event = TransitionEvent {
            timestamp: Utc::now(),
            previous_state: ControlState::Off,
            new_state: ControlState::InitialHeating,
            action: Action::Armed,
            current_temperature: Some(19.0),
            target_temperature: Some(22.0),
            upper_threshold: Some(22.5),
            lower_threshold: Some(21.5),
            predicted_temperature: Some(21.0),
            wait_remaining_sec: 0.0,
            heater_energized: false,
        };
        recorder.record_transition(&event).await.unwrap();
        recorder.record_transition(&event).await.unwrap();

        let contents = std::fs::read_to_string(recorder.transitions_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["newState"], "InitialHeating");
        assert_eq!(parsed["action"], "armed");
    }

    #[tokio::test]
    async fn test_torn_line_is_skipped() {
        let dir = tempdir().unwrap();
        let recorder = JsonLinesRecorder::open(dir.path()).await.unwrap();
        let now = Utc::now();
        recorder.record_sample(&Sample { timestamp: now, temperature: 21.0 }).await.unwrap();
        let path = recorder.samples_path(now.date_naive());
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("{\"timestamp\":\"20");
        std::fs::write(&path, contents).unwrap();

        let samples = recorder
            .samples_between(now - Duration::seconds(1), now + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(samples.len(), 1);
    }
}
