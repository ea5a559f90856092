//! Recorded route replay
//!
//! Reads a JSONL file of fixes (one `{"latitude":..,"longitude":..}` object
//! per line) and hands them out one per query. Once the route is exhausted
//! the last fix repeats. Every fix is stamped with the wall clock at the time
//! it is handed out.

use crate::domain::types::{Coordinate, PositionOptions, PositionSample};
use crate::io::provider::{LocationProvider, ProviderError};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
struct RouteFix {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    accuracy_m: Option<f64>,
}

pub struct ReplayProvider {
    fixes: Vec<RouteFix>,
    cursor: AtomicUsize,
}

impl ReplayProvider {
    pub fn from_coordinates(coordinates: &[Coordinate]) -> Self {
        let fixes = coordinates
            .iter()
            .map(|c| RouteFix { latitude: c.latitude, longitude: c.longitude, accuracy_m: None })
            .collect();
        Self { fixes, cursor: AtomicUsize::new(0) }
    }

    /// Load a JSONL route file. Blank lines and `#` comments are skipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read route file {}", path.display()))?;

        let mut fixes = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fix: RouteFix = serde_json::from_str(line).with_context(|| {
                format!("Invalid fix on line {} of {}", lineno + 1, path.display())
            })?;
            let coordinate = Coordinate::new(fix.latitude, fix.longitude);
            anyhow::ensure!(
                coordinate.is_valid(),
                "Coordinate {} out of range on line {} of {}",
                coordinate,
                lineno + 1,
                path.display()
            );
            fixes.push(fix);
        }

        info!(file = %path.display(), fixes = fixes.len(), "replay_route_loaded");
        Ok(Self { fixes, cursor: AtomicUsize::new(0) })
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

#[async_trait]
impl LocationProvider for ReplayProvider {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<PositionSample, ProviderError> {
        let last = self
            .fixes
            .len()
            .checked_sub(1)
            .ok_or_else(|| ProviderError::new("replay route is empty"))?;

        let idx = self.cursor.fetch_add(1, Ordering::Relaxed).min(last);
        let fix = &self.fixes[idx];
        debug!(idx = idx, latitude = fix.latitude, longitude = fix.longitude, "replay_fix");

        let sample = PositionSample::now(Coordinate::new(fix.latitude, fix.longitude));
        Ok(match fix.accuracy_m {
            Some(acc) => sample.with_accuracy(acc),
            None => sample,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_replays_in_order_then_repeats_last() {
        let provider = ReplayProvider::from_coordinates(&[
            Coordinate::new(1.0, 1.0),
            Coordinate::new(2.0, 2.0),
        ]);
        let options = PositionOptions::default();

        let a = provider.current_position(&options).await.unwrap();
        let b = provider.current_position(&options).await.unwrap();
        let c = provider.current_position(&options).await.unwrap();

        assert_eq!(a.coordinate, Coordinate::new(1.0, 1.0));
        assert_eq!(b.coordinate, Coordinate::new(2.0, 2.0));
        assert_eq!(c.coordinate, Coordinate::new(2.0, 2.0));
    }

    #[tokio::test]
    async fn test_empty_route_errors() {
        let provider = ReplayProvider::from_coordinates(&[]);
        let err = provider.current_position(&PositionOptions::default()).await.unwrap_err();
        assert_eq!(err.message, "replay route is empty");
    }

    #[tokio::test]
    async fn test_from_file_skips_comments() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# walk back to the car").unwrap();
        writeln!(file, r#"{{"latitude": 45.0, "longitude": 7.0, "accuracy_m": 8.0}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"latitude": 45.1, "longitude": 7.1}}"#).unwrap();
        file.flush().unwrap();

        let provider = ReplayProvider::from_file(file.path()).unwrap();
        assert_eq!(provider.len(), 2);

        let first = provider.current_position(&PositionOptions::default()).await.unwrap();
        assert_eq!(first.accuracy_m, Some(8.0));
    }

    #[test]
    fn test_from_file_reports_bad_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();

        let err = ReplayProvider::from_file(file.path()).err().unwrap();
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[test]
    fn test_from_file_rejects_out_of_range_fix() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"latitude": 45.0, "longitude": 7.0}}"#).unwrap();
        writeln!(file, r#"{{"latitude": 200.0, "longitude": 7.0}}"#).unwrap();
        file.flush().unwrap();

        let err = ReplayProvider::from_file(file.path()).err().unwrap();
        assert!(format!("{:#}", err).contains("out of range on line 2"));
    }
}
