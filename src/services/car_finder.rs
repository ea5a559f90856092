//! Car finder application service
//!
//! Wires the tracker to the saved-position store:
//! - `initialize` - load a saved car position, or take the current position
//!   as the candidate to save
//! - `update_position` / `save_position` - refresh and commit the candidate
//! - `find_car` / `guide` - track the user back to the car
//! - `reinitialize` - forget the car (also done automatically on arrival)

use crate::domain::error::LocationResult;
use crate::domain::types::{PositionSample, TrackerEvent, TrackerState};
use crate::io::store::ReferenceStore;
use crate::services::tracker::ProximityTracker;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct CarFinder {
    tracker: ProximityTracker,
    store: ReferenceStore,
    /// Position captured but not yet committed
    candidate: Option<PositionSample>,
    saved: bool,
}

impl CarFinder {
    pub fn new(tracker: ProximityTracker, store: ReferenceStore) -> Self {
        Self { tracker, store, candidate: None, saved: false }
    }

    /// Restore a saved car position, or capture the current one as candidate.
    ///
    /// A location failure is published as an event and is not an error here;
    /// only store failures are.
    pub async fn initialize(&mut self) -> anyhow::Result<()> {
        if let Some(saved) = self.store.load()? {
            self.tracker.set_reference(saved)?;
            self.saved = true;
            return Ok(());
        }
        self.acquire_candidate().await;
        Ok(())
    }

    /// Re-acquire the candidate position before saving
    pub async fn update_position(&mut self) -> Option<&PositionSample> {
        self.acquire_candidate().await;
        self.candidate.as_ref()
    }

    /// Use an externally supplied position as the candidate
    pub fn set_candidate(&mut self, position: PositionSample) {
        self.candidate = Some(position);
    }

    /// Commit the candidate as the car position. Returns `false` when there
    /// is nothing to save.
    ///
    /// The tracker must accept the position before it is written, so the
    /// store never disagrees with the reference being tracked.
    pub fn save_position(&mut self) -> anyhow::Result<bool> {
        let Some(candidate) = self.candidate.clone() else {
            warn!("save_without_candidate");
            return Ok(false);
        };
        self.tracker.set_reference(candidate.clone())?;
        self.store.save(&candidate)?;
        self.saved = true;
        Ok(true)
    }

    /// Start guiding the user to the saved car
    pub async fn find_car(&mut self) -> LocationResult<()> {
        self.tracker.start_tracking().await
    }

    /// Track until the car is found or `shutdown` fires.
    ///
    /// Returns `true` on arrival, after forgetting the saved position.
    pub async fn guide(&mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<bool> {
        if self.tracker.state() != TrackerState::Tracking {
            self.find_car().await?;
        }

        while self.tracker.state() == TrackerState::Tracking {
            tokio::select! {
                more = self.tracker.process_next() => {
                    if !more {
                        warn!("guide_poll_ended");
                        if self.tracker.state() == TrackerState::Tracking {
                            self.tracker.stop_tracking()?;
                        }
                        return Ok(false);
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender can never signal again
                    if changed.is_err() || *shutdown.borrow() {
                        info!("guide_cancelled");
                        self.tracker.stop_tracking()?;
                        return Ok(false);
                    }
                }
            }
        }

        if self.tracker.state() == TrackerState::Arrived {
            self.reinitialize()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Forget the car: stop tracking, drop candidate and saved position
    pub fn reinitialize(&mut self) -> anyhow::Result<()> {
        self.tracker.reset();
        self.candidate = None;
        self.saved = false;
        self.store.clear()
    }

    async fn acquire_candidate(&mut self) {
        match self.tracker.position_source().get_current_position().await {
            Ok(sample) => {
                info!(coordinate = %sample.coordinate, "candidate_acquired");
                self.candidate = Some(sample);
            }
            Err(e) => {
                warn!(error = %e, "candidate_acquire_failed");
                self.tracker.emit(TrackerEvent::LocationError {
                    message: format!("Unable to get location: {}", e.message()),
                });
            }
        }
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub fn candidate(&self) -> Option<&PositionSample> {
        self.candidate.as_ref()
    }

    pub fn tracker(&self) -> &ProximityTracker {
        &self.tracker
    }

    pub fn store(&self) -> &ReferenceStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Coordinate, PositionOptions};
    use crate::io::provider::{LocationProvider, ProviderError};
    use crate::io::replay::ReplayProvider;
    use crate::services::position_source::PositionSource;
    use crate::services::tracker::DEFAULT_ARRIVAL_THRESHOLD_KM;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const CAR: Coordinate = Coordinate::new(45.07, 7.686);

    fn walk_to_car() -> Vec<Coordinate> {
        [0.8, 0.3, 0.004]
            .iter()
            .map(|km| Coordinate::new(CAR.latitude - km / 111.195, CAR.longitude))
            .collect()
    }

    struct DeniedProvider;

    #[async_trait]
    impl LocationProvider for DeniedProvider {
        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<PositionSample, ProviderError> {
            Err(ProviderError::new("User denied Geolocation"))
        }
    }

    fn finder(provider: Arc<dyn LocationProvider>, dir: &TempDir) -> CarFinder {
        let source = PositionSource::new(provider, PositionOptions::default());
        let tracker =
            ProximityTracker::new(source, Duration::from_millis(10), DEFAULT_ARRIVAL_THRESHOLD_KM);
        CarFinder::new(tracker, ReferenceStore::new(dir.path().join("car.json")))
    }

    #[tokio::test]
    async fn test_initialize_captures_candidate() {
        let dir = TempDir::new().unwrap();
        let mut f = finder(Arc::new(ReplayProvider::from_coordinates(&[CAR])), &dir);

        f.initialize().await.unwrap();

        assert!(!f.is_saved());
        assert_eq!(f.candidate().unwrap().coordinate, CAR);
        assert_eq!(f.tracker().state(), TrackerState::Idle);
    }

    #[tokio::test]
    async fn test_save_then_restore() {
        let dir = TempDir::new().unwrap();
        let mut f = finder(Arc::new(ReplayProvider::from_coordinates(&[CAR])), &dir);
        f.initialize().await.unwrap();
        assert!(f.save_position().unwrap());
        assert!(f.is_saved());
        assert_eq!(f.tracker().state(), TrackerState::Armed);

        // A fresh process restores the saved position without a fix
        let mut restored = finder(Arc::new(DeniedProvider), &dir);
        let mut events = restored.tracker().subscribe();
        restored.initialize().await.unwrap();

        assert!(restored.is_saved());
        assert_eq!(restored.tracker().reference().unwrap().coordinate, CAR);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_save_without_candidate() {
        let dir = TempDir::new().unwrap();
        let mut f = finder(Arc::new(DeniedProvider), &dir);
        let mut events = f.tracker().subscribe();

        f.initialize().await.unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            TrackerEvent::LocationError {
                message: "Unable to get location: User denied Geolocation".to_string()
            }
        );
        assert!(!f.save_position().unwrap());
        assert!(!f.store().path().exists());
    }

    #[tokio::test]
    async fn test_guide_to_car_forgets_position() {
        let dir = TempDir::new().unwrap();
        let mut f = finder(Arc::new(ReplayProvider::from_coordinates(&walk_to_car())), &dir);
        f.set_candidate(PositionSample::now(CAR));
        f.save_position().unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let found = tokio::time::timeout(Duration::from_secs(2), f.guide(shutdown_rx))
            .await
            .unwrap()
            .unwrap();

        assert!(found);
        assert!(!f.is_saved());
        assert_eq!(f.tracker().state(), TrackerState::Idle);
        assert!(!f.store().path().exists());
    }

    #[tokio::test]
    async fn test_guide_cancelled_keeps_position() {
        let dir = TempDir::new().unwrap();
        // Stays 800 m away forever
        let far = Coordinate::new(CAR.latitude - 0.8 / 111.195, CAR.longitude);
        let mut f = finder(Arc::new(ReplayProvider::from_coordinates(&[far])), &dir);
        f.set_candidate(PositionSample::now(CAR));
        f.save_position().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = shutdown_tx.send(true);
        });
        let found = f.guide(shutdown_rx).await.unwrap();

        assert!(!found);
        assert!(f.is_saved());
        assert_eq!(f.tracker().state(), TrackerState::Armed);
        assert!(f.store().path().exists());
    }

    #[tokio::test]
    async fn test_save_while_tracking_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let far = Coordinate::new(CAR.latitude - 0.8 / 111.195, CAR.longitude);
        let mut f = finder(Arc::new(ReplayProvider::from_coordinates(&[far])), &dir);
        f.set_candidate(PositionSample::now(CAR));
        f.save_position().unwrap();
        f.find_car().await.unwrap();

        f.set_candidate(PositionSample::now(Coordinate::new(10.0, 10.0)));
        assert!(f.save_position().is_err());

        let stored = f.store().load().unwrap().unwrap();
        assert_eq!(stored.coordinate, f.tracker().reference().unwrap().coordinate);
        assert_eq!(stored.coordinate, CAR);
        f.reinitialize().unwrap();
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_coordinates() {
        let dir = TempDir::new().unwrap();
        let mut f = finder(Arc::new(DeniedProvider), &dir);

        f.set_candidate(PositionSample::now(Coordinate::new(f64::NAN, 0.0)));
        assert!(f.save_position().is_err());
        f.set_candidate(PositionSample::now(Coordinate::new(200.0, 0.0)));
        assert!(f.save_position().is_err());

        assert!(!f.is_saved());
        assert!(!f.store().path().exists());
        assert_eq!(f.tracker().state(), TrackerState::Idle);
    }

    #[tokio::test]
    async fn test_guide_stops_tracking_when_poll_ends() {
        let dir = TempDir::new().unwrap();
        let far = Coordinate::new(CAR.latitude - 0.8 / 111.195, CAR.longitude);
        let mut f = finder(Arc::new(ReplayProvider::from_coordinates(&[far])), &dir);
        f.set_candidate(PositionSample::now(CAR));
        f.save_position().unwrap();
        f.find_car().await.unwrap();
        f.tracker.poll_rx = None;
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let found = f.guide(shutdown_rx).await.unwrap();

        assert!(!found);
        assert_eq!(f.tracker().state(), TrackerState::Armed);
        assert!(!f.tracker().is_polling());
        assert!(f.store().path().exists());
    }

    #[tokio::test]
    async fn test_guide_without_saved_position_fails() {
        let dir = TempDir::new().unwrap();
        let mut f = finder(Arc::new(ReplayProvider::from_coordinates(&[CAR])), &dir);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        assert!(f.guide(shutdown_rx).await.is_err());
    }
}
