//! Sample handling for the ProximityTracker

use super::ProximityTracker;
use crate::domain::geo::distance_km;
use crate::domain::types::{PositionSample, TrackerEvent, TrackerState};
use crate::services::position_source::PolledSample;
use tracing::{debug, info, warn};

impl ProximityTracker {
    /// Handle a sample delivered by the poll. Samples from a cancelled watch
    /// are dropped.
    pub(crate) fn handle_polled(&mut self, polled: PolledSample) {
        let current = self.session.as_ref().map(|s| s.poll_generation);
        if current != Some(polled.generation) {
            debug!(
                generation = polled.generation,
                current = ?current,
                "polled_sample_stale_generation"
            );
            return;
        }
        self.handle_position(polled.sample);
    }

    /// Process a position update. Ignored unless Tracking.
    pub fn handle_position(&mut self, sample: PositionSample) {
        if self.state != TrackerState::Tracking {
            debug!(state = %self.state, "position_ignored");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !sample.coordinate.is_valid() {
            warn!(session_id = %session.id, coordinate = %sample.coordinate, "position_invalid");
            return;
        }

        // At most one extra query can race the previous one; keep the newest
        if let Some(last) = session.last_accepted {
            if sample.timestamp < last {
                debug!(
                    session_id = %session.id,
                    sample_ts = %sample.timestamp,
                    accepted_ts = %last,
                    "position_out_of_order"
                );
                return;
            }
        }

        let distance = distance_km(&sample, &session.reference);
        session.last_accepted = Some(sample.timestamp);
        session.last_distance_km = distance;
        session.updates += 1;
        self.last_distance_km = Some(distance);

        debug!(
            session_id = %session.id,
            coordinate = %sample.coordinate,
            distance_km = %distance,
            accuracy_m = ?sample.accuracy_m,
            "proximity_updated"
        );

        if distance <= self.arrival_threshold_km {
            self.arrive(distance);
        } else {
            self.emit(TrackerEvent::PositionUpdated {
                coordinate: sample.coordinate,
                distance_km: distance,
            });
        }
    }

    /// Within threshold: stop polling, keep the reference, publish arrival
    fn arrive(&mut self, distance: f64) {
        if let Some(session) = &self.session {
            info!(
                session_id = %session.id,
                distance_km = %distance,
                updates = session.updates,
                elapsed_ms = session.started_at.elapsed().as_millis() as u64,
                "car_found"
            );
        }
        self.end_session("arrived");
        self.state = TrackerState::Arrived;
        self.emit(TrackerEvent::Arrived);
    }

    /// Cancel the watch and drop the session
    pub(crate) fn end_session(&mut self, reason: &str) {
        self.source.clear_watch();
        self.poll_rx = None;
        if let Some(session) = self.session.take() {
            info!(
                session_id = %session.id,
                reason = %reason,
                updates = session.updates,
                last_distance_km = %session.last_distance_km,
                "tracking_session_ended"
            );
        }
    }

    /// The poll channel closed under us; nothing more will arrive
    pub(crate) fn poll_closed(&mut self) {
        self.poll_rx = None;
        if self.state == TrackerState::Tracking {
            warn!("poll_channel_closed");
        }
    }

    pub(crate) fn emit(&self, event: TrackerEvent) {
        // No subscribers is fine; events are advisory
        if self.events.send(event.clone()).is_err() {
            debug!(event = %event.as_str(), "event_without_subscribers");
        }
    }
}
