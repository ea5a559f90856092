//! Proximity tracking to the saved car position
//!
//! The ProximityTracker is the state machine behind "find my car":
//! - Holds the reference (saved) position
//! - Drives a polling session on the position source
//! - Computes the distance to the reference on every accepted sample
//! - Publishes `TrackerEvent`s and stops itself on arrival
//!
//! States: Idle -> Armed -> Tracking -> Arrived, `reset` returns to Idle.

mod handlers;

use crate::domain::error::{LocationError, LocationResult};
use crate::domain::types::{PositionSample, TrackerEvent, TrackerState};
use crate::infra::config::Config;
use crate::services::position_source::{PolledSample, PositionSource};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default distance at or below which the car counts as found (10 m)
pub const DEFAULT_ARRIVAL_THRESHOLD_KM: f64 = 0.01;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Live state of one tracking run, from `start_tracking` to stop or arrival
#[derive(Debug, Clone)]
pub struct TrackingSession {
    /// Correlation id for logs
    pub id: Uuid,
    pub reference: PositionSample,
    /// Generation of the watch feeding this session
    pub poll_generation: u64,
    pub last_distance_km: f64,
    /// Timestamp of the newest accepted sample
    pub last_accepted: Option<DateTime<Utc>>,
    pub updates: u64,
    pub started_at: Instant,
}

impl TrackingSession {
    fn new(reference: PositionSample, poll_generation: u64) -> Self {
        Self {
            id: Uuid::now_v7(),
            reference,
            poll_generation,
            last_distance_km: 0.0,
            last_accepted: None,
            updates: 0,
            started_at: Instant::now(),
        }
    }
}

/// Commands accepted by [`ProximityTracker::run`]
#[derive(Debug, Clone)]
pub enum TrackerCommand {
    SetReference(PositionSample),
    StartTracking,
    StopTracking,
    Reset,
}

pub struct ProximityTracker {
    pub(crate) source: PositionSource,
    pub(crate) state: TrackerState,
    pub(crate) reference: Option<PositionSample>,
    pub(crate) session: Option<TrackingSession>,
    pub(crate) poll_rx: Option<mpsc::Receiver<PolledSample>>,
    /// Distance computed by the most recent accepted sample, kept after arrival
    pub(crate) last_distance_km: Option<f64>,
    pub(crate) events: broadcast::Sender<TrackerEvent>,
    pub(crate) poll_interval: Duration,
    pub(crate) arrival_threshold_km: f64,
}

impl ProximityTracker {
    pub fn new(source: PositionSource, poll_interval: Duration, arrival_threshold_km: f64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            state: TrackerState::Idle,
            reference: None,
            session: None,
            poll_rx: None,
            last_distance_km: None,
            events,
            poll_interval,
            arrival_threshold_km,
        }
    }

    pub fn from_config(source: PositionSource, config: &Config) -> Self {
        Self::new(source, config.poll_interval(), config.arrival_threshold_km())
    }

    /// Subscribe to tracker events
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Store the reference position. Idle/Armed -> Armed.
    pub fn set_reference(&mut self, position: PositionSample) -> LocationResult<()> {
        match self.state {
            TrackerState::Idle | TrackerState::Armed => {}
            from => return Err(LocationError::InvalidTransition { from, op: "set_reference" }),
        }
        if !position.coordinate.is_valid() {
            warn!(coordinate = %position.coordinate, "reference_rejected");
            return Err(LocationError::InvalidCoordinate(position.coordinate));
        }

        info!(coordinate = %position.coordinate, "reference_set");
        self.reference = Some(position);
        self.state = TrackerState::Armed;
        Ok(())
    }

    /// Take an initial fix, check it, then start polling. Armed -> Tracking.
    ///
    /// A failed initial fix publishes `LocationError` and leaves the tracker
    /// Armed. If the initial fix is already within the threshold the tracker
    /// goes straight to Arrived and no poll is started.
    pub async fn start_tracking(&mut self) -> LocationResult<()> {
        match self.state {
            TrackerState::Armed => {}
            TrackerState::Idle => {
                warn!("start_tracking_without_reference");
                return Err(LocationError::NoReferencePosition);
            }
            from => return Err(LocationError::InvalidTransition { from, op: "start_tracking" }),
        }
        let reference = self.reference.clone().ok_or(LocationError::NoReferencePosition)?;

        let initial = match self.source.get_current_position().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "initial_fix_failed");
                self.emit(TrackerEvent::LocationError { message: e.message() });
                return Err(e);
            }
        };

        let session = TrackingSession::new(reference, self.source.generation());
        info!(session_id = %session.id, "tracking_started");
        self.session = Some(session);
        self.state = TrackerState::Tracking;

        self.handle_position(initial);

        if self.state == TrackerState::Tracking {
            let rx = self.source.watch_position(self.poll_interval);
            if let Some(session) = self.session.as_mut() {
                session.poll_generation = self.source.generation();
            }
            self.poll_rx = Some(rx);
        }
        Ok(())
    }

    /// Cancel polling but keep the reference. Tracking -> Armed.
    pub fn stop_tracking(&mut self) -> LocationResult<()> {
        if self.state != TrackerState::Tracking {
            return Err(LocationError::InvalidTransition { from: self.state, op: "stop_tracking" });
        }
        self.end_session("stopped");
        self.state = TrackerState::Armed;
        Ok(())
    }

    /// Forget everything and stop any poll. Any state -> Idle.
    pub fn reset(&mut self) {
        if self.session.is_some() {
            self.end_session("reset");
        } else {
            self.source.clear_watch();
            self.poll_rx = None;
        }
        self.reference = None;
        self.last_distance_km = None;
        self.state = TrackerState::Idle;
        info!("tracker_reset");
    }

    /// Wait for the next polled sample and process it.
    ///
    /// Returns `false` when there is no active poll to wait on.
    pub async fn process_next(&mut self) -> bool {
        if self.poll_rx.is_none() {
            return false;
        }
        match recv_polled(&mut self.poll_rx).await {
            Some(polled) => {
                self.handle_polled(polled);
                true
            }
            None => {
                self.poll_closed();
                false
            }
        }
    }

    /// Run the tracker, consuming commands and poll samples until the
    /// command channel closes
    pub async fn run(&mut self, mut commands: mpsc::Receiver<TrackerCommand>) {
        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(cmd) => self.apply(cmd).await,
                        None => break, // Channel closed
                    }
                }
                polled = recv_polled(&mut self.poll_rx) => {
                    match polled {
                        Some(p) => self.handle_polled(p),
                        None => self.poll_closed(),
                    }
                }
            }
        }

        if self.state == TrackerState::Tracking {
            self.end_session("shutdown");
            self.state = TrackerState::Armed;
        }
        debug!("tracker_run_finished");
    }

    async fn apply(&mut self, cmd: TrackerCommand) {
        let result = match cmd {
            TrackerCommand::SetReference(position) => self.set_reference(position),
            TrackerCommand::StartTracking => self.start_tracking().await,
            TrackerCommand::StopTracking => self.stop_tracking(),
            TrackerCommand::Reset => {
                self.reset();
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, state = %self.state, "tracker_command_failed");
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn reference(&self) -> Option<&PositionSample> {
        self.reference.as_ref()
    }

    pub fn session(&self) -> Option<&TrackingSession> {
        self.session.as_ref()
    }

    pub fn last_distance_km(&self) -> Option<f64> {
        self.last_distance_km
    }

    pub fn is_polling(&self) -> bool {
        self.source.is_watching()
    }

    pub fn position_source(&self) -> &PositionSource {
        &self.source
    }
}

async fn recv_polled(rx: &mut Option<mpsc::Receiver<PolledSample>>) -> Option<PolledSample> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
