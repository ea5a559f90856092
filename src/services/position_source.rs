//! Position source - one-shot queries and interval polling
//!
//! Continuous watching is emulated with a fixed-interval poll that runs a
//! one-shot query on every tick. Each tick's query is spawned on its own so a
//! slow fix never delays the next tick.
//!
//! Every watch is tagged with a generation number. `clear_watch` bumps the
//! generation, so a query that was already in flight when the watch was
//! cancelled finds its generation stale and drops its result.

use crate::domain::error::{LocationError, LocationResult};
use crate::domain::geo::distance_km;
use crate::domain::types::{PositionOptions, PositionSample};
use crate::io::provider::LocationProvider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Buffered samples between the poller and its consumer
const WATCH_BUFFER: usize = 16;

/// Shortest poll period; tokio intervals cannot tick at zero
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A sample delivered by a running watch, tagged with the watch generation
#[derive(Debug, Clone)]
pub struct PolledSample {
    pub generation: u64,
    pub sample: PositionSample,
}

pub struct PositionSource {
    provider: Arc<dyn LocationProvider>,
    options: PositionOptions,
    generation: Arc<AtomicU64>,
    poll: Option<JoinHandle<()>>,
}

impl PositionSource {
    pub fn new(provider: Arc<dyn LocationProvider>, options: PositionOptions) -> Self {
        Self { provider, options, generation: Arc::new(AtomicU64::new(0)), poll: None }
    }

    /// Single fresh fix, bounded by the configured timeout
    pub async fn get_current_position(&self) -> LocationResult<PositionSample> {
        query(self.provider.as_ref(), &self.options).await
    }

    /// Start polling every `every`. Any running watch is cancelled first.
    ///
    /// The first query runs one full interval after the call. Failed ticks
    /// are logged and skipped; only successful samples reach the receiver.
    /// A zero period is raised to one millisecond.
    pub fn watch_position(&mut self, every: Duration) -> mpsc::Receiver<PolledSample> {
        self.clear_watch();
        let every = every.max(MIN_POLL_INTERVAL);

        let generation = self.generation.load(Ordering::SeqCst);
        let current = self.generation.clone();
        let provider = self.provider.clone();
        let options = self.options;
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if tx.is_closed() || current.load(Ordering::SeqCst) != generation {
                    break;
                }

                let provider = provider.clone();
                let current = current.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    match query(provider.as_ref(), &options).await {
                        Ok(sample) => {
                            if current.load(Ordering::SeqCst) != generation {
                                debug!(generation = generation, "poll_result_discarded");
                                return;
                            }
                            let _ = tx.send(PolledSample { generation, sample }).await;
                        }
                        Err(e) => {
                            let e = LocationError::PollTransientError(e.message());
                            warn!(generation = generation, error = %e, "poll_tick_failed");
                        }
                    }
                });
            }
        });

        info!(
            generation = generation,
            interval_ms = every.as_millis() as u64,
            "watch_started"
        );
        self.poll = Some(handle);
        rx
    }

    /// Cancel the running watch. Safe to call when nothing is running.
    pub fn clear_watch(&mut self) {
        let previous = self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.poll.take() {
            handle.abort();
            info!(generation = previous, "watch_cleared");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.poll.is_some()
    }

    /// Generation of the current (or next) watch
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Great-circle distance between two samples in km
    pub fn distance(a: &PositionSample, b: &PositionSample) -> f64 {
        distance_km(a, b)
    }
}

impl Drop for PositionSource {
    fn drop(&mut self) {
        self.clear_watch();
    }
}

async fn query(
    provider: &dyn LocationProvider,
    options: &PositionOptions,
) -> LocationResult<PositionSample> {
    match tokio::time::timeout(options.timeout, provider.current_position(options)).await {
        Ok(Ok(sample)) => Ok(sample),
        Ok(Err(e)) => Err(LocationError::LocationUnavailable(e.message)),
        Err(_) => Err(LocationError::LocationUnavailable(format!(
            "Timeout expired after {} ms",
            options.timeout.as_millis()
        ))),
    }
}
