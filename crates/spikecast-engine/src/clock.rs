//! Per-session replay clock: state machine, control surface, and the
//! deadline-anchored tick thread.
//!
//! The tick thread owns the delivery sender exclusively (moved in via
//! `thread::Builder::spawn`). Control calls and the tick loop share one
//! `Mutex<ClockState>` plus a `Condvar`; the condvar doubles as the
//! deadline timer, so a control call or `stop()` interrupts a sleeping
//! tick immediately.
//!
//! # Architecture
//!
//! ```text
//! Control Thread(s)           Tick Thread               Fetch Workers (N)
//!     |                           |                          |
//!     |--start()/pause()/seek()-->| condvar wakes            |
//!     |   [mutex + notify_all]    | wait_timeout(deadline)   |
//!     |                           | snapshot cursor+filter   |
//!     |                           |--fetch_range()---------->|
//!     |                           |   blocks on bounded(1)   | source.query()
//!     |                           |<--bundle or error--------|
//!     |                           | noise.transform_packet() |
//!     |<--packets() Receiver------| try_send(packet)         |
//!     |                           | advance cursor, sequence |
//! ```
//!
//! Deadlines are anchored to the start of the current run epoch:
//! `deadline(n) = epoch_start + n * interval`. A late tick does not push
//! later ticks back, so scheduling error never accumulates. `pause()`
//! ends the epoch; `resume()` anchors a fresh one, so no catch-up burst
//! follows a pause.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use spikecast_core::{
    ControlError, InitError, ReplayFilter, ReplayStats, RunState, SamplePacket, SampleSource,
    StreamMetadata, TrialId,
};
use spikecast_noise::NoiseTransform;

use crate::config::ReplayConfig;
use crate::fetch::FetchPool;
use crate::telemetry::ErrorWindow;

/// Mutable state shared between the control surface and the tick thread.
struct ClockState {
    run_state: RunState,
    cursor: u64,
    sequence: u64,
    filter: Option<ReplayFilter>,
    packets_emitted: u64,
    dropped_packets: u64,
    last_drop: Option<String>,
    timing: ErrorWindow,
    /// Bumped by `start()`/`resume()`; the tick thread re-anchors its
    /// deadline epoch whenever it observes a new value.
    epoch: u64,
}

struct ClockShared {
    state: Mutex<ClockState>,
    cond: Condvar,
}

/// A session-scoped replay clock over a shared sample source.
///
/// One dedicated tick thread per clock. Emits [`SamplePacket`]s at the
/// recording's fixed interval through a bounded channel; the clock never
/// blocks on a slow consumer (overrun packets are counted as dropped).
///
/// Dataset exhaustion transitions to [`RunState::Stopped`] and closes
/// the packet channel; replay never wraps around.
pub struct ReplayClock {
    shared: Arc<ClockShared>,
    source: Arc<dyn SampleSource>,
    packet_rx: Receiver<SamplePacket>,
    tick_thread: Option<JoinHandle<()>>,
    metadata: StreamMetadata,
    total_samples: u64,
}

impl ReplayClock {
    /// Bind a clock to `source` and spawn its tick thread (idle until
    /// [`start`](Self::start)).
    ///
    /// Probes the source synchronously; all probe failures are fatal and
    /// no thread is left behind.
    pub fn new(
        source: Arc<dyn SampleSource>,
        pool: Arc<FetchPool>,
        config: ReplayConfig,
        noise: Option<NoiseTransform>,
    ) -> Result<Self, InitError> {
        config
            .validate()
            .map_err(|e| InitError::InvalidConfig {
                reason: e.to_string(),
            })?;

        let total_samples = source
            .total_samples()
            .map_err(|e| InitError::SourceUnavailable {
                reason: e.to_string(),
            })?;
        if total_samples == 0 {
            return Err(InitError::EmptyDataset);
        }

        let interval = source
            .sample_interval()
            .map_err(|e| InitError::SourceUnavailable {
                reason: e.to_string(),
            })?;
        if interval.is_zero() {
            return Err(InitError::InvalidInterval { interval_ms: 0.0 });
        }
        let interval_s = interval.as_secs_f64();

        // One representative sample fixes the channel count.
        let probe = source
            .query(0, 1)
            .map_err(|e| InitError::SourceUnavailable {
                reason: e.to_string(),
            })?;
        let num_channels = probe
            .samples
            .first()
            .map(|s| s.spikes.num_channels())
            .unwrap_or(0);

        let metadata = StreamMetadata {
            total_samples,
            interval_ms: interval_s * 1000.0,
            frequency_hz: 1.0 / interval_s,
            num_channels,
            duration_s: total_samples as f64 * interval_s,
        };

        let shared = Arc::new(ClockShared {
            state: Mutex::new(ClockState {
                run_state: RunState::Ready,
                cursor: 0,
                sequence: 0,
                filter: None,
                packets_emitted: 0,
                dropped_packets: 0,
                last_drop: None,
                timing: ErrorWindow::new(config.timing_window),
                epoch: 0,
            }),
            cond: Condvar::new(),
        });

        let (packet_tx, packet_rx) = crossbeam_channel::bounded(config.channel_capacity);
        let fetch_budget = config.fetch_timeout.unwrap_or(interval);

        let thread_shared = Arc::clone(&shared);
        let tick_thread = thread::Builder::new()
            .name("replay-tick".into())
            .spawn(move || {
                tick_loop(
                    thread_shared,
                    pool,
                    packet_tx,
                    interval,
                    fetch_budget,
                    total_samples,
                    noise,
                );
            })
            .map_err(|e| InitError::ThreadSpawn {
                reason: format!("tick thread: {e}"),
            })?;

        Ok(Self {
            shared,
            source,
            packet_rx,
            tick_thread: Some(tick_thread),
            metadata,
            total_samples,
        })
    }

    /// Begin (or resume) emission. Idempotent while running.
    pub fn start(&self) -> Result<(), ControlError> {
        let mut st = self.shared.state.lock().unwrap();
        match st.run_state {
            RunState::Stopped => Err(ControlError::SessionStopped),
            RunState::Running => Ok(()),
            RunState::Ready | RunState::Paused => {
                st.run_state = RunState::Running;
                st.epoch += 1;
                debug!(cursor = st.cursor, "replay started");
                self.shared.cond.notify_all();
                Ok(())
            }
        }
    }

    /// Suspend emission; the cursor holds its position. Idempotent
    /// while paused.
    pub fn pause(&self) -> Result<(), ControlError> {
        let mut st = self.shared.state.lock().unwrap();
        match st.run_state {
            RunState::Stopped => Err(ControlError::SessionStopped),
            RunState::Running => {
                st.run_state = RunState::Paused;
                debug!(cursor = st.cursor, "replay paused");
                self.shared.cond.notify_all();
                Ok(())
            }
            RunState::Ready | RunState::Paused => Ok(()),
        }
    }

    /// Resume emission from the held cursor on a fresh deadline epoch.
    pub fn resume(&self) -> Result<(), ControlError> {
        self.start()
    }

    /// Stop the clock permanently. Idempotent; effective immediately.
    ///
    /// The tick thread exits and the packet channel closes once any
    /// in-flight fetch result has been discarded.
    pub fn stop(&self) {
        let mut st = self.shared.state.lock().unwrap();
        if st.run_state != RunState::Stopped {
            st.run_state = RunState::Stopped;
            debug!(
                sequence = st.sequence,
                emitted = st.packets_emitted,
                "replay stopped"
            );
            self.shared.cond.notify_all();
        }
    }

    /// Move the cursor to an absolute recording index.
    ///
    /// Only the cursor moves: sequence numbering, run state, and the
    /// filter are unaffected.
    pub fn seek(&self, index: u64) -> Result<(), ControlError> {
        let mut st = self.shared.state.lock().unwrap();
        if st.run_state == RunState::Stopped {
            return Err(ControlError::SessionStopped);
        }
        if index >= self.total_samples {
            return Err(ControlError::SeekOutOfRange {
                position: index,
                total: self.total_samples,
            });
        }
        st.cursor = index;
        debug!(index, "cursor moved");
        self.shared.cond.notify_all();
        Ok(())
    }

    /// Move the cursor to the first sample of `trial`.
    ///
    /// Resolves the trial span on the calling thread; a resolution
    /// failure leaves the cursor untouched.
    pub fn seek_trial(&self, trial: TrialId) -> Result<(), ControlError> {
        let bundle = self.source.query_by_trial(trial)?;
        self.seek(bundle.start_index)
    }

    /// Install or clear the emission filter (`None` clears).
    ///
    /// Filters never change cadence: the cursor advances one sample per
    /// interval regardless, and non-matching ticks are silently not
    /// emitted.
    pub fn set_filter(&self, filter: Option<ReplayFilter>) -> Result<(), ControlError> {
        let mut st = self.shared.state.lock().unwrap();
        if st.run_state == RunState::Stopped {
            return Err(ControlError::SessionStopped);
        }
        st.filter = filter;
        Ok(())
    }

    /// Point-in-time statistics snapshot.
    pub fn get_stats(&self) -> ReplayStats {
        let st = self.shared.state.lock().unwrap();
        ReplayStats {
            cursor_index: st.cursor,
            total_samples: self.total_samples,
            sequence: st.sequence,
            packets_emitted: st.packets_emitted,
            dropped_packets: st.dropped_packets,
            last_drop: st.last_drop.clone(),
            run_state: st.run_state,
            timing_error_mean_ms: st.timing.mean(),
            timing_error_std_ms: st.timing.std(),
            timing_error_max_ms: st.timing.max_abs(),
        }
    }

    /// Current run state.
    pub fn run_state(&self) -> RunState {
        self.shared.state.lock().unwrap().run_state
    }

    /// A handle onto the packet stream.
    ///
    /// The channel is multi-consumer: each packet is delivered to
    /// exactly one receiver. The channel closes when the clock stops or
    /// the recording is exhausted.
    pub fn packets(&self) -> Receiver<SamplePacket> {
        self.packet_rx.clone()
    }

    /// Static facts about the stream (totals, interval, channel count).
    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }
}

impl Drop for ReplayClock {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.tick_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Outcome of one attempted tick, resolved outside the state lock.
enum TickOutcome {
    Emitted,
    Filtered,
    Dropped(String),
}

/// Main loop of the tick thread. Exits when the state reaches
/// `Stopped`; dropping `packet_tx` on exit closes the stream.
fn tick_loop(
    shared: Arc<ClockShared>,
    pool: Arc<FetchPool>,
    packet_tx: Sender<SamplePacket>,
    interval: Duration,
    fetch_budget: Duration,
    total_samples: u64,
    noise: Option<NoiseTransform>,
) {
    let interval_s = interval.as_secs_f64();
    let mut epoch_start = Instant::now();
    let mut epoch_ticks: u32 = 0;
    let mut seen_epoch: u64 = 0;
    let mut started_at: Option<Instant> = None;

    let mut st = shared.state.lock().unwrap();
    'ticks: loop {
        // Park in Ready/Paused; exit in Stopped.
        match st.run_state {
            RunState::Stopped => break,
            RunState::Ready | RunState::Paused => {
                st = shared.cond.wait(st).unwrap();
                continue;
            }
            RunState::Running => {}
        }

        // A new epoch re-anchors the deadline series at "now".
        if st.epoch != seen_epoch {
            seen_epoch = st.epoch;
            epoch_start = Instant::now();
            epoch_ticks = 0;
            started_at.get_or_insert(epoch_start);
        }

        if st.cursor >= total_samples {
            st.run_state = RunState::Stopped;
            debug!(
                sequence = st.sequence,
                emitted = st.packets_emitted,
                "recording exhausted"
            );
            shared.cond.notify_all();
            break;
        }

        epoch_ticks += 1;
        let deadline = epoch_start + interval * epoch_ticks;

        // Sleep until the deadline. Control calls notify the condvar;
        // a state change is handled at the top of the loop.
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = shared.cond.wait_timeout(st, deadline - now).unwrap();
            st = guard;
            if st.run_state != RunState::Running {
                continue 'ticks;
            }
        }

        let wake_error_ms = deadline.elapsed().as_secs_f64() * 1000.0;
        st.timing.push(wake_error_ms);
        if wake_error_ms > interval.as_secs_f64() * 1000.0 {
            warn!(wake_error_ms, "tick deadline slipped by over one interval");
        }

        // Snapshot, then release the lock for the fetch round trip.
        // Every attempted tick consumes one sequence number, so
        // sequence always equals elapsed running time over the interval
        // even when ticks are dropped or filtered.
        let sequence = st.sequence;
        let cursor = st.cursor;
        let filter = st.filter;
        st.sequence += 1;
        st.cursor += 1;
        drop(st);

        let fetched = pool.fetch_range(cursor, cursor + 1, fetch_budget);

        // A stop() issued during the fetch wins: the fetched result is
        // discarded, never delivered.
        st = shared.state.lock().unwrap();
        if st.run_state == RunState::Stopped {
            break;
        }

        let outcome = match fetched {
            Ok(bundle) => match bundle.samples.into_iter().next() {
                Some(sample) => {
                    let passes = filter
                        .map_or(true, |f| f.matches(sample.trial_id, sample.target.target_id));
                    if passes {
                        let mut packet =
                            SamplePacket::from_sample(sequence, cursor, interval_s, sample);
                        if let Some(noise) = &noise {
                            let elapsed = started_at.map(|t| t.elapsed()).unwrap_or_default();
                            noise.transform_packet(&mut packet, elapsed);
                        }
                        match packet_tx.try_send(packet) {
                            Ok(()) => TickOutcome::Emitted,
                            Err(TrySendError::Full(_)) => TickOutcome::Dropped(
                                "delivery overrun: packet channel full".into(),
                            ),
                            Err(TrySendError::Disconnected(_)) => {
                                TickOutcome::Dropped("packet channel disconnected".into())
                            }
                        }
                    } else {
                        TickOutcome::Filtered
                    }
                }
                None => TickOutcome::Dropped(format!("empty bundle at index {cursor}")),
            },
            Err(e) => TickOutcome::Dropped(e.to_string()),
        };

        match outcome {
            TickOutcome::Emitted => {
                st.packets_emitted += 1;
                if st.packets_emitted % 1000 == 0 {
                    debug!(
                        emitted = st.packets_emitted,
                        dropped = st.dropped_packets,
                        timing_mean_ms = st.timing.mean(),
                        "replay progress"
                    );
                }
            }
            TickOutcome::Filtered => {}
            TickOutcome::Dropped(reason) => {
                st.dropped_packets += 1;
                debug!(sequence, %reason, "tick dropped");
                st.last_drop = Some(reason);
            }
        }
    }
    // Thread exit drops packet_tx, closing the stream for consumers.
}
