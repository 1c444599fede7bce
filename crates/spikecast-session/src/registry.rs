//! Keyed session registry: creation, LRU eviction, TTL sweep, and the
//! per-session control surface.
//!
//! One `Mutex` guards the session map; clock handles are `Arc`-cloned
//! out of it before any blocking call, so control operations on one
//! session never hold the map against another. The sweeper is a named
//! background thread that waits on a condvar with the sweep interval as
//! timeout, so `shutdown()` interrupts it immediately.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::Receiver;
use indexmap::IndexMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use spikecast_core::{
    InitError, RegistryError, ReplayFilter, ReplayStats, RunState, SamplePacket, SampleSource,
    StreamMetadata, TargetId, TrialId,
};
use spikecast_engine::{FetchPool, ReplayClock};

use crate::config::RegistryConfig;
use crate::keys::generate_key;

/// One registered session.
struct SessionEntry {
    clock: Arc<ReplayClock>,
    created_at: Instant,
    last_accessed: Instant,
    subscribers: usize,
}

struct RegistryInner {
    sessions: IndexMap<String, SessionEntry>,
    rng: ChaCha8Rng,
}

struct SweeperShared {
    stop: Mutex<bool>,
    cond: Condvar,
}

/// Public snapshot of one session, as reported by [`SessionRegistry::list`].
#[derive(Clone, Debug)]
pub struct SessionInfo {
    /// Session key.
    pub key: String,
    /// Time since the session was created.
    pub age: Duration,
    /// Time since the session was last touched by any operation.
    pub idle: Duration,
    /// Number of attached packet-stream subscribers.
    pub subscribers: usize,
    /// Current run state of the session's clock.
    pub run_state: RunState,
    /// Current recording index.
    pub cursor_index: u64,
    /// Attempted tick count.
    pub sequence: u64,
    /// Packets delivered so far.
    pub packets_emitted: u64,
}

/// Registry-wide totals, as reported by [`SessionRegistry::registry_stats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of live sessions.
    pub sessions: usize,
    /// Configured session ceiling.
    pub max_sessions: usize,
    /// Sessions currently in the `Running` state.
    pub running: usize,
    /// Total attached subscribers across all sessions.
    pub subscribers: usize,
}

/// Registry of isolated replay sessions over one shared source.
///
/// Every session gets its own [`ReplayClock`]; reads go through a single
/// shared [`FetchPool`]. Every control or consume operation refreshes
/// the session's `last_accessed` stamp, which drives LRU eviction and
/// the TTL sweep. Sessions with attached subscribers are never evicted
/// or swept.
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    source: Arc<dyn SampleSource>,
    pool: Arc<FetchPool>,
    config: RegistryConfig,
    sweeper_shared: Arc<SweeperShared>,
    sweeper: Option<JoinHandle<()>>,
}

impl SessionRegistry {
    /// Probe the source, build the shared fetch pool, and start the
    /// sweeper thread.
    pub fn new(
        source: Arc<dyn SampleSource>,
        config: RegistryConfig,
    ) -> Result<Self, RegistryError> {
        config
            .validate()
            .map_err(|e| InitError::InvalidConfig {
                reason: e.to_string(),
            })?;

        // An unreachable source is fatal here, not at first create().
        let total = source
            .total_samples()
            .map_err(|e| InitError::SourceUnavailable {
                reason: e.to_string(),
            })?;
        if total == 0 {
            return Err(RegistryError::Init(InitError::EmptyDataset));
        }

        let pool = Arc::new(FetchPool::new(Arc::clone(&source), &config.pool)?);

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let inner = Arc::new(Mutex::new(RegistryInner {
            sessions: IndexMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }));

        let sweeper_shared = Arc::new(SweeperShared {
            stop: Mutex::new(false),
            cond: Condvar::new(),
        });

        let sweep_inner = Arc::clone(&inner);
        let sweep_shared = Arc::clone(&sweeper_shared);
        let sweep_interval = config.sweep_interval;
        let session_ttl = config.session_ttl;
        let sweeper = thread::Builder::new()
            .name("session-sweeper".into())
            .spawn(move || {
                sweeper_loop(sweep_inner, sweep_shared, sweep_interval, session_ttl);
            })
            .map_err(|e| InitError::ThreadSpawn {
                reason: format!("sweeper: {e}"),
            })?;

        info!(
            total_samples = total,
            max_sessions = config.max_sessions,
            "session registry ready"
        );

        Ok(Self {
            inner,
            source,
            pool,
            config,
            sweeper_shared,
            sweeper: Some(sweeper),
        })
    }

    /// Create a session, or return the existing one under a supplied key.
    ///
    /// Generated keys are collision-checked `adjective-noun-NN` strings.
    /// At capacity the least-recently-accessed session with zero
    /// subscribers whose idle time exceeds the eviction grace is removed
    /// first; if no session qualifies the call fails with `AtCapacity`
    /// and nothing is evicted.
    pub fn create(&self, custom_key: Option<&str>) -> Result<String, RegistryError> {
        if let Some(key) = custom_key {
            let mut inner = self.inner.lock().unwrap();
            if let Some(entry) = inner.sessions.get_mut(key) {
                entry.last_accessed = Instant::now();
                debug!(key, "returning existing session");
                return Ok(key.to_string());
            }
        }

        // The source probes inside ReplayClock::new can take
        // milliseconds; the map stays unlocked while they run.
        let clock = Arc::new(ReplayClock::new(
            Arc::clone(&self.source),
            Arc::clone(&self.pool),
            self.config.replay.clone(),
            self.config.noise.clone(),
        )?);

        let mut inner = self.inner.lock().unwrap();

        if let Some(key) = custom_key {
            if let Some(entry) = inner.sessions.get_mut(key) {
                // Lost a create race for this key; keep the winner.
                clock.stop();
                entry.last_accessed = Instant::now();
                debug!(key, "returning existing session");
                return Ok(key.to_string());
            }
        }

        if inner.sessions.len() >= self.config.max_sessions {
            self.evict_one(&mut inner)?;
        }

        let key = match custom_key {
            Some(k) => k.to_string(),
            None => loop {
                let candidate = generate_key(&mut inner.rng);
                if !inner.sessions.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let now = Instant::now();
        inner.sessions.insert(
            key.clone(),
            SessionEntry {
                clock,
                created_at: now,
                last_accessed: now,
                subscribers: 0,
            },
        );
        info!(key, sessions = inner.sessions.len(), "session created");
        Ok(key)
    }

    /// Fetch-or-create under a fixed key (implicit creation on first
    /// contact).
    pub fn get_or_create(&self, key: &str) -> Result<String, RegistryError> {
        self.create(Some(key))
    }

    /// Stop and remove a session. Idempotent: `false` when absent.
    ///
    /// Attached consumers of a deleted session observe the closed
    /// packet channel.
    pub fn delete(&self, key: &str) -> bool {
        let entry = {
            let mut inner = self.inner.lock().unwrap();
            inner.sessions.shift_remove(key)
        };
        match entry {
            Some(entry) => {
                entry.clock.stop();
                info!(key, "session deleted");
                true
            }
            None => false,
        }
    }

    /// Snapshot every live session.
    pub fn list(&self) -> Vec<SessionInfo> {
        let inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner
            .sessions
            .iter()
            .map(|(key, entry)| {
                let stats = entry.clock.get_stats();
                SessionInfo {
                    key: key.clone(),
                    age: now.duration_since(entry.created_at),
                    idle: now.duration_since(entry.last_accessed),
                    subscribers: entry.subscribers,
                    run_state: stats.run_state,
                    cursor_index: stats.cursor_index,
                    sequence: stats.sequence,
                    packets_emitted: stats.packets_emitted,
                }
            })
            .collect()
    }

    /// Remove sessions with zero subscribers idle past the TTL.
    ///
    /// Returns the number removed. Also run periodically by the sweeper
    /// thread.
    pub fn sweep_expired(&self) -> usize {
        sweep(&self.inner, self.config.session_ttl)
    }

    /// Registry-wide totals.
    pub fn registry_stats(&self) -> RegistryStats {
        let inner = self.inner.lock().unwrap();
        let mut running = 0;
        let mut subscribers = 0;
        for entry in inner.sessions.values() {
            if entry.clock.run_state() == RunState::Running {
                running += 1;
            }
            subscribers += entry.subscribers;
        }
        RegistryStats {
            sessions: inner.sessions.len(),
            max_sessions: self.config.max_sessions,
            running,
            subscribers,
        }
    }

    // ── Subscriber accounting ────────────────────────────────────

    /// Attach a subscriber: returns a handle onto the session's packet
    /// stream and pins the session against eviction and sweep.
    pub fn attach(&self, key: &str) -> Result<Receiver<SamplePacket>, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .sessions
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound {
                key: key.to_string(),
            })?;
        entry.last_accessed = Instant::now();
        entry.subscribers += 1;
        Ok(entry.clock.packets())
    }

    /// Detach a subscriber (saturating; the receiver itself is just
    /// dropped by the caller).
    pub fn detach(&self, key: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .sessions
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound {
                key: key.to_string(),
            })?;
        entry.last_accessed = Instant::now();
        entry.subscribers = entry.subscribers.saturating_sub(1);
        Ok(())
    }

    // ── Control surface ──────────────────────────────────────────

    /// Start (or resume) the keyed session.
    pub fn start(&self, key: &str) -> Result<(), RegistryError> {
        self.with_clock(key, |c| c.start().map_err(RegistryError::from))
    }

    /// Pause the keyed session.
    pub fn pause(&self, key: &str) -> Result<(), RegistryError> {
        self.with_clock(key, |c| c.pause().map_err(RegistryError::from))
    }

    /// Resume the keyed session.
    pub fn resume(&self, key: &str) -> Result<(), RegistryError> {
        self.with_clock(key, |c| c.resume().map_err(RegistryError::from))
    }

    /// Stop the keyed session permanently (the entry remains listed
    /// until deleted or swept).
    pub fn stop(&self, key: &str) -> Result<(), RegistryError> {
        self.with_clock(key, |c| {
            c.stop();
            Ok(())
        })
    }

    /// Move the keyed session's cursor to an absolute index.
    pub fn seek(&self, key: &str, index: u64) -> Result<(), RegistryError> {
        self.with_clock(key, |c| c.seek(index).map_err(RegistryError::from))
    }

    /// Move the keyed session's cursor to the start of a trial.
    pub fn seek_trial(&self, key: &str, trial: TrialId) -> Result<(), RegistryError> {
        self.with_clock(key, |c| c.seek_trial(trial).map_err(RegistryError::from))
    }

    /// Install, replace, or clear the keyed session's emission filter.
    ///
    /// Supplying both a trial and a target is rejected; the two filters
    /// are mutually exclusive.
    pub fn set_filter(
        &self,
        key: &str,
        trial: Option<TrialId>,
        target: Option<TargetId>,
    ) -> Result<(), RegistryError> {
        let filter = ReplayFilter::from_parts(trial, target).map_err(RegistryError::from)?;
        self.with_clock(key, |c| c.set_filter(filter).map_err(RegistryError::from))
    }

    /// Statistics snapshot of the keyed session.
    pub fn get_stats(&self, key: &str) -> Result<ReplayStats, RegistryError> {
        self.with_clock(key, |c| Ok(c.get_stats()))
    }

    /// Stream metadata of the keyed session.
    pub fn metadata(&self, key: &str) -> Result<StreamMetadata, RegistryError> {
        self.with_clock(key, |c| Ok(c.metadata().clone()))
    }

    /// Stop the sweeper, stop every session, and release the pool.
    ///
    /// Idempotent; also invoked by `Drop`.
    pub fn shutdown(&mut self) {
        {
            let mut stop = self.sweeper_shared.stop.lock().unwrap();
            *stop = true;
            self.sweeper_shared.cond.notify_all();
        }
        if let Some(handle) = self.sweeper.take() {
            let _ = handle.join();
        }

        let drained: Vec<(String, SessionEntry)> = {
            let mut inner = self.inner.lock().unwrap();
            inner.sessions.drain(..).collect()
        };
        for (key, entry) in drained {
            entry.clock.stop();
            debug!(key, "session stopped on shutdown");
        }
    }

    // ── Internals ────────────────────────────────────────────────

    /// Clone the keyed clock handle out of the map (touching the
    /// activity stamp), then run `f` without holding the map lock.
    fn with_clock<R>(
        &self,
        key: &str,
        f: impl FnOnce(&ReplayClock) -> Result<R, RegistryError>,
    ) -> Result<R, RegistryError> {
        let clock = {
            let mut inner = self.inner.lock().unwrap();
            let entry = inner
                .sessions
                .get_mut(key)
                .ok_or_else(|| RegistryError::NotFound {
                    key: key.to_string(),
                })?;
            entry.last_accessed = Instant::now();
            Arc::clone(&entry.clock)
        };
        f(&clock)
    }

    /// Evict one LRU session, or fail with `AtCapacity`.
    ///
    /// Candidates must have zero subscribers and idle time past the
    /// grace period; among them the least recently accessed wins, with
    /// creation time breaking ties.
    fn evict_one(&self, inner: &mut RegistryInner) -> Result<(), RegistryError> {
        let now = Instant::now();
        let victim = inner
            .sessions
            .iter()
            .filter(|(_, e)| {
                e.subscribers == 0
                    && now.duration_since(e.last_accessed) >= self.config.eviction_grace
            })
            .min_by_key(|(_, e)| (e.last_accessed, e.created_at))
            .map(|(k, _)| k.clone());

        match victim {
            Some(key) => {
                if let Some(entry) = inner.sessions.shift_remove(&key) {
                    entry.clock.stop();
                }
                info!(key, "evicted idle session at capacity");
                Ok(())
            }
            None => {
                warn!(
                    max_sessions = self.config.max_sessions,
                    "session ceiling reached, no session evictable"
                );
                Err(RegistryError::AtCapacity {
                    max_sessions: self.config.max_sessions,
                })
            }
        }
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Remove sessions with zero subscribers idle past `ttl`; returns the
/// count removed. Shared by the public method and the sweeper thread.
fn sweep(inner: &Mutex<RegistryInner>, ttl: Duration) -> usize {
    let expired: Vec<(String, SessionEntry)> = {
        let mut inner = inner.lock().unwrap();
        let now = Instant::now();
        let keys: Vec<String> = inner
            .sessions
            .iter()
            .filter(|(_, e)| e.subscribers == 0 && now.duration_since(e.last_accessed) > ttl)
            .map(|(k, _)| k.clone())
            .collect();
        keys.into_iter()
            .filter_map(|k| inner.sessions.shift_remove(&k).map(|e| (k, e)))
            .collect()
    };
    let count = expired.len();
    for (key, entry) in expired {
        entry.clock.stop();
        info!(key, "expired session swept");
    }
    count
}

/// Sweeper thread body: periodic sweep with condvar-interruptible waits.
fn sweeper_loop(
    inner: Arc<Mutex<RegistryInner>>,
    shared: Arc<SweeperShared>,
    sweep_interval: Duration,
    session_ttl: Duration,
) {
    let mut stop = shared.stop.lock().unwrap();
    loop {
        if *stop {
            return;
        }
        let (guard, timeout) = shared
            .cond
            .wait_timeout(stop, sweep_interval)
            .unwrap();
        stop = guard;
        if *stop {
            return;
        }
        if timeout.timed_out() {
            drop(stop);
            let swept = sweep(&inner, session_ttl);
            if swept > 0 {
                debug!(swept, "sweeper pass complete");
            }
            stop = shared.stop.lock().unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikecast_core::ControlError;
    use spikecast_test_utils::{SyntheticSource, UnreachableSource};

    fn registry_with(config: RegistryConfig) -> SessionRegistry {
        let source: Arc<dyn SampleSource> =
            Arc::new(SyntheticSource::new(1000, 4, Duration::from_millis(10)));
        SessionRegistry::new(source, config).unwrap()
    }

    fn quick_config() -> RegistryConfig {
        RegistryConfig {
            eviction_grace: Duration::ZERO,
            ..RegistryConfig::default()
        }
    }

    #[test]
    fn new_rejects_unreachable_source() {
        let err = SessionRegistry::new(Arc::new(UnreachableSource), RegistryConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RegistryError::Init(InitError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn new_rejects_invalid_config() {
        let source: Arc<dyn SampleSource> =
            Arc::new(SyntheticSource::new(10, 2, Duration::from_millis(10)));
        let config = RegistryConfig {
            max_sessions: 0,
            ..RegistryConfig::default()
        };
        let err = SessionRegistry::new(source, config).err().unwrap();
        assert!(matches!(
            err,
            RegistryError::Init(InitError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn generated_keys_are_unique_and_readable() {
        let registry = registry_with(quick_config());
        let a = registry.create(None).unwrap();
        let b = registry.create(None).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.split('-').count(), 3);
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn custom_key_is_get_or_create() {
        let registry = registry_with(quick_config());
        let first = registry.create(Some("lab-rig-3")).unwrap();
        let second = registry.get_or_create("lab-rig-3").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let registry = registry_with(quick_config());
        let key = registry.create(None).unwrap();
        assert!(registry.delete(&key));
        assert!(!registry.delete(&key));
        assert!(matches!(
            registry.get_stats(&key),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn unknown_key_is_not_found() {
        let registry = registry_with(quick_config());
        assert!(matches!(
            registry.start("missing"),
            Err(RegistryError::NotFound { .. })
        ));
        assert!(matches!(
            registry.attach("missing"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn filter_conflict_is_rejected_before_touching_the_session() {
        let registry = registry_with(quick_config());
        let key = registry.create(None).unwrap();
        let err = registry
            .set_filter(&key, Some(TrialId(1)), Some(TargetId(2)))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Control(ControlError::FilterConflict)
        ));
    }

    #[test]
    fn eviction_prefers_least_recently_accessed() {
        let config = RegistryConfig {
            max_sessions: 2,
            ..quick_config()
        };
        let registry = registry_with(config);
        let oldest = registry.create(None).unwrap();
        let newer = registry.create(None).unwrap();
        // Touch the newer session so the first becomes LRU.
        registry.get_stats(&newer).unwrap();

        let third = registry.create(None).unwrap();
        let keys: Vec<String> = registry.list().into_iter().map(|s| s.key).collect();
        assert!(!keys.contains(&oldest), "LRU session not evicted");
        assert!(keys.contains(&newer));
        assert!(keys.contains(&third));
    }

    #[test]
    fn subscribed_sessions_are_never_evicted() {
        let config = RegistryConfig {
            max_sessions: 1,
            ..quick_config()
        };
        let registry = registry_with(config);
        let key = registry.create(None).unwrap();
        let _rx = registry.attach(&key).unwrap();

        let err = registry.create(None).unwrap_err();
        assert_eq!(err, RegistryError::AtCapacity { max_sessions: 1 });
        assert_eq!(registry.list()[0].key, key);

        // Detaching frees the slot again.
        registry.detach(&key).unwrap();
        assert!(registry.create(None).is_ok());
    }

    #[test]
    fn eviction_grace_protects_recent_sessions() {
        let config = RegistryConfig {
            max_sessions: 1,
            eviction_grace: Duration::from_secs(60),
            ..RegistryConfig::default()
        };
        let registry = registry_with(config);
        registry.create(None).unwrap();
        // The only candidate is idle but well inside the grace window.
        let err = registry.create(None).unwrap_err();
        assert_eq!(err, RegistryError::AtCapacity { max_sessions: 1 });
    }

    #[test]
    fn sweep_removes_only_idle_unsubscribed_sessions() {
        let config = RegistryConfig {
            session_ttl: Duration::from_millis(1),
            ..quick_config()
        };
        let registry = registry_with(config);
        let idle = registry.create(None).unwrap();
        let busy = registry.create(None).unwrap();
        let _rx = registry.attach(&busy).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(registry.sweep_expired(), 1);
        let keys: Vec<String> = registry.list().into_iter().map(|s| s.key).collect();
        assert!(!keys.contains(&idle));
        assert!(keys.contains(&busy));
    }

    #[test]
    fn registry_stats_totals() {
        let registry = registry_with(quick_config());
        let a = registry.create(None).unwrap();
        let _b = registry.create(None).unwrap();
        let _rx = registry.attach(&a).unwrap();
        registry.start(&a).unwrap();

        let stats = registry.registry_stats();
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.max_sessions, 16);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut registry = registry_with(quick_config());
        registry.create(None).unwrap();
        registry.shutdown();
        registry.shutdown();
        assert!(registry.list().is_empty());
    }
}
