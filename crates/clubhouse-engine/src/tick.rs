// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recurring tick for display observers and the periodic sweep.
//!
//! Every tick the [`TickScheduler`] notifies each registered
//! [`TickObserver`] in one serialized pass under the observer-list lock.
//! Every few ticks it spawns the [`ActivationSweep`] in its own task,
//! outside that lock. At most one sweep is in flight, and storage failures
//! push the next sweep back exponentially up to a configured ceiling.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clubhouse_config::SchedulerConfig;
use clubhouse_core::{Clock, ClubError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::sweep::{ActivationSweep, SweepReport};

/// Receives the current time on every tick.
///
/// Called synchronously while the observer list is locked, so `on_tick`
/// must be quick and must not register or unregister observers.
pub trait TickObserver: Send + Sync + 'static {
    fn on_tick(&self, now: DateTime<Utc>);
}

/// Handle returned by [`TickScheduler::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

/// Tick cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSettings {
    pub tick_interval: Duration,
    pub sweep_interval: Duration,
    pub max_backoff: Duration,
}

impl TickSettings {
    /// Number of ticks between sweeps, at least one.
    pub fn ticks_per_sweep(&self) -> u64 {
        let tick = self.tick_interval.as_millis().max(1);
        let every = self.sweep_interval.as_millis() / tick;
        u64::try_from(every).unwrap_or(u64::MAX).max(1)
    }
}

impl From<&SchedulerConfig> for TickSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            sweep_interval: config.activation_interval(),
            max_backoff: config.max_backoff(),
        }
    }
}

/// Exponential delay after consecutive sweep failures.
#[derive(Debug)]
struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
    resume_at: Option<Instant>,
}

impl Backoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
            resume_at: None,
        }
    }

    /// `base * 2^failures`, capped at `max`.
    fn delay(&self) -> Duration {
        let factor = 1u32 << self.failures.min(16);
        self.base.saturating_mul(factor).min(self.max)
    }

    fn record_failure(&mut self, now: Instant) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.delay();
        self.resume_at = Some(now + delay);
        delay
    }

    fn record_success(&mut self) {
        self.failures = 0;
        self.resume_at = None;
    }

    fn ready(&self, now: Instant) -> bool {
        self.resume_at.is_none_or(|at| now >= at)
    }
}

type ObserverList = Vec<(ObserverToken, Arc<dyn TickObserver>)>;

struct Shared {
    clock: Arc<dyn Clock>,
    settings: TickSettings,
    observers: Mutex<ObserverList>,
    next_token: AtomicU64,
    sweep: Option<Arc<dyn ActivationSweep>>,
    sweep_in_flight: AtomicBool,
    backoff: Mutex<Backoff>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Notify every observer, evicting any that panic. Returns how many
    /// observers remain.
    fn notify(&self, now: DateTime<Utc>) -> usize {
        let mut observers = lock(&self.observers);
        let mut evicted = Vec::new();
        for (token, observer) in observers.iter() {
            if catch_unwind(AssertUnwindSafe(|| observer.on_tick(now))).is_err() {
                error!(token = token.0, "tick observer panicked, unregistering it");
                evicted.push(*token);
            }
        }
        if !evicted.is_empty() {
            observers.retain(|(token, _)| !evicted.contains(token));
        }
        observers.len()
    }

    /// Claim the single sweep slot unless a sweep is running or backing off.
    fn try_claim_sweep(&self) -> bool {
        if !lock(&self.backoff).ready(Instant::now()) {
            debug!("sweep skipped, backing off after storage failure");
            return false;
        }
        if self.sweep_in_flight.swap(true, Ordering::AcqRel) {
            debug!("sweep skipped, previous sweep still running");
            return false;
        }
        true
    }

    fn finish_sweep(&self, result: &Result<SweepReport, ClubError>) {
        match result {
            Ok(_) => lock(&self.backoff).record_success(),
            Err(e) if e.is_storage() => {
                let delay = lock(&self.backoff).record_failure(Instant::now());
                warn!(error = %e, backoff_secs = delay.as_secs(), "sweep failed, backing off");
            }
            Err(e) => error!(error = %e, "sweep failed"),
        }
        self.sweep_in_flight.store(false, Ordering::Release);
    }

    fn spawn_sweep(self: &Arc<Self>) {
        let Some(sweep) = self.sweep.clone() else {
            return;
        };
        if !self.try_claim_sweep() {
            return;
        }
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let result = sweep.sweep().await;
            shared.finish_sweep(&result);
        });
    }
}

/// Drives observers and the sweep on a fixed cadence.
pub struct TickScheduler {
    shared: Arc<Shared>,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl TickScheduler {
    pub fn new(clock: Arc<dyn Clock>, settings: TickSettings) -> Self {
        Self::build(clock, settings, None)
    }

    /// A scheduler that also runs `sweep` every
    /// [`ticks_per_sweep`](TickSettings::ticks_per_sweep) ticks.
    pub fn with_sweep(
        clock: Arc<dyn Clock>,
        settings: TickSettings,
        sweep: Arc<dyn ActivationSweep>,
    ) -> Self {
        Self::build(clock, settings, Some(sweep))
    }

    fn build(
        clock: Arc<dyn Clock>,
        settings: TickSettings,
        sweep: Option<Arc<dyn ActivationSweep>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                clock,
                settings,
                observers: Mutex::new(Vec::new()),
                next_token: AtomicU64::new(1),
                sweep,
                sweep_in_flight: AtomicBool::new(false),
                backoff: Mutex::new(Backoff::new(settings.sweep_interval, settings.max_backoff)),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn register(&self, observer: Arc<dyn TickObserver>) -> ObserverToken {
        let token = ObserverToken(self.shared.next_token.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.observers).push((token, observer));
        token
    }

    /// Remove an observer. Returns `false` if the token was unknown or the
    /// observer was already evicted.
    pub fn unregister(&self, token: ObserverToken) -> bool {
        let mut observers = lock(&self.shared.observers);
        let before = observers.len();
        observers.retain(|(t, _)| *t != token);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.shared.observers).len()
    }

    /// Run one observer pass at the clock's current time.
    pub fn notify_now(&self) -> usize {
        self.shared.notify(self.shared.clock.now())
    }

    /// Run the sweep inline, honoring the in-flight slot and the backoff.
    ///
    /// Returns `None` if there is no sweep or it is not allowed to run now.
    pub async fn sweep_now(&self) -> Option<Result<SweepReport, ClubError>> {
        let sweep = self.shared.sweep.clone()?;
        if !self.shared.try_claim_sweep() {
            return None;
        }
        let result = sweep.sweep().await;
        self.shared.finish_sweep(&result);
        Some(result)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Start ticking. The loop stops when `shutdown` or [`stop`](Self::stop)
    /// cancels it.
    pub fn start(&self, shutdown: &CancellationToken) -> Result<(), ClubError> {
        let mut running = lock(&self.running);
        if running.is_some() {
            return Err(ClubError::InvalidState(
                "tick scheduler is already running".to_string(),
            ));
        }
        let cancel = shutdown.child_token();
        let handle = tokio::spawn(run(Arc::clone(&self.shared), cancel.clone()));
        *running = Some((cancel, handle));
        info!(
            tick_ms = self.shared.settings.tick_interval.as_millis() as u64,
            ticks_per_sweep = self.shared.settings.ticks_per_sweep(),
            "tick scheduler started"
        );
        Ok(())
    }

    /// Stop ticking and wait for the loop to exit. A sweep already in
    /// flight finishes on its own.
    pub async fn stop(&self) {
        let running = lock(&self.running).take();
        if let Some((cancel, handle)) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!(error = %e, "tick loop ended abnormally");
            }
            info!("tick scheduler stopped");
        }
    }
}

async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(shared.settings.tick_interval.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let every = shared.settings.ticks_per_sweep();
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = shared.clock.now();
                shared.notify(now);
                // The first tick sweeps right away to catch up after a restart.
                if ticks % every == 0 {
                    shared.spawn_sweep();
                }
                ticks = ticks.wrapping_add(1);
            }
            _ = cancel.cancelled() => {
                debug!("tick loop cancelled");
                break;
            }
        }
    }
}
