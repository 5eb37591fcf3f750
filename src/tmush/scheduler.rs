//! Periodic tick delivery for harvest jobs.
//!
//! Two implementations of [`TickScheduler`]:
//! * [`TokioScheduler`] spawns one tokio task per registration and drives it
//!   with `tokio::time::interval`. Used by the binary.
//! * [`ManualScheduler`] holds registrations until the caller advances time.
//!   Used by tests and dry-run simulations where tick order must be exact.
//!
//! Contract shared by both: once `cancel` returns, the callback for that handle
//! is never invoked again.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, trace};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Callback invoked on every tick.
pub type TickCallback = Arc<dyn Fn() + Send + Sync>;

/// Opaque registration id returned by [`TickScheduler::schedule_periodic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickHandle(u64);

impl TickHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

pub trait TickScheduler: Send + Sync {
    /// Invoke `callback` every `interval_units` time units until cancelled.
    fn schedule_periodic(&self, interval_units: u32, callback: TickCallback) -> TickHandle;

    /// Stop delivery for `handle`. Unknown handles are ignored.
    fn cancel(&self, handle: TickHandle);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct PeriodicTask {
    join: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

/// Tokio-backed scheduler. One time unit maps to `unit` of wall-clock time.
pub struct TokioScheduler {
    runtime: tokio::runtime::Handle,
    unit: Duration,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, PeriodicTask>>,
}

impl TokioScheduler {
    pub fn new(runtime: tokio::runtime::Handle, unit: Duration) -> Self {
        Self {
            runtime,
            unit,
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of registrations not yet cancelled.
    pub fn active(&self) -> usize {
        lock(&self.tasks).len()
    }
}

impl TickScheduler for TokioScheduler {
    fn schedule_periodic(&self, interval_units: u32, callback: TickCallback) -> TickHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let period = (self.unit * interval_units.max(1)).max(Duration::from_millis(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let join = self.runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                callback();
            }
            trace!("periodic task {} finished", id);
        });

        lock(&self.tasks).insert(id, PeriodicTask { join, cancelled });
        debug!("scheduled periodic task {} every {:?}", id, period);
        TickHandle(id)
    }

    fn cancel(&self, handle: TickHandle) {
        if let Some(task) = lock(&self.tasks).remove(&handle.0) {
            task.cancelled.store(true, Ordering::Release);
            task.join.abort();
            debug!("cancelled periodic task {}", handle.0);
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in lock(&self.tasks).drain() {
            task.cancelled.store(true, Ordering::Release);
            task.join.abort();
        }
    }
}

struct Registration {
    interval: u32,
    elapsed: u32,
    callback: TickCallback,
}

/// Deterministic scheduler: nothing fires until [`ManualScheduler::advance`].
#[derive(Default)]
pub struct ManualScheduler {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, Registration>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `units`, firing every registration whose interval
    /// elapses. Returns the number of callbacks invoked.
    pub fn advance(&self, units: u32) -> usize {
        let mut fired = 0;
        for _ in 0..units {
            let due: Vec<(u64, TickCallback)> = {
                let mut entries = lock(&self.entries);
                entries
                    .iter_mut()
                    .filter_map(|(id, reg)| {
                        reg.elapsed += 1;
                        if reg.elapsed >= reg.interval {
                            reg.elapsed = 0;
                            Some((*id, reg.callback.clone()))
                        } else {
                            None
                        }
                    })
                    .collect()
            };
            fired += self.deliver(due);
        }
        fired
    }

    /// Fire every registration once, ignoring intervals.
    pub fn fire_all(&self) -> usize {
        let due: Vec<(u64, TickCallback)> = lock(&self.entries)
            .iter()
            .map(|(id, reg)| (*id, reg.callback.clone()))
            .collect();
        self.deliver(due)
    }

    // Callbacks run without the registry lock held so they may cancel.
    fn deliver(&self, due: Vec<(u64, TickCallback)>) -> usize {
        let mut fired = 0;
        for (id, callback) in due {
            if !lock(&self.entries).contains_key(&id) {
                continue;
            }
            callback();
            fired += 1;
        }
        fired
    }

    pub fn registered(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_registered(&self, handle: TickHandle) -> bool {
        lock(&self.entries).contains_key(&handle.0)
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule_periodic(&self, interval_units: u32, callback: TickCallback) -> TickHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.entries).insert(
            id,
            Registration {
                interval: interval_units.max(1),
                elapsed: 0,
                callback,
            },
        );
        TickHandle(id)
    }

    fn cancel(&self, handle: TickHandle) {
        lock(&self.entries).remove(&handle.0);
    }
}
