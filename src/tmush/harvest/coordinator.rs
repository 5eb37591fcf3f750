use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, info, trace, warn};

use crate::tmush::errors::TinyMushError;
use crate::tmush::harvest::job::{Audience, HarvestJob, JobEvent};
use crate::tmush::scheduler::{TickCallback, TickScheduler};
use crate::tmush::types::HARVEST_VERB;
use crate::tmush::world::{HarvestWorld, MoveListener};

/// Tuning for harvest jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    /// Scheduler time units between strikes.
    pub interval_units: u32,
    /// Hit points removed per strike.
    pub strike_power: u32,
    /// Capability verb checked before a job starts.
    pub access_verb: String,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            interval_units: 2,
            strike_power: 5,
            access_verb: HARVEST_VERB.to_string(),
        }
    }
}

/// Result of [`HarvestCoordinator::stop_job`] and [`HarvestCoordinator::interrupt_job`].
#[derive(Debug, Clone)]
pub enum StopOutcome {
    /// The job reached a terminal state; this is its final snapshot.
    Ended(HarvestJob),
    NothingToStop,
}

impl StopOutcome {
    pub fn ended(&self) -> bool {
        matches!(self, StopOutcome::Ended(_))
    }
}

/// Process-wide registry of harvest jobs, at most one per actor.
///
/// Every transition runs inside the `jobs` critical section, and terminal
/// transitions cancel the tick registration before the lock is released. A
/// tick that was already in flight then finds no matching job and does nothing.
pub struct HarvestCoordinator {
    world: Arc<dyn HarvestWorld>,
    scheduler: Arc<dyn TickScheduler>,
    settings: HarvestSettings,
    jobs: Mutex<HashMap<String, HarvestJob>>,
    next_job_id: AtomicU64,
    this: Weak<HarvestCoordinator>,
}

impl HarvestCoordinator {
    pub fn new(
        world: Arc<dyn HarvestWorld>,
        scheduler: Arc<dyn TickScheduler>,
        settings: HarvestSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            world,
            scheduler,
            settings,
            jobs: Mutex::new(HashMap::new()),
            next_job_id: AtomicU64::new(1),
            this: this.clone(),
        })
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, HarvestJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin harvesting `target_id` on behalf of `actor_id`.
    pub fn start_job(&self, actor_id: &str, target_id: &str) -> Result<HarvestJob, TinyMushError> {
        let mut jobs = self.jobs();
        if jobs.contains_key(actor_id) {
            return Err(TinyMushError::AlreadyHarvesting);
        }

        let target = self.world.harvest_target(target_id)?;
        if target.is_destroyed() {
            return Err(TinyMushError::TargetGone);
        }
        let target_name = self
            .world
            .display_name(target_id)
            .unwrap_or_else(|| target_id.to_string());
        if !self
            .world
            .access(actor_id, target_id, &self.settings.access_verb)
        {
            debug!(
                "{} denied '{}' on {}",
                actor_id, self.settings.access_verb, target_id
            );
            return Err(TinyMushError::PermissionDenied(format!(
                "You can't {} {}.",
                self.settings.access_verb, target_name
            )));
        }

        let job_id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        let mut job = HarvestJob::new(job_id, actor_id, target_id, &target_name);

        let handle = self
            .scheduler
            .schedule_periodic(self.settings.interval_units, self.tick_callback(actor_id, job_id));
        if let Some(event) = job.activate(handle) {
            self.announce(&job, &event);
        }

        info!(
            "harvest job {} started: actor={} target={} hp={}/{}",
            job_id,
            actor_id,
            target_id,
            target.hp(),
            target.max_hp()
        );
        jobs.insert(actor_id.to_string(), job.clone());
        Ok(job)
    }

    fn tick_callback(&self, actor_id: &str, job_id: u64) -> TickCallback {
        let this = self.this.clone();
        let actor = actor_id.to_string();
        Arc::new(move || {
            if let Some(coordinator) = this.upgrade() {
                coordinator.tick(&actor, job_id);
            }
        })
    }

    /// Advance `actor_id`'s job by one strike. Ticks for a job that has since
    /// ended (or been replaced) are ignored.
    pub fn tick(&self, actor_id: &str, job_id: u64) {
        let mut jobs = self.jobs();
        let Some(job) = jobs.get_mut(actor_id) else {
            trace!("ignoring tick for {}: no job", actor_id);
            return;
        };
        if job.id() != job_id || !job.is_active() {
            trace!("ignoring stale tick {} for {}", job_id, actor_id);
            return;
        }

        let result = self
            .world
            .strike_target(job.target_id(), self.settings.strike_power);
        if let Err(e) = &result {
            debug!("harvest job {} lost its target: {}", job_id, e);
        }
        let events = job.on_strike(result);
        for event in &events {
            self.announce(job, event);
        }

        if job.state().is_terminal() {
            if let Some(mut finished) = jobs.remove(actor_id) {
                self.release(&mut finished);
                info!(
                    "harvest job {} finished after {} ticks: {:?}",
                    job_id,
                    finished.ticks_elapsed(),
                    finished.state()
                );
            }
        }
    }

    /// Voluntary stop. Reports `NothingToStop` when the actor is idle.
    pub fn stop_job(&self, actor_id: &str) -> StopOutcome {
        self.end_job(actor_id, HarvestJob::stop)
    }

    /// Early termination because something else happened to the actor.
    pub fn interrupt_job(&self, actor_id: &str) -> StopOutcome {
        self.end_job(actor_id, HarvestJob::interrupt)
    }

    fn end_job(
        &self,
        actor_id: &str,
        transition: fn(&mut HarvestJob) -> Option<JobEvent>,
    ) -> StopOutcome {
        let mut jobs = self.jobs();
        let Some(mut job) = jobs.remove(actor_id) else {
            return StopOutcome::NothingToStop;
        };
        self.release(&mut job);
        if let Some(event) = transition(&mut job) {
            self.announce(&job, &event);
        }
        info!(
            "harvest job {} ended by request: actor={} state={:?}",
            job.id(),
            actor_id,
            job.state()
        );
        StopOutcome::Ended(job)
    }

    /// Drop the registry entry for `actor_id`. Safe to call repeatedly.
    pub fn deregister(&self, actor_id: &str) -> bool {
        match self.jobs().remove(actor_id) {
            Some(mut job) => {
                self.release(&mut job);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the actor's current job.
    pub fn job(&self, actor_id: &str) -> Option<HarvestJob> {
        self.jobs().get(actor_id).cloned()
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs().len()
    }

    /// Interrupt every job, e.g. on shutdown.
    pub fn shutdown(&self) -> usize {
        let actors: Vec<String> = self.jobs().keys().cloned().collect();
        actors
            .iter()
            .filter(|actor| self.interrupt_job(actor).ended())
            .count()
    }

    fn release(&self, job: &mut HarvestJob) {
        if let Some(handle) = job.take_tick_handle() {
            self.scheduler.cancel(handle);
        }
    }

    fn announce(&self, job: &HarvestJob, event: &JobEvent) {
        let actor_id = job.actor_id();
        let actor_name = self
            .world
            .display_name(actor_id)
            .unwrap_or_else(|| actor_id.to_string());
        let location = self.world.location_of(actor_id);

        for (audience, text) in event.deliveries(&actor_name, job.target_name()) {
            match (audience, location.as_deref()) {
                (Audience::Actor, _) => self.world.notify(actor_id, &text, &[]),
                (Audience::Room, Some(room)) => self.world.notify(room, &text, &[]),
                (Audience::RoomExceptActor, Some(room)) => {
                    self.world.notify(room, &text, &[actor_id])
                }
                (_, None) => warn!("{} has no location; dropped room text", actor_id),
            }
        }
    }
}

impl MoveListener for HarvestCoordinator {
    fn before_move(&self, mover: &str) {
        if self.interrupt_job(mover).ended() {
            debug!("interrupted harvest for {} before move", mover);
        }
    }
}
