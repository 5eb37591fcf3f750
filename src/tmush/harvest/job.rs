//! Per-actor harvest state machine.
//!
//! ```text
//!            activate              tick (Continuing)
//!   Idle ─────────────▶ Active ◀──────────────┐
//!                         │ └──────────────────┘
//!        stop / depleted  │  interrupt
//!        / target lost    │
//!            ▼            ▼
//!        Completed    Interrupted
//! ```
//!
//! The job only records transitions and reports [`JobEvent`]s. Cancelling the
//! tick registration and delivering text is the coordinator's job.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::tmush::errors::TinyMushError;
use crate::tmush::harvest::target::StrikeOutcome;
use crate::tmush::scheduler::TickHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Active,
    Interrupted,
    Completed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Interrupted | JobState::Completed)
    }
}

/// Warning markers, each emitted at most once per job.
///
/// Thresholds are inclusive: Wedge fires once hp is at or below half of
/// max hp, Leaning at or below a quarter. Each threshold is tracked on its
/// own, so on a 20 hp tree struck for 5 Wedge fires at 10 and Leaning still
/// fires at 5; only a repeat of an already fired threshold is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// hp at or below half.
    Wedge,
    /// hp at or below a quarter.
    Leaning,
}

impl Threshold {
    pub const ALL: [Threshold; 2] = [Threshold::Wedge, Threshold::Leaning];

    pub fn crossed(self, hp: u32, max_hp: u32) -> bool {
        match self {
            Threshold::Wedge => hp <= max_hp / 2,
            Threshold::Leaning => hp <= max_hp / 4,
        }
    }
}

/// Who hears a rendered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Actor,
    Room,
    RoomExceptActor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Began,
    Swing { hp: u32 },
    Warning(Threshold),
    Felled { spawned: usize },
    TargetLost,
    Stopped,
    Interrupted,
}

impl JobEvent {
    /// Player-visible text for this event.
    pub fn deliveries(&self, actor: &str, target: &str) -> Vec<(Audience, String)> {
        match self {
            JobEvent::Began => vec![
                (
                    Audience::Actor,
                    format!(
                        "You swing your axe into {}, leaving a sizeable impression.",
                        target
                    ),
                ),
                (
                    Audience::RoomExceptActor,
                    format!(
                        "Chips of wood fly everywhere as {} swings their axe into {}.",
                        actor, target
                    ),
                ),
            ],
            JobEvent::Swing { .. } => vec![
                (Audience::Actor, format!("You chop at {}.", target)),
                (
                    Audience::RoomExceptActor,
                    format!("{} chops at {}.", actor, target),
                ),
            ],
            JobEvent::Warning(Threshold::Wedge) => vec![(
                Audience::Actor,
                format!("You have cut a deep wedge into {}.", target),
            )],
            JobEvent::Warning(Threshold::Leaning) => vec![(
                Audience::Room,
                format!("{} begins to lean precariously.", target),
            )],
            JobEvent::Felled { .. } => vec![(
                Audience::Room,
                format!(
                    "{} makes a loud cracking sound and falls to the ground.",
                    target
                ),
            )],
            JobEvent::TargetLost => vec![(
                Audience::Actor,
                format!("There is nothing left of {} to chop.", target),
            )],
            JobEvent::Stopped => vec![
                (Audience::Actor, format!("You stop chopping {}.", target)),
                (
                    Audience::RoomExceptActor,
                    format!("{} stops chopping {}.", actor, target),
                ),
            ],
            JobEvent::Interrupted => vec![(
                Audience::Actor,
                format!("You abandon your work on {} as you move away.", target),
            )],
        }
    }
}

/// One actor's in-progress harvest. Holds the target by id only.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestJob {
    id: u64,
    actor_id: String,
    target_id: String,
    target_name: String,
    state: JobState,
    ticks_elapsed: u32,
    warning_flags: BTreeSet<Threshold>,
    #[serde(skip)]
    tick_handle: Option<TickHandle>,
}

impl HarvestJob {
    pub fn new(id: u64, actor_id: &str, target_id: &str, target_name: &str) -> Self {
        Self {
            id,
            actor_id: actor_id.to_string(),
            target_id: target_id.to_string(),
            target_name: target_name.to_string(),
            state: JobState::Idle,
            ticks_elapsed: 0,
            warning_flags: BTreeSet::new(),
            tick_handle: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == JobState::Active
    }

    pub fn ticks_elapsed(&self) -> u32 {
        self.ticks_elapsed
    }

    pub fn warning_flags(&self) -> &BTreeSet<Threshold> {
        &self.warning_flags
    }

    pub fn tick_handle(&self) -> Option<TickHandle> {
        self.tick_handle
    }

    /// Hand back the tick registration so it can be cancelled exactly once.
    pub fn take_tick_handle(&mut self) -> Option<TickHandle> {
        self.tick_handle.take()
    }

    /// Idle -> Active once ticks are registered.
    pub fn activate(&mut self, handle: TickHandle) -> Option<JobEvent> {
        if self.state != JobState::Idle {
            return None;
        }
        self.state = JobState::Active;
        self.tick_handle = Some(handle);
        Some(JobEvent::Began)
    }

    /// Apply the result of one strike. Returns nothing for a job that is not
    /// Active, so a late tick cannot revive a finished job.
    pub fn on_strike(&mut self, result: Result<StrikeOutcome, TinyMushError>) -> Vec<JobEvent> {
        if self.state != JobState::Active {
            return Vec::new();
        }
        self.ticks_elapsed += 1;

        match result {
            Ok(StrikeOutcome::Continuing { hp, max_hp }) => {
                let mut events = vec![JobEvent::Swing { hp }];
                for threshold in Threshold::ALL {
                    if threshold.crossed(hp, max_hp) && self.warning_flags.insert(threshold) {
                        events.push(JobEvent::Warning(threshold));
                    }
                }
                events
            }
            Ok(StrikeOutcome::Depleted { spawned }) => {
                self.state = JobState::Completed;
                vec![JobEvent::Felled {
                    spawned: spawned.len(),
                }]
            }
            Err(_) => {
                self.state = JobState::Completed;
                vec![JobEvent::TargetLost]
            }
        }
    }

    /// Voluntary stop: Active -> Completed.
    pub fn stop(&mut self) -> Option<JobEvent> {
        if self.state != JobState::Active {
            return None;
        }
        self.state = JobState::Completed;
        Some(JobEvent::Stopped)
    }

    /// External interruption: Active -> Interrupted.
    pub fn interrupt(&mut self) -> Option<JobEvent> {
        if self.state != JobState::Active {
            return None;
        }
        self.state = JobState::Interrupted;
        Some(JobEvent::Interrupted)
    }
}
