//! Timed, interruptible harvesting (chopping trees, mining veins).
//!
//! A [`HarvestCoordinator`] owns at most one [`HarvestJob`] per actor and
//! drives it with periodic ticks; each tick strikes the job's
//! [`HarvestTarget`] until it is depleted, the actor stops, or movement
//! interrupts the job.

pub mod coordinator;
pub mod job;
pub mod target;

pub use coordinator::{HarvestCoordinator, HarvestSettings, StopOutcome};
pub use job::{Audience, HarvestJob, JobEvent, JobState, Threshold};
pub use target::{HarvestTarget, StrikeOutcome};
