//! TinyMUSH world model: stackable objects, harvestable targets and the
//! timed jobs that chop them down, plus Sled-backed persistence.

pub mod commands;
pub mod errors;
pub mod harvest;
pub mod inventory;
pub mod scheduler;
pub mod stack;
pub mod storage;
pub mod types;
pub mod world;

pub use commands::{parse_command, TinyMushCommand, TinyMushProcessor};
pub use errors::TinyMushError;
pub use harvest::{
    HarvestCoordinator, HarvestJob, HarvestSettings, HarvestTarget, JobState, StopOutcome,
};
pub use inventory::{drop_item, get_item, give_item};
pub use scheduler::{ManualScheduler, TickHandle, TickScheduler, TokioScheduler};
pub use stack::{ConsumeResult, SplitResult, StackUnit};
pub use storage::ObjectStore;
pub use types::*;
pub use world::{Notice, TransferRequest, World};
