//! # Mushcraft - Harvesting and Stacking for a TinyMUSH World
//!
//! Mushcraft models a small text-world crafting loop: characters chop down
//! trees over several timed strikes, felled trees drop stackable logs, and
//! logs can be picked up, split, merged and handed around.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mushcraft::tmush::{HarvestCoordinator, HarvestSettings, ManualScheduler, World};
//!
//! let world = Arc::new(World::new());
//! let scheduler = Arc::new(ManualScheduler::new());
//! let coordinator = HarvestCoordinator::new(world.clone(), scheduler.clone(), HarvestSettings::default());
//! world.watch_moves(&coordinator);
//! ```
//!
//! ## Module Organization
//!
//! - [`tmush`] - World objects, stacks, harvest jobs, commands and storage
//! - [`config`] - TOML configuration
//! - [`logutil`] - Helpers for single-line log output

pub mod config;
pub mod logutil;
pub mod tmush;
