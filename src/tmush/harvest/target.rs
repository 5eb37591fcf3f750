use serde::{Deserialize, Serialize};

use crate::tmush::errors::TinyMushError;
use crate::tmush::world::Spawner;

/// Depletable resource carried by a harvestable object (a tree, an ore vein).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarvestTarget {
    hp: u32,
    max_hp: u32,
    yield_kind: String,
    yield_amount: u32,
    #[serde(default)]
    destroyed: bool,
}

/// Result of a successful [`HarvestTarget::strike`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrikeOutcome {
    Continuing { hp: u32, max_hp: u32 },
    /// Hit points ran out; `spawned` holds the yield objects created.
    Depleted { spawned: Vec<String> },
}

impl HarvestTarget {
    /// A fresh target at full hit points.
    pub fn new(max_hp: u32, yield_kind: &str, yield_amount: u32) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            yield_kind: yield_kind.to_string(),
            yield_amount,
            destroyed: false,
        }
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn yield_kind(&self) -> &str {
        &self.yield_kind
    }

    pub fn yield_amount(&self) -> u32 {
        self.yield_amount
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Remove `power` hit points. Reaching zero spawns the yield at `location`
    /// and marks the target destroyed; any later strike fails with `TargetGone`.
    pub fn strike(
        &mut self,
        power: u32,
        location: &str,
        spawner: &dyn Spawner,
    ) -> Result<StrikeOutcome, TinyMushError> {
        if self.destroyed {
            return Err(TinyMushError::TargetGone);
        }

        self.hp = self.hp.saturating_sub(power);
        if self.hp > 0 {
            return Ok(StrikeOutcome::Continuing {
                hp: self.hp,
                max_hp: self.max_hp,
            });
        }

        self.destroyed = true;
        let spawned = spawner.spawn(&self.yield_kind, location, self.yield_amount);
        Ok(StrikeOutcome::Depleted { spawned })
    }
}
