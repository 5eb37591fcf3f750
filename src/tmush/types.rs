use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::harvest::HarvestTarget;
use super::stack::StackUnit;

pub const OBJECT_SCHEMA_VERSION: u8 = 1;

/// Verb checked before an actor may begin harvesting a target.
pub const HARVEST_VERB: &str = "harvest";
pub const GET_VERB: &str = "get";
pub const DROP_VERB: &str = "drop";
pub const GIVE_VERB: &str = "give";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Room,
    Character,
    Item,
    Harvestable,
}

/// A single world object. Every object carries a [`StackUnit`]; only
/// harvestable objects carry a [`HarvestTarget`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectRecord {
    pub id: String,
    /// Prototype key. Two objects stack only when their kinds match.
    pub kind: String,
    pub name: String,
    pub description: String,
    pub class: ObjectClass,
    pub location: Option<String>,
    #[serde(default)]
    pub stack: StackUnit,
    #[serde(default)]
    pub harvest: Option<HarvestTarget>,
    /// Verb -> allowed. Verbs not listed are allowed.
    #[serde(default)]
    pub locks: HashMap<String, bool>,
    #[serde(default)]
    pub get_err_msg: Option<String>,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl ObjectRecord {
    fn base(id: &str, kind: &str, name: &str, description: &str, class: ObjectClass) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            class,
            location: None,
            stack: StackUnit::default(),
            harvest: None,
            locks: HashMap::new(),
            get_err_msg: None,
            created_at: Utc::now(),
            schema_version: OBJECT_SCHEMA_VERSION,
        }
    }

    pub fn room(id: &str, name: &str, description: &str) -> Self {
        let mut room = Self::base(id, "room", name, description, ObjectClass::Room);
        room.locks.insert(GET_VERB.to_string(), false);
        room
    }

    pub fn character(id: &str, name: &str, location: &str) -> Self {
        let mut character = Self::base(id, "character", name, "", ObjectClass::Character)
            .at(location);
        character.locks.insert(GET_VERB.to_string(), false);
        character
    }

    pub fn item(id: &str, kind: &str, name: &str, description: &str) -> Self {
        Self::base(id, kind, name, description, ObjectClass::Item)
    }

    /// A harvestable tree: cannot be picked up, may be chopped by anyone.
    pub fn tree(id: &str, name: &str, target: HarvestTarget) -> Self {
        let mut tree = Self::base(
            id,
            "tree",
            name,
            "A tall tree with rough bark.",
            ObjectClass::Harvestable,
        );
        tree.locks.insert(GET_VERB.to_string(), false);
        tree.locks.insert(HARVEST_VERB.to_string(), true);
        tree.get_err_msg = Some(format!(
            "You can't pick {} up. Try chopping it with an axe instead!",
            name
        ));
        tree.harvest = Some(target);
        tree
    }

    pub fn at(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn with_lock(mut self, verb: &str, allowed: bool) -> Self {
        self.locks.insert(verb.to_string(), allowed);
        self
    }

    pub fn with_stack(mut self, stack: StackUnit) -> Self {
        self.stack = stack;
        self
    }

    /// Lock lookup only; actor-specific rules belong to the capability checker.
    pub fn allows(&self, verb: &str) -> bool {
        self.locks.get(verb).copied().unwrap_or(true)
    }

    /// Name with the stack count folded in, e.g. "3 Log".
    pub fn display_name(&self) -> String {
        if self.stack.stackable() && self.stack.count() > 1 {
            format!("{} {}", self.stack.count(), self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Template used by the spawner to instantiate objects of a kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prototype {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub stackable: bool,
}

impl Prototype {
    pub fn new(name: &str, description: &str, stackable: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            stackable,
        }
    }

    pub fn instantiate(&self, id: &str, kind: &str, location: &str) -> ObjectRecord {
        let mut stack = StackUnit::default();
        stack.set_stackable(self.stackable);
        ObjectRecord::item(id, kind, &self.name, &self.description)
            .with_stack(stack)
            .at(location)
    }
}

/// Crafting component prototypes known out of the box.
pub fn default_prototypes() -> HashMap<String, Prototype> {
    let mut protos = HashMap::new();
    protos.insert(
        "log".to_string(),
        Prototype::new("Log", "A generic log.", true),
    );
    protos
}

/// Outcome of inventory moves (get/drop/give).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryResult {
    /// Whole object moved to the destination.
    Moved { object_id: String, quantity: u32 },
    /// Part of a stack was split off and moved.
    Split { object_id: String, quantity: u32 },
    /// Moved quantity merged into a stack already at the destination.
    Merged { into_id: String, quantity: u32 },
}

impl InventoryResult {
    pub fn quantity(&self) -> u32 {
        match self {
            InventoryResult::Moved { quantity, .. }
            | InventoryResult::Split { quantity, .. }
            | InventoryResult::Merged { quantity, .. } => *quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_default_to_allowed() {
        let log = ObjectRecord::item("l1", "log", "Log", "A log.");
        assert!(log.allows(GET_VERB));
        let tree = ObjectRecord::tree("t1", "oak", HarvestTarget::new(20, "log", 3));
        assert!(!tree.allows(GET_VERB));
        assert!(tree.allows(HARVEST_VERB));
        assert!(tree.get_err_msg.unwrap().contains("Try chopping it"));
    }

    #[test]
    fn prototype_instances_stack() {
        let protos = default_prototypes();
        let log = protos["log"].instantiate("l1", "log", "glade");
        assert!(log.stack.stackable());
        assert_eq!(log.stack.count(), 1);
        assert_eq!(log.location.as_deref(), Some("glade"));
        assert_eq!(log.display_name(), "Log");
    }
}
