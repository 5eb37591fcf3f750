//! Collaborator ports consumed by the harvest and stacking core, plus
//! [`World`], an in-memory implementation of all of them.
//!
//! Lock order: the harvest coordinator's job map is always taken before any
//! `World` lock, and `World` never holds its own locks while calling a
//! [`MoveListener`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use log::{debug, trace, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::logutil::escape_log;
use crate::tmush::errors::TinyMushError;
use crate::tmush::harvest::{HarvestTarget, StrikeOutcome};
use crate::tmush::stack::{self, ConsumeResult, SplitResult};
use crate::tmush::types::{default_prototypes, InventoryResult, ObjectClass, ObjectRecord, Prototype};

/// Capability gate consulted before harvesting and inventory moves.
pub trait AccessCheck: Send + Sync {
    fn access(&self, actor: &str, target: &str, verb: &str) -> bool;
}

/// Instantiates prototype objects.
pub trait Spawner: Send + Sync {
    fn spawn(&self, kind: &str, location: &str, count: u32) -> Vec<String>;
}

/// Player-visible text delivery. `recipient` is an actor or a location; a
/// location fans out to every actor in it except those in `exclude`.
pub trait Messenger: Send + Sync {
    fn notify(&self, recipient: &str, text: &str, exclude: &[&str]);
}

/// Lookup and mutation of harvestable objects by id.
pub trait TargetStore: Send + Sync {
    fn harvest_target(&self, target_id: &str) -> Result<HarvestTarget, TinyMushError>;
    fn strike_target(&self, target_id: &str, power: u32) -> Result<StrikeOutcome, TinyMushError>;
    fn display_name(&self, object_id: &str) -> Option<String>;
    fn location_of(&self, object_id: &str) -> Option<String>;
}

/// Called synchronously before an actor's location changes.
pub trait MoveListener: Send + Sync {
    fn before_move(&self, mover: &str);
}

/// Everything the harvest coordinator needs from the world.
pub trait HarvestWorld: AccessCheck + Spawner + Messenger + TargetStore {}

impl<T: AccessCheck + Spawner + Messenger + TargetStore> HarvestWorld for T {}

/// A message recorded in the world outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub recipient: String,
    pub text: String,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// Shared by `AccessCheck` and `transfer`, which already holds the write lock.
fn allowed(objects: &HashMap<String, ObjectRecord>, actor: &str, target: &str, verb: &str) -> bool {
    match (objects.get(actor), objects.get(target)) {
        (Some(_), Some(record)) => record.allows(verb),
        _ => false,
    }
}

/// A guarded inventory move: `actor` moves `object_id` from `from` to `to`
/// using `verb`.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub actor: &'a str,
    pub verb: &'a str,
    pub object_id: &'a str,
    pub quantity: Option<u32>,
    pub from: &'a str,
    pub to: &'a str,
}

/// In-memory world: objects, prototypes, an outbox of delivered text and the
/// movement hook.
pub struct World {
    objects: RwLock<HashMap<String, ObjectRecord>>,
    prototypes: HashMap<String, Prototype>,
    outbox: Mutex<Vec<Notice>>,
    // Serialises read-modify-write of harvest targets.
    strike_lock: Mutex<()>,
    move_listeners: RwLock<Vec<Weak<dyn MoveListener>>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_prototypes(default_prototypes())
    }

    pub fn with_prototypes(prototypes: HashMap<String, Prototype>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            prototypes,
            outbox: Mutex::new(Vec::new()),
            strike_lock: Mutex::new(()),
            move_listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn new_object_id(kind: &str) -> String {
        format!("{}-{}", kind, Uuid::new_v4())
    }

    pub fn add_move_listener(&self, listener: Weak<dyn MoveListener>) {
        write(&self.move_listeners).push(listener);
    }

    /// Register any listener held in an `Arc` (the harvest coordinator).
    pub fn watch_moves<L: MoveListener + 'static>(&self, listener: &Arc<L>) {
        let listener: Arc<dyn MoveListener> = listener.clone();
        self.add_move_listener(Arc::downgrade(&listener));
    }

    pub fn insert(&self, record: ObjectRecord) -> String {
        let id = record.id.clone();
        write(&self.objects).insert(id.clone(), record);
        id
    }

    pub fn get(&self, object_id: &str) -> Option<ObjectRecord> {
        read(&self.objects).get(object_id).cloned()
    }

    pub fn contains(&self, object_id: &str) -> bool {
        read(&self.objects).contains_key(object_id)
    }

    /// Destroy an object outright.
    pub fn remove(&self, object_id: &str) -> Option<ObjectRecord> {
        write(&self.objects).remove(object_id)
    }

    pub fn objects(&self) -> Vec<ObjectRecord> {
        let mut all: Vec<ObjectRecord> = read(&self.objects).values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    /// Objects whose location is `location`, oldest first.
    pub fn contents(&self, location: &str) -> Vec<ObjectRecord> {
        let mut found: Vec<ObjectRecord> = read(&self.objects)
            .values()
            .filter(|o| o.location.as_deref() == Some(location))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        found
    }

    /// Resolve `query` against the contents of `location` by id, name or kind.
    pub fn find_in(&self, location: &str, query: &str) -> Option<ObjectRecord> {
        let query = query.trim();
        let contents = self.contents(location);
        contents
            .iter()
            .find(|o| o.id == query)
            .or_else(|| contents.iter().find(|o| o.name.eq_ignore_ascii_case(query)))
            .or_else(|| contents.iter().find(|o| o.kind.eq_ignore_ascii_case(query)))
            .cloned()
    }

    /// Move an object. Actors notify every [`MoveListener`] first, so an
    /// in-progress harvest ends before the move commits.
    pub fn move_object(&self, object_id: &str, destination: &str) -> Result<(), TinyMushError> {
        let is_actor = {
            let objects = read(&self.objects);
            if !objects.contains_key(destination) {
                return Err(TinyMushError::NotFound(format!("location: {}", destination)));
            }
            let record = objects
                .get(object_id)
                .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", object_id)))?;
            record.class == ObjectClass::Character
        };

        if is_actor {
            let listeners: Vec<Arc<dyn MoveListener>> = {
                let mut registered = write(&self.move_listeners);
                registered.retain(|l| l.strong_count() > 0);
                registered.iter().filter_map(Weak::upgrade).collect()
            };
            for listener in listeners {
                listener.before_move(object_id);
            }
        }

        let mut objects = write(&self.objects);
        let record = objects
            .get_mut(object_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", object_id)))?;
        record.location = Some(destination.to_string());
        debug!("moved {} to {}", object_id, destination);
        Ok(())
    }

    /// Move `quantity` items (or the whole object) to `request.to`, splitting
    /// and merging stacks as needed. The object must still sit at
    /// `request.from` and allow `request.verb` for `request.actor`; both are
    /// checked under the same lock that performs the move.
    pub fn transfer(&self, request: &TransferRequest<'_>) -> Result<InventoryResult, TinyMushError> {
        let TransferRequest {
            actor,
            verb,
            object_id,
            quantity,
            from,
            to: destination,
        } = *request;

        let mut objects = write(&self.objects);
        if !objects.contains_key(destination) {
            return Err(TinyMushError::NotFound(format!("location: {}", destination)));
        }
        let current = objects
            .get(object_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", object_id)))?;
        if current.location.as_deref() != Some(from) {
            return Err(TinyMushError::NotFound(format!(
                "{} is no longer at {}",
                object_id, from
            )));
        }
        if !allowed(&objects, actor, object_id, verb) {
            return Err(TinyMushError::PermissionDenied(format!(
                "You can't {} that.",
                verb
            )));
        }

        let source = objects
            .get_mut(object_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", object_id)))?;
        let moving_id = match quantity {
            None => object_id.to_string(),
            Some(amount) => {
                let new_id = Self::new_object_id(&source.kind);
                match stack::split(source, amount, &new_id)? {
                    SplitResult::Whole => object_id.to_string(),
                    SplitResult::Split(part) => {
                        objects.insert(new_id.clone(), part);
                        new_id
                    }
                }
            }
        };

        let moving = objects
            .get_mut(&moving_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", moving_id)))?;
        moving.location = Some(destination.to_string());
        let moved_count = moving.stack.count();
        let moving = moving.clone();

        let merge_into = objects
            .values()
            .filter(|o| {
                o.id != moving.id
                    && o.location.as_deref() == Some(destination)
                    && stack::check_merge(o, &moving).is_ok()
            })
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .map(|o| o.id.clone());

        if let Some(into_id) = merge_into {
            if let Some(src) = objects.remove(&moving_id) {
                if let Some(dst) = objects.get_mut(&into_id) {
                    stack::merge(dst, src)?;
                }
            }
            trace!("merged {} into {}", moving_id, into_id);
            return Ok(InventoryResult::Merged {
                into_id,
                quantity: moved_count,
            });
        }

        if moving_id == object_id {
            Ok(InventoryResult::Moved {
                object_id: moving_id,
                quantity: moved_count,
            })
        } else {
            Ok(InventoryResult::Split {
                object_id: moving_id,
                quantity: moved_count,
            })
        }
    }

    /// Split `amount` off a stored stack. Returns the id of the object that now
    /// holds `amount` items: the original when the split covers the whole stack.
    pub fn split_object(&self, object_id: &str, amount: u32) -> Result<String, TinyMushError> {
        let mut objects = write(&self.objects);
        let source = objects
            .get_mut(object_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", object_id)))?;
        let new_id = Self::new_object_id(&source.kind);
        match stack::split(source, amount, &new_id)? {
            SplitResult::Whole => Ok(object_id.to_string()),
            SplitResult::Split(part) => {
                objects.insert(new_id.clone(), part);
                Ok(new_id)
            }
        }
    }

    /// Merge `src_id` into `dst_id`, destroying `src_id`. Returns the new count.
    pub fn merge_objects(&self, dst_id: &str, src_id: &str) -> Result<u32, TinyMushError> {
        let mut objects = write(&self.objects);
        let dst = objects
            .get(dst_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", dst_id)))?;
        if dst_id == src_id {
            return Ok(dst.stack.count());
        }
        let src = objects
            .get(src_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", src_id)))?;
        stack::check_merge(dst, src)?;

        let src = objects
            .remove(src_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", src_id)))?;
        let dst = objects
            .get_mut(dst_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", dst_id)))?;
        stack::merge(dst, src)
    }

    /// Consume items from a stored stack. `Ok(None)` means the object was
    /// destroyed.
    pub fn consume_object(&self, object_id: &str, amount: u32) -> Result<Option<u32>, TinyMushError> {
        let mut objects = write(&self.objects);
        let record = objects
            .get_mut(object_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", object_id)))?;
        match stack::consume(&mut record.stack, amount)? {
            ConsumeResult::Remaining(left) => Ok(Some(left)),
            ConsumeResult::Exhausted => {
                objects.remove(object_id);
                debug!("consumed last of {}", object_id);
                Ok(None)
            }
        }
    }

    pub fn set_stackable(&self, object_id: &str, stackable: bool) -> Result<(), TinyMushError> {
        let mut objects = write(&self.objects);
        let record = objects
            .get_mut(object_id)
            .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", object_id)))?;
        record.stack.set_stackable(stackable);
        Ok(())
    }

    /// Text delivered to `recipient` so far, oldest first.
    pub fn messages_for(&self, recipient: &str) -> Vec<String> {
        lock(&self.outbox)
            .iter()
            .filter(|n| n.recipient == recipient)
            .map(|n| n.text.clone())
            .collect()
    }

    /// Drain the outbox.
    pub fn take_messages(&self) -> Vec<Notice> {
        std::mem::take(&mut *lock(&self.outbox))
    }
}

impl AccessCheck for World {
    fn access(&self, actor: &str, target: &str, verb: &str) -> bool {
        allowed(&read(&self.objects), actor, target, verb)
    }
}

impl Spawner for World {
    fn spawn(&self, kind: &str, location: &str, count: u32) -> Vec<String> {
        let Some(prototype) = self.prototypes.get(kind) else {
            warn!("no prototype for {}; nothing spawned", kind);
            return Vec::new();
        };
        let mut objects = write(&self.objects);
        (0..count)
            .map(|_| {
                let id = Self::new_object_id(kind);
                objects.insert(id.clone(), prototype.instantiate(&id, kind, location));
                id
            })
            .collect()
    }
}

impl Messenger for World {
    fn notify(&self, recipient: &str, text: &str, exclude: &[&str]) {
        let targets: Vec<String> = {
            let objects = read(&self.objects);
            match objects.get(recipient) {
                Some(record) if record.class == ObjectClass::Room => objects
                    .values()
                    .filter(|o| {
                        o.class == ObjectClass::Character
                            && o.location.as_deref() == Some(recipient)
                            && !exclude.contains(&o.id.as_str())
                    })
                    .map(|o| o.id.clone())
                    .collect(),
                Some(_) if !exclude.contains(&recipient) => vec![recipient.to_string()],
                _ => Vec::new(),
            }
        };
        debug!("notify {} ({} recipients): {}", recipient, targets.len(), escape_log(text));

        let mut outbox = lock(&self.outbox);
        for target in targets {
            outbox.push(Notice {
                recipient: target,
                text: text.to_string(),
            });
        }
    }
}

impl TargetStore for World {
    fn harvest_target(&self, target_id: &str) -> Result<HarvestTarget, TinyMushError> {
        let objects = read(&self.objects);
        let record = objects.get(target_id).ok_or(TinyMushError::TargetGone)?;
        record
            .harvest
            .clone()
            .ok_or_else(|| TinyMushError::NotHarvestable(record.name.clone()))
    }

    fn strike_target(&self, target_id: &str, power: u32) -> Result<StrikeOutcome, TinyMushError> {
        let _serial = lock(&self.strike_lock);
        let (mut target, location) = {
            let objects = read(&self.objects);
            let record = objects.get(target_id).ok_or(TinyMushError::TargetGone)?;
            let target = record
                .harvest
                .clone()
                .ok_or_else(|| TinyMushError::NotHarvestable(record.name.clone()))?;
            let location = record.location.clone().ok_or(TinyMushError::TargetGone)?;
            (target, location)
        };

        // Spawning takes the object write lock, so no guard is held here.
        let outcome = target.strike(power, &location, self)?;
        let mut objects = write(&self.objects);
        match &outcome {
            StrikeOutcome::Depleted { spawned } => {
                objects.remove(target_id);
                debug!("{} depleted; spawned {} objects", target_id, spawned.len());
            }
            StrikeOutcome::Continuing { hp, .. } => {
                if let Some(record) = objects.get_mut(target_id) {
                    record.harvest = Some(target);
                }
                trace!("{} struck for {}; hp={}", target_id, power, hp);
            }
        }
        Ok(outcome)
    }

    fn display_name(&self, object_id: &str) -> Option<String> {
        read(&self.objects).get(object_id).map(|o| o.name.clone())
    }

    fn location_of(&self, object_id: &str) -> Option<String> {
        read(&self.objects)
            .get(object_id)
            .and_then(|o| o.location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmush::stack::StackUnit;

    fn glade() -> World {
        let world = World::new();
        world.insert(ObjectRecord::room("glade", "Glade", "A quiet clearing."));
        world.insert(ObjectRecord::room("road", "Road", "A dusty road."));
        world.insert(ObjectRecord::character("alice", "Alice", "glade"));
        world.insert(ObjectRecord::character("bob", "Bob", "glade"));
        world
    }

    fn logs(id: &str, count: u32, location: &str) -> ObjectRecord {
        ObjectRecord::item(id, "log", "Log", "A generic log.")
            .with_stack(StackUnit::stack_of(count).unwrap())
            .at(location)
    }

    #[test]
    fn room_notify_skips_excluded() {
        let world = glade();
        world.notify("glade", "Leaves rustle.", &["alice"]);
        assert!(world.messages_for("alice").is_empty());
        assert_eq!(world.messages_for("bob"), vec!["Leaves rustle.".to_string()]);
    }

    #[test]
    fn spawn_uses_prototype() {
        let world = glade();
        let ids = world.spawn("log", "glade", 3);
        assert_eq!(ids.len(), 3);
        for id in &ids {
            let log = world.get(id).unwrap();
            assert_eq!(log.name, "Log");
            assert!(log.stack.stackable());
            assert_eq!(log.location.as_deref(), Some("glade"));
        }
        assert!(world.spawn("unknown", "glade", 2).is_empty());
    }

    #[test]
    fn split_merge_consume_through_world() {
        let world = glade();
        world.insert(logs("pile", 10, "glade"));

        let part = world.split_object("pile", 4).unwrap();
        assert_ne!(part, "pile");
        assert_eq!(world.get(&part).unwrap().stack.count(), 4);
        assert_eq!(world.get("pile").unwrap().stack.count(), 6);
        assert_eq!(world.split_object("pile", 6).unwrap(), "pile");

        assert_eq!(world.merge_objects("pile", &part).unwrap(), 10);
        assert!(!world.contains(&part));

        assert_eq!(world.consume_object("pile", 9).unwrap(), Some(1));
        assert_eq!(world.consume_object("pile", 1).unwrap(), None);
        assert!(!world.contains("pile"));
    }

    #[test]
    fn failed_merge_keeps_both() {
        let world = glade();
        world.insert(logs("pile", 2, "glade"));
        world.insert(ObjectRecord::item("axe", "axe", "Axe", "Sharp.").at("glade"));
        assert!(matches!(
            world.merge_objects("pile", "axe"),
            Err(TinyMushError::NotStackable(_))
        ));
        assert!(world.contains("axe"));
        assert_eq!(world.get("pile").unwrap().stack.count(), 2);
    }

    #[test]
    fn overflowing_merge_keeps_both() {
        let world = glade();
        world.insert(logs("hoard", u32::MAX, "alice"));
        world.insert(logs("pile", 2, "glade"));
        assert!(matches!(
            world.merge_objects("hoard", "pile"),
            Err(TinyMushError::CountOverflow { .. })
        ));
        assert_eq!(world.get("pile").unwrap().stack.count(), 2);
        assert_eq!(world.get("hoard").unwrap().stack.count(), u32::MAX);

        // A full stack at the destination is skipped rather than merged.
        let result = world
            .transfer(&TransferRequest {
                actor: "alice",
                verb: "get",
                object_id: "pile",
                quantity: None,
                from: "glade",
                to: "alice",
            })
            .unwrap();
        assert!(matches!(result, InventoryResult::Moved { quantity: 2, .. }));
        assert!(world.contains("pile"));
    }

    #[test]
    fn transfer_splits_and_merges() {
        let world = glade();
        world.insert(logs("pile", 5, "glade"));
        world.insert(logs("carried", 1, "alice"));

        let result = world
            .transfer(&TransferRequest {
                actor: "alice",
                verb: "get",
                object_id: "pile",
                quantity: Some(2),
                from: "glade",
                to: "alice",
            })
            .unwrap();
        assert_eq!(
            result,
            InventoryResult::Merged {
                into_id: "carried".to_string(),
                quantity: 2
            }
        );
        assert_eq!(world.get("carried").unwrap().stack.count(), 3);
        assert_eq!(world.get("pile").unwrap().stack.count(), 3);

        let result = world
            .transfer(&TransferRequest {
                actor: "bob",
                verb: "get",
                object_id: "pile",
                quantity: None,
                from: "glade",
                to: "bob",
            })
            .unwrap();
        assert_eq!(
            result,
            InventoryResult::Moved {
                object_id: "pile".to_string(),
                quantity: 3
            }
        );
    }

    #[test]
    fn transfer_rechecks_source_and_locks() {
        let world = glade();
        world.insert(logs("pile", 5, "bob"));
        world.insert(
            ObjectRecord::item("anvil", "anvil", "Anvil", "Heavy.")
                .at("glade")
                .with_lock("get", false),
        );

        let stale = TransferRequest {
            actor: "alice",
            verb: "get",
            object_id: "pile",
            quantity: None,
            from: "glade",
            to: "alice",
        };
        assert!(matches!(
            world.transfer(&stale),
            Err(TinyMushError::NotFound(_))
        ));
        assert_eq!(world.get("pile").unwrap().location.as_deref(), Some("bob"));

        let locked = TransferRequest {
            object_id: "anvil",
            ..stale
        };
        assert!(matches!(
            world.transfer(&locked),
            Err(TinyMushError::PermissionDenied(_))
        ));
        assert_eq!(world.get("anvil").unwrap().location.as_deref(), Some("glade"));
    }

    #[test]
    fn strike_removes_depleted_target() {
        let world = glade();
        world.insert(ObjectRecord::tree("oak", "the oak", HarvestTarget::new(10, "log", 3)).at("glade"));
        assert!(matches!(
            world.strike_target("oak", 5).unwrap(),
            StrikeOutcome::Continuing { hp: 5, max_hp: 10 }
        ));
        assert_eq!(world.harvest_target("oak").unwrap().hp(), 5);
        assert!(matches!(
            world.strike_target("oak", 5).unwrap(),
            StrikeOutcome::Depleted { .. }
        ));
        assert!(!world.contains("oak"));
        assert_eq!(world.contents("glade").iter().filter(|o| o.kind == "log").count(), 3);
        assert!(matches!(
            world.strike_target("oak", 5),
            Err(TinyMushError::TargetGone)
        ));
    }
}
