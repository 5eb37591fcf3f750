//! Inventory moves for TinyMUSH: get, drop and give, each with an optional
//! quantity that splits exactly that many items off a stack.
use log::info;

use super::errors::TinyMushError;
use super::types::{InventoryResult, ObjectRecord, DROP_VERB, GET_VERB, GIVE_VERB};
use super::world::{AccessCheck, Messenger, TransferRequest, World};

// ============================================================================
// Inventory Operations
// ============================================================================

/// "3 Log" for stackable quantities, the bare name otherwise.
pub fn quantity_name(item: &ObjectRecord, quantity: u32) -> String {
    if quantity > 1 {
        format!("{} {}", quantity, item.name)
    } else {
        item.name.clone()
    }
}

fn lookup(world: &World, object_id: &str) -> Result<ObjectRecord, TinyMushError> {
    world
        .get(object_id)
        .ok_or_else(|| TinyMushError::NotFound(format!("object: {}", object_id)))
}

/// Pick up `object_id` (or `quantity` of it) from the actor's location.
pub fn get_item(
    world: &World,
    actor_id: &str,
    object_id: &str,
    quantity: Option<u32>,
) -> Result<InventoryResult, TinyMushError> {
    if actor_id == object_id {
        return Err(TinyMushError::PermissionDenied(
            "You can't get yourself.".to_string(),
        ));
    }
    let actor = lookup(world, actor_id)?;
    let item = lookup(world, object_id)?;
    let room = actor
        .location
        .clone()
        .ok_or_else(|| TinyMushError::NotFound(format!("location of {}", actor_id)))?;
    if item.location.as_deref() != Some(room.as_str()) {
        return Err(TinyMushError::NotFound(format!("{} is not here", item.name)));
    }
    if !world.access(actor_id, object_id, GET_VERB) {
        return Err(TinyMushError::PermissionDenied(
            item.get_err_msg
                .clone()
                .unwrap_or_else(|| "You can't get that.".to_string()),
        ));
    }

    // The checks above only pick the reply; `transfer` re-validates under its lock.
    let result = world.transfer(&TransferRequest {
        actor: actor_id,
        verb: GET_VERB,
        object_id,
        quantity,
        from: &room,
        to: actor_id,
    })?;
    let what = quantity_name(&item, result.quantity());
    world.notify(actor_id, &format!("You pick up {}.", what), &[]);
    world.notify(
        &room,
        &format!("{} picks up {}.", actor.name, what),
        &[actor_id],
    );
    info!("{} picked up {} x{}", actor_id, object_id, result.quantity());
    Ok(result)
}

/// Drop a carried object (or `quantity` of it) into the actor's location.
pub fn drop_item(
    world: &World,
    actor_id: &str,
    object_id: &str,
    quantity: Option<u32>,
) -> Result<InventoryResult, TinyMushError> {
    let actor = lookup(world, actor_id)?;
    let item = lookup(world, object_id)?;
    if item.location.as_deref() != Some(actor_id) {
        return Err(TinyMushError::NotFound(format!(
            "You aren't carrying {}.",
            item.name
        )));
    }
    let room = actor
        .location
        .clone()
        .ok_or_else(|| TinyMushError::NotFound(format!("location of {}", actor_id)))?;
    if !world.access(actor_id, object_id, DROP_VERB) {
        return Err(TinyMushError::PermissionDenied(
            "You can't drop that.".to_string(),
        ));
    }

    let result = world.transfer(&TransferRequest {
        actor: actor_id,
        verb: DROP_VERB,
        object_id,
        quantity,
        from: actor_id,
        to: &room,
    })?;
    let what = quantity_name(&item, result.quantity());
    world.notify(actor_id, &format!("You drop {}.", what), &[]);
    world.notify(&room, &format!("{} drops {}.", actor.name, what), &[actor_id]);
    info!("{} dropped {} x{}", actor_id, object_id, result.quantity());
    Ok(result)
}

/// Hand a carried object (or `quantity` of it) to `recipient_id`.
pub fn give_item(
    world: &World,
    actor_id: &str,
    object_id: &str,
    quantity: Option<u32>,
    recipient_id: &str,
) -> Result<InventoryResult, TinyMushError> {
    let actor = lookup(world, actor_id)?;
    let item = lookup(world, object_id)?;
    if recipient_id == actor_id {
        return Err(TinyMushError::PermissionDenied(format!(
            "You keep {} to yourself.",
            item.name
        )));
    }
    let recipient = lookup(world, recipient_id)?;
    if item.location.as_deref() != Some(actor_id) {
        return Err(TinyMushError::NotFound(format!(
            "You are not holding {}.",
            item.name
        )));
    }
    if !world.access(actor_id, object_id, GIVE_VERB) {
        return Err(TinyMushError::PermissionDenied(
            "You can't give that away.".to_string(),
        ));
    }

    let result = world.transfer(&TransferRequest {
        actor: actor_id,
        verb: GIVE_VERB,
        object_id,
        quantity,
        from: actor_id,
        to: recipient_id,
    })?;
    let what = quantity_name(&item, result.quantity());
    world.notify(
        actor_id,
        &format!("You give {} to {}.", what, recipient.name),
        &[],
    );
    world.notify(
        recipient_id,
        &format!("{} gives you {}.", actor.name, what),
        &[],
    );
    info!(
        "{} gave {} x{} to {}",
        actor_id,
        object_id,
        result.quantity(),
        recipient_id
    );
    Ok(result)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmush::harvest::HarvestTarget;
    use crate::tmush::stack::StackUnit;

    fn test_world() -> World {
        let world = World::new();
        world.insert(ObjectRecord::room("glade", "Glade", "A clearing."));
        world.insert(ObjectRecord::character("alice", "Alice", "glade"));
        world.insert(ObjectRecord::character("bob", "Bob", "glade"));
        world.insert(
            ObjectRecord::item("logs", "log", "Log", "A generic log.")
                .with_stack(StackUnit::stack_of(5).unwrap())
                .at("glade"),
        );
        world
    }

    #[test]
    fn test_get_partial_stack() {
        let world = test_world();
        let result = get_item(&world, "alice", "logs", Some(2)).unwrap();
        let InventoryResult::Split { object_id, quantity } = result else {
            panic!("expected a split");
        };
        assert_eq!(quantity, 2);
        assert_eq!(world.get(&object_id).unwrap().location.as_deref(), Some("alice"));
        assert_eq!(world.get("logs").unwrap().stack.count(), 3);
        assert_eq!(world.messages_for("alice"), vec!["You pick up 2 Log."]);
        assert_eq!(world.messages_for("bob"), vec!["Alice picks up 2 Log."]);
    }

    #[test]
    fn test_get_whole_stack_when_asking_for_more() {
        let world = test_world();
        let result = get_item(&world, "alice", "logs", Some(50)).unwrap();
        assert_eq!(
            result,
            InventoryResult::Moved {
                object_id: "logs".to_string(),
                quantity: 5
            }
        );
    }

    #[test]
    fn test_get_respects_locks() {
        let world = test_world();
        world.insert(
            ObjectRecord::tree("oak", "the oak", HarvestTarget::new(20, "log", 3)).at("glade"),
        );
        let err = get_item(&world, "alice", "oak", None).unwrap_err();
        match err {
            TinyMushError::PermissionDenied(msg) => assert!(msg.contains("Try chopping it")),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(get_item(&world, "alice", "alice", None).is_err());
    }

    #[test]
    fn test_drop_merges_back() {
        let world = test_world();
        let InventoryResult::Split { object_id, .. } =
            get_item(&world, "alice", "logs", Some(2)).unwrap()
        else {
            panic!("expected a split");
        };
        let result = drop_item(&world, "alice", &object_id, None).unwrap();
        assert_eq!(
            result,
            InventoryResult::Merged {
                into_id: "logs".to_string(),
                quantity: 2
            }
        );
        assert_eq!(world.get("logs").unwrap().stack.count(), 5);
        assert!(!world.contains(&object_id));
    }

    #[test]
    fn test_drop_requires_carrying() {
        let world = test_world();
        assert!(matches!(
            drop_item(&world, "alice", "logs", None),
            Err(TinyMushError::NotFound(_))
        ));
    }

    #[test]
    fn test_give_quantity() {
        let world = test_world();
        get_item(&world, "alice", "logs", None).unwrap();
        let result = give_item(&world, "alice", "logs", Some(1), "bob").unwrap();
        assert_eq!(result.quantity(), 1);
        assert_eq!(world.get("logs").unwrap().stack.count(), 4);
        assert!(world
            .messages_for("bob")
            .contains(&"Alice gives you Log.".to_string()));
        assert!(give_item(&world, "alice", "logs", None, "alice").is_err());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let world = test_world();
        assert!(matches!(
            get_item(&world, "alice", "logs", Some(0)),
            Err(TinyMushError::InvalidAmount(0))
        ));
        assert_eq!(world.get("logs").unwrap().location.as_deref(), Some("glade"));
    }

    #[test]
    fn test_racing_pickups_move_the_stack_once() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        for _ in 0..200 {
            let world = Arc::new(test_world());
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = ["alice", "bob"]
                .into_iter()
                .map(|who| {
                    let world = world.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        get_item(&world, who, "logs", None).is_ok()
                    })
                })
                .collect();
            let wins: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            assert_eq!(wins.iter().filter(|won| **won).count(), 1);
            let winner = if wins[0] { "alice" } else { "bob" };
            let logs = world.get("logs").unwrap();
            assert_eq!(logs.location.as_deref(), Some(winner));
            assert_eq!(logs.stack.count(), 5);
        }
    }
}
