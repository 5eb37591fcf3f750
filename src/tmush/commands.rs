//! TinyMUSH command parsing and dispatch.
//!
//! Raw player input is parsed into a [`TinyMushCommand`] and executed against
//! the [`World`] and the [`HarvestCoordinator`]. Successful actions deliver
//! their own messages through the world's messenger; failures come back as a
//! single reply line for the actor.

use std::sync::Arc;

use log::debug;

use crate::logutil::escape_log;
use crate::tmush::errors::TinyMushError;
use crate::tmush::harvest::{HarvestCoordinator, StopOutcome};
use crate::tmush::inventory::{drop_item, get_item, give_item};
use crate::tmush::types::{ObjectClass, ObjectRecord};
use crate::tmush::world::{Messenger, World};

/// TinyMUSH command categories for parsing and routing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TinyMushCommand {
    // Harvesting
    Chop(Option<String>), // CHOP tree, CHOP DOWN tree
    Stop,                 // STOP - stop the current harvest

    // Inventory
    Get { item: String, quantity: Option<u32> },  // GET [n] item
    Drop { item: String, quantity: Option<u32> }, // DROP [n] item
    Give {
        item: String,
        quantity: Option<u32>,
        recipient: String,
    }, // GIVE [n] item TO player, GIVE [n] item = player

    // Navigation
    Go(String), // GO room

    // Unrecognized command
    Unknown(String),
}

/// Split an optional leading count off `words`: "3 log" -> (Some(3), "log").
fn split_quantity(words: &[&str]) -> (Option<u32>, String) {
    match words.split_first() {
        Some((first, rest)) if !rest.is_empty() => match first.parse::<u32>() {
            Ok(n) => (Some(n), rest.join(" ")),
            Err(_) => (None, words.join(" ")),
        },
        _ => (None, words.join(" ")),
    }
}

/// Parse raw input into TinyMUSH command enum
pub fn parse_command(input: &str) -> TinyMushCommand {
    let input = input.trim();
    let parts: Vec<&str> = input.split_whitespace().collect();

    let Some((verb, args)) = parts.split_first() else {
        return TinyMushCommand::Unknown(input.to_string());
    };

    match verb.to_uppercase().as_str() {
        "CHOP" => {
            let args = match args.first() {
                Some(word) if word.eq_ignore_ascii_case("down") => &args[1..],
                _ => args,
            };
            if args.is_empty() {
                TinyMushCommand::Chop(None)
            } else {
                TinyMushCommand::Chop(Some(args.join(" ")))
            }
        }
        "STOP" => TinyMushCommand::Stop,

        "GET" | "TAKE" | "GRAB" | "T" if !args.is_empty() => {
            let (quantity, item) = split_quantity(args);
            TinyMushCommand::Get { item, quantity }
        }
        "DROP" | "D" if !args.is_empty() => {
            let (quantity, item) = split_quantity(args);
            TinyMushCommand::Drop { item, quantity }
        }
        "GIVE" => {
            let split_at = args
                .iter()
                .position(|w| w.eq_ignore_ascii_case("to") || *w == "=");
            match split_at {
                Some(i) if i > 0 && i + 1 < args.len() => {
                    let (quantity, item) = split_quantity(&args[..i]);
                    TinyMushCommand::Give {
                        item,
                        quantity,
                        recipient: args[i + 1..].join(" "),
                    }
                }
                _ => TinyMushCommand::Unknown("Usage: GIVE [n] <item> TO <player>".to_string()),
            }
        }
        "GO" if !args.is_empty() => TinyMushCommand::Go(args.join(" ")),

        _ => TinyMushCommand::Unknown(input.to_string()),
    }
}

/// Text shown to the actor when a command fails.
pub fn failure_text(err: &TinyMushError) -> String {
    match err {
        TinyMushError::AlreadyHarvesting => "You are already busy chopping something.".to_string(),
        TinyMushError::TargetGone => "There is nothing left there to chop.".to_string(),
        TinyMushError::NotHarvestable(name) => format!("You can't chop {}.", name),
        TinyMushError::PermissionDenied(msg) => msg.clone(),
        TinyMushError::InvalidAmount(n) => format!("You can't move {} of those.", n),
        TinyMushError::NotStackable(_)
        | TinyMushError::TypeMismatch { .. }
        | TinyMushError::CountOverflow { .. } => {
            "Those don't stack together.".to_string()
        }
        TinyMushError::NotFound(_) => "You don't see that here.".to_string(),
        other => format!("Something went wrong: {}", other),
    }
}

/// Executes parsed commands on behalf of actors.
pub struct TinyMushProcessor {
    world: Arc<World>,
    coordinator: Arc<HarvestCoordinator>,
}

impl TinyMushProcessor {
    pub fn new(world: Arc<World>, coordinator: Arc<HarvestCoordinator>) -> Self {
        Self { world, coordinator }
    }

    /// Parse and run `input` for `actor_id`. Returns a reply for the actor
    /// when the command produced no messages of its own.
    pub fn handle_command(&self, actor_id: &str, input: &str) -> Option<String> {
        let command = parse_command(input);
        debug!(
            "TinyMUSH command parsed: actor={} command={:?}",
            escape_log(actor_id),
            command
        );
        self.execute(actor_id, command)
    }

    pub fn execute(&self, actor_id: &str, command: TinyMushCommand) -> Option<String> {
        let result = match command {
            TinyMushCommand::Chop(None) => {
                return Some("You need to specify a tree to chop!".to_string())
            }
            TinyMushCommand::Chop(Some(target)) => self.handle_chop(actor_id, &target),
            TinyMushCommand::Stop => match self.coordinator.stop_job(actor_id) {
                StopOutcome::Ended(_) => Ok(()),
                StopOutcome::NothingToStop => {
                    return Some("You aren't chopping anything.".to_string())
                }
            },
            TinyMushCommand::Get { item, quantity } => {
                self.handle_get(actor_id, &item, quantity)
            }
            TinyMushCommand::Drop { item, quantity } => self
                .carried(actor_id, &item)
                .and_then(|found| drop_item(&self.world, actor_id, &found.id, quantity))
                .map(|_| ()),
            TinyMushCommand::Give {
                item,
                quantity,
                recipient,
            } => self.handle_give(actor_id, &item, quantity, &recipient),
            TinyMushCommand::Go(room) => self.handle_go(actor_id, &room),
            TinyMushCommand::Unknown(cmd) => {
                return Some(format!("Unknown command: '{}'", cmd));
            }
        };

        match result {
            Ok(()) => None,
            Err(e) => {
                debug!("command failed for {}: {}", escape_log(actor_id), e);
                Some(failure_text(&e))
            }
        }
    }

    fn location_of(&self, actor_id: &str) -> Result<String, TinyMushError> {
        self.world
            .get(actor_id)
            .and_then(|actor| actor.location)
            .ok_or_else(|| TinyMushError::NotFound(format!("location of {}", actor_id)))
    }

    fn nearby(&self, actor_id: &str, query: &str) -> Result<ObjectRecord, TinyMushError> {
        let room = self.location_of(actor_id)?;
        self.world
            .find_in(&room, query)
            .ok_or_else(|| TinyMushError::NotFound(query.to_string()))
    }

    fn carried(&self, actor_id: &str, query: &str) -> Result<ObjectRecord, TinyMushError> {
        self.world
            .find_in(actor_id, query)
            .ok_or_else(|| TinyMushError::NotFound(query.to_string()))
    }

    fn handle_chop(&self, actor_id: &str, query: &str) -> Result<(), TinyMushError> {
        let target = self.nearby(actor_id, query)?;
        self.coordinator.start_job(actor_id, &target.id).map(|_| ())
    }

    fn handle_get(
        &self,
        actor_id: &str,
        query: &str,
        quantity: Option<u32>,
    ) -> Result<(), TinyMushError> {
        let found = if query.eq_ignore_ascii_case("me") || query.eq_ignore_ascii_case("self") {
            self.world
                .get(actor_id)
                .ok_or_else(|| TinyMushError::NotFound(actor_id.to_string()))?
        } else {
            self.nearby(actor_id, query)?
        };
        get_item(&self.world, actor_id, &found.id, quantity).map(|_| ())
    }

    fn handle_give(
        &self,
        actor_id: &str,
        item: &str,
        quantity: Option<u32>,
        recipient: &str,
    ) -> Result<(), TinyMushError> {
        let found = self.carried(actor_id, item)?;
        let to = if recipient.eq_ignore_ascii_case("me") {
            actor_id.to_string()
        } else {
            self.nearby(actor_id, recipient)?.id
        };
        give_item(&self.world, actor_id, &found.id, quantity, &to).map(|_| ())
    }

    fn handle_go(&self, actor_id: &str, room: &str) -> Result<(), TinyMushError> {
        let destination = self
            .world
            .objects()
            .into_iter()
            .find(|o| {
                o.class == ObjectClass::Room
                    && (o.id == room || o.name.eq_ignore_ascii_case(room))
            })
            .ok_or_else(|| TinyMushError::NotFound(room.to_string()))?;
        self.world.move_object(actor_id, &destination.id)?;
        self.world
            .notify(actor_id, &format!("You go to {}.", destination.name), &[]);
        Ok(())
    }
}
