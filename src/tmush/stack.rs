//! Item stacking: one count-bearing [`StackUnit`] per object plus the split /
//! merge / consume operations that keep counts consistent.
//!
//! The functions here never touch a store. They mutate records in place and
//! report what the caller must create or destroy; [`crate::tmush::world::World`]
//! applies those outcomes under its object lock so creation and destruction
//! land atomically with the count change.

use serde::{Deserialize, Serialize};

use super::errors::TinyMushError;
use super::types::ObjectRecord;

/// Stackability and quantity of a single object instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackUnit {
    stackable: bool,
    count: u32,
}

impl Default for StackUnit {
    fn default() -> Self {
        Self {
            stackable: false,
            count: 1,
        }
    }
}

impl StackUnit {
    /// A stackable unit holding `count` items.
    pub fn stack_of(count: u32) -> Result<Self, TinyMushError> {
        if count < 1 {
            return Err(TinyMushError::InvalidAmount(count));
        }
        Ok(Self {
            stackable: true,
            count,
        })
    }

    pub fn stackable(&self) -> bool {
        self.stackable
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Switching stackability discards the previous quantity: the count is
    /// always reset to 1, even when the flag does not change.
    pub fn set_stackable(&mut self, value: bool) {
        self.stackable = value;
        self.count = 1;
    }
}

/// Result of [`split`].
#[derive(Debug, Clone, PartialEq)]
pub enum SplitResult {
    /// Requested amount covers the whole stack; the source object is the answer.
    Whole,
    /// A new object holding the requested amount.
    Split(ObjectRecord),
}

/// Result of [`consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeResult {
    Remaining(u32),
    /// Nothing left; the owning object must be destroyed. The unit's count is
    /// left untouched so a zero never becomes observable.
    Exhausted,
}

/// Split `amount` items off `source` into a new object with id `new_id`.
pub fn split(
    source: &mut ObjectRecord,
    amount: u32,
    new_id: &str,
) -> Result<SplitResult, TinyMushError> {
    if amount < 1 {
        return Err(TinyMushError::InvalidAmount(amount));
    }
    if amount >= source.stack.count {
        return Ok(SplitResult::Whole);
    }

    let mut copy = source.clone();
    copy.id = new_id.to_string();
    copy.created_at = chrono::Utc::now();
    copy.stack.count = amount;
    source.stack.count -= amount;
    Ok(SplitResult::Split(copy))
}

/// Validate that `src` may be merged into `dst` without changing either.
pub fn check_merge(dst: &ObjectRecord, src: &ObjectRecord) -> Result<(), TinyMushError> {
    if !dst.stack.stackable {
        return Err(TinyMushError::NotStackable(dst.name.clone()));
    }
    if !src.stack.stackable {
        return Err(TinyMushError::NotStackable(src.name.clone()));
    }
    if dst.kind != src.kind {
        return Err(TinyMushError::TypeMismatch {
            expected: dst.kind.clone(),
            found: src.kind.clone(),
        });
    }
    merged_count(dst, src).map(|_| ())
}

fn merged_count(dst: &ObjectRecord, src: &ObjectRecord) -> Result<u32, TinyMushError> {
    dst.stack
        .count
        .checked_add(src.stack.count)
        .ok_or(TinyMushError::CountOverflow {
            count: dst.stack.count,
            added: src.stack.count,
        })
}

/// Fold `src` into `dst`. `src` is consumed; callers that need it back on
/// failure should run [`check_merge`] first.
pub fn merge(dst: &mut ObjectRecord, src: ObjectRecord) -> Result<u32, TinyMushError> {
    check_merge(dst, &src)?;
    dst.stack.count = merged_count(dst, &src)?;
    Ok(dst.stack.count)
}

/// Take `amount` items out of `unit`.
pub fn consume(unit: &mut StackUnit, amount: u32) -> Result<ConsumeResult, TinyMushError> {
    if amount < 1 {
        return Err(TinyMushError::InvalidAmount(amount));
    }
    if amount >= unit.count {
        return Ok(ConsumeResult::Exhausted);
    }
    unit.count -= amount;
    Ok(ConsumeResult::Remaining(unit.count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logs(id: &str, count: u32) -> ObjectRecord {
        ObjectRecord::item(id, "log", "Log", "A generic log.")
            .with_stack(StackUnit::stack_of(count).unwrap())
    }

    #[test]
    fn default_unit_is_single_and_unstackable() {
        let unit = StackUnit::default();
        assert!(!unit.stackable());
        assert_eq!(unit.count(), 1);
    }

    #[test]
    fn set_stackable_resets_count() {
        let mut unit = StackUnit::stack_of(7).unwrap();
        unit.set_stackable(true);
        assert_eq!(unit.count(), 1);
        unit.set_stackable(false);
        assert!(!unit.stackable());
        assert_eq!(unit.count(), 1);
    }

    #[test]
    fn split_partial_creates_distinct_object() {
        let mut source = logs("a", 10);
        let result = split(&mut source, 4, "b").unwrap();
        let SplitResult::Split(part) = result else {
            panic!("expected a new stack");
        };
        assert_eq!(part.id, "b");
        assert_eq!(part.kind, source.kind);
        assert_eq!(part.name, source.name);
        assert!(part.stack.stackable());
        assert_eq!(part.stack.count() + source.stack.count(), 10);
        assert_eq!(source.stack.count(), 6);
    }

    #[test]
    fn split_sums_for_every_amount() {
        for n in 1..=6 {
            for amount in 1..=8 {
                let mut source = logs("a", n);
                match split(&mut source, amount, "b").unwrap() {
                    SplitResult::Whole => {
                        assert!(amount >= n);
                        assert_eq!(source.stack.count(), n);
                    }
                    SplitResult::Split(part) => {
                        assert!(amount < n);
                        assert_eq!(part.stack.count(), amount);
                        assert_eq!(part.stack.count() + source.stack.count(), n);
                    }
                }
            }
        }
    }

    #[test]
    fn split_rejects_zero() {
        let mut source = logs("a", 3);
        assert!(matches!(
            split(&mut source, 0, "b"),
            Err(TinyMushError::InvalidAmount(0))
        ));
        assert_eq!(source.stack.count(), 3);
    }

    #[test]
    fn merge_adds_counts() {
        let mut dst = logs("a", 3);
        let src = logs("b", 4);
        assert_eq!(merge(&mut dst, src).unwrap(), 7);
        assert_eq!(dst.stack.count(), 7);
    }

    #[test]
    fn merge_requires_stackable_and_same_kind() {
        let dst = logs("a", 2);
        let sword = ObjectRecord::item("s", "sword", "Sword", "Sharp.");
        assert!(matches!(
            check_merge(&dst, &sword),
            Err(TinyMushError::NotStackable(_))
        ));

        let stone = ObjectRecord::item("s", "stone", "Stone", "Grey.")
            .with_stack(StackUnit::stack_of(2).unwrap());
        assert!(matches!(
            check_merge(&dst, &stone),
            Err(TinyMushError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn consume_to_zero_exhausts() {
        let mut unit = StackUnit::stack_of(5).unwrap();
        assert_eq!(consume(&mut unit, 4).unwrap(), ConsumeResult::Remaining(1));
        assert_eq!(unit.count(), 1);
        assert_eq!(consume(&mut unit, 1).unwrap(), ConsumeResult::Exhausted);
        assert_eq!(unit.count(), 1);
    }

    #[test]
    fn consume_rejects_zero() {
        let mut unit = StackUnit::stack_of(2).unwrap();
        assert!(consume(&mut unit, 0).is_err());
        assert_eq!(unit.count(), 2);
    }

    #[test]
    fn merge_refuses_to_overflow() {
        let mut dst = logs("a", u32::MAX);
        let src = logs("b", 2);
        assert!(matches!(
            check_merge(&dst, &src),
            Err(TinyMushError::CountOverflow {
                count: u32::MAX,
                added: 2
            })
        ));
        assert!(merge(&mut dst, src).is_err());
        assert_eq!(dst.stack.count(), u32::MAX);
    }
}
