use thiserror::Error;

/// Errors that can arise while harvesting, stacking, or persisting TinyMUSH objects.
#[derive(Debug, Error)]
pub enum TinyMushError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Stack quantities must be at least one.
    #[error("invalid amount: {0}")]
    InvalidAmount(u32),

    /// Merge attempted on a stack that does not allow stacking.
    #[error("not stackable: {0}")]
    NotStackable(String),

    /// Merge would push a stack past the largest representable count.
    #[error("stack overflow: {count} + {added} items")]
    CountOverflow { count: u32, added: u32 },

    /// Merge attempted between objects of different kinds.
    #[error("type mismatch: cannot merge {found} into {expected}")]
    TypeMismatch { expected: String, found: String },

    /// The harvest target no longer exists (already depleted or removed).
    #[error("target gone")]
    TargetGone,

    /// The actor already has an active harvest job.
    #[error("already harvesting")]
    AlreadyHarvesting,

    /// Object exists but carries no harvestable resource.
    #[error("not harvestable: {0}")]
    NotHarvestable(String),

    /// Capability check refused the action.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}
