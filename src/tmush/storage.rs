use std::path::Path;

use log::{debug, info};
use sled::IVec;

use crate::tmush::errors::TinyMushError;
use crate::tmush::types::{ObjectRecord, OBJECT_SCHEMA_VERSION};
use crate::tmush::world::World;

const TREE_OBJECTS: &str = "mushcraft_objects";
const OBJECT_PREFIX: &str = "objects:";

/// Sled-backed persistence for world objects, keyed by object id.
pub struct ObjectStore {
    _db: sled::Db,
    objects: sled::Tree,
}

impl ObjectStore {
    /// Open (or create) the object store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TinyMushError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let objects = db.open_tree(TREE_OBJECTS)?;
        Ok(Self { _db: db, objects })
    }

    fn object_key(object_id: &str) -> Vec<u8> {
        format!("{}{}", OBJECT_PREFIX, object_id).into_bytes()
    }

    fn serialize(record: &ObjectRecord) -> Result<Vec<u8>, TinyMushError> {
        Ok(bincode::serialize(record)?)
    }

    fn deserialize(bytes: IVec) -> Result<ObjectRecord, TinyMushError> {
        let record: ObjectRecord = bincode::deserialize(&bytes)?;
        if record.schema_version != OBJECT_SCHEMA_VERSION {
            return Err(TinyMushError::SchemaMismatch {
                entity: "object",
                expected: OBJECT_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    /// Insert or update an object record.
    pub fn put_object(&self, mut record: ObjectRecord) -> Result<(), TinyMushError> {
        record.schema_version = OBJECT_SCHEMA_VERSION;
        let key = Self::object_key(&record.id);
        let bytes = Self::serialize(&record)?;
        self.objects.insert(key, bytes)?;
        self.objects.flush()?;
        Ok(())
    }

    pub fn get_object(&self, object_id: &str) -> Result<ObjectRecord, TinyMushError> {
        let key = Self::object_key(object_id);
        let Some(bytes) = self.objects.get(key)? else {
            return Err(TinyMushError::NotFound(format!("object: {}", object_id)));
        };
        Self::deserialize(bytes)
    }

    /// Remove an object. Returns whether it existed.
    pub fn delete_object(&self, object_id: &str) -> Result<bool, TinyMushError> {
        let existed = self.objects.remove(Self::object_key(object_id))?.is_some();
        self.objects.flush()?;
        Ok(existed)
    }

    pub fn list_object_ids(&self) -> Result<Vec<String>, TinyMushError> {
        let mut ids = Vec::new();
        for entry in self.objects.scan_prefix(OBJECT_PREFIX.as_bytes()) {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            if let Some(id) = text.strip_prefix(OBJECT_PREFIX) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    pub fn list_objects(&self) -> Result<Vec<ObjectRecord>, TinyMushError> {
        self.objects
            .scan_prefix(OBJECT_PREFIX.as_bytes())
            .map(|result| {
                result
                    .map_err(TinyMushError::from)
                    .and_then(|(_key, value)| Self::deserialize(value))
            })
            .collect()
    }

    /// Replace the stored snapshot with every object currently in `world`.
    /// Objects destroyed since the last save disappear from the store. The
    /// removals and writes land as one batch, so a crash leaves either the old
    /// snapshot or the new one.
    pub fn save_world(&self, world: &World) -> Result<usize, TinyMushError> {
        let mut batch = sled::Batch::default();
        for entry in self.objects.scan_prefix(OBJECT_PREFIX.as_bytes()) {
            let (key, _) = entry?;
            batch.remove(key);
        }
        let mut written = 0usize;
        for record in world.objects() {
            let bytes = Self::serialize(&record)?;
            batch.insert(Self::object_key(&record.id), bytes);
            written += 1;
        }
        self.objects.apply_batch(batch)?;
        self.objects.flush()?;
        info!("saved {} objects", written);
        Ok(written)
    }

    /// Insert every stored object into `world`, replacing same-id entries.
    pub fn load_into(&self, world: &World) -> Result<usize, TinyMushError> {
        let records = self.list_objects()?;
        let loaded = records.len();
        for record in records {
            debug!("loading object {}", record.id);
            world.insert(record);
        }
        info!("loaded {} objects", loaded);
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmush::harvest::HarvestTarget;
    use crate::tmush::stack::StackUnit;
    use tempfile::TempDir;

    fn sample_world() -> World {
        let world = World::new();
        world.insert(ObjectRecord::room("glade", "Glade", "A clearing."));
        world.insert(ObjectRecord::character("alice", "Alice", "glade"));
        world.insert(
            ObjectRecord::tree("oak", "the oak", HarvestTarget::new(20, "log", 3)).at("glade"),
        );
        world.insert(
            ObjectRecord::item("logs", "log", "Log", "A generic log.")
                .with_stack(StackUnit::stack_of(4).unwrap())
                .at("alice"),
        );
        world
    }

    #[test]
    fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let record = ObjectRecord::item("axe", "axe", "Axe", "A sharp axe.");
        store.put_object(record).unwrap();

        let loaded = store.get_object("axe").unwrap();
        assert_eq!(loaded.name, "Axe");
        assert!(store.delete_object("axe").unwrap());
        assert!(!store.delete_object("axe").unwrap());
        assert!(matches!(
            store.get_object("axe"),
            Err(TinyMushError::NotFound(_))
        ));
    }

    #[test]
    fn test_world_round_trip_preserves_stacks_and_targets() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let world = sample_world();
        assert_eq!(store.save_world(&world).unwrap(), 4);

        let restored = World::new();
        assert_eq!(store.load_into(&restored).unwrap(), 4);
        let logs = restored.get("logs").unwrap();
        assert!(logs.stack.stackable());
        assert_eq!(logs.stack.count(), 4);
        let oak = restored.get("oak").unwrap();
        assert_eq!(oak.harvest.as_ref().unwrap().hp(), 20);
        assert!(!oak.allows("get"));
    }

    #[test]
    fn test_save_drops_removed_objects() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let world = sample_world();
        store.save_world(&world).unwrap();
        world.remove("oak");
        store.save_world(&world).unwrap();

        let mut ids = store.list_object_ids().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["alice", "glade", "logs"]);
    }

    #[test]
    fn test_resave_overwrites_changed_objects() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let world = sample_world();
        store.save_world(&world).unwrap();

        world.consume_object("logs", 3).unwrap();
        assert_eq!(store.save_world(&world).unwrap(), 4);
        assert_eq!(store.get_object("logs").unwrap().stack.count(), 1);
        assert_eq!(store.list_objects().unwrap().len(), 4);
    }

    #[test]
    fn test_schema_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        let mut record = ObjectRecord::item("old", "axe", "Axe", "Rusty.");
        record.schema_version = OBJECT_SCHEMA_VERSION + 1;
        let bytes = bincode::serialize(&record).unwrap();
        store
            .objects
            .insert(ObjectStore::object_key("old"), bytes)
            .unwrap();
        assert!(matches!(
            store.get_object("old"),
            Err(TinyMushError::SchemaMismatch { entity: "object", .. })
        ));
    }
}
