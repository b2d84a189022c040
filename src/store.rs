use std::sync::Mutex;

use room::{CharacterRecord, StoreError, WorldRecord, WorldStore};
use serde_json::Value;
use world_db::{WorldDb, WorldDbError};

/// `WorldStore` adapter over the SQLite database. Rooms call from their own
/// tasks via blocking workers; the mutex serializes access to the single
/// connection.
pub struct SqliteWorldStore {
    db: Mutex<WorldDb>,
}

impl SqliteWorldStore {
    pub fn new(db: WorldDb) -> Self {
        Self { db: Mutex::new(db) }
    }
}

fn store_err(e: WorldDbError) -> StoreError {
    StoreError(e.to_string())
}

impl WorldStore for SqliteWorldStore {
    fn get_world(&self, world_id: i64) -> Result<Option<WorldRecord>, StoreError> {
        let db = self.db.lock().unwrap();
        let row = db.world().get(world_id).map_err(store_err)?;
        Ok(row.map(|w| WorldRecord {
            id: w.id,
            owner_account_id: w.owner_account_id,
            name: w.name,
            seed: w.seed as u64,
            world_data: w.world_data,
        }))
    }

    fn get_character(
        &self,
        account_id: i64,
        world_id: i64,
    ) -> Result<Option<CharacterRecord>, StoreError> {
        let db = self.db.lock().unwrap();
        let row = db
            .character()
            .get(account_id, world_id)
            .map_err(store_err)?;
        Ok(row.map(|c| CharacterRecord {
            id: c.id,
            name: c.name,
            x: c.x,
            y: c.y,
        }))
    }

    fn create_character(
        &self,
        account_id: i64,
        world_id: i64,
        name: &str,
        x: i32,
        y: i32,
    ) -> Result<CharacterRecord, StoreError> {
        let db = self.db.lock().unwrap();
        let row = db
            .character()
            .create(account_id, world_id, name, x, y)
            .map_err(store_err)?;
        Ok(CharacterRecord {
            id: row.id,
            name: row.name,
            x: row.x,
            y: row.y,
        })
    }

    fn save_character_position(
        &self,
        character_id: i64,
        x: i32,
        y: i32,
    ) -> Result<(), StoreError> {
        let db = self.db.lock().unwrap();
        db.character()
            .save_position(character_id, x, y)
            .map_err(store_err)
    }

    fn save_all(
        &self,
        world_id: i64,
        world_data: &Value,
        positions: &[(i64, i32, i32)],
    ) -> Result<(), StoreError> {
        let mut db = self.db.lock().unwrap();
        db.save_all(world_id, world_data, positions)
            .map_err(store_err)
    }
}
