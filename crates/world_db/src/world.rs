use rusqlite::Connection;
use serde_json::Value;

use crate::error::WorldDbError;

/// A world-save record from the database. `world_data` is an opaque JSON
/// document owned by the room runtime; the store never inspects it.
#[derive(Debug, Clone)]
pub struct WorldSaveRow {
    pub id: i64,
    pub owner_account_id: i64,
    pub name: String,
    pub seed: i64,
    pub world_data: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// Repository for world-save operations.
pub struct WorldRepo<'a> {
    conn: &'a Connection,
}

impl<'a> WorldRepo<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new world save owned by an account.
    pub fn create(
        &self,
        owner_account_id: i64,
        name: &str,
        seed: i64,
    ) -> Result<WorldSaveRow, WorldDbError> {
        self.conn.execute(
            "INSERT INTO world_saves (owner_account_id, name, seed) VALUES (?1, ?2, ?3)",
            rusqlite::params![owner_account_id, name, seed],
        )?;

        let id = self.conn.last_insert_rowid();

        Ok(WorldSaveRow {
            id,
            owner_account_id,
            name: name.to_string(),
            seed,
            world_data: None,
            created_at: String::new(),
            updated_at: String::new(),
        })
    }

    /// Load a world save by id.
    pub fn get(&self, id: i64) -> Result<Option<WorldSaveRow>, WorldDbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_account_id, name, seed, world_data, created_at, updated_at
             FROM world_saves WHERE id = ?1",
        )?;

        match stmt.query_row(rusqlite::params![id], |row| {
            let data_str: Option<String> = row.get(4)?;
            Ok(WorldSaveRow {
                id: row.get(0)?,
                owner_account_id: row.get(1)?,
                name: row.get(2)?,
                seed: row.get(3)?,
                world_data: data_str.and_then(|s| serde_json::from_str(&s).ok()),
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        }) {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all world saves owned by an account.
    pub fn list_for_account(
        &self,
        owner_account_id: i64,
    ) -> Result<Vec<WorldSaveRow>, WorldDbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_account_id, name, seed, world_data, created_at, updated_at
             FROM world_saves WHERE owner_account_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![owner_account_id], |row| {
                let data_str: Option<String> = row.get(4)?;
                Ok(WorldSaveRow {
                    id: row.get(0)?,
                    owner_account_id: row.get(1)?,
                    name: row.get(2)?,
                    seed: row.get(3)?,
                    world_data: data_str.and_then(|s| serde_json::from_str(&s).ok()),
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Delete a world save (characters cascade).
    pub fn delete(&self, id: i64) -> Result<(), WorldDbError> {
        let rows = self
            .conn
            .execute("DELETE FROM world_saves WHERE id = ?1", rusqlite::params![id])?;
        if rows == 0 {
            return Err(WorldDbError::WorldNotFound(id));
        }
        Ok(())
    }
}
