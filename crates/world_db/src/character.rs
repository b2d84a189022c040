use rusqlite::Connection;

use crate::error::WorldDbError;

/// A character record. One per (account, world) pair.
#[derive(Debug, Clone)]
pub struct CharacterRow {
    pub id: i64,
    pub account_id: i64,
    pub world_id: i64,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// Repository for character operations.
pub struct CharacterRepo<'a> {
    conn: &'a Connection,
}

impl<'a> CharacterRepo<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a character for an account in a world.
    pub fn create(
        &self,
        account_id: i64,
        world_id: i64,
        name: &str,
        x: i32,
        y: i32,
    ) -> Result<CharacterRow, WorldDbError> {
        if self.get(account_id, world_id)?.is_some() {
            return Err(WorldDbError::CharacterExists {
                account_id,
                world_id,
            });
        }

        self.conn.execute(
            "INSERT INTO characters (account_id, world_id, name, x, y) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![account_id, world_id, name, x, y],
        )?;

        let id = self.conn.last_insert_rowid();

        Ok(CharacterRow {
            id,
            account_id,
            world_id,
            name: name.to_string(),
            x,
            y,
            created_at: String::new(),
            updated_at: String::new(),
        })
    }

    /// Get the character for an account in a world.
    pub fn get(
        &self,
        account_id: i64,
        world_id: i64,
    ) -> Result<Option<CharacterRow>, WorldDbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, world_id, name, x, y, created_at, updated_at
             FROM characters WHERE account_id = ?1 AND world_id = ?2",
        )?;

        match stmt.query_row(rusqlite::params![account_id, world_id], |row| {
            Ok(CharacterRow {
                id: row.get(0)?,
                account_id: row.get(1)?,
                world_id: row.get(2)?,
                name: row.get(3)?,
                x: row.get(4)?,
                y: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        }) {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a character's position.
    pub fn save_position(&self, id: i64, x: i32, y: i32) -> Result<(), WorldDbError> {
        let rows = self.conn.execute(
            "UPDATE characters SET x = ?1, y = ?2, updated_at = datetime('now') WHERE id = ?3",
            rusqlite::params![x, y, id],
        )?;
        if rows == 0 {
            return Err(WorldDbError::CharacterNotFound(id));
        }
        Ok(())
    }
}
