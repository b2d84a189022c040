use rusqlite::Connection;
use serde_json::Value;

use crate::character::CharacterRepo;
use crate::error::WorldDbError;
use crate::schema;
use crate::world::WorldRepo;

/// Main database handle wrapping a SQLite connection.
pub struct WorldDb {
    conn: Connection,
}

impl WorldDb {
    /// Open (or create) a database at the given file path.
    pub fn open(path: &str) -> Result<Self, WorldDbError> {
        // Ensure parent directory exists
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    WorldDbError::Database(rusqlite::Error::SqliteFailure(
                        rusqlite::ffi::Error::new(1),
                        Some(format!("failed to create dir: {}", e)),
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        schema::create_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self, WorldDbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::create_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Get world-save repository.
    pub fn world(&self) -> WorldRepo<'_> {
        WorldRepo::new(&self.conn)
    }

    /// Get character repository.
    pub fn character(&self) -> CharacterRepo<'_> {
        CharacterRepo::new(&self.conn)
    }

    /// Commit a world's data together with a batch of character positions.
    /// Either everything lands or nothing does.
    pub fn save_all(
        &mut self,
        world_id: i64,
        world_data: &Value,
        positions: &[(i64, i32, i32)],
    ) -> Result<(), WorldDbError> {
        let tx = self.conn.transaction()?;
        {
            let rows = tx.execute(
                "UPDATE world_saves SET world_data = ?1, updated_at = datetime('now') WHERE id = ?2",
                rusqlite::params![world_data.to_string(), world_id],
            )?;
            if rows == 0 {
                return Err(WorldDbError::WorldNotFound(world_id));
            }

            let mut stmt = tx.prepare(
                "UPDATE characters SET x = ?1, y = ?2, updated_at = datetime('now') WHERE id = ?3",
            )?;
            for &(character_id, x, y) in positions {
                let rows = stmt.execute(rusqlite::params![x, y, character_id])?;
                if rows == 0 {
                    return Err(WorldDbError::CharacterNotFound(character_id));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
