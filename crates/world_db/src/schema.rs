use rusqlite::Connection;

use crate::error::WorldDbError;

pub fn create_tables(conn: &Connection) -> Result<(), WorldDbError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS world_saves (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_account_id INTEGER NOT NULL,
            name             TEXT NOT NULL,
            seed             INTEGER NOT NULL,
            world_data       TEXT,
            created_at       TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS characters (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id  INTEGER NOT NULL,
            world_id    INTEGER NOT NULL REFERENCES world_saves(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            x           INTEGER NOT NULL,
            y           INTEGER NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(account_id, world_id)
        );
        ",
    )?;
    Ok(())
}
