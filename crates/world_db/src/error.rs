use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldDbError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("world not found: {0}")]
    WorldNotFound(i64),

    #[error("character not found: {0}")]
    CharacterNotFound(i64),

    #[error("account {account_id} already has a character in world {world_id}")]
    CharacterExists { account_id: i64, world_id: i64 },
}
