use serde_json::Value;
use thiserror::Error;

/// World-save data as the room consumes it.
#[derive(Debug, Clone)]
pub struct WorldRecord {
    pub id: i64,
    pub owner_account_id: i64,
    pub name: String,
    pub seed: u64,
    pub world_data: Option<Value>,
}

/// Character data as the room consumes it.
#[derive(Debug, Clone)]
pub struct CharacterRecord {
    pub id: i64,
    pub name: String,
    pub x: i32,
    pub y: i32,
}

/// Opaque persistence failure. The room logs it and moves on; retry policy
/// belongs to the adapter behind the port.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Narrow persistence port consumed by rooms. Implementations are handed in
/// at construction; the room holds no other process-wide state.
pub trait WorldStore: Send + Sync {
    fn get_world(&self, world_id: i64) -> Result<Option<WorldRecord>, StoreError>;

    fn get_character(
        &self,
        account_id: i64,
        world_id: i64,
    ) -> Result<Option<CharacterRecord>, StoreError>;

    fn create_character(
        &self,
        account_id: i64,
        world_id: i64,
        name: &str,
        x: i32,
        y: i32,
    ) -> Result<CharacterRecord, StoreError>;

    fn save_character_position(
        &self,
        character_id: i64,
        x: i32,
        y: i32,
    ) -> Result<(), StoreError>;

    /// Transactional batch save: world data plus `(character_id, x, y)`
    /// positions commit together or not at all.
    fn save_all(
        &self,
        world_id: i64,
        world_data: &Value,
        positions: &[(i64, i32, i32)],
    ) -> Result<(), StoreError>;
}
