mod character;
mod db;
mod error;
mod schema;
mod world;

pub use character::{CharacterRepo, CharacterRow};
pub use db::WorldDb;
pub use error::WorldDbError;
pub use world::{WorldRepo, WorldSaveRow};
