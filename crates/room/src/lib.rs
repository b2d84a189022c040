mod config;
mod error;
mod input;
mod registry;
mod room;
mod state;
mod store;

pub use config::{RoomConfig, MAX_PARTY_SIZE, MAX_QUEUE, TICK_RATE};
pub use error::{JoinError, RoomError};
pub use input::{InputMessage, InputQueue, InputVerdict};
pub use registry::RoomRegistry;
pub use room::{RoomCommand, RoomHandle, WorldRoom};
pub use state::{PlayerRecord, RoomState, StatePatch};
pub use store::{CharacterRecord, StoreError, WorldRecord, WorldStore};
