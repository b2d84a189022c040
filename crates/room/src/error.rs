use thiserror::Error;

use crate::store::StoreError;

/// Failures while bringing a room up.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("world {0} not found")]
    WorldNotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a join was refused. The gateway maps these to close codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("world not found")]
    WorldNotFound,

    #[error("only the world owner may open it")]
    NotOwner,

    #[error("room is full")]
    PartyFull,

    #[error("room is no longer accepting joins")]
    RoomClosed,

    #[error("persistence failure: {0}")]
    Persistence(String),
}
