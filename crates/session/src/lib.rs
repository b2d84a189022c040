use std::fmt;

/// Unique id for a connected client session within this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity bound to a session once the gateway has decoded its bearer token.
/// Everything a room needs to admit a player; the token itself never travels
/// past the gateway.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub account_id: i64,
    pub email: String,
    /// Requested display name for a character created on first join.
    pub character_name: Option<String>,
}
