use std::collections::BTreeMap;

use session::SessionId;

/// The per-player record clients observe. Every field here is synchronized;
/// anything else about a player is room-internal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub session_id: SessionId,
    pub account_id: i64,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub last_processed_seq: u64,
}

/// One observable state change, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatePatch {
    Added(PlayerRecord),
    Changed {
        session_id: SessionId,
        x: i32,
        y: i32,
        last_processed_seq: u64,
    },
    Removed(SessionId),
}

/// Room state as clients observe it: one record per session, plus a journal
/// of changes since the last flush. All mutation funnels through the methods
/// here so nothing observable can change without a patch being recorded.
#[derive(Debug, Default)]
pub struct RoomState {
    players: BTreeMap<SessionId, PlayerRecord>,
    journal: Vec<StatePatch>,
}

impl RoomState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully populated record. At most one record may exist per
    /// session; a second insert for the same session replaces it wholesale.
    pub fn insert(&mut self, record: PlayerRecord) {
        self.journal.push(StatePatch::Added(record.clone()));
        self.players.insert(record.session_id, record);
    }

    /// Apply a tick result: position (possibly unchanged) plus the
    /// acknowledged sequence number.
    pub fn apply_move(&mut self, session_id: SessionId, x: i32, y: i32, seq: u64) {
        let Some(player) = self.players.get_mut(&session_id) else {
            return;
        };
        player.x = x;
        player.y = y;
        player.last_processed_seq = seq;
        self.journal.push(StatePatch::Changed {
            session_id,
            x,
            y,
            last_processed_seq: seq,
        });
    }

    pub fn remove(&mut self, session_id: SessionId) -> Option<PlayerRecord> {
        let record = self.players.remove(&session_id)?;
        self.journal.push(StatePatch::Removed(session_id));
        Some(record)
    }

    pub fn get(&self, session_id: SessionId) -> Option<&PlayerRecord> {
        self.players.get(&session_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.values()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.players.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Take everything recorded since the last flush.
    pub fn drain_patches(&mut self) -> Vec<StatePatch> {
        std::mem::take(&mut self.journal)
    }
}
