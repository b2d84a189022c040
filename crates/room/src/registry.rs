use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use net::ClientTx;
use session::SessionContext;
use tokio::sync::{mpsc, Mutex};

use crate::config::RoomConfig;
use crate::error::{JoinError, RoomError};
use crate::room::{RoomHandle, WorldRoom};
use crate::store::WorldStore;

/// Process-wide directory of live rooms, keyed by world id.
///
/// Owns lookup-synchronization and nothing else: creation for a key is
/// serialized by holding the map lock across `WorldRoom::open`, so two
/// concurrent cold-opens of the same world end up in one room.
pub struct RoomRegistry {
    store: Arc<dyn WorldStore>,
    config: RoomConfig,
    rooms: Mutex<HashMap<i64, RoomHandle>>,
    next_epoch: AtomicU64,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn WorldStore>, config: RoomConfig) -> Self {
        Self {
            store,
            config,
            rooms: Mutex::new(HashMap::new()),
            next_epoch: AtomicU64::new(0),
        }
    }

    /// Locate or create the room for a world and join it. Returns the handle
    /// the gateway uses to forward inputs and the eventual leave.
    pub async fn join(
        self: &Arc<Self>,
        world_id: i64,
        ctx: SessionContext,
        client_tx: ClientTx,
    ) -> Result<RoomHandle, JoinError> {
        // A handle can go dead between lookup and join when its room is
        // mid-disposal; evict it and try once more with a fresh room.
        for _ in 0..2 {
            let handle = self.lookup_or_create(world_id).await?;
            match handle.join(ctx.clone(), client_tx.clone()).await {
                Ok(()) => return Ok(handle),
                Err(JoinError::RoomClosed) => {
                    self.evict(world_id, handle.epoch).await;
                }
                Err(other) => return Err(other),
            }
        }
        Err(JoinError::RoomClosed)
    }

    async fn lookup_or_create(self: &Arc<Self>, world_id: i64) -> Result<RoomHandle, JoinError> {
        let mut rooms = self.rooms.lock().await;
        if let Some(handle) = rooms.get(&world_id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let room = tokio::task::spawn_blocking(move || WorldRoom::open(world_id, store, config))
            .await
            .map_err(|e| JoinError::Persistence(e.to_string()))?
            .map_err(|e| match e {
                RoomError::WorldNotFound(_) => JoinError::WorldNotFound,
                other => JoinError::Persistence(other.to_string()),
            })?;

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = RoomHandle::new(cmd_tx, epoch);
        rooms.insert(world_id, handle.clone());

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            room.run(cmd_rx).await;
            registry.evict(world_id, epoch).await;
        });

        Ok(handle)
    }

    /// Drop a directory entry, but only the generation that asked: a dead
    /// room must not evict its own replacement.
    async fn evict(&self, world_id: i64, epoch: u64) {
        let mut rooms = self.rooms.lock().await;
        if rooms.get(&world_id).map(|h| h.epoch) == Some(epoch) {
            rooms.remove(&world_id);
        }
    }

    pub async fn live_rooms(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Ask every live room to save and close its sessions.
    pub async fn shutdown_all(&self) {
        let handles: Vec<RoomHandle> = self.rooms.lock().await.values().cloned().collect();
        for handle in handles {
            handle.shutdown();
        }
    }
}
