use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use net::protocol::{close, MapWire, PlayerChangeWire, PlayerWire, ServerMessage};
use net::{ClientTx, OutboundFrame};
use observability::TickMetrics;
use session::{SessionContext, SessionId};
use tokio::sync::{mpsc, oneshot};
use worldmap::TileMap;

use crate::config::RoomConfig;
use crate::error::{JoinError, RoomError};
use crate::input::{self, InputMessage, InputQueue, InputVerdict};
use crate::state::{PlayerRecord, RoomState, StatePatch};
use crate::store::{CharacterRecord, WorldStore};

/// Everything a room can be asked to do. All commands for one room are
/// consumed by its single owning task, which is what serializes the room.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        ctx: SessionContext,
        client_tx: ClientTx,
        reply: oneshot::Sender<Result<(), JoinError>>,
    },
    Input {
        session_id: SessionId,
        input: InputMessage,
    },
    Leave {
        session_id: SessionId,
        consented: bool,
    },
    Shutdown,
}

/// Cheap handle for talking to a live room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    cmd_tx: mpsc::UnboundedSender<RoomCommand>,
    pub(crate) epoch: u64,
}

impl RoomHandle {
    pub(crate) fn new(cmd_tx: mpsc::UnboundedSender<RoomCommand>, epoch: u64) -> Self {
        Self { cmd_tx, epoch }
    }

    pub async fn join(&self, ctx: SessionContext, client_tx: ClientTx) -> Result<(), JoinError> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::Join {
                ctx,
                client_tx,
                reply,
            })
            .map_err(|_| JoinError::RoomClosed)?;
        reply_rx.await.map_err(|_| JoinError::RoomClosed)?
    }

    pub fn input(&self, session_id: SessionId, input: InputMessage) {
        let _ = self.cmd_tx.send(RoomCommand::Input { session_id, input });
    }

    pub fn leave(&self, session_id: SessionId, consented: bool) {
        let _ = self.cmd_tx.send(RoomCommand::Leave {
            session_id,
            consented,
        });
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(RoomCommand::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }
}

/// Releases the single-flight save flag however the save ends.
struct SaveGuard(Arc<AtomicBool>);

impl Drop for SaveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The live runtime for exactly one world save.
///
/// Owns the map, the synchronized state, per-session input queues and the
/// timers. Handlers are synchronous and in-memory; persistence happens on
/// blocking tasks so the tick never waits on I/O.
pub struct WorldRoom {
    world_id: i64,
    world_name: String,
    host_account_id: i64,
    map: TileMap,
    state: RoomState,
    queues: BTreeMap<SessionId, InputQueue>,
    clients: BTreeMap<SessionId, ClientTx>,
    account_by_session: BTreeMap<SessionId, i64>,
    character_by_session: BTreeMap<SessionId, i64>,
    last_input: BTreeMap<SessionId, Instant>,
    idle_warned: BTreeSet<SessionId>,
    host_session: Option<SessionId>,
    saving: Arc<AtomicBool>,
    store: Arc<dyn WorldStore>,
    config: RoomConfig,
    tick: u64,
    join_attempted: bool,
}

impl std::fmt::Debug for WorldRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldRoom")
            .field("world_id", &self.world_id)
            .field("world_name", &self.world_name)
            .field("host_account_id", &self.host_account_id)
            .field("map", &self.map)
            .field("state", &self.state)
            .field("queues", &self.queues)
            .field("clients", &self.clients)
            .field("account_by_session", &self.account_by_session)
            .field("character_by_session", &self.character_by_session)
            .field("last_input", &self.last_input)
            .field("idle_warned", &self.idle_warned)
            .field("host_session", &self.host_session)
            .field("saving", &self.saving)
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("join_attempted", &self.join_attempted)
            .finish()
    }
}

impl WorldRoom {
    /// Load the world and build the live room. Fails if the world save does
    /// not exist; the attempting client gets a creation failure.
    pub fn open(
        world_id: i64,
        store: Arc<dyn WorldStore>,
        config: RoomConfig,
    ) -> Result<Self, RoomError> {
        let world = store
            .get_world(world_id)?
            .ok_or(RoomError::WorldNotFound(world_id))?;

        let map = match world.world_data {
            Some(data) => match serde_json::from_value::<TileMap>(data) {
                Ok(map) if map.validate().is_ok() => map,
                _ => {
                    tracing::warn!(world_id, "stored world data unusable, regenerating from seed");
                    TileMap::generate(world.seed, config.map_width, config.map_height)
                }
            },
            None => TileMap::generate(world.seed, config.map_width, config.map_height),
        };

        tracing::info!(
            world_id,
            name = %world.name,
            host_account_id = world.owner_account_id,
            "room created"
        );

        Ok(Self {
            world_id,
            world_name: world.name,
            host_account_id: world.owner_account_id,
            map,
            state: RoomState::new(),
            queues: BTreeMap::new(),
            clients: BTreeMap::new(),
            account_by_session: BTreeMap::new(),
            character_by_session: BTreeMap::new(),
            last_input: BTreeMap::new(),
            idle_warned: BTreeSet::new(),
            host_session: None,
            saving: Arc::new(AtomicBool::new(false)),
            store,
            config,
            tick: 0,
            join_attempted: false,
        })
    }

    pub fn world_id(&self) -> i64 {
        self.world_id
    }

    pub fn player_count(&self) -> usize {
        self.state.len()
    }

    pub fn host_session(&self) -> Option<SessionId> {
        self.host_session
    }

    pub fn player(&self, session_id: SessionId) -> Option<&PlayerRecord> {
        self.state.get(session_id)
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    /// Admit a session. The host must be first in; once the room is warm any
    /// authenticated account may join up to the party cap. All persistence
    /// happens before any bookkeeping, so a failed join leaves no trace.
    pub fn handle_join(
        &mut self,
        ctx: SessionContext,
        client_tx: ClientTx,
        now: Instant,
    ) -> Result<(), JoinError> {
        self.join_attempted = true;

        if self.state.len() >= self.config.max_party_size {
            tracing::info!(
                world_id = self.world_id,
                session_id = %ctx.session_id,
                "join refused: room full"
            );
            return Err(JoinError::PartyFull);
        }
        if self.state.is_empty() && ctx.account_id != self.host_account_id {
            tracing::info!(
                world_id = self.world_id,
                account_id = ctx.account_id,
                "join refused: cold open by non-owner"
            );
            return Err(JoinError::NotOwner);
        }

        let character = self.load_or_create_character(&ctx)?;
        // A stale save can hold a position the current map rejects.
        let (x, y) = if self.map.is_passable(character.x, character.y) {
            (character.x, character.y)
        } else {
            self.map.spawn()
        };

        let record = PlayerRecord {
            session_id: ctx.session_id,
            account_id: ctx.account_id,
            name: character.name.clone(),
            x,
            y,
            last_processed_seq: 0,
        };

        self.state.insert(record);
        // Sessions already present learn about the newcomer now; the
        // newcomer itself starts from the full snapshot below.
        self.flush_patches();

        let (spawn_x, spawn_y) = self.map.spawn();
        let _ = client_tx.send(OutboundFrame::Message(ServerMessage::Welcome {
            session_id: ctx.session_id.0,
            world_id: self.world_id,
            world_name: self.world_name.clone(),
            tick: self.tick,
            map: MapWire {
                width: self.map.width(),
                height: self.map.height(),
                spawn_x,
                spawn_y,
            },
        }));
        let snapshot = ServerMessage::StatePatch {
            tick: self.tick,
            added: self.state.players().map(player_wire).collect(),
            changed: Vec::new(),
            removed: Vec::new(),
        };
        let _ = client_tx.send(OutboundFrame::Message(snapshot));

        self.clients.insert(ctx.session_id, client_tx);
        self.queues
            .insert(ctx.session_id, InputQueue::new(self.config.max_queue));
        self.account_by_session
            .insert(ctx.session_id, ctx.account_id);
        self.character_by_session
            .insert(ctx.session_id, character.id);
        self.last_input.insert(ctx.session_id, now);
        if ctx.account_id == self.host_account_id {
            self.host_session = Some(ctx.session_id);
        }

        tracing::info!(
            world_id = self.world_id,
            session_id = %ctx.session_id,
            account_id = ctx.account_id,
            "player joined"
        );
        Ok(())
    }

    fn load_or_create_character(
        &self,
        ctx: &SessionContext,
    ) -> Result<CharacterRecord, JoinError> {
        match self.store.get_character(ctx.account_id, self.world_id) {
            Ok(Some(character)) => Ok(character),
            Ok(None) => {
                let name = ctx
                    .character_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .unwrap_or(ctx.email.as_str())
                    .to_string();
                let (spawn_x, spawn_y) = self.map.spawn();
                self.store
                    .create_character(ctx.account_id, self.world_id, &name, spawn_x, spawn_y)
                    .map_err(|e| JoinError::Persistence(e.to_string()))
            }
            Err(e) => Err(JoinError::Persistence(e.to_string())),
        }
    }

    /// Message intake. Any well-formed input from a live session counts as
    /// activity, even one too stale to apply.
    pub fn handle_input(&mut self, session_id: SessionId, input: InputMessage, now: Instant) {
        let last = self.state.get(session_id).map(|p| p.last_processed_seq);
        match input::validate(&input, last) {
            InputVerdict::UnknownSession => {
                tracing::debug!(
                    world_id = self.world_id,
                    %session_id,
                    seq = input.sequence_number,
                    "input for unknown session dropped"
                );
            }
            InputVerdict::Malformed => {
                tracing::warn!(
                    world_id = self.world_id,
                    %session_id,
                    seq = input.sequence_number,
                    "malformed input dropped"
                );
            }
            verdict @ (InputVerdict::Accept | InputVerdict::Stale) => {
                self.last_input.insert(session_id, now);
                self.idle_warned.remove(&session_id);
                if verdict == InputVerdict::Stale {
                    tracing::debug!(
                        world_id = self.world_id,
                        %session_id,
                        seq = input.sequence_number,
                        "stale input dropped"
                    );
                    return;
                }
                if let Some(queue) = self.queues.get_mut(&session_id) {
                    if !queue.push(input) {
                        tracing::debug!(
                            world_id = self.world_id,
                            %session_id,
                            seq = input.sequence_number,
                            "input queue full, dropping newest"
                        );
                    }
                }
            }
        }
    }

    /// One simulation step: at most one input per player, then publish.
    ///
    /// The sequence number is acknowledged even when the move is blocked;
    /// clients discard confirmed predictions by that acknowledgement, so a
    /// silently dropped input would grow their replay buffer forever.
    pub fn tick(&mut self) {
        let started = Instant::now();
        let mut applied = 0;

        for (session_id, queue) in self.queues.iter_mut() {
            let Some(input) = queue.pop() else { continue };
            let Some(player) = self.state.get(*session_id) else {
                continue;
            };
            if input.sequence_number <= player.last_processed_seq {
                continue;
            }
            let step = worldmap::step(&self.map, player.x, player.y, input.direction);
            self.state
                .apply_move(*session_id, step.x, step.y, input.sequence_number);
            applied += 1;
        }

        self.tick += 1;
        self.flush_patches();

        TickMetrics {
            tick_number: self.tick,
            duration_us: started.elapsed().as_micros(),
            inputs_applied: applied,
            player_count: self.state.len(),
        }
        .log();
    }

    /// Warn at one minute out, kick at the deadline. Runs on a coarse timer,
    /// so both fire somewhere inside the following check interval.
    pub fn check_idle(&mut self, now: Instant) {
        let mut warned = Vec::new();
        let mut kicked = Vec::new();
        for (session_id, last) in &self.last_input {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed >= self.config.idle_kick_after {
                kicked.push(*session_id);
            } else if elapsed >= self.config.idle_warn_after
                && !self.idle_warned.contains(session_id)
            {
                warned.push(*session_id);
            }
        }

        for session_id in warned {
            let seconds_remaining =
                (self.config.idle_kick_after - self.config.idle_warn_after).as_secs();
            tracing::info!(world_id = self.world_id, %session_id, "idle warning");
            self.send_to(session_id, ServerMessage::IdleWarning { seconds_remaining });
            self.idle_warned.insert(session_id);
        }
        for session_id in kicked {
            tracing::info!(world_id = self.world_id, %session_id, "idle kick");
            self.send_to(
                session_id,
                ServerMessage::IdleKick {
                    reason: "no input received for too long".to_string(),
                },
            );
            self.close_session(session_id, close::IDLE_TIMEOUT, "idle timeout");
            self.handle_leave(session_id, false);
        }
    }

    /// Remove a session. Idempotent: the transport close and an earlier kick
    /// can both land here. The character save is fire-and-forget; the leave
    /// itself never waits on the store.
    pub fn handle_leave(&mut self, session_id: SessionId, consented: bool) {
        let Some(record) = self.state.remove(session_id) else {
            return;
        };

        if let Some(character_id) = self.character_by_session.remove(&session_id) {
            let store = Arc::clone(&self.store);
            let (x, y) = (record.x, record.y);
            tokio::spawn(async move {
                let result =
                    tokio::task::spawn_blocking(move || store.save_character_position(character_id, x, y))
                        .await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::error!(character_id, error = %e, "character save on leave failed")
                    }
                    Err(e) => tracing::error!(character_id, error = %e, "character save task failed"),
                }
            });
        }

        self.queues.remove(&session_id);
        self.account_by_session.remove(&session_id);
        self.last_input.remove(&session_id);
        self.idle_warned.remove(&session_id);
        self.clients.remove(&session_id);
        if self.host_session == Some(session_id) {
            self.host_session = None;
        }

        self.flush_patches();
        tracing::info!(world_id = self.world_id, %session_id, consented, "player left");
    }

    /// Kick off a background save of world data and all player positions.
    /// Single-flight: while one save is in the air, further calls return
    /// immediately.
    pub fn spawn_auto_save(&self) {
        if self
            .saving
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            tracing::debug!(world_id = self.world_id, "save already in flight, skipping");
            return;
        }
        let guard = SaveGuard(Arc::clone(&self.saving));

        let world_data = match serde_json::to_value(&self.map) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(world_id = self.world_id, error = %e, "world snapshot failed");
                return;
            }
        };
        let positions = self.position_snapshot();
        let count = positions.len();
        let store = Arc::clone(&self.store);
        let world_id = self.world_id;

        tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || store.save_all(world_id, &world_data, &positions))
                    .await;
            match result {
                Ok(Ok(())) => tracing::debug!(world_id, characters = count, "auto-save complete"),
                Ok(Err(e)) => tracing::error!(world_id, error = %e, "auto-save failed"),
                Err(e) => tracing::error!(world_id, error = %e, "auto-save task failed"),
            }
            drop(guard);
        });
    }

    fn position_snapshot(&self) -> Vec<(i64, i32, i32)> {
        self.character_by_session
            .iter()
            .filter_map(|(session_id, character_id)| {
                self.state
                    .get(*session_id)
                    .map(|p| (*character_id, p.x, p.y))
            })
            .collect()
    }

    fn send_to(&self, session_id: SessionId, message: ServerMessage) {
        if let Some(tx) = self.clients.get(&session_id) {
            let _ = tx.send(OutboundFrame::Message(message));
        }
    }

    fn close_session(&self, session_id: SessionId, code: u16, reason: &str) {
        if let Some(tx) = self.clients.get(&session_id) {
            let _ = tx.send(OutboundFrame::Close {
                code,
                reason: reason.to_string(),
            });
        }
    }

    fn close_all(&mut self, reason: &str) {
        for tx in std::mem::take(&mut self.clients).into_values() {
            let _ = tx.send(OutboundFrame::Message(ServerMessage::Error {
                message: reason.to_string(),
            }));
            let _ = tx.send(OutboundFrame::Close {
                code: 1001,
                reason: reason.to_string(),
            });
        }
    }

    /// Deliver the journal to every connected session.
    fn flush_patches(&mut self) {
        let patches = self.state.drain_patches();
        if patches.is_empty() || self.clients.is_empty() {
            return;
        }

        let mut added = Vec::new();
        let mut changed = Vec::new();
        let mut removed = Vec::new();
        for patch in patches {
            match patch {
                StatePatch::Added(record) => added.push(player_wire(&record)),
                StatePatch::Changed {
                    session_id,
                    x,
                    y,
                    last_processed_seq,
                } => changed.push(PlayerChangeWire {
                    session_id: session_id.0,
                    x,
                    y,
                    last_processed_seq,
                }),
                StatePatch::Removed(session_id) => removed.push(session_id.0),
            }
        }

        let message = ServerMessage::StatePatch {
            tick: self.tick,
            added,
            changed,
            removed,
        };
        for tx in self.clients.values() {
            let _ = tx.send(OutboundFrame::Message(message.clone()));
        }
    }

    /// Single owning task for this room. Exiting the loop drops the timers,
    /// so nothing can fire after disposal begins.
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<RoomCommand>) {
        use tokio::time::{interval_at, Instant as TokioInstant, MissedTickBehavior};

        let start = TokioInstant::now();
        let mut tick_timer = interval_at(start + self.config.tick_period, self.config.tick_period);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut autosave_timer = interval_at(
            start + self.config.autosave_interval,
            self.config.autosave_interval,
        );
        autosave_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut idle_timer = interval_at(
            start + self.config.idle_check_interval,
            self.config.idle_check_interval,
        );
        idle_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(RoomCommand::Join { ctx, client_tx, reply }) => {
                        let result = self.handle_join(ctx, client_tx, Instant::now());
                        let _ = reply.send(result);
                    }
                    Some(RoomCommand::Input { session_id, input }) => {
                        self.handle_input(session_id, input, Instant::now());
                    }
                    Some(RoomCommand::Leave { session_id, consented }) => {
                        self.handle_leave(session_id, consented);
                    }
                    Some(RoomCommand::Shutdown) | None => {
                        self.close_all("server shutting down");
                        break;
                    }
                },
                _ = tick_timer.tick() => self.tick(),
                _ = autosave_timer.tick() => self.spawn_auto_save(),
                _ = idle_timer.tick() => self.check_idle(Instant::now()),
            }

            if self.join_attempted && self.state.is_empty() {
                break;
            }
        }

        self.dispose().await;
    }

    /// Final save on the way out. Waits for completion; the registry only
    /// forgets the room after this returns.
    async fn dispose(self) {
        tracing::info!(world_id = self.world_id, "room disposing");

        if self
            .saving
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            tracing::warn!(
                world_id = self.world_id,
                "save in flight at dispose, skipping final save"
            );
            return;
        }
        let _guard = SaveGuard(Arc::clone(&self.saving));

        let world_data = match serde_json::to_value(&self.map) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(world_id = self.world_id, error = %e, "world snapshot failed");
                return;
            }
        };
        let positions = self.position_snapshot();
        let store = Arc::clone(&self.store);
        let world_id = self.world_id;

        let result =
            tokio::task::spawn_blocking(move || store.save_all(world_id, &world_data, &positions))
                .await;
        match result {
            Ok(Ok(())) => tracing::info!(world_id, "final save complete"),
            Ok(Err(e)) => tracing::error!(world_id, error = %e, "final save failed"),
            Err(e) => tracing::error!(world_id, error = %e, "final save task failed"),
        }
    }
}

fn player_wire(record: &PlayerRecord) -> PlayerWire {
    PlayerWire {
        session_id: record.session_id.0,
        account_id: record.account_id,
        name: record.name.clone(),
        x: record.x,
        y: record.y,
        last_processed_seq: record.last_processed_seq,
    }
}
