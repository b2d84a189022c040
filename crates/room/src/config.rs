use std::time::Duration;

/// Simulation ticks per second. Clients pace their prediction against this.
pub const TICK_RATE: u32 = 20;

/// Hard cap on concurrent players in one room.
pub const MAX_PARTY_SIZE: usize = 8;

/// Per-session input queue bound. The queue absorbs one-tick bursts; it is
/// not a buffer for sustained backlog, so overflow refuses the newest input.
pub const MAX_QUEUE: usize = 10;

/// Per-room runtime knobs. The defaults are the client contract; tests
/// compress the timers.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub tick_period: Duration,
    pub autosave_interval: Duration,
    pub idle_check_interval: Duration,
    pub idle_warn_after: Duration,
    pub idle_kick_after: Duration,
    pub max_party_size: usize,
    pub max_queue: usize,
    /// Dimensions used when a fresh world is generated from its seed.
    pub map_width: u32,
    pub map_height: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(1000 / TICK_RATE as u64),
            autosave_interval: Duration::from_secs(60),
            idle_check_interval: Duration::from_secs(30),
            idle_warn_after: Duration::from_secs(14 * 60),
            idle_kick_after: Duration::from_secs(15 * 60),
            max_party_size: MAX_PARTY_SIZE,
            max_queue: MAX_QUEUE,
            map_width: 64,
            map_height: 64,
        }
    }
}
