use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide subscriber. Rooms default to debug so input
/// drops and save activity are visible in development; `RUST_LOG` overrides
/// everything.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,room=debug"));
    fmt()
        .compact()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[derive(Debug, Clone)]
pub struct TickMetrics {
    pub tick_number: u64,
    pub duration_us: u128,
    pub inputs_applied: usize,
    pub player_count: usize,
}

impl TickMetrics {
    pub fn log(&self) {
        // One tick period at 20 Hz.
        const TICK_BUDGET_US: u128 = 50_000;
        if self.duration_us > TICK_BUDGET_US {
            tracing::warn!(
                tick = self.tick_number,
                duration_us = self.duration_us,
                inputs = self.inputs_applied,
                players = self.player_count,
                "tick exceeded budget ({}us > {}us)",
                self.duration_us,
                TICK_BUDGET_US
            );
        } else {
            tracing::trace!(
                tick = self.tick_number,
                duration_us = self.duration_us,
                inputs = self.inputs_applied,
                players = self.player_count,
                "tick completed"
            );
        }
    }
}
