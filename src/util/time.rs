//! Time utilities and session pacing

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Grace period countdown step
pub const GRACE_STEP: Duration = Duration::from_secs(1);
/// Main loop sub-tick; termination is re-checked after each one
pub const SUB_TICK: Duration = Duration::from_secs(3);
/// Sub-ticks between periodic score announcements
pub const SUB_TICKS_PER_ROUND: u32 = 5;
/// Pause between participants when sending everyone to spawn
pub const SPAWN_PACE: Duration = Duration::from_millis(250);
/// Pause after each block of a score announcement
pub const SECTION_PAUSE: Duration = Duration::from_secs(1);
/// Pause between leaderboard lines
pub const LEADERBOARD_LINE_PACE: Duration = Duration::from_millis(500);
/// Pause between final placement lines
pub const PLACEMENT_PACE: Duration = Duration::from_millis(750);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_round_is_fifteen_seconds() {
        assert_eq!(SUB_TICK * SUB_TICKS_PER_ROUND, Duration::from_secs(15));
    }
}
