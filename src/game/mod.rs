//! TNT Wars session core

pub mod broadcast;
pub mod config;
pub mod error;
pub mod player;
pub mod registry;
pub mod roster;
pub mod scoring;
pub mod session;
pub mod state;
pub mod types;
pub mod zone;

pub use config::{GameConfig, StreakTier};
pub use error::SessionError;
pub use registry::GameRegistry;
pub use scoring::KillReport;
pub use session::{BuildAction, GameSession, SessionSummary};
pub use types::{Difficulty, GameMode, SessionStatus, Team};
pub use zone::{Zone, ZoneKind};
