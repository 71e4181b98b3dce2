//! Session errors

use crate::config::ConfigError;
use crate::world::{ParticipantId, WorldError, WorldId};

use super::types::SessionStatus;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Backup of the world failed; the session goes straight to Finished
    #[error("Backing up world for TNT Wars failed: {0}")]
    SetupFailure(#[source] WorldError),

    #[error("There is already a TNT Wars game on {0}")]
    WorldAlreadyHosting(WorldId),

    #[error("No world selected")]
    NoWorld,

    #[error("Game is already {0}")]
    AlreadyStarted(SessionStatus),

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Game mode can only be changed before the match starts")]
    ModeLocked,

    #[error("Participant {0} is not in this game")]
    UnknownParticipant(ParticipantId),

    #[error("Participant {0} is already in this game")]
    AlreadyJoined(ParticipantId),

    #[error("Game is not in progress")]
    NotInProgress,

    #[error("Session {0} not found")]
    NotFound(u64),

    #[error("Invalid game settings: {0}")]
    InvalidConfig(#[from] ConfigError),
}
