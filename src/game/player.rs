//! Per-participant combat and scoring record

use std::sync::Arc;

use serde::Serialize;

use crate::world::{Cosmetics, Participant, ParticipantId};

use super::types::{Difficulty, Team};

/// Player state in a session (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub participant: Arc<Participant>,
    pub team: Team,
    /// Spectators never score and can never build
    pub spectator: bool,
    pub health: i32,
    pub score: i32,
    pub kill_streak: u32,
    pub score_multiplier: f32,
    /// Highest streak tier already announced this life (0 = none)
    pub last_announced_streak: u32,
    /// Last attacker to damage this player without killing them
    pub harmed_by: Option<ParticipantId>,
    pub active_ordnance: u32,
    /// Cosmetics from before the session, restored on exit
    pub saved_cosmetics: Cosmetics,
}

impl PlayerState {
    pub fn new(participant: Arc<Participant>, spectator: bool) -> Self {
        let saved_cosmetics = participant.cosmetics();
        Self {
            participant,
            team: Team::None,
            spectator,
            health: Difficulty::default().max_health(),
            score: 0,
            kill_streak: 0,
            score_multiplier: 1.0,
            last_announced_streak: 0,
            harmed_by: None,
            active_ordnance: 0,
            saved_cosmetics,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.participant.id()
    }

    pub fn name(&self) -> &str {
        self.participant.name()
    }

    /// Streak and multiplier go back to defaults (on death and at match start)
    pub fn reset_streak(&mut self) {
        self.kill_streak = 0;
        self.score_multiplier = 1.0;
        self.last_announced_streak = 0;
    }

    /// Prepare combat fields for a fresh match
    pub fn reset_for_match(&mut self, difficulty: Difficulty) {
        self.health = difficulty.max_health();
        self.harmed_by = None;
        self.active_ordnance = 0;
        self.reset_streak();
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            participant_id: self.id(),
            name: self.name().to_string(),
            team: self.team,
            spectator: self.spectator,
            score: self.score,
            health: self.health,
            kill_streak: self.kill_streak,
        }
    }
}

/// Read-only view of a player for lookup surfaces
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    pub participant_id: ParticipantId,
    pub name: String,
    pub team: Team,
    pub spectator: bool,
    pub score: i32,
    pub health: i32,
    pub kill_streak: u32,
}
