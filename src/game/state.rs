//! Lock-protected match state shared by the worker and external callers

use crate::world::{BlockPos, ParticipantId, SnapshotHandle};

use super::config::GameConfig;
use super::error::SessionError;
use super::roster::Roster;
use super::types::{Difficulty, GameMode, SessionStatus, Team};
use super::zone::{ZoneIndex, ZoneKind};

/// Everything a session mutates; always accessed under the session lock
#[derive(Debug, Clone)]
pub struct MatchState {
    pub status: SessionStatus,
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub config: GameConfig,
    pub red_score: i32,
    pub blue_score: i32,
    pub snapshot: Option<SnapshotHandle>,
    pub red_spawn: Option<BlockPos>,
    pub blue_spawn: Option<BlockPos>,
    pub roster: Roster,
    pub no_ordnance: ZoneIndex,
    pub damage_immune: ZoneIndex,
}

impl MatchState {
    pub fn new(mode: GameMode, difficulty: Difficulty, config: GameConfig) -> Self {
        Self {
            status: SessionStatus::WaitingForPlayers,
            mode,
            difficulty,
            config,
            red_score: 0,
            blue_score: 0,
            snapshot: None,
            red_spawn: None,
            blue_spawn: None,
            roster: Roster::new(),
            no_ordnance: ZoneIndex::new(),
            damage_immune: ZoneIndex::new(),
        }
    }

    /// Move to `next`, refusing backward or skipped transitions
    pub fn advance(&mut self, next: SessionStatus) -> Result<(), SessionError> {
        if !self.status.can_advance_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if next == SessionStatus::InProgress && self.snapshot.is_none() {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Two players on the same team in TDM
    pub fn same_team(&self, a: Team, b: Team) -> bool {
        self.mode == GameMode::Tdm && a != Team::None && a == b
    }

    /// Apply `amount * multiplier` (truncated toward zero) to a player and,
    /// in TDM, to that player's team total. Returns the applied delta.
    pub fn change_score(&mut self, id: &ParticipantId, amount: i32, multiplier: f32) -> i32 {
        let delta = (amount as f32 * multiplier) as i32;
        let Some(player) = self.roster.find_mut(id) else {
            return 0;
        };
        player.score = player.score.saturating_add(delta);
        let team = player.team;

        if self.mode == GameMode::Tdm {
            match team {
                Team::Red => self.red_score = self.red_score.saturating_add(delta),
                Team::Blue => self.blue_score = self.blue_score.saturating_add(delta),
                Team::None => {}
            }
        }
        delta
    }

    pub fn spawn_for(&self, team: Team) -> Option<BlockPos> {
        match (self.mode, team) {
            (GameMode::Tdm, Team::Red) => self.red_spawn,
            (GameMode::Tdm, Team::Blue) => self.blue_spawn,
            _ => None,
        }
    }

    pub fn zones(&self, kind: ZoneKind) -> &ZoneIndex {
        match kind {
            ZoneKind::NoOrdnance => &self.no_ordnance,
            ZoneKind::BlockDamageImmune => &self.damage_immune,
        }
    }

    pub fn zones_mut(&mut self, kind: ZoneKind) -> &mut ZoneIndex {
        match kind {
            ZoneKind::NoOrdnance => &mut self.no_ordnance,
            ZoneKind::BlockDamageImmune => &mut self.damage_immune,
        }
    }

    /// Whether the match should end now
    pub fn termination_reached(&self) -> bool {
        let required = self.config.score_required;
        match self.mode {
            GameMode::Tdm if self.red_score >= required || self.blue_score >= required => {
                return true
            }
            GameMode::Ffa if self.roster.iter().any(|p| p.score >= required) => return true,
            _ => {}
        }
        self.roster.active_count() <= 1 || self.status == SessionStatus::Finished
    }
}
