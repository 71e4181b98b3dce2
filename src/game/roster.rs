//! Ordered player collection and team balance

use std::sync::Arc;

use crate::world::{Participant, ParticipantId};

use super::player::PlayerState;
use super::types::Team;

#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: Vec<PlayerState>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, player: PlayerState) {
        self.players.push(player);
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<PlayerState> {
        let idx = self.players.iter().position(|p| p.id() == *id)?;
        Some(self.players.remove(idx))
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.find(id).is_some()
    }

    pub fn find(&self, id: &ParticipantId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id() == *id)
    }

    pub fn find_mut(&mut self, id: &ParticipantId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.id() == *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlayerState> {
        self.players.iter_mut()
    }

    /// Members on `team`
    pub fn team_count(&self, team: Team) -> usize {
        self.players.iter().filter(|p| p.team == team).count()
    }

    /// Non-spectator participants
    pub fn active_count(&self) -> usize {
        self.players.iter().filter(|p| !p.spectator).count()
    }

    /// Non-spectators, highest score first; equal scores keep join order
    pub fn sorted_by_score(&self) -> Vec<&PlayerState> {
        let mut sorted: Vec<&PlayerState> = self.players.iter().filter(|p| !p.spectator).collect();
        sorted.sort_by(|a, b| b.score.cmp(&a.score));
        sorted
    }

    /// Handles for every member, for fan-out outside the session lock
    pub fn participants(&self) -> Vec<Arc<Participant>> {
        self.players.iter().map(|p| p.participant.clone()).collect()
    }

    /// Put a player on the smaller team, then the trailing team, then red
    pub fn auto_assign_team(
        &mut self,
        id: &ParticipantId,
        red_score: i32,
        blue_score: i32,
    ) -> Option<Team> {
        self.find_mut(id)?.team = Team::None;
        let red = self.team_count(Team::Red);
        let blue = self.team_count(Team::Blue);

        let team = if red < blue {
            Team::Red
        } else if blue < red {
            Team::Blue
        } else if blue_score < red_score {
            Team::Blue
        } else {
            Team::Red
        };

        let player = self.find_mut(id)?;
        player.team = team;
        Some(team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldId;
    use uuid::Uuid;

    fn player(name: &str, team: Team, score: i32) -> PlayerState {
        let participant = Arc::new(Participant::new(
            Uuid::new_v4(),
            name,
            WorldId::new("arena"),
        ));
        let mut state = PlayerState::new(participant, false);
        state.team = team;
        state.score = score;
        state
    }

    fn roster_with(red: usize, blue: usize) -> Roster {
        let mut roster = Roster::new();
        for i in 0..red {
            roster.push(player(&format!("r{i}"), Team::Red, 0));
        }
        for i in 0..blue {
            roster.push(player(&format!("b{i}"), Team::Blue, 0));
        }
        roster
    }

    #[test]
    fn even_teams_go_to_lower_team_score() {
        let mut roster = roster_with(2, 2);
        let newcomer = player("new", Team::None, 0);
        let id = newcomer.id();
        roster.push(newcomer);
        assert_eq!(roster.auto_assign_team(&id, 10, 20), Some(Team::Red));
        assert_eq!(roster.team_count(Team::Red), 3);
    }

    #[test]
    fn minority_team_wins_over_scores() {
        let mut roster = roster_with(1, 3);
        let newcomer = player("new", Team::None, 0);
        let id = newcomer.id();
        roster.push(newcomer);
        assert_eq!(roster.auto_assign_team(&id, 500, 0), Some(Team::Red));
    }

    #[test]
    fn full_tie_defaults_to_red_and_reassignment_clears_old_team() {
        let mut roster = roster_with(1, 1);
        let newcomer = player("new", Team::Blue, 0);
        let id = newcomer.id();
        roster.push(newcomer);
        // Own blue flag is cleared before counting: 1 vs 1, scores equal
        assert_eq!(roster.auto_assign_team(&id, 7, 7), Some(Team::Red));
        assert_eq!(roster.auto_assign_team(&Uuid::new_v4(), 0, 0), None);
    }

    #[test]
    fn sorted_by_score_skips_spectators() {
        let mut roster = Roster::new();
        roster.push(player("low", Team::None, 3));
        roster.push(player("high", Team::None, 9));
        let mut spec = player("spec", Team::None, 100);
        spec.spectator = true;
        roster.push(spec);

        let names: Vec<&str> = roster.sorted_by_score().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["high", "low"]);
        assert_eq!(roster.active_count(), 2);
    }
}
