//! Kill, assist and streak resolution

use std::sync::Arc;

use tracing::debug;

use crate::world::{BlockPos, Participant, ParticipantId};

use super::broadcast::{tagged, Notice};
use super::error::SessionError;
use super::state::MatchState;

/// What one explosion did to the session
#[derive(Debug, Default)]
pub struct KillReport {
    /// Kills that count toward the attacker's streak and score
    pub kills: u32,
    pub team_kills: u32,
    pub deaths: Vec<ParticipantId>,
    /// Net change applied to the attacker's score
    pub score_delta: i32,
    pub notices: Vec<Notice>,
    /// Dead players to send back to spawn once the lock is released
    pub respawns: Vec<(Arc<Participant>, Option<BlockPos>)>,
}

pub struct ScoringEngine;

impl ScoringEngine {
    /// Resolve one attack against one or more victims
    pub fn resolve(
        state: &mut MatchState,
        attacker_id: ParticipantId,
        victims: &[ParticipantId],
    ) -> Result<KillReport, SessionError> {
        let attacker = state
            .roster
            .find(&attacker_id)
            .ok_or(SessionError::UnknownParticipant(attacker_id))?;
        let mut report = KillReport::default();
        if attacker.spectator {
            debug!(participant = %attacker_id, "Ignoring hits from spectator");
            return Ok(report);
        }
        let attacker_handle = attacker.participant.clone();
        let attacker_team = attacker.team;

        let damage = state.difficulty.hit_damage();
        let mut team_kill_penalty: i32 = 0;

        for victim_id in victims {
            if *victim_id == attacker_id || report.deaths.contains(victim_id) {
                continue;
            }
            let Some(victim) = state.roster.find(victim_id) else {
                debug!(participant = %victim_id, "Hit on unknown participant");
                continue;
            };
            if victim.spectator {
                continue;
            }
            let team_kill = state.same_team(attacker_team, victim.team);
            if team_kill && !state.config.team_kills {
                continue;
            }
            let per_kill = state.config.score_per_kill;

            let Some(victim) = state.roster.find_mut(victim_id) else {
                continue;
            };
            if victim.health - damage <= 0 {
                victim.health = 0;
                report.deaths.push(*victim_id);
                if team_kill {
                    team_kill_penalty = team_kill_penalty.saturating_add(per_kill);
                }
            } else {
                victim.health -= damage;
                victim.harmed_by = Some(attacker_id);
                report.notices.push(Notice::Personal(
                    attacker_handle.clone(),
                    tagged(format!("You harmed {}", victim.name())),
                ));
                report.notices.push(Notice::Personal(
                    victim.participant.clone(),
                    tagged(format!("You were harmed by {}", attacker_handle.name())),
                ));
            }
        }

        for dead_id in report.deaths.clone() {
            Self::resolve_death(state, &attacker_handle, dead_id, &mut report);
        }

        Self::apply_streak(state, &attacker_id, &mut report);
        Self::apply_score(state, &attacker_handle, team_kill_penalty, &mut report);
        Ok(report)
    }

    fn resolve_death(
        state: &mut MatchState,
        attacker: &Arc<Participant>,
        dead_id: ParticipantId,
        report: &mut KillReport,
    ) {
        let attacker_team = state
            .roster
            .find(&attacker.id())
            .map(|p| p.team)
            .unwrap_or_default();
        let max_health = state.difficulty.max_health();
        let Some(dead) = state.roster.find_mut(&dead_id) else {
            return;
        };
        dead.reset_streak();
        let harmer = dead.harmed_by.take();
        let dead_team = dead.team;
        let dead_name = dead.name().to_string();
        let dead_handle = dead.participant.clone();

        let team_kill = state.same_team(attacker_team, dead_team);
        let verb = if team_kill { "team killed" } else { "killed" };
        if team_kill {
            report.team_kills += 1;
        } else {
            report.kills += 1;
        }

        let helper = harmer
            .filter(|id| *id != attacker.id())
            .and_then(|id| state.roster.find(&id))
            .map(|p| (p.id(), p.team, p.participant.clone()));

        match helper {
            None => report.notices.push(Notice::Session(tagged(format!(
                "{} {verb} {dead_name}",
                attacker.name()
            )))),
            Some((helper_id, helper_team, helper_handle)) => {
                report.notices.push(Notice::Session(tagged(format!(
                    "{} {verb} {dead_name} (with help from {})",
                    attacker.name(),
                    helper_handle.name()
                ))));

                let assist = state.config.assist_score;
                let line = if state.same_team(helper_team, dead_team) {
                    state.change_score(&helper_id, -assist, 1.0);
                    format!("- {assist} point(s) for team kill assist!")
                } else {
                    state.change_score(&helper_id, assist, 1.0);
                    format!("+ {assist} point(s) for assist!")
                };
                report
                    .notices
                    .push(Notice::Personal(helper_handle, tagged(line)));
            }
        }

        if let Some(dead) = state.roster.find_mut(&dead_id) {
            dead.health = max_health;
        }
        report
            .respawns
            .push((dead_handle, state.spawn_for(dead_team)));
    }

    fn apply_streak(state: &mut MatchState, attacker_id: &ParticipantId, report: &mut KillReport) {
        let kills = report.kills;
        let streaks = state.config.streaks;
        let tiers = state.config.streak_tiers;
        let bonus_health = state.difficulty.streak_bonus_health();
        let Some(attacker) = state.roster.find_mut(attacker_id) else {
            return;
        };
        attacker.kill_streak += kills;
        if kills == 0 || !streaks {
            return;
        }

        let streak = attacker.kill_streak;
        let name = attacker.name().to_string();
        let handle = attacker.participant.clone();
        let reached = tiers.iter().rposition(|tier| streak >= tier.kills);

        match reached {
            Some(level) if tiers[level].kills != attacker.last_announced_streak => {
                let tier = tiers[level];
                attacker.score_multiplier = tier.multiplier;
                attacker.last_announced_streak = tier.kills;
                let (personal, public) = match level {
                    0 => (
                        format!("Kill streak of {streak} (Multiplier of {})", tier.multiplier),
                        format!("{name} has a kill streak of {streak}"),
                    ),
                    1 => (
                        format!(
                            "Kill streak of {streak} (Multiplier of {} and a bigger explosion!)",
                            tier.multiplier
                        ),
                        format!(
                            "{name} has a kill streak of {streak} and now has a bigger explosion for their TNT!"
                        ),
                    ),
                    _ => {
                        attacker.health += bonus_health;
                        (
                            format!(
                                "Kill streak of {streak} (Multiplier of {} and you now have {bonus_health} extra health!)",
                                tier.multiplier
                            ),
                            format!("{name} has a kill streak of {streak} and now has {bonus_health} extra health!"),
                        )
                    }
                };
                report
                    .notices
                    .push(Notice::Personal(handle, tagged(personal)));
                report.notices.push(Notice::Session(tagged(public)));
            }
            _ => report.notices.push(Notice::Personal(
                handle,
                tagged(format!("Kill streak of {streak}")),
            )),
        }
    }

    fn apply_score(
        state: &mut MatchState,
        attacker: &Arc<Participant>,
        team_kill_penalty: i32,
        report: &mut KillReport,
    ) {
        let kills = report.kills as i32;
        let mut gained = kills.saturating_mul(state.config.score_per_kill);
        if kills > 1 {
            gained = gained.saturating_add(kills.saturating_mul(state.config.multi_kill_bonus));
        }

        if gained > 0 {
            let multiplier = state
                .roster
                .find(&attacker.id())
                .map(|p| p.score_multiplier)
                .unwrap_or(1.0);
            let delta = state.change_score(&attacker.id(), gained, multiplier);
            report.score_delta += delta;
            report.notices.push(Notice::Personal(
                attacker.clone(),
                tagged(format!("+ {delta} point(s) for {kills} kills")),
            ));
        }
        if team_kill_penalty != 0 {
            let delta = state.change_score(&attacker.id(), -team_kill_penalty, 1.0);
            report.score_delta += delta;
            report.notices.push(Notice::Personal(
                attacker.clone(),
                tagged(format!("- {team_kill_penalty} point(s) for team kill(s)!")),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::game::player::PlayerState;
    use crate::game::types::{Difficulty, GameMode, Team};
    use crate::world::WorldId;
    use uuid::Uuid;

    fn state(mode: GameMode, difficulty: Difficulty, config: GameConfig) -> MatchState {
        MatchState::new(mode, difficulty, config)
    }

    fn join(state: &mut MatchState, name: &str, team: Team) -> ParticipantId {
        let participant = Arc::new(Participant::new(
            Uuid::new_v4(),
            name,
            WorldId::new("arena"),
        ));
        let mut player = PlayerState::new(participant, false);
        player.team = team;
        player.reset_for_match(state.difficulty);
        let id = player.id();
        state.roster.push(player);
        id
    }

    fn player(state: &MatchState, id: &ParticipantId) -> PlayerState {
        state.roster.find(id).cloned().expect("player present")
    }

    fn session_lines(report: &KillReport) -> Vec<String> {
        report
            .notices
            .iter()
            .filter_map(|n| match n {
                Notice::Session(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn two_hits_kill_on_normal() {
        let mut s = state(GameMode::Ffa, Difficulty::Normal, GameConfig::default());
        let a = join(&mut s, "alice", Team::None);
        let b = join(&mut s, "bob", Team::None);
        s.roster.find_mut(&b).unwrap().kill_streak = 2;
        s.roster.find_mut(&b).unwrap().score_multiplier = 1.25;

        let first = ScoringEngine::resolve(&mut s, a, &[b]).unwrap();
        assert!(first.deaths.is_empty());
        assert_eq!(player(&s, &b).health, 1);
        assert_eq!(player(&s, &b).harmed_by, Some(a));
        assert_eq!(
            first
                .notices
                .iter()
                .filter(|n| matches!(n, Notice::Personal(..)))
                .count(),
            2
        );

        let second = ScoringEngine::resolve(&mut s, a, &[b]).unwrap();
        assert_eq!(second.deaths, vec![b]);
        let bob = player(&s, &b);
        assert_eq!(bob.kill_streak, 0);
        assert_eq!(bob.score_multiplier, 1.0);
        assert_eq!(bob.harmed_by, None);
        assert_eq!(bob.health, 2);
        assert_eq!(player(&s, &a).score, 10);
        assert_eq!(second.respawns.len(), 1);
    }

    #[test]
    fn multi_kill_adds_bonus_per_kill() {
        let mut config = GameConfig::default();
        config.streaks = false;
        let mut s = state(GameMode::Ffa, Difficulty::Hard, config);
        let a = join(&mut s, "alice", Team::None);
        let victims: Vec<_> = ["b", "c", "d"]
            .iter()
            .map(|n| join(&mut s, n, Team::None))
            .collect();

        let report = ScoringEngine::resolve(&mut s, a, &victims).unwrap();
        assert_eq!(report.kills, 3);
        assert_eq!(report.score_delta, 45);
        assert_eq!(player(&s, &a).score, 45);
    }

    #[test]
    fn streak_multiplier_applies_to_the_same_event() {
        let mut s = state(GameMode::Ffa, Difficulty::Hard, GameConfig::default());
        let a = join(&mut s, "alice", Team::None);
        let victims: Vec<_> = ["b", "c", "d"]
            .iter()
            .map(|n| join(&mut s, n, Team::None))
            .collect();

        let report = ScoringEngine::resolve(&mut s, a, &victims).unwrap();
        // 45 * 1.25 = 56.25
        assert_eq!(report.score_delta, 56);
        assert_eq!(player(&s, &a).score_multiplier, 1.25);
        assert_eq!(player(&s, &a).last_announced_streak, 3);
    }

    #[test]
    fn streak_tier_announces_once() {
        let mut s = state(GameMode::Ffa, Difficulty::Hard, GameConfig::default());
        let a = join(&mut s, "alice", Team::None);
        let b = join(&mut s, "bob", Team::None);
        s.roster.find_mut(&a).unwrap().kill_streak = 2;

        let crossing = ScoringEngine::resolve(&mut s, a, &[b]).unwrap();
        assert_eq!(player(&s, &a).kill_streak, 3);
        assert!(session_lines(&crossing)
            .iter()
            .any(|l| l.contains("has a kill streak of 3")));

        let again = ScoringEngine::resolve(&mut s, a, &[b]).unwrap();
        assert_eq!(player(&s, &a).kill_streak, 4);
        assert!(!session_lines(&again)
            .iter()
            .any(|l| l.contains("kill streak")));
        assert!(again.notices.iter().any(|n| matches!(
            n,
            Notice::Personal(_, line) if line.ends_with("Kill streak of 4")
        )));
        assert_eq!(player(&s, &a).score_multiplier, 1.25);
    }

    #[test]
    fn top_tier_grants_bonus_health() {
        let mut s = state(GameMode::Ffa, Difficulty::Extreme, GameConfig::default());
        let a = join(&mut s, "alice", Team::None);
        let b = join(&mut s, "bob", Team::None);
        s.roster.find_mut(&a).unwrap().kill_streak = 6;
        s.roster.find_mut(&a).unwrap().last_announced_streak = 5;

        ScoringEngine::resolve(&mut s, a, &[b]).unwrap();
        let alice = player(&s, &a);
        assert_eq!(alice.score_multiplier, 2.0);
        assert_eq!(alice.health, 1 + 2);
        assert_eq!(alice.score, 20);
    }

    #[test]
    fn assist_goes_to_earlier_attacker() {
        let mut s = state(GameMode::Tdm, Difficulty::Normal, GameConfig::default());
        let red_a = join(&mut s, "ra", Team::Red);
        let red_b = join(&mut s, "rb", Team::Red);
        let blue = join(&mut s, "bl", Team::Blue);

        ScoringEngine::resolve(&mut s, red_a, &[blue]).unwrap();
        let report = ScoringEngine::resolve(&mut s, red_b, &[blue]).unwrap();

        assert_eq!(report.kills, 1);
        assert!(session_lines(&report)[0].contains("(with help from ra)"));
        assert_eq!(player(&s, &red_a).score, 5);
        assert_eq!(player(&s, &red_b).score, 10);
        assert_eq!(s.red_score, 15);
        assert_eq!(s.blue_score, 0);
        assert_eq!(player(&s, &blue).harmed_by, None);
    }

    #[test]
    fn team_kills_skipped_when_disabled() {
        let mut s = state(GameMode::Tdm, Difficulty::Hard, GameConfig::default());
        let a = join(&mut s, "a", Team::Red);
        let b = join(&mut s, "b", Team::Red);

        let report = ScoringEngine::resolve(&mut s, a, &[b]).unwrap();
        assert!(report.deaths.is_empty());
        assert_eq!(player(&s, &b).health, 1);
    }

    #[test]
    fn team_kill_costs_flat_penalty() {
        let mut config = GameConfig::default();
        config.team_kills = true;
        let mut s = state(GameMode::Tdm, Difficulty::Hard, config);
        let a = join(&mut s, "a", Team::Red);
        let mate = join(&mut s, "mate", Team::Red);
        let foe = join(&mut s, "foe", Team::Blue);
        s.roster.find_mut(&a).unwrap().score_multiplier = 2.0;

        let report = ScoringEngine::resolve(&mut s, a, &[mate, foe]).unwrap();
        assert_eq!(report.kills, 1);
        assert_eq!(report.team_kills, 1);
        // +10 * 2.0 for the foe, -10 flat for the teammate
        assert_eq!(report.score_delta, 10);
        assert_eq!(s.red_score, 10);
        assert!(session_lines(&report)
            .iter()
            .any(|l| l.contains("a team killed mate")));
    }

    #[test]
    fn team_kill_assist_is_a_penalty() {
        let mut config = GameConfig::default();
        config.team_kills = true;
        let mut s = state(GameMode::Tdm, Difficulty::Normal, config);
        let helper = join(&mut s, "helper", Team::Red);
        let victim = join(&mut s, "victim", Team::Red);
        let finisher = join(&mut s, "finisher", Team::Blue);

        ScoringEngine::resolve(&mut s, helper, &[victim]).unwrap();
        ScoringEngine::resolve(&mut s, finisher, &[victim]).unwrap();

        assert_eq!(player(&s, &helper).score, -5);
        assert_eq!(player(&s, &finisher).score, 10);
        assert_eq!(s.red_score, -5);
        assert_eq!(s.blue_score, 10);
    }

    #[test]
    fn spectators_and_unknown_attackers() {
        let mut s = state(GameMode::Ffa, Difficulty::Hard, GameConfig::default());
        let a = join(&mut s, "a", Team::None);
        let spec = join(&mut s, "spec", Team::None);
        s.roster.find_mut(&spec).unwrap().spectator = true;

        let report = ScoringEngine::resolve(&mut s, a, &[spec, a]).unwrap();
        assert!(report.deaths.is_empty());
        assert_eq!(report.score_delta, 0);
        assert!(matches!(
            ScoringEngine::resolve(&mut s, Uuid::new_v4(), &[a]),
            Err(SessionError::UnknownParticipant(_))
        ));
    }
}
