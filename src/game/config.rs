//! Per-session match rules

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A kill streak threshold and the score multiplier it grants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreakTier {
    pub kills: u32,
    pub multiplier: f32,
}

/// Scoring and timing rules for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Score at which a team (TDM) or player (FFA) wins
    pub score_required: i32,
    pub score_per_kill: i32,
    /// Added per kill when one event kills more than one player
    pub multi_kill_bonus: i32,
    pub assist_score: i32,
    pub initial_grace_period: bool,
    pub grace_period_secs: u32,
    pub team_kills: bool,
    pub streaks: bool,
    /// Three ascending thresholds; the last one also grants bonus health
    pub streak_tiers: [StreakTier; 3],
    pub max_active_ordnance: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            score_required: 150,
            score_per_kill: 10,
            multi_kill_bonus: 5,
            assist_score: 5,
            initial_grace_period: true,
            grace_period_secs: 30,
            team_kills: false,
            streaks: true,
            streak_tiers: [
                StreakTier {
                    kills: 3,
                    multiplier: 1.25,
                },
                StreakTier {
                    kills: 5,
                    multiplier: 1.5,
                },
                StreakTier {
                    kills: 7,
                    multiplier: 2.0,
                },
            ],
            max_active_ordnance: 1,
        }
    }
}

/// Upper bound for any single point award
pub const MAX_POINTS: i32 = 10_000;
/// Upper bound for the winning score
pub const MAX_SCORE_REQUIRED: i32 = 1_000_000;
/// Upper bound for a streak multiplier
pub const MAX_MULTIPLIER: f32 = 100.0;

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.score_required <= 0 || self.score_required > MAX_SCORE_REQUIRED {
            return Err(ConfigError::Invalid(
                "score_required must be between 1 and 1000000",
            ));
        }
        let awards = [self.score_per_kill, self.multi_kill_bonus, self.assist_score];
        if awards.iter().any(|p| !(0..=MAX_POINTS).contains(p)) {
            return Err(ConfigError::Invalid(
                "point awards must be between 0 and 10000",
            ));
        }
        let [one, two, three] = self.streak_tiers;
        if !(one.kills > 0 && one.kills < two.kills && two.kills < three.kills) {
            return Err(ConfigError::Invalid("streak tiers must be strictly ascending"));
        }
        if self
            .streak_tiers
            .iter()
            .any(|t| !(t.multiplier > 0.0 && t.multiplier <= MAX_MULTIPLIER))
        {
            return Err(ConfigError::Invalid(
                "streak multipliers must be positive and at most 100",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unordered_tiers() {
        let mut config = GameConfig::default();
        config.streak_tiers[1].kills = 2;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_point_awards_that_could_overflow() {
        for config in [
            GameConfig {
                score_per_kill: i32::MAX,
                ..GameConfig::default()
            },
            GameConfig {
                multi_kill_bonus: MAX_POINTS + 1,
                ..GameConfig::default()
            },
            GameConfig {
                assist_score: -1,
                ..GameConfig::default()
            },
            GameConfig {
                score_required: MAX_SCORE_REQUIRED + 1,
                ..GameConfig::default()
            },
        ] {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }

        let mut config = GameConfig::default();
        config.streak_tiers[2].multiplier = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: GameConfig =
            serde_json::from_str(r#"{"score_required": 40, "team_kills": true}"#).unwrap();
        assert_eq!(config.score_required, 40);
        assert!(config.team_kills);
        assert_eq!(config.score_per_kill, 10);
    }
}
