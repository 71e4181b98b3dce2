//! Closed enumerations for session state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Session lifecycle phase. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    WaitingForPlayers,
    AboutToStart,
    GracePeriod,
    InProgress,
    Finished,
}

impl SessionStatus {
    /// Whether `next` is a legal forward step from this phase
    pub fn can_advance_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (WaitingForPlayers, AboutToStart | Finished) => true,
            (AboutToStart, GracePeriod | InProgress | Finished) => true,
            (GracePeriod, InProgress | Finished) => true,
            (InProgress, Finished) => true,
            _ => false,
        }
    }

    /// Match activity (building restrictions, join hooks) applies in these phases
    pub fn is_live(self) -> bool {
        !matches!(self, Self::WaitingForPlayers | Self::Finished)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::WaitingForPlayers => "waiting for players",
            Self::AboutToStart => "about to start",
            Self::GracePeriod => "grace period",
            Self::InProgress => "in progress",
            Self::Finished => "finished",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Free for all
    Ffa,
    /// Team deathmatch
    #[default]
    Tdm,
}

impl GameMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ffa => "Free For All",
            Self::Tdm => "Team Deathmatch",
        }
    }
}

/// Fixed at creation; drives hit damage, health and explosion presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// 2 hits to die, long fuse
    Easy,
    /// 2 hits to die, medium fuse
    #[default]
    Normal,
    /// 1 hit to die, medium fuse
    Hard,
    /// 1 hit to die, short fuse and big explosion
    Extreme,
}

impl Difficulty {
    fn is_brutal(self) -> bool {
        matches!(self, Self::Hard | Self::Extreme)
    }

    pub fn max_health(self) -> i32 {
        if self.is_brutal() {
            1
        } else {
            2
        }
    }

    pub fn hit_damage(self) -> i32 {
        if self.is_brutal() {
            2
        } else {
            1
        }
    }

    /// Extra health granted by the top streak tier
    pub fn streak_bonus_health(self) -> i32 {
        self.hit_damage()
    }

    pub fn hits_to_die(self) -> i32 {
        if self.is_brutal() {
            1
        } else {
            2
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Normal => "Normal",
            Self::Hard => "Hard",
            Self::Extreme => "Extreme",
        }
    }

    pub fn explosion_delay(self) -> &'static str {
        match self {
            Self::Easy => "long",
            Self::Normal | Self::Hard => "medium",
            Self::Extreme => "short",
        }
    }

    pub fn explosion_size(self) -> &'static str {
        match self {
            Self::Extreme => "big",
            _ => "normal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    #[default]
    None,
    Red,
    Blue,
}

impl Team {
    pub fn color(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Red => Some("red"),
            Self::Blue => Some("blue"),
        }
    }
}
