//! Axis-aligned build-restriction zones

use serde::{Deserialize, Serialize};

use crate::world::BlockPos;

/// Which restriction a zone applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    /// Ordnance may not be placed inside
    NoOrdnance,
    /// Blocks inside are not destroyed by explosions
    BlockDamageImmune,
}

/// Inclusive integer box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl Zone {
    /// Build a zone from two opposite corners in any order
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.y >= self.min.y
            && pos.z >= self.min.z
            && pos.x <= self.max.x
            && pos.y <= self.max.y
            && pos.z <= self.max.z
    }
}

/// A set of zones; a point is covered if any zone contains it
#[derive(Debug, Clone, Default, Serialize)]
pub struct ZoneIndex {
    zones: Vec<Zone>,
}

impl ZoneIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, zone: Zone) {
        self.zones.push(zone);
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.zones.iter().any(|zone| zone.contains(pos))
    }

    pub fn count(&self) -> usize {
        self.zones.len()
    }
}
