//! World collaborators consumed by the session core
//!
//! Moving participants between worlds, taking world backups and delivering
//! chat lines all live outside the session manager. The session only talks
//! to them through the narrow traits below.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::MemoryWorld;

/// Stable identity of a connected participant
pub type ParticipantId = Uuid;

/// Numeric session id (1-based, allocated by the registry)
pub type SessionId = u64;

/// Identity of a world/map
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(pub String);

impl WorldId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Integer block coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Opaque reference to a pre-match world backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotHandle(pub u32);

/// Name color and title shown above a participant
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cosmetics {
    pub color: String,
    pub title: String,
}

/// Flags on the participant record that the world and the session both touch
#[derive(Debug, Clone)]
pub struct ParticipantFlags {
    pub world: WorldId,
    /// Currently playing a TNT match
    pub in_match: bool,
    /// Last session this participant was enrolled in
    pub session_id: Option<SessionId>,
    pub can_build: bool,
    /// Set once the participant has entered a match world
    pub in_match_world: bool,
    pub cosmetics: Cosmetics,
}

/// A connected participant, shared between the world and any session
#[derive(Debug)]
pub struct Participant {
    id: ParticipantId,
    name: String,
    flags: RwLock<ParticipantFlags>,
}

impl Participant {
    pub fn new(id: ParticipantId, name: impl Into<String>, world: WorldId) -> Self {
        Self {
            id,
            name: name.into(),
            flags: RwLock::new(ParticipantFlags {
                world,
                in_match: false,
                session_id: None,
                can_build: true,
                in_match_world: false,
                cosmetics: Cosmetics::default(),
            }),
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> WorldId {
        self.flags.read().world.clone()
    }

    pub fn set_world(&self, world: WorldId) {
        self.flags.write().world = world;
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.flags.read().session_id
    }

    pub fn can_build(&self) -> bool {
        self.flags.read().can_build
    }

    pub fn set_can_build(&self, allowed: bool) {
        self.flags.write().can_build = allowed;
    }

    pub fn in_match(&self) -> bool {
        self.flags.read().in_match
    }

    pub fn cosmetics(&self) -> Cosmetics {
        self.flags.read().cosmetics.clone()
    }

    pub fn set_color(&self, color: &str) {
        self.flags.write().cosmetics.color = color.to_string();
    }

    /// Run a closure against the flag block under a single write lock
    pub fn update<R>(&self, f: impl FnOnce(&mut ParticipantFlags) -> R) -> R {
        f(&mut self.flags.write())
    }

    pub fn flags(&self) -> ParticipantFlags {
        self.flags.read().clone()
    }
}

/// Collaborator failures
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Backup of world {0} failed")]
    BackupFailed(WorldId),

    #[error("Restore of world {world} from snapshot {handle} failed")]
    RestoreFailed { world: WorldId, handle: u32 },

    #[error("Could not move {participant} to {world}")]
    RelocationFailed {
        participant: ParticipantId,
        world: WorldId,
    },

    #[error("Participant {0} is not connected")]
    Disconnected(ParticipantId),

    #[error("World {0} is not loaded")]
    UnknownWorld(WorldId),
}

/// A single recipient could not be reached
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Recipient {0} is disconnected")]
    Disconnected(ParticipantId),

    #[error("Global channel unavailable: {0}")]
    ChannelClosed(String),
}

/// World backup/restore service
#[async_trait]
pub trait WorldSnapshots: Send + Sync {
    async fn backup(&self, world: &WorldId) -> Result<SnapshotHandle, WorldError>;

    async fn restore(&self, handle: SnapshotHandle, world: &WorldId) -> Result<(), WorldError>;
}

/// World mutation and participant relocation
pub trait WorldControl: Send + Sync {
    /// Switch the world into the block-damage physics mode used by matches
    fn enable_match_physics(&self, world: &WorldId) -> Result<(), WorldError>;

    fn relocate(&self, participant: &Participant, world: &WorldId) -> Result<(), WorldError>;

    /// Ask every client in the world to re-render entities (name-tag colors)
    fn reload_visuals(&self, world: &WorldId);

    fn return_to_spawn(
        &self,
        participant: &Participant,
        spawn: Option<BlockPos>,
    ) -> Result<(), WorldError>;
}

/// Line-based text delivery
pub trait Messenger: Send + Sync {
    fn send(&self, to: &Participant, line: &str) -> Result<(), NotificationError>;

    fn broadcast_global(&self, line: &str) -> Result<(), NotificationError>;
}

/// Bundle of collaborator handles injected into every session
#[derive(Clone)]
pub struct WorldServices {
    pub snapshots: Arc<dyn WorldSnapshots>,
    pub control: Arc<dyn WorldControl>,
    pub messenger: Arc<dyn Messenger>,
}

impl WorldServices {
    /// Use one backend for every collaborator role
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: WorldSnapshots + WorldControl + Messenger + 'static,
    {
        Self {
            snapshots: backend.clone(),
            control: backend.clone(),
            messenger: backend,
        }
    }
}
