//! In-memory world backend
//!
//! Keeps participants, deliveries and backups in process. Used by the admin
//! server and as the collaborator double in tests. Delivered lines and
//! restores are kept as bounded ring buffers; a backup is dropped once it has
//! been restored.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    BlockPos, Messenger, NotificationError, Participant, ParticipantId, SnapshotHandle,
    WorldControl, WorldError, WorldId, WorldSnapshots,
};

/// Most recent entries kept per inbox, for the global log and for restores
pub const RECORD_CAPACITY: usize = 256;

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T) {
    if buffer.len() == RECORD_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

#[derive(Default)]
pub struct MemoryWorld {
    participants: DashMap<ParticipantId, Arc<Participant>>,
    inboxes: DashMap<ParticipantId, VecDeque<String>>,
    global_log: Mutex<VecDeque<String>>,
    unreachable: Mutex<HashSet<ParticipantId>>,
    backups: DashMap<u32, WorldId>,
    restored: Mutex<VecDeque<(SnapshotHandle, WorldId)>>,
    spawns: DashMap<ParticipantId, u32>,
    next_backup: AtomicU32,
    fail_backups: AtomicBool,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant standing in `world`
    pub fn connect(&self, name: &str, world: WorldId) -> Arc<Participant> {
        let participant = Arc::new(Participant::new(Uuid::new_v4(), name, world));
        self.participants
            .insert(participant.id(), participant.clone());
        info!(participant = %participant.id(), name, "Participant connected");
        participant
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<Arc<Participant>> {
        self.participants.get(id).map(|p| p.value().clone())
    }

    /// Make every future delivery to `id` fail
    pub fn drop_recipient(&self, id: ParticipantId) {
        self.unreachable.lock().insert(id);
    }

    pub fn fail_backups(&self, fail: bool) {
        self.fail_backups.store(fail, Ordering::SeqCst);
    }

    pub fn inbox(&self, id: &ParticipantId) -> Vec<String> {
        self.inboxes
            .get(id)
            .map(|lines| lines.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn global_log(&self) -> Vec<String> {
        self.global_log.lock().iter().cloned().collect()
    }

    pub fn restored(&self) -> Vec<(SnapshotHandle, WorldId)> {
        self.restored.lock().iter().cloned().collect()
    }

    /// Backups taken and not yet restored
    pub fn pending_backups(&self) -> usize {
        self.backups.len()
    }

    pub fn spawn_count(&self, id: &ParticipantId) -> u32 {
        self.spawns.get(id).map(|c| *c.value()).unwrap_or(0)
    }
}

#[async_trait]
impl WorldSnapshots for MemoryWorld {
    async fn backup(&self, world: &WorldId) -> Result<SnapshotHandle, WorldError> {
        if self.fail_backups.load(Ordering::SeqCst) {
            return Err(WorldError::BackupFailed(world.clone()));
        }
        let number = self.next_backup.fetch_add(1, Ordering::SeqCst) + 1;
        self.backups.insert(number, world.clone());
        Ok(SnapshotHandle(number))
    }

    async fn restore(&self, handle: SnapshotHandle, world: &WorldId) -> Result<(), WorldError> {
        match self.backups.remove_if(&handle.0, |_, saved| saved == world) {
            Some(_) => {
                push_bounded(&mut self.restored.lock(), (handle, world.clone()));
                Ok(())
            }
            None => Err(WorldError::RestoreFailed {
                world: world.clone(),
                handle: handle.0,
            }),
        }
    }
}

impl WorldControl for MemoryWorld {
    fn enable_match_physics(&self, world: &WorldId) -> Result<(), WorldError> {
        debug!(world = %world, "Match physics enabled");
        Ok(())
    }

    fn relocate(&self, participant: &Participant, world: &WorldId) -> Result<(), WorldError> {
        if self.unreachable.lock().contains(&participant.id()) {
            return Err(WorldError::RelocationFailed {
                participant: participant.id(),
                world: world.clone(),
            });
        }
        participant.set_world(world.clone());
        Ok(())
    }

    fn reload_visuals(&self, world: &WorldId) {
        debug!(world = %world, "Visuals reloaded");
    }

    fn return_to_spawn(
        &self,
        participant: &Participant,
        _spawn: Option<BlockPos>,
    ) -> Result<(), WorldError> {
        if self.unreachable.lock().contains(&participant.id()) {
            return Err(WorldError::Disconnected(participant.id()));
        }
        *self.spawns.entry(participant.id()).or_insert(0) += 1;
        Ok(())
    }
}

impl Messenger for MemoryWorld {
    fn send(&self, to: &Participant, line: &str) -> Result<(), NotificationError> {
        if self.unreachable.lock().contains(&to.id()) {
            return Err(NotificationError::Disconnected(to.id()));
        }
        debug!(participant = %to.id(), line, "Message delivered");
        push_bounded(&mut self.inboxes.entry(to.id()).or_default(), line.to_string());
        Ok(())
    }

    fn broadcast_global(&self, line: &str) -> Result<(), NotificationError> {
        info!(line, "Global announcement");
        push_bounded(&mut self.global_log.lock(), line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn backup_then_restore_same_world() {
        let world = MemoryWorld::new();
        let map = WorldId::new("arena");
        let handle = assert_ok!(world.backup(&map).await);
        assert_ok!(world.restore(handle, &map).await);
        assert_eq!(world.restored(), vec![(handle, map.clone())]);
        assert_eq!(world.pending_backups(), 0);

        assert_err!(world.restore(handle, &map).await);
        assert_eq!(world.restored().len(), 1);
    }

    #[test]
    fn recorded_deliveries_keep_only_the_newest_lines() {
        let world = MemoryWorld::new();
        let p = world.connect("alice", WorldId::new("lobby"));
        for n in 0..RECORD_CAPACITY + 10 {
            assert_ok!(world.send(&p, &format!("line {n}")));
            assert_ok!(world.broadcast_global(&format!("global {n}")));
        }

        let inbox = world.inbox(&p.id());
        assert_eq!(inbox.len(), RECORD_CAPACITY);
        assert_eq!(inbox.first().map(String::as_str), Some("line 10"));
        assert_eq!(
            inbox.last().cloned(),
            Some(format!("line {}", RECORD_CAPACITY + 9))
        );

        let global = world.global_log();
        assert_eq!(global.len(), RECORD_CAPACITY);
        assert_eq!(global.first().map(String::as_str), Some("global 10"));
    }

    #[tokio::test]
    async fn failing_backups_and_foreign_restores_error() {
        let world = MemoryWorld::new();
        let map = WorldId::new("arena");
        let handle = assert_ok!(world.backup(&map).await);
        assert_err!(world.restore(handle, &WorldId::new("other")).await);
        assert_eq!(world.pending_backups(), 1);

        world.fail_backups(true);
        assert_err!(world.backup(&map).await);
    }

    #[test]
    fn dropped_recipient_fails_delivery() {
        let world = MemoryWorld::new();
        let p = world.connect("alice", WorldId::new("lobby"));
        assert_ok!(world.send(&p, "hi"));
        world.drop_recipient(p.id());
        assert_err!(world.send(&p, "again"));
        assert_eq!(world.inbox(&p.id()), vec!["hi".to_string()]);
    }
}
