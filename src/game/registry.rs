//! Registry of every session on the server
//!
//! One unfinished session per world. Finished sessions are dropped once
//! their worker has handed the world back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::world::{Participant, SessionId, WorldId, WorldServices};

use super::broadcast::tagged;
use super::config::GameConfig;
use super::error::SessionError;
use super::session::{GameSession, SessionSummary};
use super::types::{Difficulty, GameMode, SessionStatus};

pub struct GameRegistry {
    sessions: DashMap<SessionId, Arc<GameSession>>,
    workers: DashMap<SessionId, JoinHandle<()>>,
    /// Held across the per-world hosting check and the insert
    claims: Mutex<()>,
    next_id: AtomicU64,
    services: WorldServices,
    defaults: GameConfig,
}

impl GameRegistry {
    pub fn new(services: WorldServices, defaults: GameConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            workers: DashMap::new(),
            claims: Mutex::new(()),
            next_id: AtomicU64::new(1),
            services,
            defaults,
        }
    }

    pub fn defaults(&self) -> &GameConfig {
        &self.defaults
    }

    /// Create a session waiting for players on `world`
    pub fn create(
        &self,
        world: WorldId,
        mode: GameMode,
        difficulty: Difficulty,
        config: Option<GameConfig>,
    ) -> Result<Arc<GameSession>, SessionError> {
        if world.is_empty() {
            return Err(SessionError::NoWorld);
        }
        let config = config.unwrap_or_else(|| self.defaults.clone());
        config.validate()?;

        let _claim = self.claims.lock();
        if self.hosting(&world, None) {
            return Err(SessionError::WorldAlreadyHosting(world));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(GameSession::new(
            id,
            world.clone(),
            mode,
            difficulty,
            config,
            self.services.clone(),
        ));
        self.sessions.insert(id, session.clone());
        info!(session_id = id, world = %world, ?mode, ?difficulty, "Session created");
        Ok(session)
    }

    /// Whether some other unfinished session already runs on `world`
    fn hosting(&self, world: &WorldId, except: Option<SessionId>) -> bool {
        self.sessions.iter().any(|entry| {
            let session = entry.value();
            Some(session.id()) != except
                && session.world() == world
                && session.status() != SessionStatus::Finished
        })
    }

    /// Launch a session's worker and reap the session when it ends
    pub fn start(self: &Arc<Self>, id: SessionId) -> Result<(), SessionError> {
        let session = self.find_by_id(id).ok_or(SessionError::NotFound(id))?;
        let worker = {
            let _claim = self.claims.lock();
            if self.hosting(session.world(), Some(id)) {
                return Err(SessionError::WorldAlreadyHosting(session.world().clone()));
            }
            session.start()?
        };
        self.workers.retain(|_, handle| !handle.is_finished());

        let registry = Arc::clone(self);
        let reaper = tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!(session_id = id, error = %e, "Session worker panicked");
            }
            registry.sessions.remove(&id);
            info!(session_id = id, "Session reaped");
        });
        self.workers.insert(id, reaper);
        Ok(())
    }

    /// Request a stop; a session that never started is dropped right away
    pub fn stop(&self, id: SessionId) -> Result<(), SessionError> {
        let session = self.find_by_id(id).ok_or(SessionError::NotFound(id))?;
        session.stop();
        if !self.workers.contains_key(&id) && session.status() == SessionStatus::Finished {
            self.sessions.remove(&id);
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: SessionId) -> Option<Arc<GameSession>> {
        self.sessions.get(&id).map(|s| s.value().clone())
    }

    /// Session on `world`, preferring one that has not finished
    pub fn find_by_world(&self, world: &WorldId) -> Option<Arc<GameSession>> {
        let mut finished = None;
        for entry in self.sessions.iter() {
            let session = entry.value();
            if session.world() != world {
                continue;
            }
            if session.status() != SessionStatus::Finished {
                return Some(session.clone());
            }
            finished = Some(session.clone());
        }
        finished
    }

    /// Session a participant belongs to: the one on their world, else the
    /// one they last enrolled in
    pub fn session_for(&self, participant: &Participant) -> Option<Arc<GameSession>> {
        self.find_by_world(&participant.world())
            .filter(|s| s.contains(&participant.id()))
            .or_else(|| participant.session_id().and_then(|id| self.find_by_id(id)))
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<_> = self.sessions.iter().map(|s| s.value().summary()).collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.value().status().is_live())
            .count()
    }

    /// Hook for a participant arriving in a world
    pub fn on_world_joined(&self, participant: &Participant) {
        let was_in_match_world = participant.flags().in_match_world;
        if was_in_match_world {
            participant.set_can_build(true);
        }

        let live = self
            .find_by_world(&participant.world())
            .filter(|s| s.status().is_live());
        let Some(session) = live else {
            participant.update(|flags| flags.in_match_world = false);
            return;
        };

        participant.update(|flags| {
            flags.can_build = false;
            flags.in_match_world = true;
        });
        session.broadcaster().to_one(
            participant,
            &tagged("Disabled your building because you are in a TNT Wars map!"),
        );
        info!(session_id = session.id(), participant = %participant.id(), "Building revoked in match world");
    }

    /// Stop every session and wait for their workers to finish cleanup
    pub async fn shutdown(&self) {
        let ids: Vec<SessionId> = self.sessions.iter().map(|s| *s.key()).collect();
        for id in &ids {
            if let Some(session) = self.find_by_id(*id) {
                session.stop();
            }
        }

        let pending: Vec<SessionId> = self.workers.iter().map(|w| *w.key()).collect();
        let handles: Vec<_> = pending
            .into_iter()
            .filter_map(|id| self.workers.remove(&id).map(|(_, handle)| handle))
            .collect();
        info!(sessions = ids.len(), workers = handles.len(), "Stopping all sessions");

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Session reaper failed during shutdown");
            }
        }
    }
}
