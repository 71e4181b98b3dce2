//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::GameRegistry;
use crate::world::{MemoryWorld, WorldServices};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub world: Arc<MemoryWorld>,
    pub registry: Arc<GameRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // In-process world backend for every collaborator role
        let world = Arc::new(MemoryWorld::new());

        let registry = Arc::new(GameRegistry::new(
            WorldServices::from_backend(world.clone()),
            config.game_defaults.clone(),
        ));

        Self {
            config,
            world,
            registry,
        }
    }
}
