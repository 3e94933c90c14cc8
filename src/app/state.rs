//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::map::MapCatalog;
use crate::game::RoomRegistry;
use crate::session::SessionManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RoomRegistry>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        // Map catalog: built-ins, optionally overridden from disk.
        let catalog = match &config.maps_path {
            Some(path) => MapCatalog::from_file(path)?,
            None => MapCatalog::builtin(),
        };

        let registry = Arc::new(RoomRegistry::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&registry),
            catalog,
            &config,
        ));

        Ok(Self {
            config,
            registry,
            sessions,
        })
    }
}
