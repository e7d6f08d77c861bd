// src/state.rs

use crate::config::Config;
use crate::engine::emitter::InMemorySink;
use crate::engine::registry::SessionRegistry;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub history: InMemorySink,
    pub config: Config,
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}

impl FromRef<AppState> for InMemorySink {
    fn from_ref(state: &AppState) -> Self {
        state.history.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
