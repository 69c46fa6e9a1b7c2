// API module - router registry, shared state, HTTP/ws routing

pub mod websocket;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::monitor::{RouterState, UpdateEvent};

/// Registry of currently connected routers, shared between session
/// tasks (add/remove) and websocket handlers (snapshot). Owned by the
/// composition root and passed down explicitly.
#[derive(Debug, Clone, Default)]
pub struct RouterRegistry {
    routers: Arc<RwLock<HashMap<String, Arc<RouterState>>>>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        RouterRegistry::default()
    }

    pub async fn add(&self, state: Arc<RouterState>) {
        let mut routers = self.routers.write().await;
        routers.insert(state.id().to_string(), state);
    }

    pub async fn remove(&self, id: &str) {
        let mut routers = self.routers.write().await;
        routers.remove(id);
    }

    pub async fn get(&self, id: &str) -> Option<Arc<RouterState>> {
        let routers = self.routers.read().await;
        routers.get(id).cloned()
    }

    /// Replay every known entry of every connected router as an `add`
    /// event. The registry lock is held across the whole snapshot so a
    /// new viewer's baseline cannot miss a router connecting mid-replay.
    pub async fn snapshot(&self) -> Vec<UpdateEvent> {
        let routers = self.routers.read().await;
        let mut events = Vec::new();
        for state in routers.values() {
            state.iter(|update| events.push(update.to_event())).await;
        }
        events
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: RouterRegistry,
    updates: broadcast::Sender<UpdateEvent>,
}

impl AppState {
    pub fn new(registry: RouterRegistry) -> Self {
        let (updates, _) = broadcast::channel(256);
        AppState { registry, updates }
    }

    /// Fan one accepted update out to every connected viewer. Returns
    /// quietly when no viewer is connected.
    pub fn publish(&self, event: UpdateEvent) {
        let _ = self.updates.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.updates.subscribe()
    }
}

pub fn create_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/ws", get(websocket::websocket_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
