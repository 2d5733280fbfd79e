pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use crate::services::import_service::Importer;
use crate::services::store::DocumentStore;
use rocket::{Build, Rocket};
use std::sync::Arc;

/// Names of the search indices backing each resource.
#[derive(Debug, Clone)]
pub struct Indices {
    pub playlists: String,
    pub videos: String,
}

impl Default for Indices {
    fn default() -> Self {
        Self {
            playlists: "playlists".to_string(),
            videos: "videos".to_string(),
        }
    }
}

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub indices: Indices,
    pub importer: Arc<dyn Importer>,
}

/// Mounts every route group and the JSON catchers. CORS is attached by the caller.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .mount("/", api::docs_routes())
        .mount("/playlists", api::playlist_routes())
        .mount("/videos", api::video_routes())
        .mount("/search", api::search_routes())
        .mount("/import", api::import_routes())
        .register("/", api::catchers())
}
