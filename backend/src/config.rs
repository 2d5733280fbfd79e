use crate::services::elastic_store::ElasticStore;
use crate::services::elasticsearch_service::create_es_indices;
use crate::services::import_service::AcknowledgingImporter;
use crate::services::memory_store::InMemoryStore;
use crate::services::store::DocumentStore;
use crate::{AppState, Indices};
use anyhow::{anyhow, Result};
use elasticsearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    Elasticsearch,
};
use env_logger::Builder;
use lazy_static::lazy_static;
use log::{info, warn, LevelFilter};
use rocket::http::Method;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;
use std::sync::Arc;

lazy_static! {
    pub static ref ELASTICSEARCH_URL: String =
        env::var("ELASTICSEARCH_URL").unwrap_or_else(|_| "http://localhost:9200".to_string());
    pub static ref PLAYLIST_INDEX: String =
        env::var("PLAYLIST_INDEX").unwrap_or_else(|_| "playlists".to_string());
    pub static ref VIDEO_INDEX: String =
        env::var("VIDEO_INDEX").unwrap_or_else(|_| "videos".to_string());
    pub static ref STORE_BACKEND: String =
        env::var("STORE_BACKEND").unwrap_or_else(|_| "elasticsearch".to_string());
    pub static ref CORS_ALLOWED_ORIGIN: String =
        env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:8080".to_string());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Elasticsearch,
    Memory,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "elasticsearch" | "es" => Ok(Self::Elasticsearch),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(anyhow!(
                "unknown STORE_BACKEND '{other}', expected 'elasticsearch' or 'memory'"
            )),
        }
    }
}

pub const BACKEND_COMPONENT: &str = "playlist search backend";
pub const EXPORT_COMPONENT: &str = "YouTube channel export";

pub fn startup_message(component: &str) -> String {
    format!("Starting {component}...")
}

/// Installs the process logger and announces which binary is starting.
pub fn init_logger(component: &str) {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
    info!("{}", startup_message(component));
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub fn configured_indices() -> Indices {
    Indices {
        playlists: PLAYLIST_INDEX.clone(),
        videos: VIDEO_INDEX.clone(),
    }
}

pub fn create_elasticsearch_client() -> Result<Elasticsearch> {
    let es_url = &*ELASTICSEARCH_URL;
    info!("Connecting to Elasticsearch at: {es_url}");

    let transport =
        TransportBuilder::new(SingleNodeConnectionPool::new(es_url.parse()?)).build()?;

    Ok(Elasticsearch::new(transport))
}

pub fn create_store(backend: StoreBackend) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match backend {
        StoreBackend::Elasticsearch => Arc::new(ElasticStore::new(create_elasticsearch_client()?)),
        StoreBackend::Memory => {
            warn!("Using the in-memory store, documents are lost on shutdown.");
            Arc::new(InMemoryStore::new())
        }
    };
    Ok(store)
}

pub async fn create_app_state() -> Result<AppState> {
    let backend = StoreBackend::parse(&STORE_BACKEND)?;
    let store = create_store(backend)?;
    let indices = configured_indices();

    create_es_indices(store.as_ref(), &indices).await;

    Ok(AppState {
        store,
        indices,
        importer: Arc::new(AcknowledgingImporter),
    })
}

pub fn create_cors() -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&[CORS_ALLOWED_ORIGIN.as_str()]))
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Options,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&["Accept", "Content-Type"]))
        .allow_credentials(true)
        .to_cors()
        .map_err(|e| anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}
