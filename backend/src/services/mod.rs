pub mod elastic_store;
pub mod elasticsearch_service;
pub mod import_service;
pub mod memory_store;
pub mod playlist_service;
pub mod search_service;
pub mod store;
pub mod video_service;
#[cfg(feature = "youtube_data_api")]
pub mod youtube;
