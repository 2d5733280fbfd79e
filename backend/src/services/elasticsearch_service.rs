use crate::services::store::DocumentStore;
use crate::Indices;
use log::{error, info};
use serde_json::{json, Value};

fn video_properties() -> Value {
    json!({
        "id": { "type": "keyword" },
        "url": { "type": "text" },
        "title": { "type": "text" },
        "description": { "type": "text" },
        "comments": { "type": "text" },
        "likes": { "type": "long" },
        "views": { "type": "long" },
        "date_added": { "type": "date" },
        "date_published": { "type": "date" },
        "date_updated": { "type": "date" },
        "original_playlist_url": { "type": "text" },
        "original_owner_url": { "type": "text" }
    })
}

pub fn video_mapping() -> Value {
    json!({
        "mappings": {
            "properties": video_properties()
        }
    })
}

pub fn playlist_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "title": { "type": "text" },
                "description": { "type": "text" },
                "comments": { "type": "text" },
                "likes": { "type": "long" },
                "views": { "type": "long" },
                "date_added": { "type": "date" },
                "date_updated": { "type": "date" },
                "original_playlist_published": { "type": "date" },
                "original_playlist_url": { "type": "text" },
                "original_owner_url": { "type": "text" },
                "video_ids": { "type": "keyword" },
                "videos": {
                    "type": "nested",
                    "properties": video_properties()
                }
            }
        }
    })
}

/// Creates the playlist and video indices when missing. Failures are logged,
/// the service still starts and reports engine errors per request.
pub async fn create_es_indices(store: &dyn DocumentStore, indices: &Indices) {
    let wanted = [
        (indices.playlists.as_str(), playlist_mapping()),
        (indices.videos.as_str(), video_mapping()),
    ];

    for (index, mapping) in wanted {
        match store.ensure_index(index, mapping).await {
            Ok(true) => info!("Search index '{index}' created."),
            Ok(false) => info!("Search index '{index}' already exists."),
            Err(e) => error!("Failed to create search index '{index}': {e}"),
        }
    }
}
