use crate::error::ApiError;
use crate::models::{AdvancedSearchRequest, AdvancedSearchResponse, SearchParams};
use crate::services::store::DocumentStore;
use crate::services::{playlist_service, video_service};
use crate::Indices;
use log::debug;
use serde_json::{json, Value};

/// Fields matched by a keyword search when the caller names none.
pub const DEFAULT_PLAYLIST_FIELDS: [&str; 3] = ["title", "description", "comments"];
pub const DEFAULT_VIDEO_FIELDS: [&str; 3] = ["title", "description", "comments"];

/// Name of the nested field holding embedded videos.
pub const NESTED_VIDEOS_PATH: &str = "videos";

/// Blank keywords mean "list everything".
pub fn normalize_keyword(q: Option<&str>) -> Option<&str> {
    q.map(str::trim).filter(|q| !q.is_empty())
}

/// Caller supplied fields are used verbatim; there is no allow-list.
pub fn resolve_fields(requested: &[String], defaults: &[&str]) -> Vec<String> {
    if requested.is_empty() {
        defaults.iter().map(|f| f.to_string()).collect()
    } else {
        requested.to_vec()
    }
}

fn build_main_query(keyword: Option<&str>, fields: &[String]) -> Value {
    match normalize_keyword(keyword) {
        None => json!({ "match_all": {} }),
        Some(keyword) => json!({
            "multi_match": {
                "query": keyword,
                "fields": fields,
                "type": "best_fields"
            }
        }),
    }
}

/// Listing when there is no keyword, best-fields relevance search otherwise.
pub fn build_search_body(keyword: Option<&str>, fields: &[String], start: usize, size: usize) -> Value {
    json!({
        "from": start,
        "size": size,
        "query": build_main_query(keyword, fields)
    })
}

pub fn build_raw_body(query: Value, start: usize, size: usize) -> Value {
    json!({
        "from": start,
        "size": size,
        "query": query
    })
}

/// Videos of one playlist matching `keyword`. Both the playlist id and the
/// nested match are required; the matching videos come back as inner hits
/// paginated by `start`/`size`.
pub fn build_nested_video_body(
    playlist_id: &str,
    keyword: &str,
    fields: &[String],
    start: usize,
    size: usize,
) -> Value {
    let nested_query = if fields.is_empty() {
        json!({ "match": { format!("{NESTED_VIDEOS_PATH}.title"): keyword } })
    } else {
        let scoped: Vec<String> = fields
            .iter()
            .map(|f| format!("{NESTED_VIDEOS_PATH}.{f}"))
            .collect();
        json!({
            "multi_match": {
                "query": keyword,
                "fields": scoped,
                "type": "best_fields"
            }
        })
    };

    json!({
        "from": 0,
        "size": 1,
        "query": {
            "bool": {
                "must": [
                    { "term": { "_id": playlist_id } },
                    {
                        "nested": {
                            "path": NESTED_VIDEOS_PATH,
                            "query": nested_query,
                            "inner_hits": {
                                "from": start,
                                "size": size
                            }
                        }
                    }
                ]
            }
        }
    })
}

pub fn build_listing_body(params: &SearchParams, defaults: &[&str]) -> Value {
    let fields = resolve_fields(&params.fields, defaults);
    build_search_body(params.q.as_deref(), &fields, params.start, params.size)
}

/// `/search`: a raw `query` object wins over `q`/`fields`. Remaining DSL keys
/// are copied onto the body; `from`/`size`/`query` are always ours.
pub fn build_advanced_body(request: &AdvancedSearchRequest, videos: bool) -> Value {
    let offset = request.offset();
    let mut body = match &request.query {
        Some(query) => build_raw_body(query.clone(), offset, request.size),
        None => {
            let defaults: &[&str] = if videos {
                &DEFAULT_VIDEO_FIELDS
            } else {
                &DEFAULT_PLAYLIST_FIELDS
            };
            let fields = resolve_fields(&request.fields, defaults);
            build_search_body(request.q.as_deref(), &fields, offset, request.size)
        }
    };

    if let Value::Object(body) = &mut body {
        for (key, value) in &request.extra {
            body.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    body
}

pub async fn advanced_search(
    store: &dyn DocumentStore,
    indices: &Indices,
    videos: bool,
    request: &AdvancedSearchRequest,
) -> Result<AdvancedSearchResponse, ApiError> {
    let body = build_advanced_body(request, videos);
    let index = if videos { &indices.videos } else { &indices.playlists };
    debug!("Advanced search on {index}");

    let hits = store.search(index, body).await?;
    if videos {
        Ok(AdvancedSearchResponse::Videos(video_service::video_hits(hits)?))
    } else {
        Ok(AdvancedSearchResponse::Playlists(playlist_service::playlist_hits(hits)?))
    }
}
