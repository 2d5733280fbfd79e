use crate::api::json_body;
use crate::error::ApiError;
use crate::models::{AdvancedSearchRequest, AdvancedSearchResponse};
use crate::services::search_service;
use crate::AppState;
use rocket::serde::json::{self, Json};
use rocket::{post, State};

/// `videos=true` searches the video index, anything else the playlist index.
#[post("/?<videos>", data = "<body>")]
pub async fn advanced_search(
    videos: Option<bool>,
    body: Result<Json<AdvancedSearchRequest>, json::Error<'_>>,
    state: &State<AppState>,
) -> Result<Json<AdvancedSearchResponse>, ApiError> {
    let request = json_body(body)?;
    let response = search_service::advanced_search(
        &*state.store,
        &state.indices,
        videos.unwrap_or(false),
        &request,
    )
    .await?;
    Ok(Json(response))
}
