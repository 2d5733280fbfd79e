use crate::api::json_body;
use crate::error::ApiError;
use crate::models::{MutationResponse, SearchParams, Video, VideoResponse};
use crate::services::video_service;
use crate::AppState;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::{delete, get, post, put, State};

#[get("/?<params..>")]
pub async fn list_videos(
    params: SearchParams,
    state: &State<AppState>,
) -> Result<Json<Vec<VideoResponse>>, ApiError> {
    let videos = video_service::search_videos(&*state.store, &state.indices.videos, &params).await?;
    Ok(Json(videos))
}

#[post("/", data = "<body>")]
pub async fn create_video(
    body: Result<Json<Video>, json::Error<'_>>,
    state: &State<AppState>,
) -> Result<status::Created<Json<MutationResponse>>, ApiError> {
    let video = json_body(body)?;
    let response = video_service::create_video(&*state.store, &state.indices.videos, &video).await?;
    let location = format!("/videos/{}", response.id);
    Ok(status::Created::new(location).body(Json(response)))
}

#[get("/<id>")]
pub async fn get_video(id: &str, state: &State<AppState>) -> Result<Json<VideoResponse>, ApiError> {
    let video = video_service::get_video(&*state.store, &state.indices.videos, id).await?;
    Ok(Json(video))
}

#[put("/<id>", data = "<body>")]
pub async fn update_video(
    id: &str,
    body: Result<Json<Video>, json::Error<'_>>,
    state: &State<AppState>,
) -> Result<Json<MutationResponse>, ApiError> {
    let video = json_body(body)?;
    let response = video_service::update_video(&*state.store, &state.indices.videos, id, &video).await?;
    Ok(Json(response))
}

#[delete("/<id>")]
pub async fn delete_video(id: &str, state: &State<AppState>) -> Result<Json<MutationResponse>, ApiError> {
    let response = video_service::delete_video(&*state.store, &state.indices.videos, id).await?;
    Ok(Json(response))
}
