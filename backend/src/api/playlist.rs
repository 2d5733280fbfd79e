use crate::api::json_body;
use crate::error::ApiError;
use crate::models::{MutationResponse, Playlist, PlaylistResponse, SearchParams, Video, VideoResponse};
use crate::services::playlist_service;
use crate::AppState;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::{delete, get, post, put, State};

fn created(location: String, response: MutationResponse) -> status::Created<Json<MutationResponse>> {
    status::Created::new(location).body(Json(response))
}

#[get("/?<params..>")]
pub async fn list_playlists(
    params: SearchParams,
    state: &State<AppState>,
) -> Result<Json<Vec<PlaylistResponse>>, ApiError> {
    let playlists =
        playlist_service::search_playlists(&*state.store, &state.indices.playlists, &params).await?;
    Ok(Json(playlists))
}

#[post("/", data = "<body>")]
pub async fn create_playlist(
    body: Result<Json<Playlist>, json::Error<'_>>,
    state: &State<AppState>,
) -> Result<status::Created<Json<MutationResponse>>, ApiError> {
    let playlist = json_body(body)?;
    let response =
        playlist_service::create_playlist(&*state.store, &state.indices.playlists, playlist).await?;
    Ok(created(format!("/playlists/{}", response.id), response))
}

#[get("/<id>")]
pub async fn get_playlist(id: &str, state: &State<AppState>) -> Result<Json<PlaylistResponse>, ApiError> {
    let playlist = playlist_service::get_playlist(&*state.store, &state.indices.playlists, id).await?;
    Ok(Json(playlist))
}

#[put("/<id>", data = "<body>")]
pub async fn update_playlist(
    id: &str,
    body: Result<Json<Playlist>, json::Error<'_>>,
    state: &State<AppState>,
) -> Result<Json<MutationResponse>, ApiError> {
    let playlist = json_body(body)?;
    let response =
        playlist_service::update_playlist(&*state.store, &state.indices.playlists, id, playlist).await?;
    Ok(Json(response))
}

#[delete("/<id>")]
pub async fn delete_playlist(id: &str, state: &State<AppState>) -> Result<Json<MutationResponse>, ApiError> {
    let response = playlist_service::delete_playlist(&*state.store, &state.indices.playlists, id).await?;
    Ok(Json(response))
}

#[get("/<id>/videos?<params..>")]
pub async fn list_playlist_videos(
    id: &str,
    params: SearchParams,
    state: &State<AppState>,
) -> Result<Json<Vec<VideoResponse>>, ApiError> {
    let videos =
        playlist_service::list_playlist_videos(&*state.store, &state.indices.playlists, id, &params)
            .await?;
    Ok(Json(videos))
}

#[post("/<id>/videos", data = "<body>")]
pub async fn add_playlist_video(
    id: &str,
    body: Result<Json<Video>, json::Error<'_>>,
    state: &State<AppState>,
) -> Result<status::Created<Json<MutationResponse>>, ApiError> {
    let video = json_body(body)?;
    let response =
        playlist_service::add_playlist_video(&*state.store, &state.indices.playlists, id, video).await?;
    Ok(created(format!("/playlists/{id}/videos/{}", response.id), response))
}

#[get("/<id>/videos/<video_id>")]
pub async fn get_playlist_video(
    id: &str,
    video_id: &str,
    state: &State<AppState>,
) -> Result<Json<VideoResponse>, ApiError> {
    let video =
        playlist_service::get_playlist_video(&*state.store, &state.indices.playlists, id, video_id)
            .await?;
    Ok(Json(video))
}

#[put("/<id>/videos/<video_id>", data = "<body>")]
pub async fn update_playlist_video(
    id: &str,
    video_id: &str,
    body: Result<Json<Video>, json::Error<'_>>,
    state: &State<AppState>,
) -> Result<Json<MutationResponse>, ApiError> {
    let video = json_body(body)?;
    let response = playlist_service::update_playlist_video(
        &*state.store,
        &state.indices.playlists,
        id,
        video_id,
        video,
    )
    .await?;
    Ok(Json(response))
}

#[delete("/<id>/videos/<video_id>")]
pub async fn delete_playlist_video(
    id: &str,
    video_id: &str,
    state: &State<AppState>,
) -> Result<Json<MutationResponse>, ApiError> {
    let response =
        playlist_service::delete_playlist_video(&*state.store, &state.indices.playlists, id, video_id)
            .await?;
    Ok(Json(response))
}
