mod docs;
mod import;
mod playlist;
mod search;
mod video;

pub use docs::*;
pub use import::*;
pub use playlist::*;
pub use search::*;
pub use video::*;

use crate::error::ApiError;
use rocket::serde::json::{self, Json};
use rocket::{catchers, routes, Catcher, Route};

/// Unwraps a JSON request body, reporting unreadable or ill-typed bodies as 422.
pub(crate) fn json_body<T>(body: Result<Json<T>, json::Error<'_>>) -> Result<T, ApiError> {
    match body {
        Ok(body) => Ok(body.into_inner()),
        Err(json::Error::Io(e)) => Err(ApiError::Validation(format!("unreadable request body: {e}"))),
        Err(json::Error::Parse(_, e)) => Err(ApiError::Validation(format!("invalid request body: {e}"))),
    }
}

pub fn playlist_routes() -> Vec<Route> {
    routes![
        list_playlists,
        create_playlist,
        get_playlist,
        update_playlist,
        delete_playlist,
        list_playlist_videos,
        add_playlist_video,
        get_playlist_video,
        update_playlist_video,
        delete_playlist_video,
    ]
}

pub fn video_routes() -> Vec<Route> {
    routes![list_videos, create_video, get_video, update_video, delete_video]
}

pub fn search_routes() -> Vec<Route> {
    routes![advanced_search]
}

pub fn import_routes() -> Vec<Route> {
    routes![submit_import]
}

pub fn docs_routes() -> Vec<Route> {
    routes![index, route_docs]
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}
