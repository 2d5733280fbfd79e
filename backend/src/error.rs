use crate::models::ErrorResponse;
use log::error;
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;
use thiserror::Error;

/// Outcomes of a document store call that are not a plain success.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document '{id}' not found in index '{index}'")]
    NotFound { index: String, id: String },

    #[error("document '{id}' in index '{index}' was modified concurrently")]
    Conflict { index: String, id: String },

    #[error("search engine error: {0}")]
    Engine(String),

    #[error("search engine transport error: {0}")]
    Transport(#[from] elasticsearch::Error),

    #[error("malformed document: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn not_found(index: &str, id: &str) -> Self {
        Self::NotFound {
            index: index.to_string(),
            id: id.to_string(),
        }
    }

    pub fn conflict(index: &str, id: &str) -> Self {
        Self::Conflict {
            index: index.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Engine(String),
}

impl ApiError {
    /// Names the resource kind in the not-found message, e.g. "playlist 'x' not found in index 'p'".
    pub fn from_store(kind: &str, e: StoreError) -> Self {
        match e {
            StoreError::NotFound { index, id } => {
                Self::NotFound(format!("{kind} '{id}' not found in index '{index}'"))
            }
            StoreError::Conflict { index, id } => Self::Conflict(format!(
                "{kind} '{id}' in index '{index}' was modified concurrently, retry the request"
            )),
            other => Self::Engine(other.to_string()),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::NotFound,
            Self::Conflict(_) => Status::Conflict,
            Self::Validation(_) => Status::UnprocessableEntity,
            Self::Engine(_) => Status::InternalServerError,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation_failed",
            Self::Engine(_) => "engine_failure",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::from_store("document", e)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{} {} failed: {self}", request.method(), request.uri());
        }

        let body = ErrorResponse {
            error: self.label().to_string(),
            message: self.to_string(),
        };
        body.into_response(status)
    }
}

impl ErrorResponse {
    pub fn into_response(self, status: Status) -> response::Result<'static> {
        let json = serde_json::to_string(&self).map_err(|_| Status::InternalServerError)?;
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_kind_id_and_index() {
        let err = ApiError::from_store("playlist", StoreError::not_found("playlists", "abc"));

        assert_eq!(err.status(), Status::NotFound);
        assert_eq!(
            err.to_string(),
            "playlist 'abc' not found in index 'playlists'"
        );
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = ApiError::from_store("playlist", StoreError::conflict("playlists", "abc"));
        assert_eq!(err.status(), Status::Conflict);
    }

    #[test]
    fn engine_failures_carry_the_engine_message() {
        let err: ApiError = StoreError::Engine("parsing_exception: unknown query".into()).into();

        assert_eq!(err.status(), Status::InternalServerError);
        assert!(err.to_string().contains("parsing_exception: unknown query"));
    }
}
