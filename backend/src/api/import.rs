use crate::api::json_body;
use crate::error::ApiError;
use crate::models::{ImportHandle, ImportSource, ImportTarget};
use crate::services::import_service::normalize_reference;
use crate::AppState;
use log::info;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::{post, State};

fn unknown_source(source: &str) -> ApiError {
    let known: Vec<&str> = ImportSource::ALL.iter().map(ImportSource::as_str).collect();
    ApiError::NotFound(format!(
        "unknown import source '{source}', expected one of: {}",
        known.join(", ")
    ))
}

#[post("/<source>", data = "<body>")]
pub async fn submit_import(
    source: Result<ImportSource, &str>,
    body: Result<Json<ImportTarget>, json::Error<'_>>,
    state: &State<AppState>,
) -> Result<status::Custom<Json<ImportHandle>>, ApiError> {
    let source = source.map_err(unknown_source)?;
    let target = json_body(body)?;
    let reference = normalize_reference(source, target.reference())?;

    info!("Import requested: {source} {reference}");
    let handle = state.importer.submit(source, reference).await?;
    Ok(status::Custom(Status::Accepted, Json(handle)))
}
