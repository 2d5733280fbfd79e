use crate::error::ApiError;
use crate::models::{ImportHandle, ImportSource};
use crate::utils::extract_youtube_video_id;
use log::info;
use url::Url;

/// Hand-off point to the external ingestion component.
#[rocket::async_trait]
pub trait Importer: Send + Sync {
    /// `reference` has already been normalized by [`normalize_reference`].
    async fn submit(&self, source: ImportSource, reference: String) -> Result<ImportHandle, ApiError>;
}

/// Accepts every request and returns a job handle without fetching anything.
#[derive(Debug, Default)]
pub struct AcknowledgingImporter;

#[rocket::async_trait]
impl Importer for AcknowledgingImporter {
    async fn submit(&self, source: ImportSource, reference: String) -> Result<ImportHandle, ApiError> {
        let job_id = uuid::Uuid::new_v4().to_string();
        info!("Accepted {source} import of {reference} as job {job_id}");

        Ok(ImportHandle {
            message: format!("accepted {source} import of {reference}"),
            job_id,
            source,
            reference,
            status: "accepted".to_string(),
        })
    }
}

fn invalid(source: ImportSource, input: &str, expected: &str) -> ApiError {
    ApiError::Validation(format!(
        "invalid {source} reference '{input}', expected {expected}"
    ))
}

fn parse_http_url(input: &str) -> Option<Url> {
    Url::parse(input)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
}

/// Reduces URLs to the platform identifier the ingestion side expects.
pub fn normalize_reference(source: ImportSource, input: &str) -> Result<String, ApiError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ApiError::Validation(format!("{source} reference must not be empty")));
    }

    match source {
        ImportSource::YoutubeVideo => extract_youtube_video_id(input)
            .ok_or_else(|| invalid(source, input, "a video id or YouTube video URL")),
        ImportSource::YoutubePlaylist => match parse_http_url(input) {
            Some(url) => url
                .query_pairs()
                .find(|(key, _)| key == "list")
                .map(|(_, value)| value.to_string())
                .ok_or_else(|| invalid(source, input, "a playlist id or URL with a 'list' parameter")),
            None if !input.contains('/') => Ok(input.to_string()),
            None => Err(invalid(source, input, "a playlist id or URL")),
        },
        ImportSource::YoutubeChannel => {
            if let Some(url) = parse_http_url(input) {
                let mut segments = url.path_segments().into_iter().flatten();
                match (segments.next(), segments.next()) {
                    (Some("channel"), Some(id)) if !id.is_empty() => Ok(id.to_string()),
                    (Some(handle), _) if handle.starts_with('@') && handle.len() > 1 => {
                        Ok(handle.to_string())
                    }
                    _ => Err(invalid(source, input, "a /channel/<id> or /@handle URL")),
                }
            } else if !input.contains('/') {
                Ok(input.to_string())
            } else {
                Err(invalid(source, input, "a channel id, @handle or URL"))
            }
        }
        ImportSource::VideoLink => parse_http_url(input)
            .map(|url| url.to_string())
            .ok_or_else(|| invalid(source, input, "an http(s) URL")),
    }
}
