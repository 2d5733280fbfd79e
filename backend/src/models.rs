use crate::error::ApiError;
use crate::utils::{deserialize_count, deserialize_timestamp};
use chrono::{DateTime, Utc};
use rocket::request::FromParam;
use rocket::FromForm;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest count the engine's `long` fields can hold.
pub const MAX_COUNT: u64 = i64::MAX as u64;

fn validate_counts(kind: &str, likes: u64, views: u64) -> Result<(), ApiError> {
    for (field, value) in [("likes", likes), ("views", views)] {
        if value > MAX_COUNT {
            return Err(ApiError::Validation(format!(
                "{kind} {field} {value} exceeds the maximum of {MAX_COUNT}"
            )));
        }
    }
    Ok(())
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub likes: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub views: u64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub date_published: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub original_playlist_url: Option<String>,
    #[serde(default)]
    pub original_owner_url: Option<String>,
}

impl Video {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            description: None,
            comments: None,
            likes: 0,
            views: 0,
            date_added: None,
            date_published: None,
            date_updated: None,
            original_playlist_url: None,
            original_owner_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.url.trim().is_empty() {
            return Err(ApiError::Validation("video url must not be empty".into()));
        }
        validate_counts("video", self.likes, self.views)
    }
}

/// A video stored inside a playlist document. The id is local to the playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedVideo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub video: Video,
}

impl EmbeddedVideo {
    pub fn with_id(id: impl Into<String>, video: Video) -> Self {
        Self {
            id: Some(id.into()),
            video,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub likes: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub views: u64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub original_playlist_published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub original_playlist_url: Option<String>,
    #[serde(default)]
    pub original_owner_url: Option<String>,
    #[serde(default)]
    pub videos: Vec<EmbeddedVideo>,
    /// Ids of top-level video records.
    #[serde(default)]
    pub video_ids: Vec<String>,
}

impl Playlist {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            comments: None,
            likes: 0,
            views: 0,
            date_added: None,
            date_updated: None,
            original_playlist_published: None,
            original_playlist_url: None,
            original_owner_url: None,
            videos: Vec::new(),
            video_ids: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::Validation("playlist title must not be empty".into()));
        }
        validate_counts("playlist", self.likes, self.views)?;

        let mut seen = HashSet::new();
        for embedded in &self.videos {
            embedded.video.validate()?;
            if let Some(id) = embedded.id() {
                if !seen.insert(id) {
                    return Err(ApiError::Validation(format!(
                        "duplicate embedded video id '{id}'"
                    )));
                }
            }
        }

        if self.video_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ApiError::Validation("video_ids must not contain empty ids".into()));
        }
        Ok(())
    }

    /// Gives every embedded video without an id a fresh one.
    pub fn assign_video_ids(&mut self) {
        for embedded in self.videos.iter_mut().filter(|v| v.id.is_none()) {
            embedded.id = Some(uuid::Uuid::new_v4().to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub video: Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub playlist: Playlist,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub message: String,
    pub id: String,
}

impl MutationResponse {
    pub fn new(message: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, FromForm)]
pub struct SearchParams {
    pub q: Option<String>,
    #[field(default = 0)]
    pub start: usize,
    #[field(default = DEFAULT_PAGE_SIZE)]
    pub size: usize,
    pub fields: Vec<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            q: None,
            start: 0,
            size: DEFAULT_PAGE_SIZE,
            fields: Vec::new(),
        }
    }
}

/// Either a raw engine `query` object or a keyword with optional fields.
/// Any other top level key (`sort`, `_source`, `aggs`, `highlight`, ...) is
/// kept in `extra` and sent to the engine as given.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvancedSearchRequest {
    #[serde(default)]
    pub query: Option<Value>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub start: usize,
    /// Engine spelling of `start`; wins when both are given.
    #[serde(default)]
    pub from: Option<usize>,
    #[serde(default = "default_page_size")]
    pub size: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AdvancedSearchRequest {
    fn default() -> Self {
        Self {
            query: None,
            q: None,
            fields: Vec::new(),
            start: 0,
            from: None,
            size: DEFAULT_PAGE_SIZE,
            extra: Map::new(),
        }
    }
}

impl AdvancedSearchRequest {
    pub fn offset(&self) -> usize {
        self.from.unwrap_or(self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdvancedSearchResponse {
    Videos(Vec<VideoResponse>),
    Playlists(Vec<PlaylistResponse>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportSource {
    YoutubePlaylist,
    YoutubeChannel,
    YoutubeVideo,
    VideoLink,
}

impl ImportSource {
    pub const ALL: [ImportSource; 4] = [
        ImportSource::YoutubePlaylist,
        ImportSource::YoutubeChannel,
        ImportSource::YoutubeVideo,
        ImportSource::VideoLink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportSource::YoutubePlaylist => "youtube-playlist",
            ImportSource::YoutubeChannel => "youtube-channel",
            ImportSource::YoutubeVideo => "youtube-video",
            ImportSource::VideoLink => "video-link",
        }
    }
}

impl fmt::Display for ImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'a> FromParam<'a> for ImportSource {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        ImportSource::ALL
            .into_iter()
            .find(|source| source.as_str() == param)
            .ok_or(param)
    }
}

/// Import bodies are either a bare JSON string or `{"reference": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImportTarget {
    Bare(String),
    Wrapped {
        #[serde(alias = "id", alias = "url")]
        reference: String,
    },
}

impl ImportTarget {
    pub fn reference(&self) -> &str {
        match self {
            ImportTarget::Bare(reference) => reference,
            ImportTarget::Wrapped { reference } => reference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportHandle {
    pub job_id: String,
    pub source: ImportSource,
    pub reference: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDoc {
    pub method: String,
    pub path: String,
    pub name: Option<String>,
}
