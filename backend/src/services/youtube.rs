//! YouTube Data API v3 export: a channel's playlists with their videos,
//! shaped as [`Playlist`] documents ready to be posted to `/playlists`.

use crate::models::{EmbeddedVideo, Playlist, Video};
use crate::utils::{parse_timestamp, youtube_channel_url, youtube_playlist_url, youtube_video_url};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use reqwest::Client;
use serde_json::Value;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const MAX_RESULTS: &str = "50";
const VIDEOS_PER_REQUEST: usize = 50;

pub struct YoutubeClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl YoutubeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, API_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, resource: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{resource}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("YouTube API request to {resource} failed"))?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .with_context(|| format!("YouTube API {resource} response is not JSON"))?;

        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(anyhow!("YouTube API {resource} returned {status}: {message}"));
        }
        Ok(body)
    }

    /// Follows `nextPageToken` until the listing is exhausted.
    async fn fetch_all(&self, resource: &str, params: &[(&str, &str)]) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut page_params = params.to_vec();
            page_params.push(("maxResults", MAX_RESULTS));
            if let Some(token) = page_token.as_deref() {
                page_params.push(("pageToken", token));
            }

            let page = self.fetch(resource, &page_params).await?;
            if let Some(page_items) = page["items"].as_array() {
                items.extend(page_items.iter().cloned());
            }

            match page["nextPageToken"].as_str() {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(items)
    }

    pub async fn channel_playlists(&self, channel_id: &str) -> Result<Vec<Value>> {
        info!("Fetching playlists for channel: {channel_id}");
        self.fetch_all(
            "playlists",
            &[("part", "snippet,contentDetails"), ("channelId", channel_id)],
        )
        .await
    }

    pub async fn playlist_video_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        info!("Fetching playlist items for playlist: {playlist_id}");
        let items = self
            .fetch_all(
                "playlistItems",
                &[("part", "snippet,contentDetails"), ("playlistId", playlist_id)],
            )
            .await?;

        Ok(items
            .iter()
            .filter_map(|item| {
                item["snippet"]["resourceId"]["videoId"]
                    .as_str()
                    .or_else(|| item["contentDetails"]["videoId"].as_str())
                    .map(String::from)
            })
            .collect())
    }

    pub async fn videos(&self, video_ids: &[String]) -> Result<Vec<Value>> {
        let mut videos = Vec::with_capacity(video_ids.len());
        for chunk in video_ids.chunks(VIDEOS_PER_REQUEST) {
            let ids = chunk.join(",");
            let page = self
                .fetch(
                    "videos",
                    &[("part", "snippet,contentDetails,statistics"), ("id", ids.as_str())],
                )
                .await?;
            if let Some(items) = page["items"].as_array() {
                videos.extend(items.iter().cloned());
            }
        }
        Ok(videos)
    }

    pub async fn export_channel(&self, channel_id: &str) -> Result<Vec<Playlist>> {
        let exported_at = Utc::now();
        let mut playlists = Vec::new();

        for item in self.channel_playlists(channel_id).await? {
            let Some(mut playlist) = playlist_from_item(&item, exported_at) else {
                warn!("Skipping playlist item without id or title: {item}");
                continue;
            };
            let Some(playlist_id) = item["id"].as_str() else {
                continue;
            };

            let video_ids = self.playlist_video_ids(playlist_id).await?;
            for video in self.videos(&video_ids).await? {
                if let Some(embedded) = video_from_item(&video, playlist_id, exported_at) {
                    playlist.videos.push(embedded);
                }
            }

            info!(
                "Exported playlist '{}' with {} videos",
                playlist.title,
                playlist.videos.len()
            );
            playlists.push(playlist);
        }

        if playlists.is_empty() {
            warn!("No playlists found for channel {channel_id}");
        }
        Ok(playlists)
    }
}

fn count(value: &Value) -> u64 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_u64())
        .unwrap_or(0)
}

fn text(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(String::from)
}

pub fn playlist_from_item(item: &Value, exported_at: DateTime<Utc>) -> Option<Playlist> {
    let id = item["id"].as_str()?;
    let snippet = &item["snippet"];
    let title = text(&snippet["title"])?;

    Some(Playlist {
        description: text(&snippet["description"]),
        date_added: Some(exported_at),
        original_playlist_published: snippet["publishedAt"].as_str().and_then(parse_timestamp),
        original_playlist_url: Some(youtube_playlist_url(id)),
        original_owner_url: snippet["channelId"].as_str().map(youtube_channel_url),
        ..Playlist::new(title)
    })
}

/// Maps a `videos.list` item; the YouTube video id becomes the embedded id.
pub fn video_from_item(
    item: &Value,
    playlist_id: &str,
    exported_at: DateTime<Utc>,
) -> Option<EmbeddedVideo> {
    let video_id = item["id"].as_str()?;
    let snippet = &item["snippet"];
    let statistics = &item["statistics"];

    let video = Video {
        title: text(&snippet["title"]),
        description: text(&snippet["description"]),
        likes: count(&statistics["likeCount"]),
        views: count(&statistics["viewCount"]),
        date_added: Some(exported_at),
        date_published: snippet["publishedAt"].as_str().and_then(parse_timestamp),
        original_playlist_url: Some(youtube_playlist_url(playlist_id)),
        original_owner_url: snippet["channelId"].as_str().map(youtube_channel_url),
        ..Video::new(youtube_video_url(video_id))
    };

    Some(EmbeddedVideo::with_id(video_id, video))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2024-03-01T00:00:00Z").unwrap()
    }

    #[test]
    fn maps_playlist_snippet() {
        let item = json!({
            "id": "PL1",
            "snippet": {
                "title": "Conference 2023",
                "description": "",
                "publishedAt": "2023-09-10T12:00:00Z",
                "channelId": "UC9"
            }
        });

        let playlist = playlist_from_item(&item, now()).unwrap();

        assert_eq!(playlist.title, "Conference 2023");
        assert_eq!(playlist.description, None);
        assert_eq!(
            playlist.original_playlist_url.as_deref(),
            Some("https://www.youtube.com/playlist?list=PL1")
        );
        assert_eq!(
            playlist.original_owner_url.as_deref(),
            Some("https://www.youtube.com/channel/UC9")
        );
        assert!(playlist.original_playlist_published.is_some());
        assert_eq!(playlist.date_added, Some(now()));
    }

    #[test]
    fn playlist_without_title_is_skipped() {
        assert!(playlist_from_item(&json!({ "id": "PL1", "snippet": {} }), now()).is_none());
    }

    #[test]
    fn maps_video_statistics_from_strings() {
        let item = json!({
            "id": "dQw4w9WgXcQ",
            "snippet": {
                "title": "Keynote",
                "description": "Opening talk",
                "publishedAt": "2023-09-11T09:00:00Z",
                "channelId": "UC9"
            },
            "statistics": { "viewCount": "1234", "likeCount": "56" }
        });

        let embedded = video_from_item(&item, "PL1", now()).unwrap();

        assert_eq!(embedded.id(), Some("dQw4w9WgXcQ"));
        assert_eq!(embedded.video.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(embedded.video.views, 1234);
        assert_eq!(embedded.video.likes, 56);
        assert_eq!(
            embedded.video.original_playlist_url.as_deref(),
            Some("https://www.youtube.com/playlist?list=PL1")
        );
    }

    #[test]
    fn hidden_statistics_default_to_zero() {
        let item = json!({ "id": "dQw4w9WgXcQ", "snippet": { "title": "Private" } });
        let embedded = video_from_item(&item, "PL1", now()).unwrap();

        assert_eq!(embedded.video.likes, 0);
        assert_eq!(embedded.video.views, 0);
    }
}
