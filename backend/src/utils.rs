use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::Deserialize;

lazy_static! {
    static ref YOUTUBE_VIDEO_ID: Regex = Regex::new(
        r"(?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)([a-zA-Z0-9_-]{11})",
    )
    .expect("static regex");
    static ref BARE_VIDEO_ID: Regex = Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("static regex");
}

/// Accepts a bare 11 character video id or any of the usual YouTube URL shapes.
pub fn extract_youtube_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_VIDEO_ID.is_match(input) {
        return Some(input.to_string());
    }

    YOUTUBE_VIDEO_ID
        .captures(input)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn youtube_video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

pub fn youtube_channel_url(channel_id: &str) -> String {
    format!("https://www.youtube.com/channel/{channel_id}")
}

pub fn youtube_playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={playlist_id}")
}

/// Parse RFC 3339, falling back to a naive `YYYY-MM-DDTHH:MM:SS[.fff]` read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Counts arrive as integers from clients and as numeric strings from the YouTube API.
pub fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
        Null(()),
    }

    match Count::deserialize(deserializer) {
        Ok(Count::Number(n)) => Ok(n),
        Ok(Count::Null(())) => Ok(0),
        Ok(Count::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map_err(|_| de::Error::custom(format!("invalid count '{text}', expected a non-negative integer"))),
        Err(_) => Err(de::Error::custom("expected a non-negative integer")),
    }
}

pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{text}'"))),
    }
}
