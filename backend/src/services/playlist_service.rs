use crate::error::{ApiError, StoreError};
use crate::models::{
    EmbeddedVideo, MutationResponse, Playlist, PlaylistResponse, SearchParams, Video,
    VideoResponse,
};
use crate::services::search_service::{
    build_listing_body, build_nested_video_body, normalize_keyword, DEFAULT_PLAYLIST_FIELDS,
    NESTED_VIDEOS_PATH,
};
use crate::services::store::{DocumentStore, Hit, SearchHits};
use log::{debug, info};
use serde_json::Value;

const KIND: &str = "playlist";

pub fn playlist_from_source(source: Value) -> Result<Playlist, StoreError> {
    serde_json::from_value(source)
        .map_err(|e| StoreError::Malformed(format!("stored playlist: {e}")))
}

pub fn playlist_hits(hits: SearchHits) -> Result<Vec<PlaylistResponse>, StoreError> {
    hits.hits
        .into_iter()
        .map(|hit| {
            Ok(PlaylistResponse {
                id: hit.id,
                score: hit.score,
                playlist: playlist_from_source(hit.source)?,
            })
        })
        .collect()
}

/// Embedded videos stored without an id are addressed by their position.
fn embedded_response(
    embedded: EmbeddedVideo,
    offset: usize,
    score: Option<f64>,
) -> VideoResponse {
    VideoResponse {
        id: embedded.id.unwrap_or_else(|| offset.to_string()),
        score,
        video: embedded.video,
    }
}

fn video_position(playlist: &Playlist, video_id: &str) -> Option<usize> {
    playlist
        .videos
        .iter()
        .position(|v| v.id() == Some(video_id))
        .or_else(|| {
            video_id
                .parse::<usize>()
                .ok()
                .filter(|&pos| playlist.videos.get(pos).is_some_and(|v| v.id.is_none()))
        })
}

fn video_not_found(index: &str, playlist_id: &str, video_id: &str) -> ApiError {
    ApiError::NotFound(format!(
        "video '{video_id}' not found in playlist '{playlist_id}' (index '{index}')"
    ))
}

fn to_body(playlist: &Playlist) -> Result<Value, ApiError> {
    serde_json::to_value(playlist).map_err(|e| ApiError::Engine(e.to_string()))
}

pub async fn search_playlists(
    store: &dyn DocumentStore,
    index: &str,
    params: &SearchParams,
) -> Result<Vec<PlaylistResponse>, ApiError> {
    let body = build_listing_body(params, &DEFAULT_PLAYLIST_FIELDS);
    let hits = store.search(index, body).await?;
    info!("Found {} playlists matching {:?}", hits.hits.len(), params.q);
    Ok(playlist_hits(hits)?)
}

pub async fn get_playlist(
    store: &dyn DocumentStore,
    index: &str,
    id: &str,
) -> Result<PlaylistResponse, ApiError> {
    let document = store
        .get(index, id)
        .await
        .map_err(|e| ApiError::from_store(KIND, e))?;

    Ok(PlaylistResponse {
        id: document.id,
        score: None,
        playlist: playlist_from_source(document.source)?,
    })
}

pub async fn create_playlist(
    store: &dyn DocumentStore,
    index: &str,
    mut playlist: Playlist,
) -> Result<MutationResponse, ApiError> {
    playlist.validate()?;
    playlist.assign_video_ids();

    let id = store.create(index, to_body(&playlist)?).await?;
    Ok(MutationResponse::new("playlist created", id))
}

pub async fn update_playlist(
    store: &dyn DocumentStore,
    index: &str,
    id: &str,
    mut playlist: Playlist,
) -> Result<MutationResponse, ApiError> {
    playlist.validate()?;
    playlist.assign_video_ids();

    store
        .update(index, id, to_body(&playlist)?)
        .await
        .map_err(|e| ApiError::from_store(KIND, e))?;
    Ok(MutationResponse::new("playlist updated", id))
}

pub async fn delete_playlist(
    store: &dyn DocumentStore,
    index: &str,
    id: &str,
) -> Result<MutationResponse, ApiError> {
    store
        .delete(index, id)
        .await
        .map_err(|e| ApiError::from_store(KIND, e))?;
    Ok(MutationResponse::new("playlist deleted", id))
}

/// Without a keyword the whole embedded list is returned verbatim in stored
/// order. With one, a nested query selects the matching videos, paginated by
/// `start`/`size`.
pub async fn list_playlist_videos(
    store: &dyn DocumentStore,
    index: &str,
    playlist_id: &str,
    params: &SearchParams,
) -> Result<Vec<VideoResponse>, ApiError> {
    let Some(keyword) = normalize_keyword(params.q.as_deref()) else {
        let playlist = get_playlist(store, index, playlist_id).await?.playlist;
        return Ok(playlist
            .videos
            .into_iter()
            .enumerate()
            .map(|(offset, embedded)| embedded_response(embedded, offset, None))
            .collect());
    };

    let body = build_nested_video_body(playlist_id, keyword, &params.fields, params.start, params.size);
    let mut hits = store.search(index, body).await?.hits;

    if hits.is_empty() {
        // Distinguish "no matching video" from "no such playlist".
        get_playlist(store, index, playlist_id).await?;
        return Ok(Vec::new());
    }

    let inner: Vec<Hit> = hits
        .swap_remove(0)
        .inner_hits
        .remove(NESTED_VIDEOS_PATH)
        .unwrap_or_default();
    debug!("Playlist {playlist_id} has {} videos matching '{keyword}'", inner.len());

    inner
        .into_iter()
        .enumerate()
        .map(|(position, hit)| {
            let embedded: EmbeddedVideo = serde_json::from_value(hit.source)
                .map_err(|e| StoreError::Malformed(format!("stored video: {e}")))?;
            let offset = hit.offset.unwrap_or(params.start + position);
            Ok(embedded_response(embedded, offset, hit.score))
        })
        .collect()
}

/// Reads the parent playlist, applies `change` and writes the whole parent
/// back, failing with a conflict if it changed in between.
async fn modify_playlist<T>(
    store: &dyn DocumentStore,
    index: &str,
    playlist_id: &str,
    change: impl FnOnce(&mut Playlist) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let document = store
        .get(index, playlist_id)
        .await
        .map_err(|e| ApiError::from_store(KIND, e))?;
    let mut playlist = playlist_from_source(document.source)?;

    let outcome = change(&mut playlist)?;
    let body = to_body(&playlist)?;

    match document.version {
        Some(version) => store.replace(index, playlist_id, body, version).await,
        None => store.update(index, playlist_id, body).await,
    }
    .map_err(|e| ApiError::from_store(KIND, e))?;

    Ok(outcome)
}

pub async fn add_playlist_video(
    store: &dyn DocumentStore,
    index: &str,
    playlist_id: &str,
    video: Video,
) -> Result<MutationResponse, ApiError> {
    video.validate()?;
    let video_id = uuid::Uuid::new_v4().to_string();

    let added = modify_playlist(store, index, playlist_id, |playlist| {
        playlist
            .videos
            .push(EmbeddedVideo::with_id(video_id.clone(), video));
        Ok(video_id)
    })
    .await?;

    info!("Added video {added} to playlist {playlist_id}");
    Ok(MutationResponse::new("video added to playlist", added))
}

pub async fn get_playlist_video(
    store: &dyn DocumentStore,
    index: &str,
    playlist_id: &str,
    video_id: &str,
) -> Result<VideoResponse, ApiError> {
    let playlist = get_playlist(store, index, playlist_id).await?.playlist;
    let position = video_position(&playlist, video_id)
        .ok_or_else(|| video_not_found(index, playlist_id, video_id))?;

    let embedded = playlist.videos[position].clone();
    Ok(embedded_response(embedded, position, None))
}

/// Replaces one embedded video in place, leaving its siblings untouched.
pub async fn update_playlist_video(
    store: &dyn DocumentStore,
    index: &str,
    playlist_id: &str,
    video_id: &str,
    video: Video,
) -> Result<MutationResponse, ApiError> {
    video.validate()?;

    modify_playlist(store, index, playlist_id, |playlist| {
        let position = video_position(playlist, video_id)
            .ok_or_else(|| video_not_found(index, playlist_id, video_id))?;
        playlist.videos[position].video = video;
        Ok(())
    })
    .await?;

    info!("Updated video {video_id} in playlist {playlist_id}");
    Ok(MutationResponse::new("playlist video updated", video_id))
}

pub async fn delete_playlist_video(
    store: &dyn DocumentStore,
    index: &str,
    playlist_id: &str,
    video_id: &str,
) -> Result<MutationResponse, ApiError> {
    modify_playlist(store, index, playlist_id, |playlist| {
        let position = video_position(playlist, video_id)
            .ok_or_else(|| video_not_found(index, playlist_id, video_id))?;
        playlist.videos.remove(position);
        Ok(())
    })
    .await?;

    info!("Removed video {video_id} from playlist {playlist_id}");
    Ok(MutationResponse::new("playlist video deleted", video_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::InMemoryStore;
    use crate::services::store::{DocVersion, StoredDocument};
    use serde_json::json;

    const INDEX: &str = "playlists";

    fn video(url: &str, title: &str) -> Video {
        Video {
            title: Some(title.into()),
            ..Video::new(url)
        }
    }

    fn playlist_with_videos() -> Playlist {
        Playlist {
            description: Some("Talks from the conference".into()),
            likes: 7,
            videos: vec![
                EmbeddedVideo::with_id("a", video("https://a", "Intro to ownership")),
                EmbeddedVideo::with_id("b", video("https://b", "Lifetimes")),
                EmbeddedVideo::with_id("c", video("https://c", "Ownership in practice")),
            ],
            ..Playlist::new("RustConf")
        }
    }

    #[rocket::async_test]
    async fn create_then_get_returns_the_input() {
        let store = InMemoryStore::new();
        let input = playlist_with_videos();

        let id = create_playlist(&store, INDEX, input.clone()).await.unwrap().id;
        let fetched = get_playlist(&store, INDEX, &id).await.unwrap();

        assert_eq!(fetched.id, id);
        assert_eq!(fetched.score, None);
        assert_eq!(fetched.playlist, input);
    }

    #[rocket::async_test]
    async fn create_assigns_missing_embedded_ids() {
        let store = InMemoryStore::new();
        let mut input = Playlist::new("Fresh");
        input.videos.push(EmbeddedVideo {
            id: None,
            video: Video::new("https://a"),
        });

        let id = create_playlist(&store, INDEX, input).await.unwrap().id;
        let fetched = get_playlist(&store, INDEX, &id).await.unwrap();

        assert!(fetched.playlist.videos[0].id().is_some());
    }

    #[rocket::async_test]
    async fn keyword_search_only_matches_requested_fields() {
        let store = InMemoryStore::new();
        let in_title = create_playlist(&store, INDEX, Playlist::new("Jazz classics"))
            .await
            .unwrap()
            .id;
        let only_description = Playlist {
            description: Some("late night jazz".into()),
            ..Playlist::new("Evening")
        };
        create_playlist(&store, INDEX, only_description).await.unwrap();

        let params = SearchParams {
            q: Some("jazz".into()),
            fields: vec!["title".into()],
            ..SearchParams::default()
        };
        let found = search_playlists(&store, INDEX, &params).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, in_title);

        let default_fields = SearchParams {
            q: Some("jazz".into()),
            ..SearchParams::default()
        };
        assert_eq!(
            search_playlists(&store, INDEX, &default_fields).await.unwrap().len(),
            2
        );
    }

    #[rocket::async_test]
    async fn update_of_missing_playlist_is_not_found() {
        let store = InMemoryStore::new();
        let err = update_playlist(&store, INDEX, "nope", Playlist::new("x"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "playlist 'nope' not found in index 'playlists'");
    }

    #[rocket::async_test]
    async fn nested_update_leaves_siblings_untouched() {
        let store = InMemoryStore::new();
        let id = create_playlist(&store, INDEX, playlist_with_videos())
            .await
            .unwrap()
            .id;
        let before = store.get(INDEX, &id).await.unwrap().source;

        let replacement = Video {
            likes: 99,
            ..video("https://b2", "Lifetimes, revisited")
        };
        update_playlist_video(&store, INDEX, &id, "b", replacement.clone())
            .await
            .unwrap();

        let after = store.get(INDEX, &id).await.unwrap().source;
        assert_eq!(after["videos"][0], before["videos"][0]);
        assert_eq!(after["videos"][2], before["videos"][2]);
        assert_eq!(after["videos"][1]["id"], "b");
        assert_eq!(after["videos"][1]["url"], "https://b2");

        let fetched = get_playlist_video(&store, INDEX, &id, "b").await.unwrap();
        assert_eq!(fetched.video, replacement);
    }

    #[rocket::async_test]
    async fn missing_nested_video_is_not_found_for_that_playlist() {
        let store = InMemoryStore::new();
        let id = create_playlist(&store, INDEX, playlist_with_videos())
            .await
            .unwrap()
            .id;

        let err = update_playlist_video(&store, INDEX, &id, "zzz", Video::new("https://z"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(err.to_string().contains("video 'zzz' not found in playlist"));
        assert!(err.to_string().contains(&id));
    }

    #[rocket::async_test]
    async fn add_and_delete_embedded_videos() {
        let store = InMemoryStore::new();
        let id = create_playlist(&store, INDEX, Playlist::new("Empty")).await.unwrap().id;

        let added = add_playlist_video(&store, INDEX, &id, Video::new("https://new"))
            .await
            .unwrap()
            .id;
        let listed = list_playlist_videos(&store, INDEX, &id, &SearchParams::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, added);

        delete_playlist_video(&store, INDEX, &id, &added).await.unwrap();
        assert!(matches!(
            delete_playlist_video(&store, INDEX, &id, &added).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn listing_without_keyword_returns_every_embedded_video() {
        let store = InMemoryStore::new();
        let mut long = Playlist::new("Full season");
        for episode in 0..12 {
            long.videos.push(EmbeddedVideo::with_id(
                format!("ep{episode}"),
                video(&format!("https://ep/{episode}"), &format!("Episode {episode}")),
            ));
        }
        let id = create_playlist(&store, INDEX, long).await.unwrap().id;

        let params = SearchParams {
            start: 5,
            size: 2,
            ..SearchParams::default()
        };
        for params in [SearchParams::default(), params] {
            let listed = list_playlist_videos(&store, INDEX, &id, &params).await.unwrap();
            let ids: Vec<String> = listed.into_iter().map(|v| v.id).collect();
            let expected: Vec<String> = (0..12).map(|episode| format!("ep{episode}")).collect();
            assert_eq!(ids, expected);
        }
    }

    #[rocket::async_test]
    async fn nested_keyword_search_is_scoped_to_the_playlist() {
        let store = InMemoryStore::new();
        let id = create_playlist(&store, INDEX, playlist_with_videos())
            .await
            .unwrap()
            .id;
        create_playlist(&store, INDEX, playlist_with_videos()).await.unwrap();

        let params = SearchParams {
            q: Some("ownership".into()),
            ..SearchParams::default()
        };
        let found = list_playlist_videos(&store, INDEX, &id, &params).await.unwrap();

        let ids: Vec<&str> = found.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(found.iter().all(|v| v.score.is_some()));

        let none = SearchParams {
            q: Some("macros".into()),
            ..SearchParams::default()
        };
        assert!(list_playlist_videos(&store, INDEX, &id, &none)
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            list_playlist_videos(&store, INDEX, "missing", &none).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn videos_without_ids_are_addressed_by_position() {
        let store = InMemoryStore::new();
        let id = store
            .create(
                INDEX,
                json!({ "title": "Imported", "videos": [{ "url": "https://x" }, { "url": "https://y" }] }),
            )
            .await
            .unwrap();

        let listed = list_playlist_videos(&store, INDEX, &id, &SearchParams::default())
            .await
            .unwrap();
        assert_eq!(listed[1].id, "1");

        let second = get_playlist_video(&store, INDEX, &id, "1").await.unwrap();
        assert_eq!(second.video.url, "https://y");
    }

    /// Writes to the parent behind the caller's back right after every read.
    struct RacingStore {
        inner: InMemoryStore,
    }

    #[rocket::async_trait]
    impl DocumentStore for RacingStore {
        async fn get(&self, index: &str, id: &str) -> Result<StoredDocument, StoreError> {
            let document = self.inner.get(index, id).await?;
            self.inner.update(index, id, document.source.clone()).await?;
            Ok(document)
        }

        async fn search(&self, index: &str, body: Value) -> Result<SearchHits, StoreError> {
            self.inner.search(index, body).await
        }

        async fn create(&self, index: &str, body: Value) -> Result<String, StoreError> {
            self.inner.create(index, body).await
        }

        async fn update(&self, index: &str, id: &str, body: Value) -> Result<(), StoreError> {
            self.inner.update(index, id, body).await
        }

        async fn replace(
            &self,
            index: &str,
            id: &str,
            body: Value,
            expected: DocVersion,
        ) -> Result<(), StoreError> {
            self.inner.replace(index, id, body, expected).await
        }

        async fn delete(&self, index: &str, id: &str) -> Result<(), StoreError> {
            self.inner.delete(index, id).await
        }

        async fn ensure_index(&self, index: &str, mapping: Value) -> Result<bool, StoreError> {
            self.inner.ensure_index(index, mapping).await
        }
    }

    #[rocket::async_test]
    async fn concurrent_parent_change_is_a_conflict() {
        let store = RacingStore {
            inner: InMemoryStore::new(),
        };
        let id = create_playlist(&store, INDEX, playlist_with_videos())
            .await
            .unwrap()
            .id;

        let err = update_playlist_video(&store, INDEX, &id, "b", Video::new("https://b2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let stored = store.inner.get(INDEX, &id).await.unwrap().source;
        assert_eq!(stored["videos"][1]["url"], "https://b");
    }
}
