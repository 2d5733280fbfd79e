use crate::error::{ApiError, StoreError};
use crate::models::{MutationResponse, SearchParams, Video, VideoResponse};
use crate::services::search_service::{build_listing_body, DEFAULT_VIDEO_FIELDS};
use crate::services::store::{DocumentStore, SearchHits};
use log::info;
use serde_json::Value;

const KIND: &str = "video";

pub fn video_from_source(source: Value) -> Result<Video, StoreError> {
    serde_json::from_value(source)
        .map_err(|e| StoreError::Malformed(format!("stored video: {e}")))
}

pub fn video_hits(hits: SearchHits) -> Result<Vec<VideoResponse>, StoreError> {
    hits.hits
        .into_iter()
        .map(|hit| {
            Ok(VideoResponse {
                id: hit.id,
                score: hit.score,
                video: video_from_source(hit.source)?,
            })
        })
        .collect()
}

fn to_body(video: &Video) -> Result<Value, ApiError> {
    serde_json::to_value(video).map_err(|e| ApiError::Engine(e.to_string()))
}

pub async fn search_videos(
    store: &dyn DocumentStore,
    index: &str,
    params: &SearchParams,
) -> Result<Vec<VideoResponse>, ApiError> {
    let body = build_listing_body(params, &DEFAULT_VIDEO_FIELDS);
    let hits = store.search(index, body).await?;
    info!("Found {} videos matching {:?}", hits.hits.len(), params.q);
    Ok(video_hits(hits)?)
}

pub async fn get_video(
    store: &dyn DocumentStore,
    index: &str,
    id: &str,
) -> Result<VideoResponse, ApiError> {
    let document = store
        .get(index, id)
        .await
        .map_err(|e| ApiError::from_store(KIND, e))?;

    Ok(VideoResponse {
        id: document.id,
        score: None,
        video: video_from_source(document.source)?,
    })
}

pub async fn create_video(
    store: &dyn DocumentStore,
    index: &str,
    video: &Video,
) -> Result<MutationResponse, ApiError> {
    video.validate()?;
    let id = store.create(index, to_body(video)?).await?;
    Ok(MutationResponse::new("video created", id))
}

pub async fn update_video(
    store: &dyn DocumentStore,
    index: &str,
    id: &str,
    video: &Video,
) -> Result<MutationResponse, ApiError> {
    video.validate()?;
    store
        .update(index, id, to_body(video)?)
        .await
        .map_err(|e| ApiError::from_store(KIND, e))?;
    Ok(MutationResponse::new("video updated", id))
}

pub async fn delete_video(
    store: &dyn DocumentStore,
    index: &str,
    id: &str,
) -> Result<MutationResponse, ApiError> {
    store
        .delete(index, id)
        .await
        .map_err(|e| ApiError::from_store(KIND, e))?;
    Ok(MutationResponse::new("video deleted", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::InMemoryStore;
    use chrono::{TimeZone, Utc};

    const INDEX: &str = "videos";

    fn sample() -> Video {
        Video {
            title: Some("Fearless concurrency".into()),
            description: Some("Threads and channels".into()),
            likes: 42,
            views: 1000,
            date_published: Some(Utc.with_ymd_and_hms(2021, 6, 1, 8, 0, 0).unwrap()),
            original_owner_url: Some("https://www.youtube.com/channel/UC1".into()),
            ..Video::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        }
    }

    #[rocket::async_test]
    async fn create_then_get_round_trips_every_field() {
        let store = InMemoryStore::new();
        let created = create_video(&store, INDEX, &sample()).await.unwrap();

        let fetched = get_video(&store, INDEX, &created.id).await.unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.score, None);
        assert_eq!(fetched.video, sample());
    }

    #[rocket::async_test]
    async fn get_missing_video_is_not_found() {
        let store = InMemoryStore::new();
        let err = get_video(&store, INDEX, "missing").await.unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(err.to_string(), "video 'missing' not found in index 'videos'");
    }

    #[rocket::async_test]
    async fn update_replaces_the_whole_body() {
        let store = InMemoryStore::new();
        let id = create_video(&store, INDEX, &sample()).await.unwrap().id;

        let replacement = Video {
            likes: 43,
            ..sample()
        };
        update_video(&store, INDEX, &id, &replacement).await.unwrap();

        let fetched = get_video(&store, INDEX, &id).await.unwrap();
        assert_eq!(fetched.video, replacement);
        assert_eq!(fetched.video.title.as_deref(), Some("Fearless concurrency"));
    }

    #[rocket::async_test]
    async fn delete_twice_is_not_found() {
        let store = InMemoryStore::new();
        let id = create_video(&store, INDEX, &sample()).await.unwrap().id;

        delete_video(&store, INDEX, &id).await.unwrap();
        assert!(matches!(
            get_video(&store, INDEX, &id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            delete_video(&store, INDEX, &id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn search_scores_results() {
        let store = InMemoryStore::new();
        create_video(&store, INDEX, &sample()).await.unwrap();
        create_video(&store, INDEX, &Video::new("https://other")).await.unwrap();

        let params = SearchParams {
            q: Some("concurrency".into()),
            ..SearchParams::default()
        };
        let found = search_videos(&store, INDEX, &params).await.unwrap();

        assert_eq!(found.len(), 1);
        assert!(found[0].score.is_some());
    }

    #[rocket::async_test]
    async fn empty_url_is_rejected_before_storing() {
        let store = InMemoryStore::new();
        let err = create_video(&store, INDEX, &Video::new("")).await.unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        let all = search_videos(&store, INDEX, &SearchParams::default()).await.unwrap();
        assert!(all.is_empty());
    }
}
