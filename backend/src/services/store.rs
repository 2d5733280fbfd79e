use crate::error::StoreError;
use serde_json::Value;
use std::collections::HashMap;

/// Engine sequence number and primary term of a document as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocVersion {
    pub seq_no: i64,
    pub primary_term: i64,
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub source: Value,
    pub version: Option<DocVersion>,
}

#[derive(Debug, Clone, Default)]
pub struct Hit {
    pub id: String,
    pub score: Option<f64>,
    pub source: Value,
    /// Position inside the parent array, only set on nested inner hits.
    pub offset: Option<usize>,
    pub inner_hits: HashMap<String, Vec<Hit>>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<Hit>,
}

/// CRUD and search against an index of JSON documents.
///
/// Missing documents are reported as [`StoreError::NotFound`], never as an engine failure.
#[rocket::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, index: &str, id: &str) -> Result<StoredDocument, StoreError>;

    async fn search(&self, index: &str, body: Value) -> Result<SearchHits, StoreError>;

    /// Inserts a new document and returns the id the engine assigned to it.
    async fn create(&self, index: &str, body: Value) -> Result<String, StoreError>;

    /// Replaces an existing document with `body`; fields missing from `body`
    /// are gone afterwards. Reads the current version first so a missing id is
    /// [`StoreError::NotFound`] and a write racing this one is a conflict.
    async fn update(&self, index: &str, id: &str, body: Value) -> Result<(), StoreError> {
        let current = self.get(index, id).await?;
        let expected = current.version.ok_or_else(|| {
            StoreError::Malformed(format!("document '{id}' in index '{index}' has no version"))
        })?;
        self.replace(index, id, body, expected).await
    }

    /// Writes the whole document only if it is still at `expected`.
    async fn replace(
        &self,
        index: &str,
        id: &str,
        body: Value,
        expected: DocVersion,
    ) -> Result<(), StoreError>;

    async fn delete(&self, index: &str, id: &str) -> Result<(), StoreError>;

    /// Creates the index with `mapping` unless it exists. Returns true if it was created.
    async fn ensure_index(&self, index: &str, mapping: Value) -> Result<bool, StoreError>;
}

impl SearchHits {
    /// Reads `hits.total` and `hits.hits[]` out of an engine search response.
    pub fn from_response(body: &Value) -> Result<Self, StoreError> {
        let hits = body
            .get("hits")
            .ok_or_else(|| StoreError::Malformed("search response without 'hits'".into()))?;

        // `total` is an object since ES 7 and a bare number before.
        let total = hits["total"]["value"]
            .as_u64()
            .or_else(|| hits["total"].as_u64())
            .unwrap_or(0);

        let hits = parse_hits(&hits["hits"]);
        Ok(SearchHits { total, hits })
    }
}

fn parse_hits(hits: &Value) -> Vec<Hit> {
    let empty = vec![];
    hits.as_array()
        .unwrap_or(&empty)
        .iter()
        .map(parse_hit)
        .collect()
}

fn parse_hit(hit: &Value) -> Hit {
    let inner_hits = hit["inner_hits"]
        .as_object()
        .map(|inner| {
            inner
                .iter()
                .map(|(name, result)| (name.clone(), parse_hits(&result["hits"]["hits"])))
                .collect()
        })
        .unwrap_or_default();

    Hit {
        id: hit["_id"].as_str().unwrap_or_default().to_string(),
        score: hit["_score"].as_f64(),
        source: hit.get("_source").cloned().unwrap_or(Value::Null),
        offset: hit["_nested"]["offset"].as_u64().map(|o| o as usize),
        inner_hits,
    }
}

pub fn version_of(body: &Value) -> Option<DocVersion> {
    Some(DocVersion {
        seq_no: body["_seq_no"].as_i64()?,
        primary_term: body["_primary_term"].as_i64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_hits_with_scores_and_inner_hits() {
        let response = json!({
            "took": 3,
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "max_score": 1.3,
                "hits": [
                    {
                        "_index": "playlists",
                        "_id": "p1",
                        "_score": 1.3,
                        "_source": { "title": "Rust talks" },
                        "inner_hits": {
                            "videos": {
                                "hits": {
                                    "total": { "value": 1 },
                                    "hits": [{
                                        "_id": "p1",
                                        "_nested": { "field": "videos", "offset": 2 },
                                        "_score": 0.7,
                                        "_source": { "id": "v3", "url": "https://c" }
                                    }]
                                }
                            }
                        }
                    },
                    { "_id": "p2", "_score": null, "_source": { "title": "Other" } }
                ]
            }
        });

        let parsed = SearchHits::from_response(&response).unwrap();

        assert_eq!(parsed.total, 2);
        assert_eq!(parsed.hits.len(), 2);
        assert_eq!(parsed.hits[0].id, "p1");
        assert_eq!(parsed.hits[0].score, Some(1.3));
        assert_eq!(parsed.hits[1].score, None);

        let inner = &parsed.hits[0].inner_hits["videos"];
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].offset, Some(2));
        assert_eq!(inner[0].source["id"], "v3");
    }

    #[test]
    fn missing_hits_is_malformed() {
        let result = SearchHits::from_response(&json!({ "error": "boom" }));
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    #[test]
    fn reads_document_version() {
        let body = json!({ "_id": "a", "_seq_no": 7, "_primary_term": 2, "found": true });
        assert_eq!(
            version_of(&body),
            Some(DocVersion {
                seq_no: 7,
                primary_term: 2
            })
        );
        assert_eq!(version_of(&json!({ "_id": "a" })), None);
    }

    /// Holds one document and records the calls the default `update` makes.
    struct RecordingStore {
        document: Option<StoredDocument>,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[rocket::async_trait]
    impl DocumentStore for RecordingStore {
        async fn get(&self, index: &str, id: &str) -> Result<StoredDocument, StoreError> {
            self.record(format!("get {index}/{id}"));
            self.document
                .clone()
                .filter(|doc| doc.id == id)
                .ok_or_else(|| StoreError::not_found(index, id))
        }

        async fn search(&self, _index: &str, _body: Value) -> Result<SearchHits, StoreError> {
            Ok(SearchHits::default())
        }

        async fn create(&self, _index: &str, _body: Value) -> Result<String, StoreError> {
            Ok("new".into())
        }

        async fn replace(
            &self,
            index: &str,
            id: &str,
            body: Value,
            expected: DocVersion,
        ) -> Result<(), StoreError> {
            self.record(format!(
                "replace {index}/{id} {body} at {}/{}",
                expected.seq_no, expected.primary_term
            ));
            Ok(())
        }

        async fn delete(&self, _index: &str, _id: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn ensure_index(&self, _index: &str, _mapping: Value) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[rocket::async_test]
    async fn update_writes_the_whole_body_at_the_read_version() {
        let store = RecordingStore {
            document: Some(StoredDocument {
                id: "v1".into(),
                source: json!({ "url": "u", "legacy": true }),
                version: Some(DocVersion {
                    seq_no: 7,
                    primary_term: 2,
                }),
            }),
            calls: Default::default(),
        };

        store.update("videos", "v1", json!({ "url": "u2" })).await.unwrap();

        assert_eq!(
            *store.calls.lock().unwrap(),
            vec![
                "get videos/v1".to_string(),
                r#"replace videos/v1 {"url":"u2"} at 7/2"#.to_string(),
            ]
        );
    }

    #[rocket::async_test]
    async fn update_of_missing_document_never_writes() {
        let store = RecordingStore {
            document: None,
            calls: Default::default(),
        };

        let result = store.update("videos", "nope", json!({})).await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(*store.calls.lock().unwrap(), vec!["get videos/nope".to_string()]);
    }

    #[rocket::async_test]
    async fn in_memory_update_drops_fields_missing_from_the_body() {
        let store = crate::services::memory_store::InMemoryStore::new();
        let id = store
            .create("videos", json!({ "url": "u", "legacy": true }))
            .await
            .unwrap();

        store.update("videos", &id, json!({ "url": "u2" })).await.unwrap();

        let stored = store.get("videos", &id).await.unwrap().source;
        assert_eq!(stored, json!({ "url": "u2" }));
    }
}
