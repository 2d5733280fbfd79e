use crate::error::StoreError;
use crate::services::store::{version_of, DocVersion, DocumentStore, SearchHits, StoredDocument};
use elasticsearch::http::response::Response;
use elasticsearch::http::StatusCode;
use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use elasticsearch::params::Refresh;
use elasticsearch::{DeleteParts, Elasticsearch, GetParts, IndexParts, SearchParts};
use log::{debug, info};
use serde_json::Value;

pub struct ElasticStore {
    client: Elasticsearch,
    refresh: Refresh,
}

impl ElasticStore {
    pub fn new(client: Elasticsearch) -> Self {
        Self {
            client,
            // Writes are visible to the next search.
            refresh: Refresh::WaitFor,
        }
    }
}

/// Turns a non-success engine response into an error carrying the engine's reason.
async fn engine_failure(response: Response) -> StoreError {
    let status = response.status_code();
    let text = response.text().await.unwrap_or_default();

    let reason = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            let error = &body["error"];
            match (error["type"].as_str(), error["reason"].as_str()) {
                (Some(kind), Some(reason)) => Some(format!("{kind}: {reason}")),
                (_, Some(reason)) => Some(reason.to_string()),
                _ => error.as_str().map(String::from),
            }
        })
        .unwrap_or(text);

    StoreError::Engine(format!("{status}: {reason}"))
}

#[rocket::async_trait]
impl DocumentStore for ElasticStore {
    async fn get(&self, index: &str, id: &str) -> Result<StoredDocument, StoreError> {
        let response = self
            .client
            .get(GetParts::IndexId(index, id))
            .send()
            .await?;

        match response.status_code() {
            StatusCode::NOT_FOUND => Err(StoreError::not_found(index, id)),
            status if status.is_success() => {
                let body = response.json::<Value>().await?;
                debug!("Fetched document {id} from {index}");
                Ok(StoredDocument {
                    id: id.to_string(),
                    version: version_of(&body),
                    source: body.get("_source").cloned().unwrap_or(Value::Null),
                })
            }
            _ => Err(engine_failure(response).await),
        }
    }

    async fn search(&self, index: &str, body: Value) -> Result<SearchHits, StoreError> {
        debug!("Searching {index} with {body}");
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(engine_failure(response).await);
        }

        let body = response.json::<Value>().await?;
        SearchHits::from_response(&body)
    }

    async fn create(&self, index: &str, body: Value) -> Result<String, StoreError> {
        let response = self
            .client
            .index(IndexParts::Index(index))
            .refresh(self.refresh)
            .body(body)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(engine_failure(response).await);
        }

        let body = response.json::<Value>().await?;
        let id = body["_id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| StoreError::Malformed("index response without '_id'".into()))?;

        info!("Created document {id} in {index}");
        Ok(id)
    }

    async fn replace(
        &self,
        index: &str,
        id: &str,
        body: Value,
        expected: DocVersion,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .if_seq_no(expected.seq_no)
            .if_primary_term(expected.primary_term)
            .refresh(self.refresh)
            .body(body)
            .send()
            .await?;

        match response.status_code() {
            StatusCode::CONFLICT => Err(StoreError::conflict(index, id)),
            status if status.is_success() => {
                info!("Replaced document {id} in {index}");
                Ok(())
            }
            _ => Err(engine_failure(response).await),
        }
    }

    async fn delete(&self, index: &str, id: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .refresh(self.refresh)
            .send()
            .await?;

        match response.status_code() {
            StatusCode::NOT_FOUND => Err(StoreError::not_found(index, id)),
            status if status.is_success() => {
                info!("Deleted document {id} from {index}");
                Ok(())
            }
            _ => Err(engine_failure(response).await),
        }
    }

    async fn ensure_index(&self, index: &str, mapping: Value) -> Result<bool, StoreError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await?;

        if exists.status_code().is_success() {
            return Ok(false);
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(mapping)
            .send()
            .await?;

        if response.status_code().is_success() {
            return Ok(true);
        }

        let failure = engine_failure(response).await;
        if failure.to_string().contains("resource_already_exists_exception") {
            Ok(false)
        } else {
            Err(failure)
        }
    }
}
