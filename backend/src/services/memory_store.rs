use crate::error::StoreError;
use crate::services::store::{DocVersion, DocumentStore, Hit, SearchHits, StoredDocument};
use log::{debug, info};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const PRIMARY_TERM: i64 = 1;

struct Entry {
    id: String,
    source: Value,
    seq_no: i64,
}

/// Process-local document store understanding the subset of the query DSL
/// this service emits. Used for local runs and tests.
///
/// Relevance is the number of distinct query terms found in the best
/// matching field; ties keep insertion order.
#[derive(Default)]
pub struct InMemoryStore {
    indices: RwLock<HashMap<String, Vec<Entry>>>,
    seq_no: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<Entry>>>, StoreError> {
        self.indices
            .read()
            .map_err(|_| StoreError::Engine("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<Entry>>>, StoreError> {
        self.indices
            .write()
            .map_err(|_| StoreError::Engine("in-memory store lock poisoned".into()))
    }

    fn next_seq_no(&self) -> i64 {
        self.seq_no.fetch_add(1, AtomicOrdering::SeqCst)
    }
}

#[rocket::async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, index: &str, id: &str) -> Result<StoredDocument, StoreError> {
        let indices = self.read()?;
        let entry = indices
            .get(index)
            .and_then(|entries| entries.iter().find(|e| e.id == id))
            .ok_or_else(|| StoreError::not_found(index, id))?;

        Ok(StoredDocument {
            id: entry.id.clone(),
            source: entry.source.clone(),
            version: Some(DocVersion {
                seq_no: entry.seq_no,
                primary_term: PRIMARY_TERM,
            }),
        })
    }

    async fn search(&self, index: &str, body: Value) -> Result<SearchHits, StoreError> {
        let from = body["from"].as_u64().unwrap_or(0) as usize;
        let size = body["size"].as_u64().unwrap_or(10) as usize;
        let query = body
            .get("query")
            .cloned()
            .unwrap_or_else(|| json!({ "match_all": {} }));

        let indices = self.read()?;
        let mut matched = Vec::new();
        for entry in indices.get(index).map(Vec::as_slice).unwrap_or_default() {
            if let Some(m) = evaluate(&query, &entry.id, &entry.source)? {
                matched.push(Hit {
                    id: entry.id.clone(),
                    score: Some(m.score),
                    source: entry.source.clone(),
                    offset: None,
                    inner_hits: m.inner_hits,
                });
            }
        }

        // Stable, so equal scores stay in insertion order.
        matched.sort_by(|a, b| compare_scores(b.score, a.score));
        debug!("In-memory search on {index} matched {} documents", matched.len());

        Ok(SearchHits {
            total: matched.len() as u64,
            hits: matched.into_iter().skip(from).take(size).collect(),
        })
    }

    async fn create(&self, index: &str, body: Value) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let seq_no = self.next_seq_no();
        self.write()?.entry(index.to_string()).or_default().push(Entry {
            id: id.clone(),
            source: body,
            seq_no,
        });
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
        let seq_no = self.next_seq_no();
        let mut indices = self.write()?;
        let entry = indices
            .get_mut(index)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
            .ok_or_else(|| StoreError::conflict(index, id))?;

        if entry.seq_no != expected.seq_no || expected.primary_term != PRIMARY_TERM {
            return Err(StoreError::conflict(index, id));
        }

        entry.source = body;
        entry.seq_no = seq_no;
        Ok(())
    }

    async fn delete(&self, index: &str, id: &str) -> Result<(), StoreError> {
        let mut indices = self.write()?;
        let entries = indices
            .get_mut(index)
            .ok_or_else(|| StoreError::not_found(index, id))?;
        let position = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| StoreError::not_found(index, id))?;

        entries.remove(position);
        info!("Deleted document {id} from {index}");
        Ok(())
    }

    async fn ensure_index(&self, index: &str, _mapping: Value) -> Result<bool, StoreError> {
        let mut indices = self.write()?;
        if indices.contains_key(index) {
            return Ok(false);
        }
        indices.insert(index.to_string(), Vec::new());
        Ok(true)
    }
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(0.0)
        .partial_cmp(&b.unwrap_or(0.0))
        .unwrap_or(Ordering::Equal)
}

struct Match {
    score: f64,
    inner_hits: HashMap<String, Vec<Hit>>,
}

impl Match {
    fn scored(score: f64) -> Option<Self> {
        Some(Self {
            score,
            inner_hits: HashMap::new(),
        })
    }
}

fn unsupported(clause: &str) -> StoreError {
    StoreError::Engine(format!(
        "parsing_exception: unsupported query clause [{clause}]"
    ))
}

/// Returns the match for `doc`, or None when the query excludes it.
fn evaluate(query: &Value, id: &str, doc: &Value) -> Result<Option<Match>, StoreError> {
    let clause = query
        .as_object()
        .filter(|object| object.len() == 1)
        .ok_or_else(|| StoreError::Engine("parsing_exception: query must hold exactly one clause".into()))?;
    let (name, body) = clause.iter().next().ok_or_else(|| unsupported("empty"))?;

    match name.as_str() {
        "match_all" => Ok(Match::scored(1.0)),
        "ids" => {
            let values = body["values"].as_array().ok_or_else(|| unsupported("ids"))?;
            Ok(values
                .iter()
                .any(|v| v.as_str() == Some(id))
                .then(|| Match::scored(1.0))
                .flatten())
        }
        "term" => {
            let (field, expected) = single_field(body, "value").ok_or_else(|| unsupported("term"))?;
            let found = if field == "_id" {
                expected.as_str() == Some(id)
            } else {
                field_values(doc, &field).into_iter().any(|v| v == &expected)
            };
            Ok(found.then(|| Match::scored(1.0)).flatten())
        }
        "match" => {
            let (field, text) = single_field(body, "query").ok_or_else(|| unsupported("match"))?;
            let text = value_text(&text);
            Ok(positive(field_score(doc, &field, &text)))
        }
        "multi_match" => {
            let text = body["query"].as_str().ok_or_else(|| unsupported("multi_match"))?;
            let fields: Vec<String> = body["fields"]
                .as_array()
                .map(|fields| {
                    fields
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|f| f.split('^').next().unwrap_or(f).to_string())
                        .collect()
                })
                .filter(|fields: &Vec<String>| !fields.is_empty())
                .unwrap_or_else(|| text_fields(doc));

            // best_fields: the single best field decides the score.
            let best = fields
                .iter()
                .map(|field| field_score(doc, field, text))
                .fold(0.0, f64::max);
            Ok(positive(best))
        }
        "nested" => evaluate_nested(body, id, doc),
        "bool" => evaluate_bool(body, id, doc),
        other => Err(unsupported(other)),
    }
}

fn evaluate_nested(body: &Value, id: &str, doc: &Value) -> Result<Option<Match>, StoreError> {
    let path = body["path"].as_str().ok_or_else(|| unsupported("nested"))?;
    let query = body.get("query").ok_or_else(|| unsupported("nested"))?;

    let empty = vec![];
    let children = doc[path].as_array().unwrap_or(&empty);

    let mut matched = Vec::new();
    for (offset, child) in children.iter().enumerate() {
        // Inner queries address fields as `path.field`.
        let scoped = json!({ path: child });
        if let Some(m) = evaluate(query, id, &scoped)? {
            matched.push(Hit {
                id: id.to_string(),
                score: Some(m.score),
                source: child.clone(),
                offset: Some(offset),
                inner_hits: HashMap::new(),
            });
        }
    }

    if matched.is_empty() {
        return Ok(None);
    }

    let score = matched.iter().filter_map(|h| h.score).sum::<f64>() / matched.len() as f64;
    let mut inner_hits = HashMap::new();
    if let Some(options) = body.get("inner_hits") {
        let name = options["name"].as_str().unwrap_or(path).to_string();
        let from = options["from"].as_u64().unwrap_or(0) as usize;
        let size = options["size"].as_u64().unwrap_or(3) as usize;
        matched.sort_by(|a, b| compare_scores(b.score, a.score));
        inner_hits.insert(name, matched.into_iter().skip(from).take(size).collect());
    }

    Ok(Some(Match { score, inner_hits }))
}

fn evaluate_bool(body: &Value, id: &str, doc: &Value) -> Result<Option<Match>, StoreError> {
    let clauses = |name: &str| -> Vec<Value> {
        match &body[name] {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            single => vec![single.clone()],
        }
    };

    let mut score = 0.0;
    let mut inner_hits = HashMap::new();

    for query in clauses("must") {
        match evaluate(&query, id, doc)? {
            Some(m) => {
                score += m.score;
                inner_hits.extend(m.inner_hits);
            }
            None => return Ok(None),
        }
    }

    for query in clauses("filter") {
        match evaluate(&query, id, doc)? {
            Some(m) => inner_hits.extend(m.inner_hits),
            None => return Ok(None),
        }
    }

    for query in clauses("must_not") {
        if evaluate(&query, id, doc)?.is_some() {
            return Ok(None);
        }
    }

    let should = clauses("should");
    let mut should_matched = false;
    for query in &should {
        if let Some(m) = evaluate(query, id, doc)? {
            should_matched = true;
            score += m.score;
            inner_hits.extend(m.inner_hits);
        }
    }

    let only_should = clauses("must").is_empty() && clauses("filter").is_empty();
    if only_should && !should.is_empty() && !should_matched {
        return Ok(None);
    }

    Ok(Some(Match {
        score: if score > 0.0 { score } else { 1.0 },
        inner_hits,
    }))
}

fn positive(score: f64) -> Option<Match> {
    if score > 0.0 {
        Match::scored(score)
    } else {
        None
    }
}

/// Accepts `{field: value}` and `{field: {key: value}}`.
fn single_field(body: &Value, key: &str) -> Option<(String, Value)> {
    let (field, value) = body.as_object()?.iter().next()?;
    let value = match value {
        Value::Object(options) => options.get(key)?.clone(),
        other => other.clone(),
    };
    Some((field.clone(), value))
}

/// Resolves a dotted path, flattening arrays on the way like the engine does.
fn field_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        current = current
            .into_iter()
            .flat_map(|value| match value {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .filter_map(|value| value.get(segment))
            .collect();
    }

    current
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn text_fields(doc: &Value) -> Vec<String> {
    doc.as_object()
        .map(Map::keys)
        .into_iter()
        .flatten()
        .filter(|key| doc[key.as_str()].is_string())
        .cloned()
        .collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn field_score(doc: &Value, field: &str, text: &str) -> f64 {
    let query_tokens = tokenize(text);
    if query_tokens.is_empty() {
        return 0.0;
    }

    let field_tokens: HashSet<String> = field_values(doc, field)
        .into_iter()
        .flat_map(|value| tokenize(&value_text(value)))
        .collect();

    query_tokens.intersection(&field_tokens).count() as f64
}
