use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use qdrant_client::{
    config::QdrantConfig,
    qdrant::{
        point_id::PointIdOptions, with_payload_selector::SelectorOptions, Condition,
        CreateCollection, Distance, Filter, PointId, PointStruct, SearchPoints, UpsertPoints,
        Value, VectorParams, VectorsConfig, WithPayloadSelector,
    },
    Qdrant, QdrantError,
};
use thiserror::Error;
use uuid::Uuid;

use crate::document::Segment;

const MAX_ATTEMPTS: usize = 3;
const RETRY_DELAY_MS: u64 = 500;

#[derive(Error, Debug)]
pub enum VectorDBError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
}

/// One ranked match from a similarity query. `text` is `None` when the
/// stored payload lacks the expected field; callers skip those.
#[derive(Debug, Clone)]
pub struct ScoredSegment {
    pub id: String,
    pub score: f32,
    pub text: Option<String>,
}

#[derive(Clone)]
pub struct VectorDB {
    client: Arc<Qdrant>,
}

impl VectorDB {
    /// Connect and probe the server. qdrant-client speaks gRPC, so the
    /// conventional REST port 6333 is mapped to 6334.
    pub async fn connect(url: &str) -> Result<Self, VectorDBError> {
        let bare = url.split("://").last().unwrap_or(url);
        let grpc_addr = if bare.ends_with(":6333") {
            bare.replace(":6333", ":6334")
        } else {
            bare.to_string()
        };

        let mut config = QdrantConfig::from_url(&format!("http://{}", grpc_addr));
        config.check_compatibility = false;
        config.timeout = Duration::from_secs(30);
        config.connect_timeout = Duration::from_secs(10);

        let client = Qdrant::new(config).map_err(|e| VectorDBError::Connection(e.to_string()))?;

        client.list_collections().await.map_err(|e| {
            VectorDBError::Connection(format!("Failed to reach Qdrant at {}: {}", grpc_addr, e))
        })?;
        log::info!("Connected to Qdrant at {}", grpc_addr);

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create the collection with cosine distance if it does not exist yet.
    pub async fn ensure_collection(
        &self,
        name: &str,
        vector_size: u64,
    ) -> Result<(), VectorDBError> {
        let vectors_config = VectorsConfig {
            config: Some(qdrant_client::qdrant::vectors_config::Config::Params(
                VectorParams {
                    size: vector_size,
                    distance: Distance::Cosine.into(),
                    ..Default::default()
                },
            )),
        };

        let request = CreateCollection {
            collection_name: name.to_string(),
            vectors_config: Some(vectors_config),
            ..Default::default()
        };

        match self.client.create_collection(request).await {
            Ok(_) => {
                log::info!("Created collection {}", name);
                Ok(())
            }
            Err(e) if e.to_string().contains("AlreadyExists") => Ok(()),
            Err(e) => Err(VectorDBError::Operation(e.to_string())),
        }
    }

    /// Deterministic point id for a document segment. Re-indexing the same
    /// document hits the same ids, so upserts overwrite instead of
    /// accumulating duplicates.
    pub fn point_id(doc_id: &str, segment_index: usize) -> String {
        Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("{}:{}", doc_id, segment_index).as_bytes(),
        )
        .to_string()
    }

    /// Store one vector per segment, with the segment text in the payload
    /// so queries can hand back the source context.
    pub async fn upsert_segments(
        &self,
        collection: &str,
        doc_id: &str,
        segments: &[Segment],
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), VectorDBError> {
        let points: Vec<PointStruct> = segments
            .iter()
            .zip(vectors)
            .map(|(segment, vector)| {
                let mut payload: HashMap<String, Value> = HashMap::new();
                payload.insert("text".to_string(), Value::from(segment.text.clone()));
                payload.insert("doc_id".to_string(), Value::from(doc_id.to_string()));
                payload.insert("segment".to_string(), Value::from(segment.index as i64));

                PointStruct {
                    id: Some(PointId {
                        point_id_options: Some(PointIdOptions::Uuid(Self::point_id(
                            doc_id,
                            segment.index,
                        ))),
                    }),
                    vectors: Some(vector.into()),
                    payload,
                }
            })
            .collect();

        let request = UpsertPoints {
            collection_name: collection.to_string(),
            points,
            ..Default::default()
        };

        let mut attempt = 1;
        loop {
            match self.client.upsert_points(request.clone()).await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                    log::warn!("Upsert attempt {}/{} failed: {}", attempt, MAX_ATTEMPTS, e);
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64))
                        .await;
                    attempt += 1;
                }
                Err(e) => return Err(VectorDBError::Operation(e.to_string())),
            }
        }
    }

    /// Top-k nearest segments by cosine similarity, ranked descending,
    /// payloads included. Scoped to one document via the `doc_id` payload
    /// field, so stale uploads from other sessions never compete in the
    /// ranking. Returns no partial results on failure.
    pub async fn search(
        &self,
        collection: &str,
        doc_id: &str,
        query_vector: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<ScoredSegment>, VectorDBError> {
        let request = SearchPoints {
            collection_name: collection.to_string(),
            vector: query_vector,
            limit: top_k,
            filter: Some(Filter::must([Condition::matches(
                "doc_id",
                doc_id.to_string(),
            )])),
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let mut attempt = 1;
        let results = loop {
            match self.client.search_points(request.clone()).await {
                Ok(results) => break results,
                Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                    log::warn!("Search attempt {}/{} failed: {}", attempt, MAX_ATTEMPTS, e);
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64))
                        .await;
                    attempt += 1;
                }
                Err(e) => return Err(VectorDBError::Operation(e.to_string())),
            }
        };

        let matches = results
            .result
            .into_iter()
            .map(|point| {
                let id = match point.id.and_then(|id| id.point_id_options) {
                    Some(PointIdOptions::Uuid(uuid)) => uuid,
                    _ => String::new(),
                };
                let text = point
                    .payload
                    .get("text")
                    .cloned()
                    .and_then(|v| serde_json::Value::try_from(v).ok())
                    .and_then(|v| v.as_str().map(str::to_string));
                ScoredSegment {
                    id,
                    score: point.score,
                    text,
                }
            })
            .collect();

        Ok(matches)
    }
}

/// Transport-level failures worth a bounded retry. Anything else (bad
/// request, missing collection) propagates immediately.
fn is_transient(err: &QdrantError) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("unavailable")
        || msg.contains("timed out")
        || msg.contains("timeout")
        || msg.contains("transport")
        || msg.contains("connection")
}
