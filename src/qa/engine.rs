use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use crate::database::{ScoredSegment, VectorDB};
use crate::document::{segment_text, Segment};
use crate::embedding::TextEmbedder;
use crate::error::QaError;
use crate::providers::traits::AnswerProvider;

/// Vector-store seam for the engine: collection setup, segment upsert and
/// top-k similarity query. `VectorDB` is the production impl; tests use
/// an in-memory fake.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), QaError>;

    async fn upsert_segments(
        &self,
        collection: &str,
        doc_id: &str,
        segments: &[Segment],
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), QaError>;

    async fn search(
        &self,
        collection: &str,
        doc_id: &str,
        query_vector: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<ScoredSegment>, QaError>;
}

#[async_trait]
impl SegmentStore for VectorDB {
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), QaError> {
        Ok(VectorDB::ensure_collection(self, name, vector_size).await?)
    }

    async fn upsert_segments(
        &self,
        collection: &str,
        doc_id: &str,
        segments: &[Segment],
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), QaError> {
        Ok(VectorDB::upsert_segments(self, collection, doc_id, segments, vectors).await?)
    }

    async fn search(
        &self,
        collection: &str,
        doc_id: &str,
        query_vector: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<ScoredSegment>, QaError> {
        Ok(VectorDB::search(self, collection, doc_id, query_vector, top_k).await?)
    }
}

/// Result of indexing one uploaded document.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    pub doc_id: String,
    pub segments: usize,
    pub words: usize,
}

/// Answer plus the retrieved context it was grounded in.
#[derive(Debug, Clone)]
pub struct QaAnswer {
    pub answer: String,
    pub context: String,
    pub elapsed: Duration,
}

/// Orchestrates extract -> embed -> store -> retrieve -> generate. All
/// collaborators are injected, nothing global.
#[derive(Clone)]
pub struct QaEngine {
    embedder: Arc<dyn TextEmbedder>,
    store: Arc<dyn SegmentStore>,
    provider: Arc<dyn AnswerProvider>,
    collection: String,
    top_k: u64,
}

/// Content-derived document id, replacing a shared hardcoded id so two
/// sessions can never silently overwrite each other's upload.
pub fn document_id(text: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, text.as_bytes()).to_string()
}

/// The generation prompt. The quoted sentence is the verbatim fallback the
/// model must return when the context does not contain the answer.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following context, please answer the question. \
         If the answer cannot be found in the context, say \
         \"I cannot find relevant information to answer this question.\"\n\n\
         Context: {}\n\nQuestion: {}\n\nAnswer:",
        context, question
    )
}

fn join_match_texts(matches: &[ScoredSegment]) -> String {
    matches
        .iter()
        .filter_map(|m| m.text.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
}

impl QaEngine {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        store: Arc<dyn SegmentStore>,
        provider: Arc<dyn AnswerProvider>,
        collection: String,
        top_k: u64,
    ) -> Self {
        Self {
            embedder,
            store,
            provider,
            collection,
            top_k,
        }
    }

    /// Segment, embed and upsert a document. Runs once per upload; asking
    /// questions afterwards never re-embeds the document.
    pub async fn index_document(&self, text: &str) -> Result<DocumentIndex, QaError> {
        let segments = segment_text(text);
        if segments.is_empty() {
            return Err(QaError::Extraction(
                "Document contains no extractable text".to_string(),
            ));
        }

        let doc_id = document_id(text);
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        self.store
            .ensure_collection(&self.collection, self.embedder.dimensions() as u64)
            .await?;
        self.store
            .upsert_segments(&self.collection, &doc_id, &segments, vectors)
            .await?;

        log::info!("Indexed document {} ({} segments)", doc_id, segments.len());

        Ok(DocumentIndex {
            doc_id,
            segments: segments.len(),
            words: text.split_whitespace().count(),
        })
    }

    /// Answer a question against one indexed document: embed the question,
    /// query top-k scoped to `doc_id`, join the matched texts (single
    /// spaces, skipping matches without a text payload), prompt the
    /// generator. Segments of other documents never enter the ranking.
    pub async fn ask(&self, question: &str, doc_id: &str) -> Result<QaAnswer, QaError> {
        let start = Instant::now();

        let mut question_vectors = self.embedder.embed(&[question.to_string()]).await?;
        if question_vectors.is_empty() {
            return Err(QaError::Embedding(
                "No embedding returned for question".to_string(),
            ));
        }
        let question_embedding = question_vectors.remove(0);

        let matches = self
            .store
            .search(&self.collection, doc_id, question_embedding, self.top_k)
            .await?;

        let context = join_match_texts(&matches);
        let prompt = build_prompt(&context, question);
        let answer = self.provider.generate(&prompt).await?;

        Ok(QaAnswer {
            answer,
            context,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::VectorDB;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const DIM: usize = 384;

    /// Deterministic fake: hashes each word into a fixed-size vector, so
    /// similar texts get similar vectors and every output is 384-dim.
    struct FakeEmbedder;

    #[async_trait]
    impl TextEmbedder for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QaError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut vector = vec![0.0f32; DIM];
                    for word in text.split_whitespace() {
                        let slot = word
                            .bytes()
                            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                            % DIM;
                        vector[slot] += 1.0;
                    }
                    vector
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            DIM
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl TextEmbedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, QaError> {
            Err(QaError::Embedding("model invocation failed".to_string()))
        }

        fn dimensions(&self) -> usize {
            DIM
        }
    }

    #[derive(Clone)]
    struct StoredPoint {
        doc_id: String,
        vector: Vec<f32>,
        text: Option<String>,
    }

    /// In-memory store keyed by the same deterministic point ids the real
    /// store uses; search is brute-force cosine similarity.
    struct FakeStore {
        points: Mutex<HashMap<String, StoredPoint>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                points: Mutex::new(HashMap::new()),
            }
        }

        fn len(&self) -> usize {
            self.points.lock().unwrap().len()
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }

    #[async_trait]
    impl SegmentStore for FakeStore {
        async fn ensure_collection(&self, _name: &str, _vector_size: u64) -> Result<(), QaError> {
            Ok(())
        }

        async fn upsert_segments(
            &self,
            _collection: &str,
            doc_id: &str,
            segments: &[Segment],
            vectors: Vec<Vec<f32>>,
        ) -> Result<(), QaError> {
            let mut points = self.points.lock().unwrap();
            for (segment, vector) in segments.iter().zip(vectors) {
                points.insert(
                    VectorDB::point_id(doc_id, segment.index),
                    StoredPoint {
                        doc_id: doc_id.to_string(),
                        vector,
                        text: Some(segment.text.clone()),
                    },
                );
            }
            Ok(())
        }

        async fn search(
            &self,
            _collection: &str,
            doc_id: &str,
            query_vector: Vec<f32>,
            top_k: u64,
        ) -> Result<Vec<ScoredSegment>, QaError> {
            let points = self.points.lock().unwrap();
            let mut scored: Vec<ScoredSegment> = points
                .iter()
                .filter(|(_, point)| point.doc_id == doc_id)
                .map(|(id, point)| ScoredSegment {
                    id: id.clone(),
                    score: cosine(&query_vector, &point.vector),
                    text: point.text.clone(),
                })
                .collect();
            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            scored.truncate(top_k as usize);
            Ok(scored)
        }
    }

    struct FailingStore;

    #[async_trait]
    impl SegmentStore for FailingStore {
        async fn ensure_collection(&self, _name: &str, _vector_size: u64) -> Result<(), QaError> {
            Ok(())
        }

        async fn upsert_segments(
            &self,
            _collection: &str,
            _doc_id: &str,
            _segments: &[Segment],
            _vectors: Vec<Vec<f32>>,
        ) -> Result<(), QaError> {
            Err(QaError::Store(
                crate::database::VectorDBError::Operation("service unavailable".to_string()),
            ))
        }

        async fn search(
            &self,
            _collection: &str,
            _doc_id: &str,
            _query_vector: Vec<f32>,
            _top_k: u64,
        ) -> Result<Vec<ScoredSegment>, QaError> {
            Err(QaError::Store(
                crate::database::VectorDBError::Operation("service unavailable".to_string()),
            ))
        }
    }

    /// Echoes the prompt back so tests can inspect what the generator saw.
    struct EchoProvider;

    #[async_trait]
    impl AnswerProvider for EchoProvider {
        async fn generate(&self, prompt: &str) -> Result<String, QaError> {
            Ok(prompt.to_string())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    struct PanicProvider;

    #[async_trait]
    impl AnswerProvider for PanicProvider {
        async fn generate(&self, _prompt: &str) -> Result<String, QaError> {
            panic!("generator must not be called when retrieval fails");
        }

        fn model_name(&self) -> &str {
            "panic"
        }
    }

    fn engine_with(store: Arc<dyn SegmentStore>, provider: Arc<dyn AnswerProvider>) -> QaEngine {
        QaEngine::new(
            Arc::new(FakeEmbedder),
            store,
            provider,
            "ragbot".to_string(),
            3,
        )
    }

    #[tokio::test]
    async fn fake_embedder_matches_model_dimensions() {
        let vectors = FakeEmbedder
            .embed(&["the sky is blue".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].len(), 384);
    }

    #[tokio::test]
    async fn indexing_reports_segments_and_words() {
        let store = Arc::new(FakeStore::new());
        let engine = engine_with(store.clone(), Arc::new(EchoProvider));

        let index = engine.index_document("the sky is blue").await.unwrap();
        assert_eq!(index.segments, 1);
        assert_eq!(index.words, 4);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn reindexing_the_same_document_overwrites() {
        let store = Arc::new(FakeStore::new());
        let engine = engine_with(store.clone(), Arc::new(EchoProvider));

        engine.index_document("the sky is blue").await.unwrap();
        engine.index_document("the sky is blue").await.unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn different_documents_do_not_collide() {
        let store = Arc::new(FakeStore::new());
        let engine = engine_with(store.clone(), Arc::new(EchoProvider));

        engine.index_document("the sky is blue").await.unwrap();
        engine.index_document("grass is green").await.unwrap();

        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn indexing_empty_text_is_an_extraction_error() {
        let engine = engine_with(Arc::new(FakeStore::new()), Arc::new(EchoProvider));
        let err = engine.index_document("   ").await.unwrap_err();
        assert!(matches!(err, QaError::Extraction(_)));
    }

    #[tokio::test]
    async fn ask_grounds_the_prompt_in_retrieved_context() {
        let store = Arc::new(FakeStore::new());
        let engine = engine_with(store.clone(), Arc::new(EchoProvider));

        let index = engine.index_document("the sky is blue").await.unwrap();
        let result = engine
            .ask("what color is the sky", &index.doc_id)
            .await
            .unwrap();

        assert_eq!(result.context, "the sky is blue");
        // EchoProvider returns the prompt; it must embed the context, the
        // question and the literal fallback instruction.
        assert!(result.answer.contains("Context: the sky is blue"));
        assert!(result.answer.contains("Question: what color is the sky"));
        assert!(result
            .answer
            .contains("I cannot find relevant information to answer this question."));
    }

    #[tokio::test]
    async fn self_similarity_ranks_own_segment_first() {
        let store = Arc::new(FakeStore::new());
        let engine = engine_with(store.clone(), Arc::new(EchoProvider));

        let index = engine.index_document("the sky is blue").await.unwrap();
        engine.index_document("completely unrelated words here").await.unwrap();

        let result = engine.ask("the sky is blue", &index.doc_id).await.unwrap();
        assert!(result.context.starts_with("the sky is blue"));
    }

    #[tokio::test]
    async fn retrieval_never_pulls_another_documents_segments() {
        let store = Arc::new(FakeStore::new());
        let engine = engine_with(store.clone(), Arc::new(EchoProvider));

        engine.index_document("the sky is blue").await.unwrap();
        let current = engine.index_document("grass is green").await.unwrap();

        // The question matches the first document far better, but the
        // session is answering against the second; its segments must not
        // leak into the context.
        let result = engine
            .ask("what color is the sky", &current.doc_id)
            .await
            .unwrap();
        assert_eq!(result.context, "grass is green");
        assert!(!result.context.contains("sky"));
    }

    #[tokio::test]
    async fn matches_without_text_payload_are_skipped() {
        let store = Arc::new(FakeStore::new());
        {
            let mut points = store.points.lock().unwrap();
            points.insert(
                "a".to_string(),
                StoredPoint {
                    doc_id: "doc-a".to_string(),
                    vector: vec![1.0; DIM],
                    text: Some("first".to_string()),
                },
            );
            points.insert(
                "b".to_string(),
                StoredPoint {
                    doc_id: "doc-a".to_string(),
                    vector: vec![1.0; DIM],
                    text: None,
                },
            );
            points.insert(
                "c".to_string(),
                StoredPoint {
                    doc_id: "doc-a".to_string(),
                    vector: vec![1.0; DIM],
                    text: Some("second".to_string()),
                },
            );
        }
        let engine = engine_with(store, Arc::new(EchoProvider));

        let result = engine.ask("anything", "doc-a").await.unwrap();
        let mut parts: Vec<&str> = result.context.split(' ').collect();
        parts.sort();
        assert_eq!(parts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn store_failure_propagates_without_calling_the_generator() {
        let engine = engine_with(Arc::new(FailingStore), Arc::new(PanicProvider));
        let err = engine
            .ask("what color is the sky", "doc-a")
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::Store(_)));
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let engine = QaEngine::new(
            Arc::new(FailingEmbedder),
            Arc::new(FakeStore::new()),
            Arc::new(PanicProvider),
            "ragbot".to_string(),
            3,
        );
        let err = engine.ask("anything", "doc-a").await.unwrap_err();
        assert!(matches!(err, QaError::Embedding(_)));
    }

    #[test]
    fn document_ids_are_content_derived() {
        assert_eq!(document_id("same text"), document_id("same text"));
        assert_ne!(document_id("same text"), document_id("other text"));
    }

    #[test]
    fn prompt_contains_fallback_context_and_question() {
        let prompt = build_prompt("the sky is blue", "what color is the sky");
        assert!(prompt.contains("Context: the sky is blue"));
        assert!(prompt.contains("Question: what color is the sky"));
        assert!(prompt.contains("\"I cannot find relevant information to answer this question.\""));
        assert!(prompt.ends_with("Answer:"));
    }
}
