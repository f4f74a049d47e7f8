use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::QaError;

/// Output dimensionality of all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;
const MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Text-to-vector seam. The engine only sees this trait, so tests can
/// substitute a fake and skip the model download entirely.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QaError>;

    fn dimensions(&self) -> usize;
}

/// Local sentence embedder running all-MiniLM-L6-v2 through fastembed's
/// ONNX runtime. Deterministic for a fixed model version, no network
/// calls after the first model download.
pub struct MiniLmEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl MiniLmEmbedder {
    pub fn new() -> Result<Self, QaError> {
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(true);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| QaError::Embedding(format!("Failed to load {}: {}", MODEL_NAME, e)))?;
        log::info!("Loaded embedding model {}", MODEL_NAME);
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl TextEmbedder for MiniLmEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QaError> {
        // ONNX inference is CPU-bound; keep it off the async workers.
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| format!("Model lock poisoned: {}", e))?;
            model
                .embed(texts, None)
                .map_err(|e| format!("Failed to encode text: {}", e))
        })
        .await
        .map_err(|e| QaError::Embedding(format!("Encoding task failed: {}", e)))?
        .map_err(QaError::Embedding)?;

        // Every caller depends on the fixed dimensionality.
        for vector in &vectors {
            if vector.len() != EMBEDDING_DIM {
                return Err(QaError::Embedding(format!(
                    "Embedding has wrong size: {} (expected {})",
                    vector.len(),
                    EMBEDDING_DIM
                )));
            }
        }

        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}
