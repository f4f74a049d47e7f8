use async_trait::async_trait;

use crate::error::QaError;

/// Seam for the hosted text-generation API. The engine depends on this
/// trait only, so tests inject fakes instead of live HTTP clients.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Produce one completion for a fully formatted prompt. Failures
    /// propagate as errors, never as error-shaped answer text.
    async fn generate(&self, prompt: &str) -> Result<String, QaError>;

    fn model_name(&self) -> &str;
}
