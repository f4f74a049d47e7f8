use std::env;

use crate::error::QaError;

/// Runtime configuration, read from the environment so credentials never
/// live in source. `dotenv` is loaded by the binary before this runs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cohere_api_key: String,
    pub cohere_model: String,
    pub qdrant_url: String,
    pub collection: String,
    pub top_k: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self, QaError> {
        let cohere_api_key = env::var("COHERE_API_KEY")
            .map_err(|_| QaError::Config("COHERE_API_KEY must be set".to_string()))?;

        let cohere_model = env::var("COHERE_MODEL")
            .unwrap_or_else(|_| "command".to_string());

        let qdrant_url = env::var("QDRANT_URL")
            .unwrap_or_else(|_| "http://localhost:6333".to_string());

        let collection = env::var("QDRANT_COLLECTION")
            .unwrap_or_else(|_| "ragbot".to_string());

        let top_k = env::var("QA_TOP_K")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        Ok(Self {
            cohere_api_key,
            cohere_model,
            qdrant_url,
            collection,
            top_k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_config_error() {
        std::env::remove_var("COHERE_API_KEY");
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, QaError::Config(_)));
    }
}
