//! Model providers.
//!
//! Providers are configured from TOML tables such as:
//!
//! ```toml
//! service = "openai"
//! base-url = "https://api.openai.com/v1"
//! api-key = "sk-..."
//! model = "gpt-4o-mini"
//! ```

use crate::{
    completion::CompletionModelHandle, embeddings::EmbeddingModelHandle,
    extension::TomlTableExt,
};
use toml::Table;

pub mod openai;

/// Errors raised when configuring providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A required configuration field is absent.
    #[error("the `{0}` field should be specified")]
    MissingField(&'static str),

    /// The service is not supported.
    #[error("service `{0}` is unsupported")]
    UnsupportedService(String),
}

/// Creates a completion model from the provider config.
/// The `service` field defaults to `openai`.
pub fn completion_model(config: &Table) -> Result<CompletionModelHandle, ProviderError> {
    let service = config.get_str("service").unwrap_or("openai");
    match service {
        "openai" => {
            let client = openai::Client::try_new(config)?;
            let model = config
                .get_str("model")
                .ok_or(ProviderError::MissingField("model"))?;
            Ok(CompletionModelHandle::new(client.completion_model(model)))
        }
        _ => Err(ProviderError::UnsupportedService(service.to_owned())),
    }
}

/// Creates an embedding model from the provider config.
/// The `service` field defaults to `openai`.
pub fn embedding_model(config: &Table) -> Result<EmbeddingModelHandle, ProviderError> {
    let service = config.get_str("service").unwrap_or("openai");
    match service {
        "openai" => {
            let client = openai::Client::try_new(config)?;
            let model = config
                .get_str("model")
                .ok_or(ProviderError::MissingField("model"))?;
            let ndims = config.get_usize("dimensions").unwrap_or_default();
            Ok(EmbeddingModelHandle::new(client.embedding_model(model, ndims)))
        }
        _ => Err(ProviderError::UnsupportedService(service.to_owned())),
    }
}
