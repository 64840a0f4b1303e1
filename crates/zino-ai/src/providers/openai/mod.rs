//! OpenAI-compatible chat completions and embeddings.

mod client;
mod completion;
mod embedding;

pub use client::Client;
pub use completion::{
    ChatResponse, Choice, CompletionModel, ResponseFunction, ResponseMessage, ResponseToolCall,
};
pub use embedding::EmbeddingModel;

/// Token usage reported by the API.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct ApiUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens.
    #[serde(default)]
    pub total_tokens: u64,
}

impl From<ApiUsage> for crate::completion::Usage {
    fn from(usage: ApiUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Extracts the error message from an API error body.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .map(|s| s.to_owned())
        })
        .unwrap_or_else(|| body.to_owned());
    format!("HTTP {status}: {message}")
}
