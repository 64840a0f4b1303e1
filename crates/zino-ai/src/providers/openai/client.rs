use super::{CompletionModel, EmbeddingModel};
use crate::{extension::TomlTableExt, providers::ProviderError};
use toml::Table;

/// Default base URL of the API.
const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP client for OpenAI-compatible APIs.
#[derive(Clone)]
pub struct Client {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("http_client", &self.http_client)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

impl Client {
    /// Creates a new client with the default API URL.
    #[inline]
    pub fn new(api_key: &str) -> Self {
        Self::from_url(api_key, OPENAI_API_BASE_URL)
    }

    /// Creates a new client with a custom API URL.
    pub fn from_url(api_key: &str, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Creates a new client from the `base-url` and `api-key` fields of the config.
    /// The API key may be omitted for local servers.
    pub fn try_new(config: &Table) -> Result<Self, ProviderError> {
        let service = config.get_str("service").unwrap_or("openai");
        if service != "openai" {
            return Err(ProviderError::UnsupportedService(service.to_owned()));
        }

        let base_url = config.get_str("base-url").unwrap_or(OPENAI_API_BASE_URL);
        let api_key = config.get_str("api-key").unwrap_or_default();
        Ok(Self::from_url(api_key, base_url))
    }

    /// Configures the client with a custom HTTP client.
    #[inline]
    pub fn with_custom_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    /// Returns the base URL.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a completion model.
    #[inline]
    pub fn completion_model(&self, model: &str) -> CompletionModel {
        CompletionModel::new(self.clone(), model)
    }

    /// Creates an embedding model. Use `0` if the number of dimensions is unknown.
    #[inline]
    pub fn embedding_model(&self, model: &str, ndims: usize) -> EmbeddingModel {
        EmbeddingModel::new(self.clone(), model, ndims)
    }

    /// Creates a POST request builder for the path.
    pub(crate) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http_client.post(url);
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }
}
