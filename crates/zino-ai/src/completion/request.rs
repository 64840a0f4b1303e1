use super::message::{AssistantContent, Message, ToolCall};
use futures::{
    future::BoxFuture,
    stream::{self, BoxStream},
};
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    ops::{Add, AddAssign},
    sync::Arc,
};
use thiserror::Error;

/// Errors raised by completion models.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Http error (e.g.: connection error, timeout, etc.)
    #[error("HttpError: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Json error (e.g.: serialization, deserialization)
    #[error("JsonError: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error building the completion request
    #[error("RequestError: {0}")]
    RequestError(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Error parsing the completion response
    #[error("ResponseError: {0}")]
    ResponseError(String),

    /// Error returned by the completion model provider
    #[error("ProviderError: {0}")]
    ProviderError(String),
}

/// A tool the model may call, described by a JSON schema.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema of the tool arguments.
    pub parameters: serde_json::Value,
}

/// Struct representing a general completion request that can be sent to a completion model provider.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// The preamble to be sent as the system message.
    pub preamble: Option<String>,
    /// The chat history, the last message being the prompt.
    pub chat_history: Vec<Message>,
    /// The tools to be sent to the completion model provider.
    pub tools: Vec<ToolDefinition>,
    /// Forces the model to call the tool with this name.
    pub tool_choice: Option<String>,
    /// The temperature to be sent to the completion model provider.
    pub temperature: Option<f64>,
    /// The max tokens to be sent to the completion model provider.
    pub max_tokens: Option<u64>,
    /// Tags identifying the task for tracing.
    pub tags: Vec<String>,
    /// Additional provider-specific parameters.
    pub additional_params: Option<serde_json::Value>,
}

impl CompletionRequest {
    /// Returns the content of the last message.
    pub fn prompt(&self) -> &str {
        self.chat_history
            .last()
            .map(|message| message.content())
            .unwrap_or_default()
    }
}

/// Builder for [`CompletionRequest`].
#[derive(Debug, Clone, Default)]
pub struct CompletionRequestBuilder {
    request: CompletionRequest,
}

impl CompletionRequestBuilder {
    /// Creates a builder with the prompt as the only message.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::from_messages(vec![Message::user(prompt)])
    }

    /// Creates a builder from the chat history.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            request: CompletionRequest {
                chat_history: messages,
                ..CompletionRequest::default()
            },
        }
    }

    /// Sets the preamble.
    #[inline]
    pub fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.request.preamble = Some(preamble.into());
        self
    }

    /// Appends a message to the chat history.
    #[inline]
    pub fn message(mut self, message: Message) -> Self {
        self.request.chat_history.push(message);
        self
    }

    /// Adds a tool definition.
    #[inline]
    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.request.tools.push(tool);
        self
    }

    /// Forces the model to call the named tool.
    #[inline]
    pub fn tool_choice(mut self, name: impl Into<String>) -> Self {
        self.request.tool_choice = Some(name.into());
        self
    }

    /// Sets the temperature.
    #[inline]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.request.temperature = Some(temperature);
        self
    }

    /// Sets the max tokens.
    #[inline]
    pub fn max_tokens(mut self, max_tokens: u64) -> Self {
        self.request.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the tags.
    pub fn tags<T: Into<String>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.request.tags = tags.into_iter().map(|tag| tag.into()).collect();
        self
    }

    /// Sets provider-specific parameters.
    #[inline]
    pub fn additional_params(mut self, params: serde_json::Value) -> Self {
        self.request.additional_params = Some(params);
        self
    }

    /// Builds the request.
    #[inline]
    pub fn build(self) -> CompletionRequest {
        self.request
    }
}

/// General completion response struct that contains the assistant contents
/// and the raw response.
#[derive(Debug)]
pub struct CompletionResponse<T> {
    /// Contents returned by the completion model provider.
    pub choice: Vec<AssistantContent>,
    /// Tokens used during prompting and responding.
    pub usage: Usage,
    /// The raw response returned by the completion model provider.
    pub raw_response: T,
}

impl<T> CompletionResponse<T> {
    /// Concatenates all the text contents.
    pub fn text(&self) -> String {
        self.choice
            .iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.as_str()),
                AssistantContent::ToolCall(_) => None,
            })
            .collect()
    }

    /// Returns the first tool call.
    pub fn tool_call(&self) -> Option<&ToolCall> {
        self.choice.iter().find_map(|content| match content {
            AssistantContent::ToolCall(call) => Some(call),
            AssistantContent::Text(_) => None,
        })
    }
}

/// Struct representing the token usage for a completion request.
/// If tokens used are `0`, then the provider failed to supply token usage metrics.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct Usage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Generated tokens.
    pub output_tokens: u64,
    /// Some providers only report this number.
    pub total_tokens: u64,
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, other: Self) -> Self::Output {
        self += other;
        self
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A stream of text deltas.
pub type StreamingCompletion = BoxStream<'static, Result<String, CompletionError>>;

/// Trait defining a completion model that can be used to generate completion responses.
pub trait CompletionModel: Clone + Send + Sync {
    /// The raw response type returned by the underlying completion model.
    type Response: Send + Sync;

    /// Generates a completion response for the given completion request.
    fn completion(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse<Self::Response>, CompletionError>> + Send;

    /// Streams the text of a completion as deltas.
    ///
    /// The default implementation yields the whole text of [`completion`](Self::completion)
    /// as a single delta.
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<StreamingCompletion, CompletionError>> + Send {
        async move {
            let text = CompletionModel::completion(self, request).await?.text();
            let deltas: StreamingCompletion = Box::pin(stream::once(async move { Ok(text) }));
            Ok(deltas)
        }
    }
}

/// Dyn-compatible version of [`CompletionModel`].
pub trait CompletionModelDyn: Send + Sync {
    /// Generates a completion response with the raw response erased.
    fn completion(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<CompletionResponse<()>, CompletionError>>;

    /// Streams the text of a completion as deltas.
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<StreamingCompletion, CompletionError>>;
}

impl<T: CompletionModel + 'static> CompletionModelDyn for T {
    fn completion(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<CompletionResponse<()>, CompletionError>> {
        Box::pin(async move {
            CompletionModel::completion(self, request)
                .await
                .map(|response| CompletionResponse {
                    choice: response.choice,
                    usage: response.usage,
                    raw_response: (),
                })
        })
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<StreamingCompletion, CompletionError>> {
        Box::pin(CompletionModel::stream(self, request))
    }
}

/// Wraps a completion model in a cloneable, type-erased handle.
#[derive(Clone)]
pub struct CompletionModelHandle {
    inner: Arc<dyn CompletionModelDyn>,
}

impl CompletionModelHandle {
    /// Creates a new instance.
    #[inline]
    pub fn new(model: impl CompletionModel + 'static) -> Self {
        Self {
            inner: Arc::new(model),
        }
    }

    /// Creates a new instance from a shared model.
    #[inline]
    pub fn from_arc(inner: Arc<dyn CompletionModelDyn>) -> Self {
        Self { inner }
    }

    /// Generates a completion response for the given completion request.
    #[inline]
    pub async fn completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse<()>, CompletionError> {
        self.inner.completion(request).await
    }

    /// Streams the text of a completion as deltas.
    #[inline]
    pub async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<StreamingCompletion, CompletionError> {
        self.inner.stream(request).await
    }
}

impl std::fmt::Debug for CompletionModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionModelHandle").finish_non_exhaustive()
    }
}

impl CompletionModel for CompletionModelHandle {
    type Response = ();

    fn completion(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse<Self::Response>, CompletionError>> + Send
    {
        self.inner.completion(request)
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<StreamingCompletion, CompletionError>> + Send {
        self.inner.stream(request)
    }
}
