use super::{ApiUsage, Client, error_message};
use crate::completion::{
    self, AssistantContent, CompletionError, CompletionRequest, CompletionResponse,
    StreamingCompletion,
};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Chat completion model of an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct CompletionModel {
    client: Client,
    model: String,
}

impl CompletionModel {
    /// Creates a new instance.
    pub fn new(client: Client, model: &str) -> Self {
        Self {
            client,
            model: model.to_owned(),
        }
    }

    /// Returns the model name.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Builds the request body of `/chat/completions`.
    pub(crate) fn request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut messages = Vec::with_capacity(request.chat_history.len() + 1);
        if let Some(preamble) = &request.preamble {
            messages.push(json!({ "role": "system", "content": preamble }));
        }
        for message in &request.chat_history {
            messages.push(json!({
                "role": message.role().as_str(),
                "content": message.content(),
            }));
        }

        let mut body = Map::new();
        body.insert("model".to_owned(), self.model.clone().into());
        body.insert("messages".to_owned(), messages.into());
        if !request.tools.is_empty() {
            let tools = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        },
                    })
                })
                .collect::<Vec<_>>();
            body.insert("tools".to_owned(), tools.into());
        }
        if let Some(name) = &request.tool_choice {
            body.insert(
                "tool_choice".to_owned(),
                json!({ "type": "function", "function": { "name": name } }),
            );
        }
        if let Some(temperature) = request.temperature {
            body.insert("temperature".to_owned(), temperature.into());
        }
        if let Some(max_tokens) = request.max_tokens {
            body.insert("max_tokens".to_owned(), max_tokens.into());
        }
        if stream {
            body.insert("stream".to_owned(), true.into());
        }

        let mut body = Value::Object(body);
        if let Some(params) = request.additional_params.clone() {
            crate::json_utils::merge_inplace(&mut body, params);
        }
        body
    }
}

/// Response of `/chat/completions`.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Response id.
    #[serde(default)]
    pub id: String,
    /// Model which generated the response.
    #[serde(default)]
    pub model: String,
    /// Generated choices.
    pub choices: Vec<Choice>,
    /// Token usage.
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

/// A choice of [`ChatResponse`].
#[derive(Debug, Deserialize)]
pub struct Choice {
    /// The generated message.
    pub message: ResponseMessage,
    /// Why the generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A message of [`Choice`].
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    /// Text content.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls.
    #[serde(default)]
    pub tool_calls: Vec<ResponseToolCall>,
}

/// A tool call of [`ResponseMessage`].
#[derive(Debug, Deserialize)]
pub struct ResponseToolCall {
    /// Call id.
    #[serde(default)]
    pub id: String,
    /// The called function.
    pub function: ResponseFunction,
}

/// A function of [`ResponseToolCall`].
#[derive(Debug, Deserialize)]
pub struct ResponseFunction {
    /// Function name.
    pub name: String,
    /// Arguments serialized as JSON.
    pub arguments: String,
}

impl TryFrom<ChatResponse> for CompletionResponse<ChatResponse> {
    type Error = CompletionError;

    fn try_from(response: ChatResponse) -> Result<Self, Self::Error> {
        let message = &response
            .choices
            .first()
            .ok_or_else(|| CompletionError::ResponseError("no choice is returned".to_owned()))?
            .message;
        let mut choice = Vec::new();
        if let Some(content) = message.content.as_deref().filter(|s| !s.is_empty()) {
            choice.push(AssistantContent::text(content));
        }
        for call in &message.tool_calls {
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
            choice.push(AssistantContent::tool_call(
                call.id.as_str(),
                call.function.name.as_str(),
                arguments,
            ));
        }
        if choice.is_empty() {
            return Err(CompletionError::ResponseError(
                "the response contains neither text nor tool calls".to_owned(),
            ));
        }

        Ok(CompletionResponse {
            choice,
            usage: response.usage.map(|usage| usage.into()).unwrap_or_default(),
            raw_response: response,
        })
    }
}

/// An event in a server-sent event stream.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseEvent {
    /// A text delta.
    Delta(String),
    /// End of the stream.
    Done,
    /// A line without text.
    Skip,
}

/// Parses a line of the SSE stream of `/chat/completions`.
pub(crate) fn parse_sse_line(line: &str) -> Result<SseEvent, CompletionError> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: Value = serde_json::from_str(data)?;
    let delta = chunk
        .pointer("/choices/0/delta/content")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty());
    Ok(match delta {
        Some(delta) => SseEvent::Delta(delta.to_owned()),
        None => SseEvent::Skip,
    })
}

/// Turns a stream of SSE body chunks into text deltas.
/// Lines may be split across chunks.
pub(crate) fn sse_deltas<B, E>(
    chunks: impl Stream<Item = Result<B, E>> + Send + 'static,
) -> impl Stream<Item = Result<String, CompletionError>> + Send + 'static
where
    B: AsRef<[u8]> + Send + 'static,
    E: Into<CompletionError> + Send + 'static,
{
    try_stream! {
        let mut chunks = Box::pin(chunks);
        let mut buffer = String::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(Into::<CompletionError>::into)?;
            buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));
            while let Some(pos) = buffer.find('\n') {
                let line = buffer.drain(..=pos).collect::<String>();
                match parse_sse_line(&line)? {
                    SseEvent::Delta(delta) => yield delta,
                    SseEvent::Done => return,
                    SseEvent::Skip => {}
                }
            }
        }
        if let SseEvent::Delta(delta) = parse_sse_line(&buffer)? {
            yield delta;
        }
    }
}

impl completion::CompletionModel for CompletionModel {
    type Response = ChatResponse;

    async fn completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse<ChatResponse>, CompletionError> {
        let body = self.request_body(&request, false);
        tracing::debug!(target: "zino-ai", model = %self.model, tags = ?request.tags, "sending a completion request");

        let response = self.client.post("chat/completions").json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(CompletionError::ProviderError(error_message(status, &text)));
        }

        let response = response.json::<ChatResponse>().await?;
        if let Some(usage) = &response.usage {
            tracing::info!(
                target: "zino-ai",
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion finished"
            );
        }
        response.try_into()
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamingCompletion, CompletionError> {
        let body = self.request_body(&request, true);
        let response = self.client.post("chat/completions").json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(CompletionError::ProviderError(error_message(status, &text)));
        }

        let deltas = sse_deltas(response.bytes_stream());
        Ok(Box::pin(deltas))
    }
}
