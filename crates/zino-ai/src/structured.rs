//! Structured JSON generation with completion models.
//!
//! Two modes are supported:
//!
//! - [`JsonMode::FunctionCalling`] declares a tool named after the task with the schema as
//!   its parameters and forces the model to call it. Any other reply is an error.
//! - [`JsonMode::Generic`] embeds the schema in a system instruction and parses the first
//!   JSON object found in the text reply. Unparsable replies degrade to an empty object.

use crate::{
    completion::{
        CompletionError, CompletionModelHandle, CompletionRequestBuilder, Message,
        ToolDefinition, ensure_alternating,
    },
    json_utils,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

/// Preamble sent along with function-calling requests.
const FUNCTION_CALLING_PREAMBLE: &str = "You are a helpful assistant.";

/// How JSON objects are obtained from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonMode {
    /// Vendor-native function calling.
    #[default]
    FunctionCalling,
    /// Schema in the prompt, JSON parsed from the text reply.
    Generic,
}

impl JsonMode {
    /// Returns the name used in configuration files.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonMode::FunctionCalling => "function-calling",
            JsonMode::Generic => "generic",
        }
    }
}

impl fmt::Display for JsonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JsonMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function-calling" => Ok(JsonMode::FunctionCalling),
            "generic" => Ok(JsonMode::Generic),
            _ => Err(format!("json mode `{s}` is unsupported")),
        }
    }
}

/// Errors raised when extracting JSON objects.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The completion request failed.
    #[error("CompletionError: {0}")]
    CompletionError(#[from] CompletionError),

    /// The extracted data does not deserialize into the target type.
    #[error("failed to deserialize the extracted data: {0}")]
    DeserializationError(#[from] serde_json::Error),

    /// The model replied with text instead of calling the tool.
    #[error("no tool call is returned for the task `{0}`")]
    NoToolCall(String),

    /// The model called a tool other than the declared one.
    #[error("expected a call of `{expected}`, found `{found}`")]
    NameMismatch {
        /// Declared tool name.
        expected: String,
        /// Called tool name.
        found: String,
    },

    /// The tool arguments are not a JSON object.
    #[error("the tool arguments are not a JSON object: {0}")]
    NotAnObject(String),
}

/// Extracts JSON objects from a completion model.
#[derive(Debug, Clone)]
pub struct StructuredGenerator {
    model: CompletionModelHandle,
    mode: JsonMode,
}

impl StructuredGenerator {
    /// Creates a new instance.
    #[inline]
    pub fn new(model: CompletionModelHandle, mode: JsonMode) -> Self {
        Self { model, mode }
    }

    /// Creates a generator using function calling.
    #[inline]
    pub fn function_calling(model: CompletionModelHandle) -> Self {
        Self::new(model, JsonMode::FunctionCalling)
    }

    /// Creates a generator embedding the schema in the prompt.
    #[inline]
    pub fn generic(model: CompletionModelHandle) -> Self {
        Self::new(model, JsonMode::Generic)
    }

    /// Returns the JSON mode.
    #[inline]
    pub fn mode(&self) -> JsonMode {
        self.mode
    }

    /// Returns the underlying completion model.
    #[inline]
    pub fn model(&self) -> &CompletionModelHandle {
        &self.model
    }

    /// Generates a JSON object for the task.
    ///
    /// Without a schema, any object is accepted.
    pub async fn generate(
        &self,
        messages: Vec<Message>,
        schema: Option<&Value>,
        task_name: &str,
        tags: &[&str],
    ) -> Result<Map<String, Value>, ExtractionError> {
        let mut tags = tags.iter().map(|tag| tag.to_string()).collect::<Vec<_>>();
        tags.push(task_name.to_owned());
        match self.mode {
            JsonMode::FunctionCalling => {
                self.generate_with_function_calling(messages, schema, task_name, tags)
                    .await
            }
            JsonMode::Generic => self.generate_generic(messages, schema, task_name, tags).await,
        }
    }

    /// Generates a JSON object and deserializes it.
    ///
    /// In the generic mode a mismatched shape yields `T::default()`.
    pub async fn generate_typed<T: DeserializeOwned + Default>(
        &self,
        messages: Vec<Message>,
        schema: Option<&Value>,
        task_name: &str,
        tags: &[&str],
    ) -> Result<T, ExtractionError> {
        let map = self.generate(messages, schema, task_name, tags).await?;
        match self.mode {
            JsonMode::FunctionCalling => Ok(serde_json::from_value(Value::Object(map))?),
            JsonMode::Generic => Ok(serde_json::from_value(Value::Object(map))
                .unwrap_or_else(|err| {
                    tracing::warn!(target: "zino-ai", task_name, "unexpected shape: {err}");
                    T::default()
                })),
        }
    }

    async fn generate_with_function_calling(
        &self,
        messages: Vec<Message>,
        schema: Option<&Value>,
        task_name: &str,
        tags: Vec<String>,
    ) -> Result<Map<String, Value>, ExtractionError> {
        let parameters = schema
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "type": "object" }));
        let request = CompletionRequestBuilder::from_messages(ensure_alternating(messages))
            .preamble(FUNCTION_CALLING_PREAMBLE)
            .tool(ToolDefinition {
                name: task_name.to_owned(),
                description: String::new(),
                parameters,
            })
            .tool_choice(task_name)
            .temperature(0.0)
            .tags(tags)
            .build();
        let response = self.model.completion(request).await?;
        let Some(call) = response.tool_call() else {
            return Err(ExtractionError::NoToolCall(task_name.to_owned()));
        };
        if call.name != task_name {
            return Err(ExtractionError::NameMismatch {
                expected: task_name.to_owned(),
                found: call.name.clone(),
            });
        }
        json_utils::parse_object(call.arguments.clone())
            .ok_or_else(|| ExtractionError::NotAnObject(call.arguments.to_string()))
    }

    async fn generate_generic(
        &self,
        messages: Vec<Message>,
        schema: Option<&Value>,
        task_name: &str,
        tags: Vec<String>,
    ) -> Result<Map<String, Value>, ExtractionError> {
        let instruction = match schema {
            Some(schema) => format!(
                "Respond with a single JSON object conforming to the following JSON schema:\n\
                 ```json\n{}\n```\nDo not add any explanation.",
                serde_json::to_string_pretty(schema)?
            ),
            None => "Respond with a single JSON object. Do not add any explanation.".to_owned(),
        };
        let mut prompt = Vec::with_capacity(messages.len() + 1);
        prompt.push(Message::system(instruction));
        prompt.extend(messages);

        let request = CompletionRequestBuilder::from_messages(ensure_alternating(prompt))
            .temperature(0.0)
            .tags(tags)
            .build();
        let text = self.model.completion(request).await?.text();
        let parsed = json_utils::find_json_substring(&text)
            .and_then(|s| serde_json::from_str::<Value>(s).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            });
        match parsed {
            Some(map) => Ok(map),
            None => {
                tracing::warn!(target: "zino-ai", task_name, "no JSON object is found in the reply");
                Ok(Map::new())
            }
        }
    }
}
