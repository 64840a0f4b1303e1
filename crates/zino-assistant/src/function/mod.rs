//! Functions the assistant can call.
//!
//! The set of function types is open: anything implementing [`Function`] can be
//! registered in a library. Built-in types are [`TextResponseFunction`],
//! [`IndexFunction`], [`CallableFunction`] and [`CommandFunction`].

use crate::{
    message::{ChatMessage, FunctionOutput},
    schema::{JsonSchema, SchemaError},
};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::HashMap, fmt, time::Duration};
use zino_ai::{CompletionError, CompletionModelHandle};

mod callable;
mod command;
mod index;
mod text_response;

pub use callable::CallableFunction;
pub use command::CommandFunction;
pub use index::{FunctionsProvider, IndexFunction};
pub use text_response::TextResponseFunction;

/// Errors raised by functions.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    /// The arguments do not conform to the parameters.
    #[error(transparent)]
    InvalidArguments(#[from] SchemaError),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Json error (e.g.: serialization, deserialization)
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The summarization model failed.
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    /// The function reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The function did not respond in time.
    #[error("no output is received within {0:?}")]
    Timeout(Duration),
}

/// A stream of output snapshots, each one superseding the previous one.
pub type OutputStream = BoxStream<'static, Result<Vec<FunctionOutput>, FunctionError>>;

/// A canonical value of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// The value passed to the function.
    pub identity: String,
    /// Helps to match free-text mentions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity {
    /// Creates a new instance.
    #[inline]
    pub fn new(identity: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            identity: identity.into(),
            description: description.map(|s| s.to_owned()),
        }
    }

    /// Returns the text embedded for similarity search.
    pub fn document(&self) -> String {
        match &self.description {
            Some(description) => format!("identity={} description={description}", self.identity),
            None => format!("identity={}", self.identity),
        }
    }
}

/// Entities of a parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// The entities.
    pub entities: Vec<Entity>,
}

/// Static description of a function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FunctionDescriptor {
    /// Unique id within a registry.
    #[serde(default)]
    pub id: String,
    /// Name shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// What the function does.
    #[serde(default)]
    pub description: String,
    /// Questions the function answers.
    #[serde(default)]
    pub sample_questions: Vec<String>,
    /// Parameters.
    #[serde(default)]
    pub parameters: JsonSchema,
    /// Never run without the user's confirmation.
    #[serde(default)]
    pub confirm: bool,
    /// Entities of the parameters.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub entity_configs: HashMap<String, EntityConfig>,
}

impl FunctionDescriptor {
    /// Creates a new instance without parameters.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[inline]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the sample questions.
    pub fn with_sample_questions<T: Into<String>>(
        mut self,
        questions: impl IntoIterator<Item = T>,
    ) -> Self {
        self.sample_questions = questions.into_iter().map(|q| q.into()).collect();
        self
    }

    /// Sets the parameters.
    #[inline]
    pub fn with_parameters(mut self, parameters: JsonSchema) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the `confirm` flag.
    #[inline]
    pub fn with_confirm(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }

    /// Adds the entities of a parameter.
    pub fn with_entities(mut self, param: impl Into<String>, entities: Vec<Entity>) -> Self {
        self.entity_configs
            .insert(param.into(), EntityConfig { entities });
        self
    }
}

/// Dependencies of a function execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionDeps {
    /// The chat history, ending with the user's message.
    pub chat_history: Vec<ChatMessage>,
    /// Validated arguments.
    pub arguments: Map<String, Value>,
    /// Model used to summarize outputs.
    pub summarizer: Option<CompletionModelHandle>,
}

/// A function the assistant can select and call.
#[async_trait::async_trait]
pub trait Function: Send + Sync {
    /// Returns the descriptor.
    fn descriptor(&self) -> &FunctionDescriptor;

    /// Returns the type tag, such as `TextResponseFunction`.
    fn function_type(&self) -> &'static str;

    /// Executes the function, streaming growing sets of outputs.
    fn execute(&self, deps: ExecutionDeps) -> OutputStream;

    /// Returns the function id.
    #[inline]
    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Returns the display name, defaulting to the id.
    #[inline]
    fn display_name(&self) -> &str {
        let descriptor = self.descriptor();
        descriptor.display_name.as_deref().unwrap_or(&descriptor.id)
    }

    /// Returns the description.
    #[inline]
    fn description(&self) -> &str {
        &self.descriptor().description
    }

    /// Returns the sample questions.
    #[inline]
    fn sample_questions(&self) -> &[String] {
        &self.descriptor().sample_questions
    }

    /// Returns the JSON schema of the parameters.
    #[inline]
    fn parameters(&self) -> &JsonSchema {
        &self.descriptor().parameters
    }

    /// Returns `true` if the function never runs without the user's confirmation.
    #[inline]
    fn confirm(&self) -> bool {
        self.descriptor().confirm
    }

    /// Returns the entities of the parameters, keyed by parameter name.
    async fn entity_configs(&self) -> HashMap<String, EntityConfig> {
        self.descriptor().entity_configs.clone()
    }

    /// Renders a Python-like signature with a docstring, which is how functions
    /// are presented to models.
    fn signature(&self) -> String {
        let mut documentation = format!("{}\nExample Questions:\n", self.description());
        for question in self.sample_questions() {
            documentation.push_str("* ");
            documentation.push_str(question);
            documentation.push('\n');
        }

        let docstring = documentation
            .lines()
            .map(|line| {
                if line.trim().is_empty() {
                    String::new()
                } else {
                    format!("    {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "def {}({}) -> pd.DataFrame:\n    \"\"\"\n{docstring}\n    \"\"\"\n",
            self.id(),
            self.parameters().render_parameters(),
        )
    }
}

impl fmt::Debug for dyn Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.function_type())
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}
