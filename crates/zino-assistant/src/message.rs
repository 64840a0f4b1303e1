//! Chat messages exchanged between the user, the assistant and functions.

use crate::schema::JsonSchema;
use csv::{ByteRecord, Writer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A message of the chat history, tagged by `role`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    /// A message written by the user.
    User {
        /// Text content.
        content: String,
        /// The user's response to an input request.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_response: Option<FunctionCall>,
    },
    /// A message from the assistant.
    Assistant {
        /// Text content, such as rejection messages.
        #[serde(default)]
        content: String,
        /// Asks the user to fill in the arguments of a function.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_request: Option<FunctionInputRequest>,
        /// Informs the client that a function is being called.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function_call: Option<FunctionCall>,
    },
    /// Outputs of a function.
    Function {
        /// Function id.
        name: String,
        /// Function outputs.
        outputs: Vec<FunctionOutput>,
    },
}

impl ChatMessage {
    /// Creates a user message.
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            input_response: None,
        }
    }

    /// Creates a user message answering an input request.
    #[inline]
    pub fn input_response(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self::User {
            content: String::new(),
            input_response: Some(FunctionCall::new(name, arguments)),
        }
    }

    /// Creates an assistant message with text content.
    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            input_request: None,
            function_call: None,
        }
    }

    /// Creates an assistant message requesting input from the user.
    #[inline]
    pub fn input_request(content: impl Into<String>, request: FunctionInputRequest) -> Self {
        Self::Assistant {
            content: content.into(),
            input_request: Some(request),
            function_call: None,
        }
    }

    /// Creates an assistant message announcing a function call.
    #[inline]
    pub fn function_call(call: FunctionCall) -> Self {
        Self::Assistant {
            content: String::new(),
            input_request: None,
            function_call: Some(call),
        }
    }

    /// Creates a function message.
    #[inline]
    pub fn function(name: impl Into<String>, outputs: Vec<FunctionOutput>) -> Self {
        Self::Function {
            name: name.into(),
            outputs,
        }
    }

    /// Returns the text content. Function messages have none.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            Self::User { content, .. } | Self::Assistant { content, .. } => content,
            Self::Function { .. } => "",
        }
    }

    /// Returns `true` if it is a user message.
    #[inline]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

/// A function invocation with its arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function id.
    pub name: String,
    /// Arguments.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl FunctionCall {
    /// Creates a new instance.
    #[inline]
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// A request for the user to fill in the arguments of a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInputRequest {
    /// Function id.
    pub name: String,
    /// Schema of the arguments.
    pub json_schema: JsonSchema,
    /// Prefilled arguments.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// A prompt suggested to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedPrompt {
    /// Short label.
    pub title: String,
    /// Prompt to send.
    pub prompt: String,
}

/// An output of a function, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunctionOutput {
    /// Tabular data.
    #[serde(rename = "dataframe")]
    DataFrame {
        /// The table.
        dataframe: DataFrame,
    },
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// A chart specification rendered by the client.
    Visualization {
        /// Opaque specification.
        visualization: Value,
    },
    /// Suggested follow-up prompts.
    FollowUps {
        /// The prompts.
        #[serde(default)]
        follow_ups: Vec<SuggestedPrompt>,
    },
}

impl FunctionOutput {
    /// Creates a text output.
    #[inline]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates a dataframe output.
    #[inline]
    pub fn dataframe(dataframe: DataFrame) -> Self {
        Self::DataFrame { dataframe }
    }

    /// Creates a follow-ups output.
    #[inline]
    pub fn follow_ups(follow_ups: Vec<SuggestedPrompt>) -> Self {
        Self::FollowUps { follow_ups }
    }
}

/// A plain table of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    /// Column names.
    pub columns: Vec<String>,
    /// Rows of values.
    pub data: Vec<Vec<Value>>,
}

impl DataFrame {
    /// Creates a new instance.
    #[inline]
    pub fn new(columns: Vec<String>, data: Vec<Vec<Value>>) -> Self {
        Self { columns, data }
    }

    /// Returns `true` if there are no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Renders the table as CSV with a header row.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut wtr = Writer::from_writer(Vec::new());
        wtr.write_record(&self.columns)?;

        let num_fields = self.columns.len();
        for row in &self.data {
            let mut record = ByteRecord::with_capacity(num_fields * 8, num_fields);
            for value in row {
                match value {
                    Value::Null => record.push_field(b""),
                    Value::String(s) => record.push_field(s.as_bytes()),
                    _ => record.push_field(value.to_string().as_bytes()),
                }
            }
            wtr.write_byte_record(&record)?;
        }
        wtr.flush()?;

        let buffer = wtr.into_inner().map_err(|err| err.into_error())?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
