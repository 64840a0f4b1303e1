//! Selection of the function matching a user query.
//!
//! The candidates are split into small chunks, each narrowed down to at most one
//! function by a concurrent model call. A final call then picks one of the survivors
//! or suggests related ones.

use crate::function::Function;
use futures::future;
use serde::Deserialize;
use serde_json::{Value, json};
use std::{collections::HashSet, sync::Arc};
use zino_ai::{ExtractionError, Message, StructuredGenerator};

/// Default maximum number of functions presented in a single call.
pub const DEFAULT_CHUNK_SIZE: usize = 4;

/// Result of a selection. At most one of the fields is non-empty.
#[derive(Debug, Clone, Default)]
pub struct SelectFunctionResult {
    /// The selected function.
    pub function: Option<Arc<dyn Function>>,
    /// Related functions suggested when none matches.
    pub suggested_functions: Vec<Arc<dyn Function>>,
}

impl SelectFunctionResult {
    /// Returns `true` if nothing is selected nor suggested.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.function.is_none() && self.suggested_functions.is_empty()
    }
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
struct FunctionSelection {
    /// The function matching the user query.
    #[serde(default)]
    function_name: Option<String>,
    /// Related functions when none matches.
    #[serde(default)]
    suggested_function_names: Vec<String>,
}

/// Splits the slice into `ceil(len / max_size)` chunks whose sizes differ by at most one,
/// earlier chunks being the larger ones.
pub fn chunk_by_max_size<T>(items: &[T], max_size: usize) -> Vec<&[T]> {
    let max_size = max_size.max(1);
    let num_chunks = items.len().div_ceil(max_size);
    if num_chunks == 0 {
        return Vec::new();
    }

    let base = items.len() / num_chunks;
    let extra = items.len() % num_chunks;
    let mut chunks = Vec::with_capacity(num_chunks);
    let mut rest = items;
    for i in 0..num_chunks {
        let size = if i < extra { base + 1 } else { base };
        let (chunk, remaining) = rest.split_at(size);
        chunks.push(chunk);
        rest = remaining;
    }
    chunks
}

/// Selects functions with a structured generator.
#[derive(Debug, Clone)]
pub struct FunctionSelector {
    generator: StructuredGenerator,
    chunk_size: usize,
}

impl FunctionSelector {
    /// Creates a new instance with the default chunk size.
    pub fn new(generator: StructuredGenerator) -> Self {
        Self {
            generator,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets the maximum number of functions presented in a single call.
    #[inline]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Returns the chunk size.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Selects the function matching the query among the candidates.
    pub async fn select(
        &self,
        candidates: &[Arc<dyn Function>],
        query: &str,
    ) -> Result<SelectFunctionResult, ExtractionError> {
        let chunks = chunk_by_max_size(candidates, self.chunk_size);
        tracing::info!(
            num_candidates = candidates.len(),
            num_chunks = chunks.len(),
            "filtering functions"
        );

        let matches = future::try_join_all(
            chunks
                .into_iter()
                .map(|chunk| self.filter_functions(chunk, query)),
        )
        .await?;
        let function_names = matches.into_iter().flatten().collect::<HashSet<_>>();
        let selected = candidates
            .iter()
            .filter(|function| function_names.contains(function.id()))
            .cloned()
            .collect::<Vec<_>>();
        if selected.is_empty() {
            tracing::info!("no function passes the filters");
            return Ok(SelectFunctionResult::default());
        }
        tracing::info!(
            reduced = ?selected.iter().map(|f| f.id()).collect::<Vec<_>>(),
            "candidates are reduced"
        );

        let selection: FunctionSelection = self
            .generator
            .generate_typed(
                selection_messages(&selected, query),
                Some(&selection_schema()),
                "select_function",
                &["selection"],
            )
            .await?;

        let function = selection.function_name.as_deref().and_then(|name| {
            selected.iter().find(|function| function.id() == name).cloned()
        });
        let suggested_functions = if function.is_some() {
            Vec::new()
        } else {
            selected
                .iter()
                .filter(|function| {
                    selection
                        .suggested_function_names
                        .iter()
                        .any(|name| name == function.id())
                })
                .cloned()
                .collect()
        };
        Ok(SelectFunctionResult {
            function,
            suggested_functions,
        })
    }

    async fn filter_functions(
        &self,
        functions: &[Arc<dyn Function>],
        query: &str,
    ) -> Result<Option<String>, ExtractionError> {
        let signatures = functions
            .iter()
            .map(|function| function.signature())
            .collect::<Vec<_>>()
            .join("\n");
        let mut ids = functions
            .iter()
            .map(|function| Value::from(function.id()))
            .collect::<Vec<_>>();
        ids.push(Value::Null);
        let schema = json!({
            "type": "object",
            "properties": {
                "function_name": { "type": ["string", "null"], "enum": ids },
            },
        });
        let messages = vec![Message::user(format!(
            "{signatures}\n\
             Which of these functions is most suitable given the user query: \"{query}\"?\n\
             Use null if none of them is suitable.\n\n\
             Respond with the JSON: {{\"function_name\": \"...\"}}\n"
        ))];
        let result = self
            .generator
            .generate(messages, Some(&schema), "filter_functions", &["selection"])
            .await?;
        Ok(result
            .get("function_name")
            .and_then(|name| name.as_str())
            .map(|name| name.to_owned()))
    }
}

fn selection_schema() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(FunctionSelection))
        .unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
}

fn selection_messages(functions: &[Arc<dyn Function>], query: &str) -> Vec<Message> {
    let signatures = functions
        .iter()
        .map(|function| function.signature())
        .collect::<Vec<_>>()
        .join("\n");
    vec![
        Message::system("You are a helpful assistant. You will respond in JSON"),
        Message::user(format!(
            "Prior selection reduced the candidates to these functions:\n\
             {signatures}\n\
             ---\n\
             User Query: {query}\n\
             ---\n\
             Instructions:\n\n\
             If there is a function in the list of candidates that matches the user query:\n\
             * Select the function name as 'function_name'.\n\
             * Respond with the JSON: {{ \"function_name\": \"...\" }}\n\n\
             If none of the functions in the list of candidates match the user query:\n\
             * Select related functions from the list of candidates as 'suggested_function_names'.\n\
             * If you think none of the functions are a good match, return an empty list.\n\
             * Respond with the JSON: {{ \"suggested_function_names\": [\"...\", \"...\"] }}\n\n\
             Respond with JSON\n"
        )),
    ]
}
