//! Compact representation of the chat history for prompts.

use crate::message::{ChatMessage, FunctionOutput};
use serde::Serialize;
use serde_json::{Map, Value};
use zino_ai::Message;

/// One user request together with everything that happened in response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Interaction {
    /// The user's utterance starting the interaction.
    pub user_prompt: String,
    /// Assistant reply which terminated the interaction or requested input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_response: Option<String>,
    /// Arguments provided by the user in an input response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_provided_args: Option<Map<String, Value>>,
    /// Called function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Arguments of the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_arguments: Option<Map<String, Value>>,
    /// Tabular outputs rendered as CSV.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_output_data: Option<String>,
    /// Text output of the function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_output_summary: Option<String>,
}

/// Groups the chat history into interactions.
/// Messages preceding the first user utterance are dropped.
pub fn interactions(history: &[ChatMessage]) -> Vec<Interaction> {
    let mut interactions: Vec<Interaction> = Vec::new();
    for message in history {
        match message {
            ChatMessage::User {
                content,
                input_response: None,
            } => interactions.push(Interaction {
                user_prompt: content.clone(),
                ..Interaction::default()
            }),
            ChatMessage::User {
                input_response: Some(call),
                ..
            } => {
                if let Some(current) = interactions.last_mut() {
                    current.user_provided_args = Some(call.arguments.clone());
                }
            }
            ChatMessage::Assistant {
                content,
                input_request: None,
                function_call,
            } => {
                let Some(current) = interactions.last_mut() else {
                    continue;
                };
                match function_call {
                    Some(call) => {
                        current.function_name = Some(call.name.clone());
                        current.function_arguments = Some(call.arguments.clone());
                    }
                    None => current.assistant_response = Some(content.clone()),
                }
            }
            ChatMessage::Assistant { .. } => {}
            ChatMessage::Function { outputs, .. } => {
                if let Some(current) = interactions.last_mut() {
                    record_outputs(current, outputs);
                }
            }
        }
    }
    interactions
}

fn record_outputs(interaction: &mut Interaction, outputs: &[FunctionOutput]) {
    let mut data = interaction.function_output_data.take().unwrap_or_default();
    for output in outputs {
        match output {
            FunctionOutput::DataFrame { dataframe } => {
                data.push_str("\n\n");
                match dataframe.to_csv() {
                    Ok(csv) if !dataframe.is_empty() => data.push_str(&csv),
                    Ok(_) => data.push_str("Data Not Available."),
                    Err(err) => {
                        tracing::warn!("fail to render the dataframe as CSV: {err}");
                        data.push_str("Data Not Available.");
                    }
                }
            }
            FunctionOutput::Text { text } => {
                interaction.function_output_summary = Some(text.trim().to_owned());
            }
            _ => {}
        }
    }

    let data = data.trim();
    if !data.is_empty() {
        interaction.function_output_data = Some(data.to_owned());
    }
}

/// Renders the chat history section of a prompt.
/// The last user utterance is rendered separately as the `user_prompt`.
pub fn chat_history_prompt(history: &[ChatMessage]) -> String {
    let mut interactions = interactions(history);
    let user_prompt = interactions
        .pop()
        .map(|interaction| interaction.user_prompt)
        .unwrap_or_default();
    let previous = if interactions.is_empty() {
        "(empty)".to_owned()
    } else {
        serde_json::to_string_pretty(&interactions).unwrap_or_default()
    };
    format!("CHAT HISTORY:\n{previous}\n---\nuser_prompt: {user_prompt}\n")
}

/// Builds the messages asking a model to summarize function outputs.
pub fn summarization_messages(
    history: &[ChatMessage],
    function_id: &str,
    arguments: &Map<String, Value>,
    outputs: &[FunctionOutput],
) -> Vec<Message> {
    let mut current = Interaction::default();
    record_outputs(&mut current, outputs);
    let data = current
        .function_output_data
        .or(current.function_output_summary)
        .unwrap_or_else(|| "Data Not Available.".to_owned());
    let arguments = serde_json::to_string(arguments).unwrap_or_default();
    vec![
        Message::system("You are a helpful assistant summarizing the results of function calls."),
        Message::user(format!(
            "{}\nThe function `{function_id}` was called with the arguments {arguments}.\n\
             It returned:\n{data}\n\n\
             Answer the user_prompt with a short summary of the returned data.",
            chat_history_prompt(history),
        )),
    ]
}
