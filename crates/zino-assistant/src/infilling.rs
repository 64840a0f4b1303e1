//! Argument infilling.
//!
//! Two model calls run concurrently: one generates the arguments, the other decides
//! for every parameter whether it is needed and whether its value can be found in the
//! conversation. The results are merged by [`finalize`].

use crate::{
    function::{Entity, Function},
    history,
    message::ChatMessage,
    schema::{JsonSchema, SchemaError, one_of_consts},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use zino_ai::{ExtractionError, JsonMode, Message, StructuredGenerator};

/// Errors raised when infilling arguments.
#[derive(Debug, thiserror::Error)]
pub enum InfillingError {
    /// The model call failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The argument decisions are malformed.
    #[error("malformed argument decisions: {0}")]
    Decisions(#[source] serde_json::Error),

    /// The generated arguments violate the parameters.
    #[error(transparent)]
    InvalidArguments(#[from] SchemaError),
}

/// Whether an argument should be passed and whether its value is known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentDecision {
    /// The argument should be passed.
    pub needed: bool,
    /// The value can be found in the conversation.
    pub can_be_found: bool,
}

impl ArgumentDecision {
    /// Returns `true` if the argument should be passed with the generated value.
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.needed && self.can_be_found
    }

    /// Returns `true` if the argument has to be asked from the user.
    #[inline]
    pub fn is_missing(&self) -> bool {
        self.needed && !self.can_be_found
    }
}

/// Arguments of a function call, and whether they suffice to run it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfillResult {
    /// No argument has to be asked from the user.
    pub complete: bool,
    /// Arguments found in the conversation.
    pub arguments: Map<String, Value>,
}

/// Generates the arguments of functions with a structured generator.
#[derive(Debug, Clone)]
pub struct ArgumentInfiller {
    generator: StructuredGenerator,
}

impl ArgumentInfiller {
    /// Creates a new instance.
    #[inline]
    pub fn new(generator: StructuredGenerator) -> Self {
        Self { generator }
    }

    /// Returns the structured generator.
    #[inline]
    pub fn generator(&self) -> &StructuredGenerator {
        &self.generator
    }

    /// Infills the arguments of a function, restricting the parameters with
    /// resolved entities to their identities.
    pub async fn infill(
        &self,
        function: &dyn Function,
        history: &[ChatMessage],
        entities: &HashMap<String, Vec<Entity>>,
    ) -> Result<InfillResult, InfillingError> {
        let parameters = function.parameters();
        if !parameters.has_properties() {
            return Ok(InfillResult {
                complete: true,
                arguments: Map::new(),
            });
        }

        let (arguments, decisions) = futures::try_join!(
            self.generate_arguments(function, history, entities),
            self.generate_argument_decisions(function, history),
        )?;
        Ok(finalize(parameters, arguments, &decisions))
    }

    /// Generates the arguments of a function call matching the last user prompt.
    pub async fn generate_arguments(
        &self,
        function: &dyn Function,
        history: &[ChatMessage],
        entities: &HashMap<String, Vec<Entity>>,
    ) -> Result<Map<String, Value>, InfillingError> {
        let schema = narrow_parameters(function.parameters(), entities)?;
        let messages = vec![Message::user(format!(
            "{}\nWe want to invoke the following function:\n{}\n\
             Provide the arguments for the function call that match the user_prompt.\n\n\
             Respond in JSON.\n",
            history::chat_history_prompt(history),
            function.signature(),
        ))];
        let arguments = self
            .generator
            .generate(
                messages,
                Some(&schema.to_value()),
                "generate_arguments",
                &["infilling"],
            )
            .await?;
        schema.validate_present(&arguments)?;
        Ok(arguments)
    }

    /// Decides for every parameter whether it is needed and can be found.
    pub async fn generate_argument_decisions(
        &self,
        function: &dyn Function,
        history: &[ChatMessage],
    ) -> Result<HashMap<String, ArgumentDecision>, InfillingError> {
        let schema = argument_decisions_schema(function.parameters());
        let messages = vec![Message::user(format!(
            "{}\nWe are analyzing the following function:\n{}\n\
             For each of the arguments decide:\n\
             - Should the argument be used?\n\
             - Can we find the right value for the argument from the user_prompt or from CHAT HISTORY?\n\n\
             Respond in JSON.\n",
            history::chat_history_prompt(history),
            function.signature(),
        ))];
        let decisions = self
            .generator
            .generate(
                messages,
                Some(&schema),
                "generate_argument_decisions",
                &["infilling"],
            )
            .await?;
        match self.generator.mode() {
            JsonMode::FunctionCalling => {
                serde_json::from_value(Value::Object(decisions)).map_err(InfillingError::Decisions)
            }
            JsonMode::Generic => Ok(decisions
                .into_iter()
                .filter_map(|(key, value)| {
                    serde_json::from_value(value)
                        .ok()
                        .map(|decision| (key, decision))
                })
                .collect()),
        }
    }
}

/// Keeps the arguments which are needed and found, and checks that nothing
/// has to be asked from the user.
pub fn finalize(
    parameters: &JsonSchema,
    arguments: Map<String, Value>,
    decisions: &HashMap<String, ArgumentDecision>,
) -> InfillResult {
    let arguments = arguments
        .into_iter()
        .filter(|(key, _)| decisions.get(key).is_some_and(|d| d.is_usable()))
        .collect::<Map<_, _>>();
    let missing_decision = decisions.values().any(|d| d.is_missing());
    let missing_required = parameters
        .required()
        .into_iter()
        .any(|key| !arguments.contains_key(key));
    let complete = !missing_decision && !missing_required;
    tracing::info!(
        complete,
        num_arguments = arguments.len(),
        decisions = ?decisions,
        "arguments are infilled"
    );
    InfillResult {
        complete,
        arguments,
    }
}

/// Restricts the parameters with resolved entities to their identities.
fn narrow_parameters(
    parameters: &JsonSchema,
    entities: &HashMap<String, Vec<Entity>>,
) -> Result<JsonSchema, SchemaError> {
    if entities.values().all(|entities| entities.is_empty()) {
        return Ok(parameters.clone());
    }

    let mut schema = parameters.to_value();
    for (param, entities) in entities {
        if entities.is_empty() || parameters.property(param).is_none() {
            continue;
        }
        schema["definitions"][param.as_str()] = one_of_consts(
            entities
                .iter()
                .map(|entity| (entity.identity.as_str(), entity.description.as_deref())),
        );
        schema["properties"][param.as_str()]["$ref"] = json!(format!("#/definitions/{param}"));
    }
    JsonSchema::try_from(schema)
}

fn argument_decisions_schema(parameters: &JsonSchema) -> Value {
    let names = parameters.property_names();
    let properties = names
        .iter()
        .map(|name| (name.to_string(), json!({ "$ref": "#/definitions/nestedObject" })))
        .collect::<Map<_, _>>();
    json!({
        "type": "object",
        "properties": properties,
        "required": names,
        "additionalProperties": false,
        "definitions": {
            "nestedObject": {
                "type": "object",
                "properties": {
                    "needed": { "type": "boolean" },
                    "can_be_found": { "type": "boolean" },
                },
                "required": ["needed", "can_be_found"],
                "additionalProperties": false,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        function::{FunctionDescriptor, TextResponseFunction},
        test_utils::{MockCompletionModel, task_name},
    };

    fn send_email() -> TextResponseFunction {
        let parameters = JsonSchema::try_from(json!({
            "type": "object",
            "properties": {
                "to": { "type": "string" },
                "subject": { "type": "string" },
                "priority": { "type": "integer" },
            },
            "required": ["to", "subject"],
        }))
        .unwrap();
        TextResponseFunction::new(
            FunctionDescriptor::new("send_email", "Send an email").with_parameters(parameters),
            "sent",
        )
    }

    fn decision(needed: bool, can_be_found: bool) -> ArgumentDecision {
        ArgumentDecision {
            needed,
            can_be_found,
        }
    }

    #[tokio::test]
    async fn it_skips_functions_without_parameters() {
        let model = MockCompletionModel::new(|_| json!({}));
        let infiller = ArgumentInfiller::new(model.generator());
        let ping = TextResponseFunction::new(FunctionDescriptor::new("ping", "Ping"), "pong");
        let result = infiller
            .infill(&ping, &[ChatMessage::user("ping")], &HashMap::new())
            .await
            .unwrap();
        assert_eq!(
            result,
            InfillResult {
                complete: true,
                arguments: Map::new(),
            }
        );
        assert_eq!(model.total_calls(), 0);
    }

    #[tokio::test]
    async fn it_reports_missing_arguments() {
        let model = MockCompletionModel::new(|request| match task_name(request) {
            "generate_arguments" => json!({ "subject": "Hello", "priority": 3 }),
            _ => json!({
                "to": { "needed": true, "can_be_found": false },
                "subject": { "needed": true, "can_be_found": true },
                "priority": { "needed": false, "can_be_found": true },
            }),
        });
        let infiller = ArgumentInfiller::new(model.generator());
        let history = [ChatMessage::user("send an email saying Hello")];
        let result = infiller
            .infill(&send_email(), &history, &HashMap::new())
            .await
            .unwrap();
        assert!(!result.complete);
        assert_eq!(result.arguments, json!({ "subject": "Hello" }).as_object().cloned().unwrap());
        assert_eq!(model.calls("generate_arguments"), 1);
        assert_eq!(model.calls("generate_argument_decisions"), 1);

        let decisions_request = model
            .requests()
            .into_iter()
            .find(|request| task_name(request) == "generate_argument_decisions")
            .unwrap();
        let schema = &decisions_request.tools[0].parameters;
        assert_eq!(schema["properties"]["to"]["$ref"], "#/definitions/nestedObject");
        assert_eq!(schema["required"], json!(["to", "subject", "priority"]));
    }

    #[tokio::test]
    async fn it_narrows_parameters_to_entities() {
        let model = MockCompletionModel::new(|request| match task_name(request) {
            "generate_arguments" => json!({ "to": "Richard Hendricks", "subject": "Hi" }),
            _ => json!({
                "to": { "needed": true, "can_be_found": true },
                "subject": { "needed": true, "can_be_found": true },
                "priority": { "needed": false, "can_be_found": false },
            }),
        });
        let infiller = ArgumentInfiller::new(model.generator());
        let mut entities = HashMap::new();
        entities.insert(
            "to".to_owned(),
            vec![
                Entity::new("Richard Hendricks", Some("CEO of Pied Piper")),
                Entity::new("Gavin Belson", None),
            ],
        );
        let result = infiller
            .infill(&send_email(), &[ChatMessage::user("say hi to richard")], &entities)
            .await
            .unwrap();
        assert!(result.complete);
        assert_eq!(result.arguments["to"], "Richard Hendricks");

        let arguments_request = model
            .requests()
            .into_iter()
            .find(|request| task_name(request) == "generate_arguments")
            .unwrap();
        let schema = &arguments_request.tools[0].parameters;
        assert_eq!(schema["properties"]["to"]["$ref"], "#/definitions/to");
        assert_eq!(
            schema["definitions"]["to"],
            json!({
                "oneOf": [
                    { "const": "Richard Hendricks", "description": "CEO of Pied Piper" },
                    { "const": "Gavin Belson" },
                ],
            })
        );
    }

    #[tokio::test]
    async fn it_rejects_unresolved_entities() {
        let model = MockCompletionModel::new(|request| match task_name(request) {
            "generate_arguments" => json!({ "to": "richard", "subject": "Hi" }),
            _ => json!({}),
        });
        let infiller = ArgumentInfiller::new(model.generator());
        let mut entities = HashMap::new();
        entities.insert(
            "to".to_owned(),
            vec![Entity::new("Richard Hendricks", None), Entity::new("Gavin Belson", None)],
        );
        let history = [ChatMessage::user("say hi to richard")];
        let err = infiller
            .generate_arguments(&send_email(), &history, &entities)
            .await
            .unwrap_err();
        let InfillingError::InvalidArguments(SchemaError::Validation(validation)) = err else {
            panic!("expected a validation error");
        };
        assert!(validation.contains_key("/to"));

        let arguments = infiller
            .generate_arguments(&send_email(), &history, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(arguments["to"], "richard");
    }

    #[tokio::test]
    async fn it_rejects_invalid_arguments() {
        let model = MockCompletionModel::new(|request| match task_name(request) {
            "generate_arguments" => json!({ "to": "ann@example.com", "priority": "high" }),
            _ => json!({}),
        });
        let infiller = ArgumentInfiller::new(model.generator());
        let err = infiller
            .infill(&send_email(), &[ChatMessage::user("email Ann")], &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InfillingError::InvalidArguments(_)));
    }

    #[test]
    fn it_finalizes_results() {
        let function = send_email();
        let arguments = json!({ "to": "ann@example.com", "subject": "Hi", "priority": 1 })
            .as_object()
            .cloned()
            .unwrap();
        let mut decisions = HashMap::new();
        decisions.insert("to".to_owned(), decision(true, true));
        decisions.insert("subject".to_owned(), decision(true, true));
        decisions.insert("priority".to_owned(), decision(false, false));

        let result = finalize(function.parameters(), arguments.clone(), &decisions);
        assert!(result.complete);
        assert_eq!(result.arguments.len(), 2);

        decisions.remove("subject");
        let result = finalize(function.parameters(), arguments, &decisions);
        assert!(!result.complete);
        assert!(!result.arguments.contains_key("subject"));
    }
}
