//! The turn orchestrator.
//!
//! A turn starts from a chat history ending with a user message and streams the
//! messages the assistant appends to it. Each item supersedes the previous one.

use crate::{
    AssistantError,
    config::AssistantConfig,
    entity::EntityResolver,
    executor,
    function::{ExecutionDeps, Function},
    infilling::{self, ArgumentInfiller, InfillResult},
    library::{DirectoryLibrary, FunctionLibrary},
    message::{ChatMessage, FunctionCall, FunctionInputRequest},
    registry::FunctionRegistry,
    selection::FunctionSelector,
};
use async_stream::try_stream;
use futures::{Stream, StreamExt, stream::BoxStream};
use serde_json::{Map, Value};
use std::{future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use zino_ai::{CompletionModelHandle, EmbeddingModelHandle, StructuredGenerator, providers};

/// Message sent when no function matches the question.
const NO_MATCH_MESSAGE: &str = "No function matching that question was found.";

/// Options of a single turn.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Runs the function without confirmation when all arguments are found.
    pub autorun: bool,
    /// Skips the selection and uses the function with this id.
    pub force_select_function: Option<String>,
    /// Cancels the turn.
    pub cancellation: CancellationToken,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            autorun: true,
            force_select_function: None,
            cancellation: CancellationToken::new(),
        }
    }
}

impl TurnOptions {
    /// Sets the `autorun` flag.
    #[inline]
    pub fn with_autorun(mut self, autorun: bool) -> Self {
        self.autorun = autorun;
        self
    }

    /// Uses the function with the id instead of selecting one.
    #[inline]
    pub fn force_select_function(mut self, id: impl Into<String>) -> Self {
        self.force_select_function = Some(id.into());
        self
    }

    /// Sets the cancellation token.
    #[inline]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// What a turn does once the function and its arguments are known.
enum TurnPlan {
    Reply(ChatMessage),
    Execute {
        function: Arc<dyn Function>,
        arguments: Map<String, Value>,
    },
}

/// An assistant calling the functions of a registry.
#[derive(Debug, Clone)]
pub struct Assistant {
    registry: Arc<FunctionRegistry>,
    selector: FunctionSelector,
    infiller: ArgumentInfiller,
    resolver: EntityResolver,
    summarizer: Option<CompletionModelHandle>,
    autorun: bool,
}

impl Assistant {
    /// Creates a new instance. The completion model of the generator also summarizes
    /// function outputs.
    pub fn new(
        registry: Arc<FunctionRegistry>,
        generator: StructuredGenerator,
        embedding: EmbeddingModelHandle,
    ) -> Self {
        let infiller = ArgumentInfiller::new(generator.clone());
        Self {
            registry,
            summarizer: Some(generator.model().clone()),
            selector: FunctionSelector::new(generator),
            resolver: EntityResolver::new(infiller.clone(), embedding),
            infiller,
            autorun: true,
        }
    }

    /// Creates a new instance from the config, reading functions from the library dirs.
    pub fn try_new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let completion = providers::completion_model(&config.completion)
            .map_err(|err| AssistantError::Config(format!("completion: {err}")))?;
        let embedding = providers::embedding_model(&config.embedding)
            .map_err(|err| AssistantError::Config(format!("embedding: {err}")))?;
        let libraries = config
            .library_dirs
            .iter()
            .map(|dir| Arc::new(DirectoryLibrary::new(dir)) as Arc<dyn FunctionLibrary>)
            .collect();
        let registry = Arc::new(FunctionRegistry::new(libraries));
        let generator = StructuredGenerator::new(completion, config.json_mode);
        let assistant = Self::new(registry, generator, embedding)
            .with_chunk_size(config.selection_chunk_size)
            .with_top_k(config.entity_top_k)
            .with_autorun(config.autorun);
        Ok(assistant)
    }

    /// Sets the max number of functions presented in a single selection call.
    #[inline]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.selector = self.selector.with_chunk_size(chunk_size);
        self
    }

    /// Sets the number of entities kept for each parameter.
    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.resolver = self.resolver.with_top_k(top_k);
        self
    }

    /// Sets the default `autorun` flag, combined with the one of each turn.
    #[inline]
    pub fn with_autorun(mut self, autorun: bool) -> Self {
        self.autorun = autorun;
        self
    }

    /// Sets the model summarizing function outputs.
    #[inline]
    pub fn with_summarizer(mut self, summarizer: Option<CompletionModelHandle>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Returns the function registry.
    #[inline]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Runs a turn, streaming the messages appended to the history.
    ///
    /// Errors raised before the execution are the only item of the stream.
    /// Execution errors are the last item, after the partial outputs.
    pub fn run_turn(
        &self,
        history: Vec<ChatMessage>,
        options: TurnOptions,
    ) -> BoxStream<'_, Result<Vec<ChatMessage>, AssistantError>> {
        Box::pin(turn_stream(self, history, options))
    }

    async fn plan_turn(
        &self,
        history: &[ChatMessage],
        options: &TurnOptions,
    ) -> Result<TurnPlan, AssistantError> {
        let utterance = match history.last() {
            Some(ChatMessage::User {
                input_response: Some(call),
                ..
            }) => {
                let function = self.find_function(&call.name).await?;
                tracing::info!(function_id = function.id(), "running a function with user input");
                return Ok(TurnPlan::Execute {
                    function,
                    arguments: call.arguments.clone(),
                });
            }
            Some(ChatMessage::User { content, .. }) => content.as_str(),
            Some(_) => {
                return Err(AssistantError::InvalidHistory(
                    "the last message should be written by the user",
                ));
            }
            None => return Err(AssistantError::InvalidHistory("the chat history is empty")),
        };

        let function = match &options.force_select_function {
            Some(id) => self.find_function(id).await?,
            None => {
                let candidates = self.registry.get_all_functions().await?;
                let selection = self
                    .selector
                    .select(candidates, utterance)
                    .await
                    .map_err(AssistantError::Selection)?;
                match selection.function {
                    Some(function) => function,
                    None => {
                        let suggestions = selection
                            .suggested_functions
                            .iter()
                            .map(|function| function.display_name())
                            .collect::<Vec<_>>();
                        tracing::info!(?suggestions, "no function is selected");
                        let message = if suggestions.is_empty() {
                            NO_MATCH_MESSAGE.to_owned()
                        } else {
                            format!("{NO_MATCH_MESSAGE} Did you mean: {}?", suggestions.join(", "))
                        };
                        return Ok(TurnPlan::Reply(ChatMessage::assistant(message)));
                    }
                }
            }
        };
        tracing::info!(function_id = function.id(), "function is selected");

        let InfillResult {
            complete,
            arguments,
        } = self.infill(&*function, utterance, history).await?;
        if can_autorun(self.autorun && options.autorun, &*function) && complete {
            return Ok(TurnPlan::Execute {
                function,
                arguments,
            });
        }

        let message = format!(
            "I found the function *{}*. Please fill in the following parameters and I'll run it.",
            function.display_name()
        );
        let request = FunctionInputRequest {
            name: function.id().to_owned(),
            json_schema: function.parameters().clone(),
            arguments,
        };
        Ok(TurnPlan::Reply(ChatMessage::input_request(message, request)))
    }

    async fn find_function(&self, id: &str) -> Result<Arc<dyn Function>, AssistantError> {
        self.registry
            .find(id)
            .await?
            .ok_or_else(|| AssistantError::FunctionNotFound(id.to_owned()))
    }

    async fn infill(
        &self,
        function: &dyn Function,
        utterance: &str,
        history: &[ChatMessage],
    ) -> Result<InfillResult, AssistantError> {
        let parameters = function.parameters();
        if !parameters.has_properties() {
            return Ok(InfillResult {
                complete: true,
                arguments: Map::new(),
            });
        }

        let (arguments, decisions) = futures::try_join!(
            async {
                let entities = self.resolver.resolve(function, utterance, history).await?;
                let arguments = self
                    .infiller
                    .generate_arguments(function, history, &entities)
                    .await?;
                Ok::<_, AssistantError>(arguments)
            },
            async {
                let decisions = self
                    .infiller
                    .generate_argument_decisions(function, history)
                    .await?;
                Ok::<_, AssistantError>(decisions)
            },
        )?;
        Ok(infilling::finalize(parameters, arguments, &decisions))
    }
}

fn turn_stream(
    assistant: &Assistant,
    history: Vec<ChatMessage>,
    options: TurnOptions,
) -> impl Stream<Item = Result<Vec<ChatMessage>, AssistantError>> + Send + '_ {
    let span = tracing::info_span!("turn", turn_id = %Uuid::now_v7());
    try_stream! {
        let token = options.cancellation.clone();
        let plan = cancellable(&token, assistant.plan_turn(&history, &options))
            .instrument(span.clone())
            .await??;
        match plan {
            TurnPlan::Reply(message) => {
                yield vec![message];
            }
            TurnPlan::Execute { function, arguments } => {
                let call = ChatMessage::function_call(FunctionCall::new(function.id(), arguments.clone()));
                yield vec![call.clone()];

                let deps = ExecutionDeps {
                    chat_history: history,
                    arguments,
                    summarizer: assistant.summarizer.clone(),
                };
                let mut outputs = Box::pin(executor::execute(function.clone(), deps));
                while let Some(result) = cancellable(&token, outputs.next())
                    .instrument(span.clone())
                    .await?
                {
                    let update = result?;
                    yield vec![call.clone(), ChatMessage::function(function.id(), update)];
                }
            }
        }
    }
}

/// Awaits the future unless the token is cancelled first.
async fn cancellable<F: Future>(
    token: &CancellationToken,
    future: F,
) -> Result<F::Output, AssistantError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(AssistantError::Cancelled),
        output = future => Ok(output),
    }
}

/// Returns `true` if the function may run without the user's confirmation.
#[inline]
pub fn can_autorun(autorun: bool, function: &dyn Function) -> bool {
    autorun && !function.confirm()
}

/// Folds a stream of snapshots into the last one.
pub async fn last_value<T, E>(
    stream: impl Stream<Item = Result<T, E>>,
) -> Result<Option<T>, E> {
    let mut stream = std::pin::pin!(stream);
    let mut last = None;
    while let Some(item) = stream.next().await {
        last = Some(item?);
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        function::{
            CallableFunction, Entity, EntityConfig, FunctionDescriptor, FunctionError,
            TextResponseFunction,
        },
        infilling::InfillingError,
        library::InMemoryLibrary,
        message::FunctionOutput,
        schema::JsonSchema,
        test_utils::{MockCompletionModel, MockEmbeddingModel, task_name},
    };
    use serde_json::json;
    use std::collections::HashMap;

    const VOCABULARY: &[&str] = &["richard", "hendricks", "gavin", "belson", "pied", "hooli"];

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn ping() -> Arc<dyn Function> {
        Arc::new(TextResponseFunction::new(
            FunctionDescriptor::new("ping", "Check whether the server is up")
                .with_sample_questions(["is the server up?"]),
            "pong",
        ))
    }

    fn send_email() -> Arc<dyn Function> {
        let parameters = JsonSchema::try_from(json!({
            "type": "object",
            "properties": {
                "to": { "type": "string" },
                "subject": { "type": "string" },
            },
            "required": ["to", "subject"],
        }))
        .unwrap();
        Arc::new(CallableFunction::new(
            FunctionDescriptor::new("send_email", "Send an email")
                .with_display_name("Send email")
                .with_parameters(parameters),
            |deps: ExecutionDeps| {
                let to = deps.arguments["to"].as_str().unwrap_or_default().to_owned();
                futures::stream::iter([Ok(vec![FunctionOutput::text(format!("sent to {to}"))])])
            },
        ))
    }

    fn find_email() -> Arc<dyn Function> {
        let parameters = JsonSchema::try_from(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"],
        }))
        .unwrap();
        Arc::new(CallableFunction::new(
            FunctionDescriptor::new("find_email", "Find the email of a person")
                .with_parameters(parameters)
                .with_entities(
                    "name",
                    vec![
                        Entity::new("Richard Hendricks", Some("CEO of Pied Piper")),
                        Entity::new("Gavin Belson", Some("CEO of Hooli")),
                    ],
                ),
            |deps: ExecutionDeps| {
                let name = deps.arguments["name"].as_str().unwrap_or_default().to_owned();
                futures::stream::iter([Ok(vec![FunctionOutput::text(name)])])
            },
        ))
    }

    fn broken() -> Arc<dyn Function> {
        Arc::new(CallableFunction::new(
            FunctionDescriptor::new("broken", "Always fails"),
            |_| {
                futures::stream::iter([
                    Ok(vec![FunctionOutput::text("starting")]),
                    Err(FunctionError::Failed("connection refused".to_owned())),
                ])
            },
        ))
    }

    fn catalog() -> Vec<Arc<dyn Function>> {
        vec![ping(), send_email(), find_email(), broken()]
    }

    /// Selects `target` and answers the infilling tasks with the closures.
    fn scripted(
        target: &'static str,
        arguments: fn(&Value) -> Value,
        decisions: Value,
    ) -> MockCompletionModel {
        MockCompletionModel::new(move |request| match task_name(request) {
            "filter_functions" => {
                let ids = &request.tools[0].parameters["properties"]["function_name"]["enum"];
                if ids.as_array().is_some_and(|ids| ids.contains(&json!(target))) {
                    json!({ "function_name": target })
                } else {
                    json!({})
                }
            }
            "select_function" => json!({ "function_name": target }),
            "generate_arguments" => arguments(&request.tools[0].parameters),
            "generate_argument_decisions" => decisions.clone(),
            _ => json!({}),
        })
    }

    fn assistant(model: &MockCompletionModel) -> Assistant {
        let library = InMemoryLibrary::new("default", catalog());
        let registry = FunctionRegistry::new(vec![Arc::new(library) as Arc<dyn FunctionLibrary>]);
        Assistant::new(
            Arc::new(registry),
            model.generator(),
            MockEmbeddingModel::new(VOCABULARY).handle(),
        )
    }

    async fn run(
        assistant: &Assistant,
        history: Vec<ChatMessage>,
        options: TurnOptions,
    ) -> Vec<Result<Vec<ChatMessage>, AssistantError>> {
        assistant.run_turn(history, options).collect().await
    }

    #[tokio::test]
    async fn it_runs_functions_without_parameters() {
        let model = scripted("ping", |_| json!({}), json!({}));
        let assistant = assistant(&model);
        let history = vec![ChatMessage::user("is the server up?")];
        let items = run(&assistant, history.clone(), TurnOptions::default()).await;

        let call = ChatMessage::function_call(FunctionCall::new("ping", Map::new()));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &vec![call.clone()]);
        assert_eq!(
            items[1].as_ref().unwrap(),
            &vec![call.clone(), ChatMessage::function("ping", vec![FunctionOutput::text("pong")])]
        );
        assert_eq!(model.calls("generate_arguments"), 0);
        assert_eq!(model.calls("generate_argument_decisions"), 0);

        let last = last_value(assistant.run_turn(history, TurnOptions::default()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.len(), 2);
        let ChatMessage::Function { outputs, .. } = &last[1] else {
            panic!("expected a function message");
        };
        assert_eq!(outputs, &[FunctionOutput::text("pong")]);
    }

    #[tokio::test]
    async fn it_asks_for_missing_arguments() {
        let model = scripted(
            "send_email",
            |_| json!({ "subject": "Launch" }),
            json!({
                "to": { "needed": true, "can_be_found": false },
                "subject": { "needed": true, "can_be_found": true },
            }),
        );
        let assistant = assistant(&model);
        let items = run(
            &assistant,
            vec![ChatMessage::user("send an email about the launch")],
            TurnOptions::default(),
        )
        .await;

        assert_eq!(items.len(), 1);
        let messages = items[0].as_ref().unwrap();
        let ChatMessage::Assistant {
            content,
            input_request: Some(request),
            function_call: None,
        } = &messages[0]
        else {
            panic!("expected an input request");
        };
        assert!(content.contains("*Send email*"));
        assert_eq!(request.name, "send_email");
        assert_eq!(request.arguments, object(json!({ "subject": "Launch" })));
        assert!(request.json_schema.is_required("to"));
    }

    #[tokio::test]
    async fn it_narrows_entities() {
        let model = scripted(
            "find_email",
            |schema| match schema["definitions"]["name"]["oneOf"][0]["const"].as_str() {
                Some(identity) => json!({ "name": identity }),
                None => json!({ "name": "richard" }),
            },
            json!({ "name": { "needed": true, "can_be_found": true } }),
        );
        let assistant = assistant(&model);
        let items = run(
            &assistant,
            vec![ChatMessage::user("what is richard's email?")],
            TurnOptions::default(),
        )
        .await;

        assert_eq!(model.calls("generate_arguments"), 2);
        let last = items.last().unwrap().as_ref().unwrap();
        assert_eq!(
            last[0],
            ChatMessage::function_call(FunctionCall::new(
                "find_email",
                object(json!({ "name": "Richard Hendricks" }))
            ))
        );
        assert_eq!(
            last[1],
            ChatMessage::function("find_email", vec![FunctionOutput::text("Richard Hendricks")])
        );
    }

    #[tokio::test]
    async fn unresolved_entities_are_never_executed() {
        let model = scripted(
            "find_email",
            |_| json!({ "name": "richard" }),
            json!({ "name": { "needed": true, "can_be_found": true } }),
        );
        let assistant = assistant(&model);
        let items = run(
            &assistant,
            vec![ChatMessage::user("what is richard's email?")],
            TurnOptions::default(),
        )
        .await;

        assert_eq!(model.calls("generate_arguments"), 2);
        assert!(items.iter().flatten().flatten().all(|message| !matches!(
            message,
            ChatMessage::Assistant { function_call: Some(_), .. } | ChatMessage::Function { .. }
        )));
        assert!(matches!(
            items.last(),
            Some(Err(AssistantError::Infilling(InfillingError::InvalidArguments(_))))
        ));
    }

    #[tokio::test]
    async fn it_fails_on_unknown_forced_functions() {
        let model = scripted("ping", |_| json!({}), json!({}));
        let assistant = assistant(&model);
        let items = run(
            &assistant,
            vec![ChatMessage::user("hello")],
            TurnOptions::default().force_select_function("made_up"),
        )
        .await;

        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(AssistantError::FunctionNotFound(id)) if id == "made_up"));
        assert_eq!(model.total_calls(), 0);
    }

    #[tokio::test]
    async fn it_runs_forced_functions() {
        let model = scripted("send_email", |_| json!({}), json!({}));
        let assistant = assistant(&model);
        let items = run(
            &assistant,
            vec![ChatMessage::user("ping")],
            TurnOptions::default().force_select_function("ping"),
        )
        .await;
        assert_eq!(items.len(), 2);
        assert_eq!(model.total_calls(), 0);
    }

    #[tokio::test]
    async fn it_executes_input_responses() {
        let model = scripted("send_email", |_| json!({}), json!({}));
        let assistant = assistant(&model);
        let arguments = object(json!({ "to": "ceo@hooli.com", "subject": "Launch" }));
        let request = FunctionInputRequest {
            name: "send_email".to_owned(),
            json_schema: send_email().parameters().clone(),
            arguments: object(json!({ "subject": "Launch" })),
        };
        let history = vec![
            ChatMessage::user("send an email about the launch"),
            ChatMessage::input_request("Please fill in the parameters.", request),
            ChatMessage::input_response("send_email", arguments.clone()),
        ];
        let items = run(&assistant, history, TurnOptions::default()).await;

        assert_eq!(model.total_calls(), 0);
        let last = items.last().unwrap().as_ref().unwrap();
        assert_eq!(
            last[0],
            ChatMessage::function_call(FunctionCall::new("send_email", arguments))
        );
        assert_eq!(
            last[1],
            ChatMessage::function("send_email", vec![FunctionOutput::text("sent to ceo@hooli.com")])
        );
    }

    #[tokio::test]
    async fn confirmation_prevents_autorun() {
        let confirm: Arc<dyn Function> = Arc::new(TextResponseFunction::new(
            FunctionDescriptor::new("reboot", "Reboot the server").with_confirm(true),
            "rebooting",
        ));
        assert!(!can_autorun(true, &*confirm));
        assert!(can_autorun(true, &*ping()));
        assert!(!can_autorun(false, &*ping()));

        let model = scripted("reboot", |_| json!({}), json!({}));
        let registry = FunctionRegistry::new(vec![
            Arc::new(InMemoryLibrary::new("ops", vec![confirm])) as Arc<dyn FunctionLibrary>,
        ]);
        let assistant = Assistant::new(
            Arc::new(registry),
            model.generator(),
            MockEmbeddingModel::new(VOCABULARY).handle(),
        );
        let items = run(&assistant, vec![ChatMessage::user("reboot")], TurnOptions::default()).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0].as_ref().unwrap()[0],
            ChatMessage::Assistant { input_request: Some(request), .. } if request.name == "reboot"
        ));

        let items = run(
            &assistant,
            vec![ChatMessage::user("ping")],
            TurnOptions::default().with_autorun(false).force_select_function("reboot"),
        )
        .await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn it_replies_when_nothing_matches() {
        let model = MockCompletionModel::new(|request| match task_name(request) {
            "filter_functions" => json!({ "function_name": "send_email" }),
            _ => json!({ "suggested_function_names": ["send_email"] }),
        });
        let assistant = assistant(&model);
        let items = run(&assistant, vec![ChatMessage::user("write a poem")], TurnOptions::default()).await;
        assert_eq!(
            items[0].as_ref().unwrap(),
            &vec![ChatMessage::assistant(
                "No function matching that question was found. Did you mean: Send email?"
            )]
        );

        let model = MockCompletionModel::new(|_| json!({}));
        let assistant = self::assistant(&model);
        let items = run(&assistant, vec![ChatMessage::user("write a poem")], TurnOptions::default()).await;
        assert_eq!(
            items[0].as_ref().unwrap(),
            &vec![ChatMessage::assistant(NO_MATCH_MESSAGE)]
        );
    }

    #[tokio::test]
    async fn execution_errors_come_last() {
        let model = scripted("broken", |_| json!({}), json!({}));
        let assistant = assistant(&model);
        let items = run(&assistant, vec![ChatMessage::user("break it")], TurnOptions::default()).await;
        assert_eq!(items.len(), 3);
        assert!(items[1].is_ok());
        assert!(matches!(
            &items[2],
            Err(AssistantError::Execution { function_id, .. }) if function_id == "broken"
        ));

        let err = last_value(assistant.run_turn(
            vec![ChatMessage::user("break it")],
            TurnOptions::default(),
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, AssistantError::Execution { .. }));
    }

    #[tokio::test]
    async fn it_rejects_invalid_histories() {
        let model = scripted("ping", |_| json!({}), json!({}));
        let assistant = assistant(&model);
        let items = run(&assistant, Vec::new(), TurnOptions::default()).await;
        assert!(matches!(&items[0], Err(AssistantError::InvalidHistory(_))));

        let items = run(&assistant, vec![ChatMessage::assistant("hi")], TurnOptions::default()).await;
        assert!(matches!(&items[0], Err(AssistantError::InvalidHistory(_))));
    }

    #[tokio::test]
    async fn cancelled_turns_stop() {
        let model = scripted("ping", |_| json!({}), json!({}));
        let assistant = assistant(&model);
        let token = CancellationToken::new();
        token.cancel();
        let items = run(
            &assistant,
            vec![ChatMessage::user("is the server up?")],
            TurnOptions::default().with_cancellation(token),
        )
        .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(AssistantError::Cancelled)));
        assert_eq!(model.total_calls(), 0);
    }

    #[tokio::test]
    async fn entity_configs_are_read_lazily() {
        let function = find_email();
        let configs: HashMap<String, EntityConfig> = function.entity_configs().await;
        assert_eq!(configs["name"].entities.len(), 2);
    }
}
