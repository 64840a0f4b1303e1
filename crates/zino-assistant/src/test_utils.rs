use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use zino_ai::{
    CompletionError, CompletionModel, CompletionModelHandle, CompletionRequest, Embedding,
    EmbeddingError, EmbeddingModel, EmbeddingModelHandle, StructuredGenerator,
    completion::{AssistantContent, CompletionResponse, Usage},
};

type Handler = Arc<dyn Fn(&CompletionRequest) -> Value + Send + Sync>;

/// Replies with the value computed by the handler, as a call of the forced tool
/// or as text when no tool is forced.
#[derive(Clone)]
pub(crate) struct MockCompletionModel {
    handler: Handler,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockCompletionModel {
    pub(crate) fn new(handler: impl Fn(&CompletionRequest) -> Value + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            requests: Arc::default(),
        }
    }

    pub(crate) fn handle(&self) -> CompletionModelHandle {
        CompletionModelHandle::new(self.clone())
    }

    pub(crate) fn generator(&self) -> StructuredGenerator {
        StructuredGenerator::function_calling(self.handle())
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn calls(&self, task_name: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.tags.iter().any(|tag| tag == task_name))
            .count()
    }
}

impl CompletionModel for MockCompletionModel {
    type Response = ();

    async fn completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse<()>, CompletionError> {
        let value = (self.handler)(&request);
        let content = match &request.tool_choice {
            Some(name) => AssistantContent::tool_call("call_0", name.as_str(), value),
            None => match value {
                Value::String(text) => AssistantContent::text(text),
                value => AssistantContent::text(value.to_string()),
            },
        };
        self.requests.lock().push(request);
        Ok(CompletionResponse {
            choice: vec![content],
            usage: Usage::default(),
            raw_response: (),
        })
    }
}

/// Returns the task name of a request sent by a structured generator.
pub(crate) fn task_name(request: &CompletionRequest) -> &str {
    request.tags.last().map(|tag| tag.as_str()).unwrap_or_default()
}

/// Returns all message contents of a request.
pub(crate) fn prompt_text(request: &CompletionRequest) -> String {
    request
        .chat_history
        .iter()
        .map(|message| message.content())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Embeds texts as bag-of-words vectors over a fixed vocabulary.
#[derive(Clone)]
pub(crate) struct MockEmbeddingModel {
    vocabulary: Arc<Vec<String>>,
    calls: Arc<AtomicUsize>,
}

impl MockEmbeddingModel {
    pub(crate) fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: Arc::new(vocabulary.iter().map(|word| word.to_lowercase()).collect()),
            calls: Arc::default(),
        }
    }

    pub(crate) fn handle(&self) -> EmbeddingModelHandle {
        EmbeddingModelHandle::new(self.clone())
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingModel for MockEmbeddingModel {
    fn ndims(&self) -> usize {
        self.vocabulary.len()
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Embedding>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .into_iter()
            .map(|text| {
                let words = text
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .map(|word| word.to_owned())
                    .collect::<Vec<_>>();
                let vec = self
                    .vocabulary
                    .iter()
                    .map(|term| words.iter().filter(|word| *word == term).count() as f64)
                    .collect();
                Embedding {
                    document: text,
                    vec,
                }
            })
            .collect())
    }
}
