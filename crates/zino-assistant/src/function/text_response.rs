use super::{ExecutionDeps, Function, FunctionDescriptor, OutputStream};
use crate::message::{FunctionOutput, SuggestedPrompt};
use serde::Deserialize;

/// A function replying with a fixed text followed by suggested prompts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TextResponseFunction {
    #[serde(flatten)]
    descriptor: FunctionDescriptor,
    text_response: String,
    #[serde(default)]
    suggested_follow_ups: Vec<SuggestedPrompt>,
}

impl TextResponseFunction {
    /// Creates a new instance.
    pub fn new(descriptor: FunctionDescriptor, text_response: impl Into<String>) -> Self {
        Self {
            descriptor,
            text_response: text_response.into(),
            suggested_follow_ups: Vec::new(),
        }
    }

    /// Sets the suggested follow-ups.
    #[inline]
    pub fn with_follow_ups(mut self, follow_ups: Vec<SuggestedPrompt>) -> Self {
        self.suggested_follow_ups = follow_ups;
        self
    }

    /// Sets the function id.
    #[inline]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.descriptor.id = id.into();
        self
    }
}

#[async_trait::async_trait]
impl Function for TextResponseFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn function_type(&self) -> &'static str {
        "TextResponseFunction"
    }

    fn execute(&self, _deps: ExecutionDeps) -> OutputStream {
        let text = FunctionOutput::text(self.text_response.as_str());
        let mut versions = vec![Ok(vec![text.clone()])];
        if !self.suggested_follow_ups.is_empty() {
            let follow_ups = FunctionOutput::follow_ups(self.suggested_follow_ups.clone());
            versions.push(Ok(vec![text, follow_ups]));
        }
        Box::pin(futures::stream::iter(versions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn it_replies_then_suggests() {
        let function: TextResponseFunction = toml::from_str(
            r#"
            type = "TextResponseFunction"
            description = "Say hello"
            sample-questions = ["hi"]
            text-response = "Hello!"

            [[suggested-follow-ups]]
            title = "Status"
            prompt = "Is the server up?"
            "#,
        )
        .unwrap();
        let function = function.with_id("greet");
        assert_eq!(function.id(), "greet");
        assert_eq!(function.sample_questions(), &["hi".to_owned()]);

        let versions = function
            .execute(ExecutionDeps::default())
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0], vec![FunctionOutput::text("Hello!")]);
        assert_eq!(
            versions[1][1],
            FunctionOutput::follow_ups(vec![SuggestedPrompt {
                title: "Status".to_owned(),
                prompt: "Is the server up?".to_owned(),
            }])
        );
    }

    #[tokio::test]
    async fn empty_follow_ups_are_not_emitted() {
        let function = TextResponseFunction::new(FunctionDescriptor::new("ping", "Ping"), "pong");
        let versions = function
            .execute(ExecutionDeps::default())
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert_eq!(versions, [vec![FunctionOutput::text("pong")]]);
    }
}
