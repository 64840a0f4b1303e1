use super::{ExecutionDeps, Function, FunctionDescriptor, FunctionError, OutputStream};
use crate::{
    history,
    message::{FunctionOutput, SuggestedPrompt},
};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    process::Command,
};
use zino_ai::completion::CompletionRequestBuilder;

/// A function running an external program.
///
/// The arguments are written to the child's stdin as a single line of JSON.
/// Every non-empty line the child writes to stdout is a JSON array of outputs
/// superseding the previous one. A non-zero exit status is a failure carrying
/// the child's stderr.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandFunction {
    #[serde(flatten)]
    descriptor: FunctionDescriptor,
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    working_dir: Option<PathBuf>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default = "CommandFunction::default_timeout")]
    timeout: u64,
    #[serde(default)]
    summarize: bool,
    #[serde(default)]
    suggested_follow_ups: Vec<SuggestedPrompt>,
}

impl CommandFunction {
    /// Creates a new instance.
    pub fn new(descriptor: FunctionDescriptor, program: impl Into<String>) -> Self {
        Self {
            descriptor,
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
            timeout: Self::default_timeout(),
            summarize: false,
            suggested_follow_ups: Vec::new(),
        }
    }

    /// Sets the program arguments.
    pub fn with_args<T: Into<String>>(mut self, args: impl IntoIterator<Item = T>) -> Self {
        self.args = args.into_iter().map(|arg| arg.into()).collect();
        self
    }

    /// Sets the working directory.
    #[inline]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets an environment variable of the child.
    #[inline]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the maximum number of seconds to wait for each output line.
    #[inline]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Summarizes the outputs with the summarization model.
    #[inline]
    pub fn with_summary(mut self, summarize: bool) -> Self {
        self.summarize = summarize;
        self
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

    fn default_timeout() -> u64 {
        60
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

fn run_command(
    function: CommandFunction,
    deps: ExecutionDeps,
) -> impl Stream<Item = Result<Vec<FunctionOutput>, FunctionError>> + Send + 'static {
    try_stream! {
        let function_id = function.descriptor.id.clone();
        let timeout = Duration::from_secs(function.timeout);
        let mut child = function.command().spawn()?;
        tracing::debug!(function_id = %function_id, program = %function.program, "spawned a child process");

        if let Some(mut stdin) = child.stdin.take() {
            let mut input = serde_json::to_vec(&deps.arguments)?;
            input.push(b'\n');
            stdin.write_all(&input).await?;
        }

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        let mut outputs = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                let line = tokio::time::timeout(timeout, lines.next_line())
                    .await
                    .map_err(|_| FunctionError::Timeout(timeout))??;
                let Some(line) = line else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                outputs = serde_json::from_str::<Vec<FunctionOutput>>(&line)?;
                yield outputs.clone();
            }
        }

        let status = tokio::time::timeout(timeout, child.wait())
            .await
            .map_err(|_| FunctionError::Timeout(timeout))??;
        if !status.success() {
            let stderr = stderr_task.await.unwrap_or_default();
            let message = match stderr.trim() {
                "" => format!("`{}` exited with {status}", function.program),
                stderr => stderr.to_owned(),
            };
            Err::<(), _>(FunctionError::Failed(message))?;
        }

        if function.summarize {
            if let Some(summarizer) = deps.summarizer.as_ref() {
                let messages = history::summarization_messages(
                    &deps.chat_history,
                    &function_id,
                    &deps.arguments,
                    &outputs,
                );
                let request = CompletionRequestBuilder::from_messages(messages)
                    .tags(["summarize_outputs"])
                    .build();
                let position = outputs.len();
                outputs.push(FunctionOutput::text(""));

                let mut summary = String::new();
                let mut deltas = summarizer.stream(request).await?;
                while let Some(delta) = deltas.next().await {
                    summary.push_str(&delta?);
                    outputs[position] = FunctionOutput::text(summary.as_str());
                    yield outputs.clone();
                }
            }
        }

        if !function.suggested_follow_ups.is_empty() {
            outputs.push(FunctionOutput::follow_ups(function.suggested_follow_ups.clone()));
            yield outputs;
        }
    }
}

#[async_trait::async_trait]
impl Function for CommandFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn function_type(&self) -> &'static str {
        "CommandFunction"
    }

    fn execute(&self, deps: ExecutionDeps) -> OutputStream {
        Box::pin(run_command(self.clone(), deps))
    }
}
