//! Execution of functions.

use crate::{
    AssistantError,
    function::{ExecutionDeps, Function, FunctionError},
    message::FunctionOutput,
};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;

/// Executes a function after validating the arguments against its parameters.
///
/// Every item is the latest set of outputs. A failure is the last item.
pub fn execute(
    function: Arc<dyn Function>,
    deps: ExecutionDeps,
) -> impl Stream<Item = Result<Vec<FunctionOutput>, AssistantError>> + Send + 'static {
    try_stream! {
        let function_id = function.id().to_owned();
        let execution_error = |source: FunctionError| AssistantError::Execution {
            function_id: function_id.clone(),
            source,
        };
        function
            .parameters()
            .validate(&deps.arguments)
            .map_err(|err| execution_error(err.into()))?;

        tracing::info!(
            function_id = %function_id,
            function_type = function.function_type(),
            "executing a function"
        );
        let mut outputs = function.execute(deps);
        let mut num_updates = 0;
        while let Some(result) = outputs.next().await {
            let update = result.map_err(execution_error)?;
            num_updates += 1;
            tracing::debug!(
                function_id = %function_id,
                num_updates,
                num_outputs = update.len(),
                "function update"
            );
            yield update;
        }
        tracing::info!(function_id = %function_id, num_updates, "function is executed");
    }
}
