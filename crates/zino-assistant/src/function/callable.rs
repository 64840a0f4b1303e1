use super::{
    EntityConfig, ExecutionDeps, Function, FunctionDescriptor, FunctionError, OutputStream,
};
use crate::message::FunctionOutput;
use futures::{Stream, future::BoxFuture};
use std::{collections::HashMap, fmt, future::Future, sync::Arc};

type ExecuteFn = Arc<dyn Fn(ExecutionDeps) -> OutputStream + Send + Sync>;
type EntityConfigsFn = Arc<dyn Fn() -> BoxFuture<'static, HashMap<String, EntityConfig>> + Send + Sync>;

/// A function backed by a Rust closure.
#[derive(Clone)]
pub struct CallableFunction {
    descriptor: FunctionDescriptor,
    execute: ExecuteFn,
    entity_configs: Option<EntityConfigsFn>,
}

impl CallableFunction {
    /// Creates a new instance with the closure producing the output stream.
    pub fn new<F, S>(descriptor: FunctionDescriptor, execute: F) -> Self
    where
        F: Fn(ExecutionDeps) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Vec<FunctionOutput>, FunctionError>> + Send + 'static,
    {
        Self {
            descriptor,
            execute: Arc::new(move |deps| -> OutputStream { Box::pin(execute(deps)) }),
            entity_configs: None,
        }
    }

    /// Computes the entity configs with the closure instead of reading the descriptor.
    pub fn with_entity_configs<F, Fut>(mut self, entity_configs: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HashMap<String, EntityConfig>> + Send + 'static,
    {
        self.entity_configs = Some(Arc::new(
            move || -> BoxFuture<'static, HashMap<String, EntityConfig>> {
                Box::pin(entity_configs())
            },
        ));
        self
    }
}

impl fmt::Debug for CallableFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableFunction")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Function for CallableFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn function_type(&self) -> &'static str {
        "CallableFunction"
    }

    fn execute(&self, deps: ExecutionDeps) -> OutputStream {
        (self.execute)(deps)
    }

    async fn entity_configs(&self) -> HashMap<String, EntityConfig> {
        match &self.entity_configs {
            Some(entity_configs) => entity_configs().await,
            None => self.descriptor.entity_configs.clone(),
        }
    }
}
