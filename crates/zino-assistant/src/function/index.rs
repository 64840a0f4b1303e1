use super::{ExecutionDeps, Function, FunctionDescriptor, FunctionError, OutputStream};
use crate::{library::FunctionLibrary, message::FunctionOutput};
use async_stream::try_stream;
use futures::{Stream, future::BoxFuture};
use std::{fmt, sync::Arc};

type FunctionsFuture = BoxFuture<'static, Result<Vec<Arc<dyn Function>>, FunctionError>>;

/// Provides the functions listed by an [`IndexFunction`].
pub type FunctionsProvider = Arc<dyn Fn() -> FunctionsFuture + Send + Sync>;

/// A function listing the other functions with their descriptions.
#[derive(Clone)]
pub struct IndexFunction {
    descriptor: FunctionDescriptor,
    functions: FunctionsProvider,
}

impl IndexFunction {
    /// Creates a new instance.
    pub fn new(descriptor: FunctionDescriptor, functions: FunctionsProvider) -> Self {
        Self {
            descriptor,
            functions,
        }
    }

    /// Creates a new instance listing the functions of the libraries.
    pub fn from_libraries(
        descriptor: FunctionDescriptor,
        libraries: Vec<Arc<dyn FunctionLibrary>>,
    ) -> Self {
        let functions: FunctionsProvider = Arc::new(move || -> FunctionsFuture {
            let libraries = libraries.clone();
            Box::pin(async move {
                let mut functions = Vec::new();
                for library in libraries {
                    let loaded = library
                        .read_all()
                        .await
                        .map_err(|err| FunctionError::Failed(err.to_string()))?;
                    functions.extend(loaded);
                }
                Ok(functions)
            })
        });
        Self::new(descriptor, functions)
    }
}

impl fmt::Debug for IndexFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexFunction")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

fn list_functions(
    functions: FunctionsProvider,
) -> impl Stream<Item = Result<Vec<FunctionOutput>, FunctionError>> + Send + 'static {
    try_stream! {
        let mut text = String::new();
        for function in functions().await? {
            if function.function_type() == "IndexFunction" {
                continue;
            }
            text.push_str(&format!(
                "**{}**\n{}\n\n",
                function.display_name(),
                function.description()
            ));
            yield vec![FunctionOutput::text(text.as_str())];
        }
    }
}

#[async_trait::async_trait]
impl Function for IndexFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn function_type(&self) -> &'static str {
        "IndexFunction"
    }

    fn execute(&self, _deps: ExecutionDeps) -> OutputStream {
        Box::pin(list_functions(self.functions.clone()))
    }
}
