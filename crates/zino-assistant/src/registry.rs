//! Registry of the functions available to the assistant.

use crate::{AssistantError, function::Function, library::FunctionLibrary};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Functions of several libraries, loaded once on first access.
#[derive(Debug)]
pub struct FunctionRegistry {
    libraries: Vec<Arc<dyn FunctionLibrary>>,
    functions: OnceCell<Vec<Arc<dyn Function>>>,
}

impl FunctionRegistry {
    /// Creates a new instance. Functions are not loaded until they are requested.
    pub fn new(libraries: Vec<Arc<dyn FunctionLibrary>>) -> Self {
        Self {
            libraries,
            functions: OnceCell::new(),
        }
    }

    /// Returns the libraries in registration order.
    #[inline]
    pub fn libraries(&self) -> &[Arc<dyn FunctionLibrary>] {
        &self.libraries
    }

    /// Returns the functions of all libraries in registration order.
    ///
    /// Functions with the same id are all kept. If loading fails, nothing is cached
    /// and the next call tries again.
    pub async fn get_all_functions(&self) -> Result<&[Arc<dyn Function>], AssistantError> {
        let functions = self
            .functions
            .get_or_try_init(|| async {
                let mut functions = Vec::new();
                for library in &self.libraries {
                    functions.extend(library.read_all().await?);
                }
                tracing::info!(
                    num_libraries = self.libraries.len(),
                    num_functions = functions.len(),
                    "function registry is loaded"
                );
                Ok::<_, AssistantError>(functions)
            })
            .await?;
        Ok(functions)
    }

    /// Finds a function by id. The first library wins.
    pub async fn find(&self, id: &str) -> Result<Option<Arc<dyn Function>>, AssistantError> {
        let functions = self.get_all_functions().await?;
        Ok(functions.iter().find(|function| function.id() == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        function::{FunctionDescriptor, TextResponseFunction},
        library::{InMemoryLibrary, LibraryError},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLibrary {
        inner: InMemoryLibrary,
        reads: AtomicUsize,
        failures: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl FunctionLibrary for CountingLibrary {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn list_ids(&self) -> Result<Vec<String>, LibraryError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(LibraryError::MissingType);
            }
            self.inner.list_ids().await
        }

        async fn read(&self, id: &str) -> Result<Option<Arc<dyn Function>>, LibraryError> {
            self.inner.read(id).await
        }
    }

    fn text_function(id: &str, text: &str) -> Arc<dyn Function> {
        Arc::new(TextResponseFunction::new(FunctionDescriptor::new(id, id), text))
    }

    fn counting_library(name: &str, functions: Vec<Arc<dyn Function>>) -> Arc<CountingLibrary> {
        Arc::new(CountingLibrary {
            inner: InMemoryLibrary::new(name, functions),
            reads: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn it_loads_functions_once() {
        let first = counting_library(
            "first",
            vec![text_function("ping", "pong"), text_function("greet", "hi")],
        );
        let second = counting_library("second", vec![text_function("ping", "PONG")]);
        let registry = FunctionRegistry::new(vec![
            first.clone() as Arc<dyn FunctionLibrary>,
            second.clone(),
        ]);

        let functions = registry.get_all_functions().await.unwrap().to_vec();
        let ids = functions.iter().map(|f| f.id()).collect::<Vec<_>>();
        assert_eq!(ids, ["ping", "greet", "ping"]);

        let again = registry.get_all_functions().await.unwrap();
        assert!(functions.iter().zip(again).all(|(a, b)| Arc::ptr_eq(a, b)));
        assert_eq!(first.reads.load(Ordering::SeqCst), 1);
        assert_eq!(second.reads.load(Ordering::SeqCst), 1);

        let ping = registry.find("ping").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&ping, &functions[0]));
        assert!(registry.find("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn it_retries_after_failures() {
        let library = counting_library("flaky", vec![text_function("ping", "pong")]);
        library.failures.store(1, Ordering::SeqCst);
        let registry = FunctionRegistry::new(vec![library.clone() as Arc<dyn FunctionLibrary>]);

        let err = registry.get_all_functions().await.unwrap_err();
        assert!(matches!(err, AssistantError::LibraryLoad { ref id, .. } if id == "flaky"));

        let functions = registry.get_all_functions().await.unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(library.reads.load(Ordering::SeqCst), 2);
    }
}
