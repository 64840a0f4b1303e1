//! Sources of function descriptors.

use crate::{
    AssistantError,
    function::{CommandFunction, Function, TextResponseFunction},
};
use futures::future;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use zino_ai::extension::TomlTableExt;

/// Errors raised when reading a function descriptor.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The descriptor is not valid TOML or does not match the function type.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The descriptor has no `type` field.
    #[error("the `type` field is missing")]
    MissingType,

    /// The function type is not supported by the library.
    #[error("function type `{0}` is not supported")]
    UnsupportedType(String),
}

/// A source of functions.
#[async_trait::async_trait]
pub trait FunctionLibrary: Send + Sync {
    /// Returns the library name.
    fn name(&self) -> &str;

    /// Lists the ids of the functions.
    async fn list_ids(&self) -> Result<Vec<String>, LibraryError>;

    /// Reads the function with the id.
    async fn read(&self, id: &str) -> Result<Option<Arc<dyn Function>>, LibraryError>;

    /// Reads all functions in the listed order.
    async fn read_all(&self) -> Result<Vec<Arc<dyn Function>>, AssistantError> {
        let ids = self
            .list_ids()
            .await
            .map_err(|source| AssistantError::LibraryLoad {
                id: self.name().to_owned(),
                source,
            })?;
        let functions = future::try_join_all(ids.iter().map(|id| async move {
            self.read(id)
                .await
                .map_err(|source| AssistantError::LibraryLoad {
                    id: id.clone(),
                    source,
                })
        }))
        .await?;
        Ok(functions.into_iter().flatten().collect())
    }
}

impl fmt::Debug for dyn FunctionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionLibrary")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// A library of functions constructed in process.
#[derive(Debug, Clone)]
pub struct InMemoryLibrary {
    name: String,
    functions: Vec<Arc<dyn Function>>,
}

impl InMemoryLibrary {
    /// Creates a new instance.
    pub fn new(name: impl Into<String>, functions: Vec<Arc<dyn Function>>) -> Self {
        Self {
            name: name.into(),
            functions,
        }
    }
}

#[async_trait::async_trait]
impl FunctionLibrary for InMemoryLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_ids(&self) -> Result<Vec<String>, LibraryError> {
        Ok(self
            .functions
            .iter()
            .map(|function| function.id().to_owned())
            .collect())
    }

    async fn read(&self, id: &str) -> Result<Option<Arc<dyn Function>>, LibraryError> {
        Ok(self
            .functions
            .iter()
            .find(|function| function.id() == id)
            .cloned())
    }

    async fn read_all(&self) -> Result<Vec<Arc<dyn Function>>, AssistantError> {
        Ok(self.functions.clone())
    }
}

/// A directory with one `*.toml` descriptor per function. The file stem is the id.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    name: String,
    dir: PathBuf,
}

impl DirectoryLibrary {
    /// Creates a new instance named after the directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.to_string_lossy().into_owned());
        Self { name, dir }
    }

    /// Returns the directory.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait::async_trait]
impl FunctionLibrary for DirectoryLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_ids(&self) -> Result<Vec<String>, LibraryError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn read(&self, id: &str) -> Result<Option<Arc<dyn Function>>, LibraryError> {
        let path = self.dir.join(format!("{id}.toml"));
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(id, path = %path.display(), "read a function descriptor");
        parse_function(id, &content).map(Some)
    }
}

/// Parses a TOML function descriptor, dispatching on the `type` field.
pub fn parse_function(id: &str, content: &str) -> Result<Arc<dyn Function>, LibraryError> {
    let table: toml::Table = toml::from_str(content)?;
    let function_type = table.get_str("type").ok_or(LibraryError::MissingType)?;
    let function: Arc<dyn Function> = match function_type {
        "TextResponseFunction" => {
            let function: TextResponseFunction = toml::from_str(content)?;
            Arc::new(function.with_id(id))
        }
        "CommandFunction" => {
            let function: CommandFunction = toml::from_str(content)?;
            Arc::new(function.with_id(id))
        }
        _ => return Err(LibraryError::UnsupportedType(function_type.to_owned())),
    };
    Ok(function)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionDescriptor;

    const GREET: &str = r#"
        type = "TextResponseFunction"
        display-name = "Greeting"
        description = "Say hello"
        text-response = "Hello!"
    "#;

    #[tokio::test]
    async fn it_reads_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greet.toml"), GREET).unwrap();
        std::fs::write(
            dir.path().join("count_users.toml"),
            "type = \"CommandFunction\"\ndescription = \"Count\"\nprogram = \"true\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let library = DirectoryLibrary::new(dir.path());
        assert_eq!(library.list_ids().await.unwrap(), ["count_users", "greet"]);
        assert!(library.read("missing").await.unwrap().is_none());

        let functions = library.read_all().await.unwrap();
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[0].function_type(), "CommandFunction");
        assert_eq!(functions[1].id(), "greet");
        assert_eq!(functions[1].display_name(), "Greeting");
    }

    #[tokio::test]
    async fn it_names_broken_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greet.toml"), GREET).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "description = \"no type\"").unwrap();

        let err = DirectoryLibrary::new(dir.path()).read_all().await.unwrap_err();
        assert_eq!(err.to_string(), "failed to load `broken`: the `type` field is missing");
    }

    #[test]
    fn it_rejects_unknown_types() {
        let err = parse_function("plot", "type = \"PlotFunction\"").unwrap_err();
        assert!(matches!(err, LibraryError::UnsupportedType(t) if t == "PlotFunction"));
    }

    #[tokio::test]
    async fn it_keeps_in_memory_order() {
        let functions: Vec<Arc<dyn Function>> = ["b", "a"]
            .into_iter()
            .map(|id| {
                Arc::new(TextResponseFunction::new(FunctionDescriptor::new(id, id), id))
                    as Arc<dyn Function>
            })
            .collect();
        let library = InMemoryLibrary::new("default", functions);
        assert_eq!(library.list_ids().await.unwrap(), ["b", "a"]);
        assert_eq!(library.read("a").await.unwrap().unwrap().id(), "a");
    }
}
