use crate::{function::FunctionError, infilling::InfillingError, library::LibraryError};
use thiserror::Error;
use zino_ai::{ExtractionError, vector_store::VectorStoreError};

/// Errors raised during a turn.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// A function descriptor could not be loaded.
    #[error("failed to load `{id}`: {source}")]
    LibraryLoad {
        /// Function id.
        id: String,
        /// Underlying error.
        source: LibraryError,
    },

    /// No function has the id.
    #[error("function `{0}` is not found")]
    FunctionNotFound(String),

    /// Function selection failed.
    #[error("failed to select a function: {0}")]
    Selection(#[source] ExtractionError),

    /// Argument infilling failed.
    #[error("failed to infill the arguments: {0}")]
    Infilling(#[from] InfillingError),

    /// The function failed. Yielded after any partial outputs.
    #[error("failed to execute `{function_id}`: {source}")]
    Execution {
        /// Function id.
        function_id: String,
        /// Underlying error.
        source: FunctionError,
    },

    /// The chat history is malformed.
    #[error("invalid chat history: {0}")]
    InvalidHistory(&'static str),

    /// Entity resolution failed.
    #[error("failed to resolve entities: {0}")]
    EntityResolution(#[from] VectorStoreError),

    /// The turn was cancelled.
    #[error("the turn is cancelled")]
    Cancelled,

    /// The configuration is invalid.
    #[error("invalid config: {0}")]
    Config(String),
}
