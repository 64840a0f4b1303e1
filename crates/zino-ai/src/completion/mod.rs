//! Chat completion models.
//!
//! The [`CompletionModel`] trait is the interface between providers and the rest of the
//! workspace. It is not dyn-compatible; use [`CompletionModelDyn`] or the
//! [`CompletionModelHandle`] wrapper when the model has to be stored behind a pointer.

mod message;
mod request;

pub use message::{AssistantContent, Message, Role, ToolCall, ensure_alternating};
pub use request::{
    CompletionError, CompletionModel, CompletionModelDyn, CompletionModelHandle,
    CompletionRequest, CompletionRequestBuilder, CompletionResponse, StreamingCompletion,
    ToolDefinition, Usage,
};
