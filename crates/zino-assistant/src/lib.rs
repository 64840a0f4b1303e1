#![doc = include_str!("../README.md")]
#![doc(html_favicon_url = "https://zino.cc/assets/zino-logo.png")]
#![doc(html_logo_url = "https://zino.cc/assets/zino-logo.svg")]

mod error;

pub mod assistant;
pub mod config;
pub mod entity;
pub mod executor;
pub mod function;
pub mod history;
pub mod infilling;
pub mod library;
pub mod message;
pub mod registry;
pub mod schema;
pub mod selection;

#[cfg(test)]
mod test_utils;

pub use assistant::{Assistant, TurnOptions, can_autorun, last_value};
pub use config::AssistantConfig;
pub use error::AssistantError;
pub use function::{Entity, EntityConfig, ExecutionDeps, Function, FunctionDescriptor};
pub use library::{DirectoryLibrary, FunctionLibrary, InMemoryLibrary};
pub use message::{ChatMessage, FunctionCall, FunctionOutput};
pub use registry::FunctionRegistry;
pub use schema::JsonSchema;
