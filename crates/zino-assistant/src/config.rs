//! Assistant configuration.

use crate::{AssistantError, entity::DEFAULT_TOP_K, selection::DEFAULT_CHUNK_SIZE};
use std::path::PathBuf;
use toml::Table;
use zino_ai::{JsonMode, extension::TomlTableExt};

/// Configuration read from the `[assistant]` table.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Max number of functions presented to the model in a single selection call.
    pub selection_chunk_size: usize,
    /// Number of entities kept for each parameter.
    pub entity_top_k: usize,
    /// Runs functions without confirmation when all arguments are found.
    pub autorun: bool,
    /// How JSON objects are obtained from the model.
    pub json_mode: JsonMode,
    /// Directories of function descriptors, in registration order.
    pub library_dirs: Vec<PathBuf>,
    /// Provider config of the completion model.
    pub completion: Table,
    /// Provider config of the embedding model.
    pub embedding: Table,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            selection_chunk_size: DEFAULT_CHUNK_SIZE,
            entity_top_k: DEFAULT_TOP_K,
            autorun: true,
            json_mode: JsonMode::default(),
            library_dirs: Vec::new(),
            completion: Table::new(),
            embedding: Table::new(),
        }
    }
}

impl AssistantConfig {
    /// Reads the config from the `[assistant]` table.
    pub fn try_from_table(config: &Table) -> Result<Self, AssistantError> {
        let mut assistant = Self::default();
        if let Some(chunk_size) = config.get_usize("selection-chunk-size") {
            if chunk_size == 0 {
                return Err(AssistantError::Config(
                    "`selection-chunk-size` should be positive".to_owned(),
                ));
            }
            assistant.selection_chunk_size = chunk_size;
        }
        if let Some(top_k) = config.get_usize("entity-top-k") {
            if top_k == 0 {
                return Err(AssistantError::Config(
                    "`entity-top-k` should be positive".to_owned(),
                ));
            }
            assistant.entity_top_k = top_k;
        }
        if let Some(autorun) = config.get_bool("autorun") {
            assistant.autorun = autorun;
        }
        if let Some(json_mode) = config.get_str("json-mode") {
            assistant.json_mode = json_mode.parse().map_err(AssistantError::Config)?;
        }
        if let Some(dirs) = config.get_str_array("library-dirs") {
            assistant.library_dirs = dirs.into_iter().map(PathBuf::from).collect();
        }
        if let Some(completion) = config.get_table("completion") {
            assistant.completion = completion.clone();
        }
        if let Some(embedding) = config.get_table("embedding") {
            assistant.embedding = embedding.clone();
        }
        Ok(assistant)
    }

    /// Parses a TOML document and reads its `[assistant]` table.
    pub fn from_toml_str(s: &str) -> Result<Self, AssistantError> {
        let table: Table = toml::from_str(s).map_err(|err| AssistantError::Config(err.to_string()))?;
        let config = table
            .get_table("assistant")
            .ok_or_else(|| AssistantError::Config("the `[assistant]` table is missing".to_owned()))?;
        Self::try_from_table(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reads_the_assistant_table() {
        let config = AssistantConfig::from_toml_str(
            r#"
            [assistant]
            selection-chunk-size = 6
            autorun = false
            json-mode = "generic"
            library-dirs = ["library/default", "library/sales"]

            [assistant.completion]
            service = "openai"
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(config.selection_chunk_size, 6);
        assert_eq!(config.entity_top_k, 3);
        assert!(!config.autorun);
        assert_eq!(config.json_mode, JsonMode::Generic);
        assert_eq!(config.library_dirs.len(), 2);
        assert_eq!(config.completion.get_str("model"), Some("gpt-4o-mini"));
        assert!(config.embedding.is_empty());
    }

    #[test]
    fn it_rejects_invalid_values() {
        let err = AssistantConfig::from_toml_str("[assistant]\njson-mode = \"xml\"").unwrap_err();
        assert_eq!(err.to_string(), "invalid config: json mode `xml` is unsupported");

        let err = AssistantConfig::from_toml_str("[assistant]\nentity-top-k = 0").unwrap_err();
        assert!(matches!(err, AssistantError::Config(_)));

        assert!(AssistantConfig::from_toml_str("[server]\nport = 80").is_err());
    }
}
