//! Configuration schema (pgparser.toml)

use crate::schema::SchemaMap;
use serde::{Deserialize, Serialize};

/// Parser knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Maximum nesting depth handed to the SQL parser
    pub recursion_limit: usize,

    /// Treat a bare `?` in operand position as a positional placeholder
    pub question_mark_placeholders: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            recursion_limit: 50,
            question_mark_placeholders: true,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserOptions,

    /// Schema metadata for join resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaMap>,
}

impl Config {
    /// Load config from file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&content)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
