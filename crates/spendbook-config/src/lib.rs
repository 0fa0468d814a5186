//! Configuration management for spendbook
//!
//! This module handles loading, validation, and management of
//! spendbook configuration from YAML files.

pub mod error;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use error::ConfigError;

// ==================== Configuration Types ====================

/// Shared settings for every paged list screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListsConfig {
    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Delay applied to search edits while the text filter is non-empty
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Filter key that selects the debounce delay
    #[serde(default = "default_text_filter")]
    pub text_filter: String,
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            debounce_ms: default_debounce_ms(),
            text_filter: default_text_filter(),
        }
    }
}

fn default_page_size() -> usize {
    25
}

fn default_debounce_ms() -> u64 {
    400
}

fn default_text_filter() -> String {
    "name".to_string()
}

/// Category list settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesConfig {
    /// Initial sort, encoded as `field,direction`
    #[serde(default = "default_category_sort")]
    pub default_sort: String,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            default_sort: default_category_sort(),
        }
    }
}

fn default_category_sort() -> String {
    "name,asc".to_string()
}

/// Expense list settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpensesConfig {
    /// Initial sort, encoded as `field,direction`
    #[serde(default = "default_expense_sort")]
    pub default_sort: String,
}

impl Default for ExpensesConfig {
    fn default() -> Self {
        Self {
            default_sort: default_expense_sort(),
        }
    }
}

fn default_expense_sort() -> String {
    "date,desc".to_string()
}

/// Data settings for the in-process backend
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataConfig {
    /// YAML file with categories and expenses to preload
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub lists: ListsConfig,
    #[serde(default)]
    pub categories: CategoriesConfig,
    #[serde(default)]
    pub expenses: ExpensesConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // serde_yaml turns an empty document into unit, not an empty map
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| ConfigError::InvalidYaml {
                message: e.to_string(),
            })?
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lists.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "lists.page_size".to_string(),
                reason: "Page size must be greater than 0".to_string(),
            });
        }

        if self.lists.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::InvalidValue {
                field: "lists.debounce_ms".to_string(),
                reason: format!("Debounce must not exceed {} ms", MAX_DEBOUNCE_MS),
            });
        }

        if self.lists.text_filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "lists.text_filter".to_string(),
                reason: "Text filter key must not be empty".to_string(),
            });
        }

        for (field, sort) in [
            ("categories.default_sort", &self.categories.default_sort),
            ("expenses.default_sort", &self.expenses.default_sort),
        ] {
            if !is_valid_sort(sort) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("'{}' is not of the form field,asc|desc", sort),
                });
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Log level must be one of {}", LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default() -> &'static str {
        include_str!("../templates/default_config.yaml")
    }
}

fn is_valid_sort(sort: &str) -> bool {
    match sort.split_once(',') {
        Some((field, direction)) => {
            !field.trim().is_empty()
                && matches!(direction.trim().to_lowercase().as_str(), "asc" | "desc")
        }
        None => false,
    }
}
