//! Configuration management for turnloop.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `DEFAULT_MODEL` - Optional. The default LLM model to use. Defaults to `openai/gpt-4o-mini`.
//! - `MODEL_TIMEOUT_SECS` - Optional. Upper bound on a single model call. Defaults to `60`.
//! - `MAX_TOOL_ITERATIONS` - Optional. Tool executions allowed per turn. Defaults to `8`.
//! - `TAVILY_API_KEY` - Optional. Enables the Tavily backend of the search tool.
//! - `APPROVE_TOOLS` - Optional. Comma-separated tool names that always require human approval.
//! - `CHECKPOINT_DB` - Optional. Sqlite path for persistent checkpoints; in-memory when unset.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Dispatch loop configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// Default LLM model identifier (OpenRouter format)
    pub default_model: String,

    /// Upper bound on a single model call, in seconds
    pub model_timeout_secs: u64,

    /// Tool executions allowed per turn before the loop aborts
    pub max_tool_iterations: usize,

    /// Tavily search API key (search tool falls back to scraping without it)
    pub tavily_api_key: Option<String>,

    /// Tool names that always require human approval
    pub approve_tools: Vec<String>,

    /// Sqlite path for persistent checkpoints
    pub checkpoint_db: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

        let model_timeout_secs = std::env::var("MODEL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MODEL_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        let max_tool_iterations = std::env::var("MAX_TOOL_ITERATIONS")
            .unwrap_or_else(|_| "8".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_TOOL_ITERATIONS".to_string(), format!("{}", e))
            })?;

        let approve_tools = std::env::var("APPROVE_TOOLS")
            .map(|v| parse_name_list(&v))
            .unwrap_or_default();

        Ok(Self {
            api_key,
            default_model,
            model_timeout_secs,
            max_tool_iterations,
            tavily_api_key: std::env::var("TAVILY_API_KEY").ok(),
            approve_tools,
            checkpoint_db: std::env::var("CHECKPOINT_DB").map(PathBuf::from).ok(),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            api_key,
            default_model,
            model_timeout_secs: 60,
            max_tool_iterations: 8,
            tavily_api_key: None,
            approve_tools: Vec::new(),
            checkpoint_db: None,
        }
    }
}

fn parse_name_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_list_trims_and_drops_empties() {
        assert_eq!(
            parse_name_list(" web_search , human_assistance ,,"),
            vec!["web_search", "human_assistance"]
        );
        assert!(parse_name_list("").is_empty());
    }
}
