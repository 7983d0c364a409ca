//! Run configuration (layered: code > env > TOML file > defaults).
//!
//! A [`HarperConfig`] is read-only for the duration of a run. It is threaded
//! through [`Context`](crate::agent::Context) by `Arc`; there is no global
//! instance.

use std::path::Path;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::HarperError;

/// Host platform the agents operate on.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Windows,
    #[default]
    Mac,
    Linux,
}

/// Named options governing agent execution and context-window management.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarperConfig {
    /// Assistant name used in system prompts.
    #[builder(default = default_name(), into)]
    pub name: String,
    #[builder(default)]
    pub platform: Platform,
    /// Maximum model calls per agent before it is failed.
    #[builder(default = 500)]
    pub max_react_num: usize,
    #[builder(default = 16_000)]
    pub max_tokens: u32,
    /// Attempts per language model, including the first.
    #[builder(default = 3)]
    pub max_retry_num: u32,
    /// Whether agents in the same stage may run concurrently.
    #[builder(default = false)]
    pub agent_parallel: bool,
    /// Message count at which the history is compressed into a snapshot.
    #[builder(default = 80)]
    pub compress_threshold: usize,
    /// Characters after which an older tool text result is truncated.
    #[builder(default = 5_000)]
    pub large_text_length: usize,
    /// Characters after which a tool text result is moved into a shared variable.
    #[builder(default = 20_000)]
    pub file_text_max_length: usize,
    /// Live images (and, separately, files) kept in a conversation.
    #[builder(default = 1)]
    pub max_dialogue_img_file_num: usize,
    /// Whether media returned by tools is forwarded to the model.
    #[builder(default = true)]
    pub tool_result_multimodal: bool,
}

fn default_name() -> String {
    "Harper".to_string()
}

impl Default for HarperConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

const ENV_PREFIX: &str = "HARPER_";

impl HarperConfig {
    /// Defaults overridden by `HARPER_*` environment variables.
    pub fn from_env() -> Result<Self, HarperError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, HarperError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, HarperError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Apply overrides from a key lookup (environment by default).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), HarperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = get("NAME") {
            self.name = value;
        }
        if let Some(value) = get("PLATFORM") {
            self.platform = value
                .parse()
                .map_err(|_| HarperError::Configuration(format!("unknown platform: {value}")))?;
        }
        if let Some(value) = get("MAX_REACT_NUM") {
            self.max_react_num = parse_env("MAX_REACT_NUM", &value)?;
        }
        if let Some(value) = get("MAX_TOKENS") {
            self.max_tokens = parse_env("MAX_TOKENS", &value)?;
        }
        if let Some(value) = get("MAX_RETRY_NUM") {
            self.max_retry_num = parse_env("MAX_RETRY_NUM", &value)?;
        }
        if let Some(value) = get("AGENT_PARALLEL") {
            self.agent_parallel = parse_env("AGENT_PARALLEL", &value)?;
        }
        if let Some(value) = get("COMPRESS_THRESHOLD") {
            self.compress_threshold = parse_env("COMPRESS_THRESHOLD", &value)?;
        }
        if let Some(value) = get("LARGE_TEXT_LENGTH") {
            self.large_text_length = parse_env("LARGE_TEXT_LENGTH", &value)?;
        }
        if let Some(value) = get("FILE_TEXT_MAX_LENGTH") {
            self.file_text_max_length = parse_env("FILE_TEXT_MAX_LENGTH", &value)?;
        }
        if let Some(value) = get("MAX_DIALOGUE_IMG_FILE_NUM") {
            self.max_dialogue_img_file_num = parse_env("MAX_DIALOGUE_IMG_FILE_NUM", &value)?;
        }
        if let Some(value) = get("TOOL_RESULT_MULTIMODAL") {
            self.tool_result_multimodal = parse_env("TOOL_RESULT_MULTIMODAL", &value)?;
        }
        self.validate()
    }

    /// Reject values that would make the agent loop unusable.
    pub fn validate(&self) -> Result<(), HarperError> {
        if self.max_react_num == 0 {
            return Err(HarperError::Configuration(
                "max_react_num must be at least 1".into(),
            ));
        }
        if self.max_retry_num == 0 {
            return Err(HarperError::Configuration(
                "max_retry_num must be at least 1".into(),
            ));
        }
        if self.large_text_length == 0 {
            return Err(HarperError::Configuration(
                "large_text_length must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, HarperError> {
    value.trim().parse().map_err(|_| {
        HarperError::Configuration(format!("invalid value for {ENV_PREFIX}{name}: {value}"))
    })
}
