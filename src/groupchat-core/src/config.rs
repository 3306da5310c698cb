//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::error::GroupChatError;
use crate::orchestrator::DEFAULT_ROUNDS;
use crate::participant::{ParticipantDescriptor, Roster};
use crate::prompts::PromptSet;

/// Environment variable that overrides `backend.api_base`.
pub const API_BASE_ENV: &str = "GROUPCHAT_API_BASE";

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub discussion: DiscussionConfig,
    pub summarizer: SummarizerConfig,
    pub prompts: PromptSet,
    pub participants: Vec<ParticipantDescriptor>,
}

/// Connection settings for the OpenAI-compatible backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub api_base: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Extra attempts after a failed call. Zero means each call is made once.
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.siliconflow.cn/v1".to_string(),
            api_key_env: "SILICONFLOW_API_KEY".to_string(),
            timeout_secs: 120,
            connect_timeout_secs: 30,
            max_retries: 0,
        }
    }
}

impl BackendConfig {
    /// Read the API key from the configured variable. Empty counts as unset.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

/// Discussion-level knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscussionConfig {
    pub default_rounds: u32,
    /// Upper bound accepted by the web surfaces.
    pub max_rounds: u32,
    pub reply_max_tokens: u32,
    pub summary_max_tokens: u32,
    /// Length limit quoted to participants in their instruction.
    pub reply_max_chars: u32,
    /// Speaker label of the user's opening turn.
    pub user_label: String,
    /// Strip `<think>`-style reasoning blocks from replies.
    pub strip_reasoning: bool,
}

impl Default for DiscussionConfig {
    fn default() -> Self {
        Self {
            default_rounds: DEFAULT_ROUNDS,
            max_rounds: 10,
            reply_max_tokens: 300,
            summary_max_tokens: 400,
            reply_max_chars: 150,
            user_label: "用户".to_string(),
            strip_reasoning: true,
        }
    }
}

/// The moderator that writes the closing summary. Any field may be left out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub name: String,
    pub model: String,
    pub emoji: Option<String>,
    pub color: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            name: "主持人".to_string(),
            model: "deepseek-ai/DeepSeek-V3".to_string(),
            emoji: Some("🎯".to_string()),
            color: Some("#E74C3C".to_string()),
        }
    }
}

impl SummarizerConfig {
    pub fn descriptor(&self) -> ParticipantDescriptor {
        let mut descriptor = ParticipantDescriptor::new(&self.name, &self.model);
        descriptor.presentation.emoji = self.emoji.clone();
        descriptor.presentation.color = self.color.clone();
        descriptor
    }
}

impl Default for Config {
    fn default() -> Self {
        default_config()
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GroupChatError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| GroupChatError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, GroupChatError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| GroupChatError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.roster()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use the embedded defaults, then
    /// apply environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, GroupChatError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => default_config(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(base) = env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                self.backend.api_base = base.trim().to_string();
            }
        }
    }

    /// Validated roster built from `[[participants]]`.
    pub fn roster(&self) -> Result<Roster, GroupChatError> {
        if self.summarizer.name.trim().is_empty() {
            return Err(GroupChatError::ConfigError(
                "summarizer name must not be empty".to_string(),
            ));
        }
        if self.summarizer.model.trim().is_empty() {
            return Err(GroupChatError::ConfigError(
                "summarizer model must not be empty".to_string(),
            ));
        }
        Roster::new(self.participants.clone())
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        backend: BackendConfig::default(),
        discussion: DiscussionConfig::default(),
        summarizer: SummarizerConfig::default(),
        prompts: PromptSet::default(),
        participants: vec![
            ParticipantDescriptor::new("DeepSeek", "deepseek-ai/DeepSeek-V3")
                .with_emoji("🔵")
                .with_color("#4A90D9"),
            ParticipantDescriptor::new("KIMI", "moonshotai/Kimi-K2-Instruct")
                .with_emoji("🟣")
                .with_color("#9B59B6"),
            ParticipantDescriptor::new("智谱", "THUDM/GLM-4-9B-Chat")
                .with_emoji("🟢")
                .with_color("#2ECC71"),
            ParticipantDescriptor::new("千问", "Qwen/Qwen3-8B")
                .with_emoji("🟠")
                .with_color("#E67E22"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roster() {
        let config = default_config();
        let roster = config.roster().unwrap();
        assert_eq!(roster.names(), vec!["DeepSeek", "KIMI", "智谱", "千问"]);
        assert_eq!(config.discussion.default_rounds, 2);
        assert_eq!(config.discussion.reply_max_tokens, 300);
        assert_eq!(config.discussion.summary_max_tokens, 400);
        assert_eq!(config.backend.max_retries, 0);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.participants.len(), 4);
        assert_eq!(config.summarizer.name, "主持人");
        assert_eq!(config.backend.api_key_env, "SILICONFLOW_API_KEY");
    }

    #[test]
    fn test_partial_file_overrides() {
        let config = Config::from_str(
            r##"
            [discussion]
            default_rounds = 3
            user_label = "User"

            [backend]
            api_base = "http://localhost:11434/v1"

            [[participants]]
            name = "Alpha"
            model = "llama3:8b"
            emoji = "🅰"

            [[participants]]
            name = "Beta"
            model = "mistral"
            color = "#000000"
            "##,
        )
        .unwrap();

        assert_eq!(config.discussion.default_rounds, 3);
        assert_eq!(config.discussion.reply_max_tokens, 300);
        assert_eq!(config.discussion.user_label, "User");
        assert_eq!(config.backend.api_base, "http://localhost:11434/v1");
        assert_eq!(config.backend.timeout_secs, 120);
        assert_eq!(config.participants.len(), 2);
        assert_eq!(config.participants[0].presentation.emoji.as_deref(), Some("🅰"));
        assert_eq!(config.participants[1].presentation.emoji, None);
        assert_eq!(
            config.participants[1].presentation.color.as_deref(),
            Some("#000000")
        );
    }

    #[test]
    fn test_summarizer_partial_table_keeps_defaults() {
        let config = Config::from_str("[summarizer]\nmodel = \"Qwen/Qwen3-8B\"\n").unwrap();
        let summarizer = config.summarizer.descriptor();
        assert_eq!(summarizer.name, "主持人");
        assert_eq!(summarizer.model, "Qwen/Qwen3-8B");
        assert_eq!(summarizer.presentation.emoji.as_deref(), Some("🎯"));
        assert_eq!(summarizer.presentation.color.as_deref(), Some("#E74C3C"));
    }

    #[test]
    fn test_summarizer_blank_model_rejected() {
        let err = Config::from_str("[summarizer]\nmodel = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("summarizer model"));
    }

    #[test]
    fn test_duplicate_participants_rejected() {
        let err = Config::from_str(
            r#"
            [[participants]]
            name = "A"
            model = "m1"

            [[participants]]
            name = "A"
            model = "m2"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, GroupChatError::ConfigError(_)));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = Config::from_str("[discussion\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_prompt_override() {
        let config = Config::from_str(
            r#"
            [prompts]
            failure = "(failed: {error})"
            "#,
        )
        .unwrap();
        assert_eq!(config.prompts.failure_text("x"), "(failed: x)");
        assert!(config.prompts.participant.contains("{name}"));
    }
}
