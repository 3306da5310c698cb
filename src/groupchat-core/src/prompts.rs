//! Instruction templates for participants and the moderator.
//!
//! Templates are plain strings with `{placeholder}` markers so they can be
//! overridden from the `[prompts]` table of the config file.

use serde::Deserialize;

/// Instruction templates used by the orchestrator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptSet {
    /// Per-participant system instruction. Placeholders: `{name}`, `{others}`, `{max_chars}`.
    pub participant: String,
    /// Moderator instruction for the closing summary.
    pub summary: String,
    /// Text of a participant failure turn. Placeholder: `{error}`.
    pub failure: String,
    /// Text of a summary failure turn. Placeholder: `{error}`.
    pub summary_failure: String,
    /// Prompt sent to every model by the roster probe.
    pub probe: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            participant: DEFAULT_PARTICIPANT_PROMPT.to_string(),
            summary: DEFAULT_SUMMARY_PROMPT.to_string(),
            failure: "[发言失败：{error}]".to_string(),
            summary_failure: "总结生成失败：{error}".to_string(),
            probe: "用一句话介绍你自己".to_string(),
        }
    }
}

impl PromptSet {
    /// System instruction for `name`, listing the other participants in roster order.
    pub fn participant_instruction(&self, name: &str, others: &[&str], max_chars: u32) -> String {
        self.participant
            .replace("{name}", name)
            .replace("{others}", &others.join(", "))
            .replace("{max_chars}", &max_chars.to_string())
    }

    pub fn summary_instruction(&self) -> String {
        self.summary.clone()
    }

    pub fn failure_text(&self, error: &str) -> String {
        self.failure.replace("{error}", error)
    }

    pub fn summary_failure_text(&self, error: &str) -> String {
        self.summary_failure.replace("{error}", error)
    }
}

const DEFAULT_PARTICIPANT_PROMPT: &str = "你是{name}，正在一个多AI讨论群里。
其他参与者有：{others}
请阅读对话历史，给出你的独特观点。
可以补充、反驳或赞同其他AI的观点。
请保持简洁，用中文回答，不超过{max_chars}字。
不要重复别人已经说过的内容。";

const DEFAULT_SUMMARY_PROMPT: &str = "你是讨论主持人，请总结以下讨论：
1. 各方的主要观点
2. 大家的共识
3. 主要分歧
用中文回答，不超过200字。";
