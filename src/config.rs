use serde::{Deserialize, Serialize};

pub(crate) static DEFAULT_STYLE: &str =
    "用第三人称描述撤回人的动作或心态，内容可以是吐槽对方发错群、暴露XP、说了蠢话等";

pub(crate) static DEFAULT_PERSONA: &str = r#"你是一个混迹在QQ群里的群友，说话简短、有梗，喜欢看热闹。你能看到群里最近的聊天记录，回复时保持自己的人设，不要解释，不要客套。"#;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub plugin: PluginSection,
    pub recall_response: RecallSection,
    pub llm: LlmSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginSection {
    pub enabled: bool,
}

impl Default for PluginSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecallSection {
    pub response_probability: f64,
    pub cooldown_seconds: u64,
    pub desperate_probability: f64,
    pub response_style: String,
    pub fixed_responses: Vec<String>,
    pub context_size: usize,
}

impl Default for RecallSection {
    fn default() -> Self {
        Self {
            response_probability: 0.3,
            cooldown_seconds: 60,
            desperate_probability: 0.5,
            response_style: DEFAULT_STYLE.to_string(),
            fixed_responses: Vec::new(),
            context_size: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmSection {
    pub apikey: Option<String>,
    pub base_url: Option<String>,
    pub model_name: Option<String>,
    pub persona: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            apikey: None,
            base_url: None,
            model_name: None,
            persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

impl LlmSection {
    pub fn is_ready(&self) -> bool {
        self.apikey.is_some() && self.base_url.is_some() && self.model_name.is_some()
    }
}

impl Config {
    /// Clamps probabilities into `[0, 1]` so a hand-edited file cannot disable the gate logic.
    pub fn normalized(mut self) -> Self {
        let r = &mut self.recall_response;
        r.response_probability = clamp_probability(r.response_probability);
        r.desperate_probability = clamp_probability(r.desperate_probability);
        r.fixed_responses.retain(|s| !s.trim().is_empty());
        self
    }

    /// Operator-facing description of every field, grouped by section.
    pub fn schema() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("plugin", "enabled", "总开关：关闭后插件完全不响应任何撤回事件"),
            (
                "recall_response",
                "response_probability",
                "每次撤回事件触发响应的概率。0.0 = 永不响应，1.0 = 每次必响应",
            ),
            (
                "recall_response",
                "cooldown_seconds",
                "同一个群两次响应之间的最短冷却时间（秒）",
            ),
            (
                "recall_response",
                "desperate_probability",
                "撤回状态后缀为「绝望」的概率，剩余概率为「开心」",
            ),
            (
                "recall_response",
                "response_style",
                "（LLM 模式）描述撤回人行为的风格指引，fixed_responses 非空时无效",
            ),
            (
                "recall_response",
                "fixed_responses",
                "定型文列表：非空时每次随机选一条，不再调用 LLM",
            ),
            (
                "recall_response",
                "context_size",
                "每个群保留多少条最近消息作为 LLM 上下文",
            ),
            ("llm", "apikey", "OpenAI 兼容接口的 API Key"),
            ("llm", "base_url", "OpenAI 兼容接口地址"),
            ("llm", "model_name", "模型名称"),
            ("llm", "persona", "系统提示词（人设）"),
        ]
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kovi::serde_json::{self, json};

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = serde_json::from_value(json!({
            "recall_response": { "cooldown_seconds": 10 }
        }))
        .unwrap();

        assert!(config.plugin.enabled);
        assert_eq!(config.recall_response.cooldown_seconds, 10);
        assert_eq!(config.recall_response.response_probability, 0.3);
        assert_eq!(config.recall_response.response_style, DEFAULT_STYLE);
        assert!(config.recall_response.fixed_responses.is_empty());
        assert!(!config.llm.is_ready());
    }

    #[test]
    fn normalized_clamps_and_drops_blank_responses() {
        let mut config = Config::default();
        config.recall_response.response_probability = 3.0;
        config.recall_response.desperate_probability = f64::NAN;
        config.recall_response.fixed_responses = vec![" ".into(), "hide...".into()];

        let config = config.normalized();

        assert_eq!(config.recall_response.response_probability, 1.0);
        assert_eq!(config.recall_response.desperate_probability, 0.0);
        assert_eq!(config.recall_response.fixed_responses, vec!["hide...".to_string()]);
    }

    #[test]
    fn schema_covers_every_section() {
        let schema = Config::schema();
        for section in ["plugin", "recall_response", "llm"] {
            assert!(schema.iter().any(|(s, _, _)| *s == section));
        }
    }
}
