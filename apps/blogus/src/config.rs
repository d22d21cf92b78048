use anyhow::{anyhow, Context, Result};

use crate::analysis::ScorePolicy;
use crate::llm_client::http::ApiKeys;
use crate::llm_client::registry::{JudgeModel, TargetModel};
use crate::llm_client::DEFAULT_MAX_TOKENS;

/// Application configuration loaded from environment variables.
/// Provider keys are optional; a missing key only fails calls to that provider.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_keys: ApiKeys,
    pub default_judge: JudgeModel,
    pub default_target: TargetModel,
    pub max_tokens: u32,
    pub score_policy: ScorePolicy,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source. Blank values count as unset.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Config {
            api_keys: ApiKeys {
                anthropic: optional("ANTHROPIC_API_KEY"),
                openai: optional("OPENAI_API_KEY"),
                groq: optional("GROQ_API_KEY"),
            },
            default_judge: match optional("BLOGUS_JUDGE_MODEL") {
                Some(id) => JudgeModel::parse(&id).context("BLOGUS_JUDGE_MODEL")?,
                None => JudgeModel::default(),
            },
            default_target: match optional("BLOGUS_TARGET_MODEL") {
                Some(id) => TargetModel::parse(&id).context("BLOGUS_TARGET_MODEL")?,
                None => TargetModel::default(),
            },
            max_tokens: match optional("BLOGUS_MAX_TOKENS") {
                Some(v) => v
                    .parse::<u32>()
                    .context("BLOGUS_MAX_TOKENS must be a positive integer")?,
                None => DEFAULT_MAX_TOKENS,
            },
            score_policy: match optional("BLOGUS_SCORE_POLICY") {
                Some(v) => v.parse::<ScorePolicy>().map_err(|e| anyhow!("BLOGUS_SCORE_POLICY: {e}"))?,
                None => ScorePolicy::default(),
            },
            port: optional("PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}
