//! Model Registry: the closed set of model identifiers Blogus can talk to.
//!
//! The same identifiers are legal in both roles, but a `TargetModel` (runs the
//! prompt) and a `JudgeModel` (analyzes the prompt) are distinct types so a
//! call site cannot hand one where the other is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::errors::AnalysisError;

/// Upstream API family a model is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAi,
    Groq,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
            Provider::Groq => "groq",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelId {
    Claude3Opus,
    Claude3Sonnet,
    Claude3Haiku,
    Gpt4o,
    Gpt4Turbo,
    Gpt35Turbo,
    GroqLlama3,
    GroqMixtral,
    GroqGemma,
}

/// Every model the registry accepts, in display order.
pub static ALL_MODELS: &[ModelId] = &[
    ModelId::Claude3Opus,
    ModelId::Claude3Sonnet,
    ModelId::Claude3Haiku,
    ModelId::Gpt4o,
    ModelId::Gpt4Turbo,
    ModelId::Gpt35Turbo,
    ModelId::GroqLlama3,
    ModelId::GroqMixtral,
    ModelId::GroqGemma,
];

/// Model used for either role when nothing else is configured.
pub const DEFAULT_MODEL: ModelId = ModelId::Gpt4o;

impl ModelId {
    /// The identifier as users and the HTTP API spell it.
    pub const fn as_str(self) -> &'static str {
        match self {
            ModelId::Claude3Opus => "claude-3-opus-20240229",
            ModelId::Claude3Sonnet => "claude-3-sonnet-20240229",
            ModelId::Claude3Haiku => "claude-3-haiku-20240307",
            ModelId::Gpt4o => "gpt-4o",
            ModelId::Gpt4Turbo => "gpt-4-turbo",
            ModelId::Gpt35Turbo => "gpt-3.5-turbo",
            ModelId::GroqLlama3 => "groq/llama3-70b-8192",
            ModelId::GroqMixtral => "groq/mixtral-8x7b-32768",
            ModelId::GroqGemma => "groq/gemma-7b-it",
        }
    }

    pub const fn provider(self) -> Provider {
        match self {
            ModelId::Claude3Opus | ModelId::Claude3Sonnet | ModelId::Claude3Haiku => {
                Provider::Anthropic
            }
            ModelId::Gpt4o | ModelId::Gpt4Turbo | ModelId::Gpt35Turbo => Provider::OpenAi,
            ModelId::GroqLlama3 | ModelId::GroqMixtral | ModelId::GroqGemma => {
                Provider::Groq
            }
        }
    }

    /// Name the provider's own API expects (the `groq/` routing prefix is dropped).
    pub fn api_name(self) -> &'static str {
        let id = self.as_str();
        id.strip_prefix("groq/").unwrap_or(id)
    }

    /// Looks up an identifier; `None` for anything outside the registry.
    pub fn lookup(id: &str) -> Option<Self> {
        let id = id.trim();
        ALL_MODELS.iter().copied().find(|m| m.as_str() == id)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ModelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::lookup(s)
            .ok_or_else(|| AnalysisError::Configuration(format!("unknown model identifier '{s}'")))
    }
}

/// A model selected to execute a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetModel(ModelId);

/// A model selected to analyze a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JudgeModel(ModelId);

impl TargetModel {
    pub const fn new(id: ModelId) -> Self {
        Self(id)
    }

    pub fn parse(id: &str) -> Result<Self, AnalysisError> {
        ModelId::lookup(id).map(Self).ok_or_else(|| {
            AnalysisError::Configuration(format!("'{id}' is not a valid target model"))
        })
    }

    pub const fn id(self) -> ModelId {
        self.0
    }
}

impl JudgeModel {
    pub const fn new(id: ModelId) -> Self {
        Self(id)
    }

    pub fn parse(id: &str) -> Result<Self, AnalysisError> {
        ModelId::lookup(id).map(Self).ok_or_else(|| {
            AnalysisError::Configuration(format!("'{id}' is not a valid judge model"))
        })
    }

    pub const fn id(self) -> ModelId {
        self.0
    }
}

impl Default for TargetModel {
    fn default() -> Self {
        Self(DEFAULT_MODEL)
    }
}

impl Default for JudgeModel {
    fn default() -> Self {
        Self(DEFAULT_MODEL)
    }
}

impl FromStr for TargetModel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for JudgeModel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for JudgeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub fn is_valid_target(id: &str) -> bool {
    TargetModel::parse(id).is_ok()
}

pub fn is_valid_judge(id: &str) -> bool {
    JudgeModel::parse(id).is_ok()
}
