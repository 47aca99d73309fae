use std::fmt;

use serde::{Deserialize, Serialize};

/// Upstream language-model vendor the backend should call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "google")]
    Google,
}

/// Model-name prefixes with a dedicated provider. Anything else falls back to
/// [`FALLBACK_PROVIDER`].
pub const PROVIDER_PREFIXES: [(&str, Provider); 1] = [("gpt", Provider::OpenAi)];

pub const FALLBACK_PROVIDER: Provider = Provider::Google;

pub const DEFAULT_MODEL: &str = "gpt-5-mini-2025-08-07";

pub const MODEL_CHOICES: [&str; 5] = [
    "gpt-5-mini-2025-08-07",
    "gpt-5-nano-2025-08-07",
    "gpt-5.2-2025-12-11",
    "gemini-1.5-flash",
    "gemini-pro",
];

impl Provider {
    #[must_use]
    pub fn for_model(model_name: &str) -> Self {
        PROVIDER_PREFIXES
            .iter()
            .find(|(prefix, _)| model_name.starts_with(prefix))
            .map_or(FALLBACK_PROVIDER, |(_, provider)| *provider)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Next entry of [`MODEL_CHOICES`] after `current`, wrapping around. Unknown
/// names restart at the first choice.
#[must_use]
pub fn next_model(current: &str) -> &'static str {
    let position = MODEL_CHOICES.iter().position(|model| *model == current);
    match position {
        Some(index) => MODEL_CHOICES[(index + 1) % MODEL_CHOICES.len()],
        None => MODEL_CHOICES[0],
    }
}
