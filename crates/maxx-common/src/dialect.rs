use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire protocol spoken by a caller or a provider (Glossary: "Client dialect").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientDialect {
    Claude,
    OpenAi,
    Codex,
    Gemini,
}

impl ClientDialect {
    pub const ALL: [ClientDialect; 4] = [
        ClientDialect::Claude,
        ClientDialect::OpenAi,
        ClientDialect::Codex,
        ClientDialect::Gemini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientDialect::Claude => "claude",
            ClientDialect::OpenAi => "openai",
            ClientDialect::Codex => "codex",
            ClientDialect::Gemini => "gemini",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "claude" => Some(ClientDialect::Claude),
            "openai" => Some(ClientDialect::OpenAi),
            "codex" => Some(ClientDialect::Codex),
            "gemini" => Some(ClientDialect::Gemini),
            _ => None,
        }
    }
}

impl fmt::Display for ClientDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
