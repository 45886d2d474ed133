use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `Provider.kind` (§3). Each kind names its own config variant below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Custom,
    Antigravity,
    Kiro,
    Codex,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Custom => "custom",
            ProviderKind::Antigravity => "antigravity",
            ProviderKind::Kiro => "kiro",
            ProviderKind::Codex => "codex",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "custom" => ProviderKind::Custom,
            "antigravity" => ProviderKind::Antigravity,
            "kiro" => ProviderKind::Kiro,
            "codex" => ProviderKind::Codex,
            _ => return None,
        })
    }
}

/// `Provider.config`, discriminated by kind (§3 Provider). Stored as
/// `config_json` in `maxx-storage`; adapters deserialize into this enum
/// rather than poking at raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Custom(CustomConfig),
    Antigravity(AntigravityConfig),
    Kiro(KiroConfig),
    Codex(CodexConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Custom(_) => ProviderKind::Custom,
            ProviderConfig::Antigravity(_) => ProviderKind::Antigravity,
            ProviderConfig::Kiro(_) => ProviderKind::Kiro,
            ProviderConfig::Codex(_) => ProviderKind::Codex,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomConfig {
    pub base_url: String,
    pub api_key: String,
    /// Overrides `base_url` per client dialect (§3 Provider.config.custom).
    #[serde(default)]
    pub per_client_base_url: HashMap<String, String>,
    /// The wire dialect this backend actually speaks (§3
    /// Provider.config.custom, §4.5 point 1). Empty (the default, for
    /// configs persisted before this field existed) is treated as `claude`,
    /// matching a plain Anthropic-API-shaped backend. When a route's client
    /// dialect differs from this one, the adapter runs the request through
    /// the Dialect Converter rather than forwarding the body as-is.
    #[serde(default)]
    pub native_dialect: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntigravityConfig {
    pub email: String,
    pub refresh_token: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KiroConfig {
    pub auth_method: String,
    pub email: String,
    pub refresh_token: String,
    pub region: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodexConfig {
    pub refresh_token: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<time::OffsetDateTime>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub plan_type: Option<String>,
}
