use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
}

/// Final, merged global configuration used by the running process.
///
/// Merge order after DB connection: CLI > ENV > DB-persisted row, then the
/// merged result is written back to the `global_config` table (§3 of
/// SPEC_FULL.md "Configuration").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub addr: String,
    pub data_dir: String,
    /// Stored as a hash, never plaintext.
    pub admin_password_hash: Option<String>,
    pub dsn: String,
    pub graceful_shutdown_timeout_secs: u64,
    pub http_shutdown_timeout_secs: u64,
    pub project_waiter_timeout_secs: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            addr: ":9880".to_string(),
            data_dir: String::new(),
            admin_password_hash: None,
            dsn: String::new(),
            graceful_shutdown_timeout_secs: 120,
            http_shutdown_timeout_secs: 5,
            project_waiter_timeout_secs: 30,
        }
    }
}

/// Optional overlay used while merging CLI / ENV / DB layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalConfigPatch {
    pub addr: Option<String>,
    pub data_dir: Option<String>,
    pub admin_password_hash: Option<String>,
    pub dsn: Option<String>,
    pub graceful_shutdown_timeout_secs: Option<u64>,
    pub http_shutdown_timeout_secs: Option<u64>,
    pub project_waiter_timeout_secs: Option<u64>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.addr.is_some() {
            self.addr = other.addr;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.admin_password_hash.is_some() {
            self.admin_password_hash = other.admin_password_hash;
        }
        if other.dsn.is_some() {
            self.dsn = other.dsn;
        }
        if other.graceful_shutdown_timeout_secs.is_some() {
            self.graceful_shutdown_timeout_secs = other.graceful_shutdown_timeout_secs;
        }
        if other.http_shutdown_timeout_secs.is_some() {
            self.http_shutdown_timeout_secs = other.http_shutdown_timeout_secs;
        }
        if other.project_waiter_timeout_secs.is_some() {
            self.project_waiter_timeout_secs = other.project_waiter_timeout_secs;
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        let default = GlobalConfig::default();
        Ok(GlobalConfig {
            addr: self.addr.unwrap_or(default.addr),
            data_dir: self.data_dir.unwrap_or(default.data_dir),
            admin_password_hash: self.admin_password_hash,
            dsn: self.dsn.ok_or(GlobalConfigError::MissingField("dsn"))?,
            graceful_shutdown_timeout_secs: self
                .graceful_shutdown_timeout_secs
                .unwrap_or(default.graceful_shutdown_timeout_secs),
            http_shutdown_timeout_secs: self
                .http_shutdown_timeout_secs
                .unwrap_or(default.http_shutdown_timeout_secs),
            project_waiter_timeout_secs: self
                .project_waiter_timeout_secs
                .unwrap_or(default.project_waiter_timeout_secs),
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(value: GlobalConfig) -> Self {
        Self {
            addr: Some(value.addr),
            data_dir: Some(value.data_dir),
            admin_password_hash: value.admin_password_hash,
            dsn: Some(value.dsn),
            graceful_shutdown_timeout_secs: Some(value.graceful_shutdown_timeout_secs),
            http_shutdown_timeout_secs: Some(value.http_shutdown_timeout_secs),
            project_waiter_timeout_secs: Some(value.project_waiter_timeout_secs),
        }
    }
}
