//! Process startup (§6 External Interfaces CLI/env, §3 Configuration):
//! resolve `GlobalConfig` from CLI > ENV > DB, connect storage, seed the
//! default retry config, build the provider registry, and hand back the
//! pieces `apps/maxx`'s `main` wires into the HTTP server and the
//! background loops.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use maxx_common::{GlobalConfig, GlobalConfigPatch};
use maxx_provider_core::events::EventHub;
use maxx_provider_core::registry::ProviderRegistry;
use maxx_storage::{SeaOrmStorage, Storage};

use crate::state::AppState;

#[derive(Debug, Clone, Parser)]
#[command(name = "maxx", version, about = "A multi-dialect AI API reverse proxy")]
pub struct CliArgs {
    /// Bind address, e.g. `:9880` or `127.0.0.1:9880`.
    #[arg(long = "addr", env = "MAXX_ADDR")]
    pub addr: Option<String>,

    /// Data directory holding `maxx.db` and `maxx.log` (defaults to
    /// `$HOME/.config/maxx`).
    #[arg(long = "data", env = "MAXX_DATA_DIR")]
    pub data_dir: Option<String>,
}

pub struct Bootstrap {
    pub storage: Arc<SeaOrmStorage>,
    pub state: Arc<AppState>,
    pub registry: Arc<ProviderRegistry>,
}

pub async fn bootstrap_from_env() -> anyhow::Result<Bootstrap> {
    let args = CliArgs::parse();
    bootstrap(args).await
}

pub async fn bootstrap(args: CliArgs) -> anyhow::Result<Bootstrap> {
    let data_dir = resolve_data_dir(args.data_dir.clone());
    let dsn = std::env::var("MAXX_DSN")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default_dsn(&data_dir));
    ensure_sqlite_parent_dir(&dsn)?;

    let storage = Arc::new(SeaOrmStorage::connect(&dsn).await.context("connect storage")?);
    storage.sync().await.context("schema sync")?;
    storage.ensure_default_retry_config().await.context("seed default retry config")?;

    let db_global = storage.load_global_config().await.context("load global config")?;
    let mut merged = db_global.map(GlobalConfigPatch::from).unwrap_or_default();

    let admin_password_hash = std::env::var("MAXX_ADMIN_PASSWORD")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|password| blake3::hash(password.as_bytes()).to_hex().to_string());

    merged.overlay(GlobalConfigPatch {
        addr: args.addr.clone(),
        data_dir: Some(data_dir.clone()),
        admin_password_hash,
        dsn: Some(dsn),
        graceful_shutdown_timeout_secs: None,
        http_shutdown_timeout_secs: None,
        project_waiter_timeout_secs: None,
    });

    let global: GlobalConfig = merged.into_config().context("finalize global config")?;
    storage.upsert_global_config(&global).await.context("persist global config")?;

    let snapshot = storage.load_snapshot().await.context("load snapshot")?;

    let registry = Arc::new({
        let mut registry = ProviderRegistry::new();
        maxx_provider_impl::register_builtin_providers(&mut registry);
        registry
    });

    let events = EventHub::new(1024);
    let state = Arc::new(AppState::new(
        storage.clone(),
        snapshot,
        events,
        registry.clone(),
        global,
    ));

    Ok(Bootstrap {
        storage,
        state,
        registry,
    })
}

/// `$HOME/.config/maxx` default (§6), `MAXX_DATA_DIR`/`-data` override it.
fn resolve_data_dir(cli_value: Option<String>) -> String {
    if let Some(dir) = cli_value.filter(|v| !v.trim().is_empty()) {
        return dir;
    }
    if let Ok(dir) = std::env::var("MAXX_DATA_DIR") {
        if !dir.trim().is_empty() {
            return dir;
        }
    }
    dirs_home_config_maxx()
}

fn dirs_home_config_maxx() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.config/maxx", home.trim_end_matches('/'))
}

fn default_dsn(data_dir: &str) -> String {
    format!("sqlite://{}/maxx.db?mode=rwc", data_dir.trim_end_matches('/'))
}

fn ensure_sqlite_parent_dir(dsn: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_file_path_from_dsn(dsn) else {
        return Ok(());
    };
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create data directory {}", parent.display()))?;
    Ok(())
}

fn sqlite_file_path_from_dsn(dsn: &str) -> Option<PathBuf> {
    let rest = dsn.strip_prefix("sqlite:")?;
    let path_part = rest.split(['?', '#']).next()?.trim();
    if path_part.is_empty() {
        return None;
    }
    let normalized = path_part.strip_prefix("//").unwrap_or(path_part);
    if normalized.eq_ignore_ascii_case(":memory:") {
        return None;
    }
    Some(PathBuf::from(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_dsn_resolves_relative_path() {
        let path = sqlite_file_path_from_dsn("sqlite://data/maxx.db?mode=rwc").unwrap();
        assert_eq!(path.to_string_lossy(), "data/maxx.db");
    }

    #[test]
    fn sqlite_memory_dsn_is_ignored() {
        assert!(sqlite_file_path_from_dsn("sqlite::memory:").is_none());
        assert!(sqlite_file_path_from_dsn("sqlite://:memory:").is_none());
    }

    #[test]
    fn default_dsn_nests_under_data_dir() {
        assert_eq!(default_dsn("/home/user/.config/maxx"), "sqlite:///home/user/.config/maxx/maxx.db?mode=rwc");
    }
}
