use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use linkboard_core::{SourceConfig, SourceTable};
use linkboard_storage::{CredentialsConfig, HttpClientConfig, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

pub const SOURCES_FILE: &str = "sources.yaml";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub workspace_root: PathBuf,
    /// CSV exports read when Sheets credentials are missing.
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub credentials: CredentialsConfig,
}

impl SyncConfig {
    /// Defaults rooted at `root`, with no credentials.
    pub fn for_workspace(root: impl Into<PathBuf>) -> Self {
        let workspace_root = root.into();
        Self {
            data_dir: workspace_root.join("data"),
            reports_dir: workspace_root.join("reports"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            credentials: CredentialsConfig::default(),
            workspace_root,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = lookup("LINKBOARD_WORKSPACE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::for_workspace(root);
        if let Some(dir) = lookup("LINKBOARD_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(agent) = lookup("LINKBOARD_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            config.user_agent = agent;
        }
        config.http_timeout_secs = lookup("LINKBOARD_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        config.credentials = CredentialsConfig::resolve(&lookup, &config.workspace_root);
        config
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: self.http_timeout(),
            user_agent: Some(self.user_agent.clone()),
        }
    }
}

/// `<root>/sources.yaml` when present, otherwise the built-in production sheets.
pub async fn load_source_table(workspace_root: &Path) -> Result<SourceTable> {
    let path = workspace_root.join(SOURCES_FILE);
    if !path.exists() {
        debug!(path = %path.display(), "no source registry; using built-in sources");
        return Ok(SourceTable::builtin());
    }
    let text = fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let registry: SourceRegistry =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(SourceTable::new(registry.sources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_hang_off_the_workspace() {
        let config = SyncConfig::from_lookup(|_| None);
        assert_eq!(config.workspace_root, PathBuf::from("."));
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.http_timeout(), Duration::from_secs(15));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(!config.credentials.has_access_token());
    }

    #[test]
    fn env_overrides_apply() {
        let vars = HashMap::from([
            ("LINKBOARD_WORKSPACE", "/srv/links"),
            ("LINKBOARD_DATA_DIR", "/tmp/exports"),
            ("LINKBOARD_HTTP_TIMEOUT_SECS", "40"),
            ("LINKBOARD_USER_AGENT", "linkboard-test"),
            ("GOOGLE_SHEETS_ACCESS_TOKEN", "tok"),
        ]);
        let config = SyncConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.reports_dir, PathBuf::from("/srv/links/reports"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/exports"));
        assert_eq!(config.http_client_config().timeout, Duration::from_secs(40));
        assert_eq!(config.http_client_config().user_agent.as_deref(), Some("linkboard-test"));
        assert!(config.credentials.has_access_token());
    }

    #[tokio::test]
    async fn source_registry_replaces_builtin_table() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_source_table(dir.path()).await.unwrap().len(), 4);

        std::fs::write(
            dir.path().join(SOURCES_FILE),
            r#"
sources:
  - spreadsheet_id: abc123
    sheet: Links
    name: Staging
    project_col: 0
    version_col: 1
    employee_col: 2
    date_col: 3
"#,
        )
        .unwrap();
        let table = load_source_table(dir.path()).await.unwrap();
        assert_eq!(table.len(), 1);
        let staging = &table.sources()[0];
        assert_eq!(staging.name, "Staging");
        assert_eq!(staging.status_filter(), None);
    }
}
