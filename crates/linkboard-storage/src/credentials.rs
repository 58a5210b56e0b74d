//! Credential discovery for the Sheets API.
//!
//! The service-account key is exchanged for an access token on each client
//! build. `GOOGLE_SHEETS_ACCESS_TOKEN`, when set, is used as is and skips the
//! exchange. The key's `client_email` is the address a sheet must be shared with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::auth::{AuthError, ServiceAccountAuth, ServiceAccountKey};
use crate::sheets::{SheetsClient, SheetsError};

pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_SHEETS_ACCESS_TOKEN";
const SERVICE_ACCOUNT_ENV_VARS: [&str; 3] = [
    "GOOGLE_SERVICE_ACCOUNT_JSON",
    "GOOGLE_SERVICE_ACCOUNT_PATH",
    "GOOGLE_APPLICATION_CREDENTIALS",
];
const SERVICE_ACCOUNT_FILES: [&str; 2] = ["service_account.json", "service_account.json.json"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountInfo {
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Inline(String),
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Google Sheets credentials are missing.\n{guidance}")]
    Missing { guidance: String },
    #[error("reading service account key {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing service account key: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("service account login failed: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Client(#[from] SheetsError),
}

#[derive(Debug, Clone, Default)]
pub struct CredentialsConfig {
    pub access_token: Option<String>,
    pub service_account: Option<CredentialSource>,
}

impl CredentialsConfig {
    pub fn from_env(workspace_root: &Path) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), workspace_root)
    }

    /// Same lookup as `from_env` with an injectable variable source.
    pub fn resolve<F>(lookup: F, workspace_root: &Path) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let access_token = non_empty(ACCESS_TOKEN_ENV).map(|v| v.trim().to_string());

        let from_env = SERVICE_ACCOUNT_ENV_VARS.iter().find_map(|key| {
            let value = non_empty(key)?;
            if value.trim_start().starts_with('{') {
                return Some(CredentialSource::Inline(value));
            }
            let path = absolutize(workspace_root, Path::new(value.trim()));
            path.exists().then_some(CredentialSource::File(path))
        });
        let service_account = from_env.or_else(|| {
            SERVICE_ACCOUNT_FILES
                .iter()
                .map(|name| workspace_root.join(name))
                .find(|p| p.exists())
                .map(CredentialSource::File)
        });

        Self {
            access_token,
            service_account,
        }
    }

    pub fn with_service_account_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.service_account = Some(CredentialSource::File(path.into()));
        self
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    fn key_text(&self) -> Result<Option<String>, CredentialsError> {
        match &self.service_account {
            None => Ok(None),
            Some(CredentialSource::Inline(json)) => Ok(Some(json.clone())),
            Some(CredentialSource::File(path)) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|source| CredentialsError::Read {
                    path: path.clone(),
                    source,
                }),
        }
    }

    pub fn service_account_info(&self) -> Result<Option<ServiceAccountInfo>, CredentialsError> {
        match self.key_text()? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// The full key, private part included.
    pub fn service_account_key(&self) -> Result<Option<ServiceAccountKey>, CredentialsError> {
        match self.key_text()? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// `client_email` of the service account, when a readable key is around.
    pub fn service_account_email(&self) -> Option<String> {
        self.service_account_info()
            .ok()
            .flatten()
            .and_then(|info| info.client_email)
    }

    pub fn guidance(&self) -> String {
        let mut lines = vec![
            "Put the service account key next to the project as service_account.json \
             or point GOOGLE_SERVICE_ACCOUNT_JSON at it."
                .to_string(),
            format!("Alternatively set {ACCESS_TOKEN_ENV} to an OAuth access token with the spreadsheets scope."),
        ];
        match self.service_account_email() {
            Some(email) => lines.push(format!(
                "Share every source spreadsheet with {email} (Viewer; Editor for write-back)."
            )),
            None => lines.push(
                "Share every source spreadsheet with the client_email from the key file.".to_string(),
            ),
        }
        lines.join("\n")
    }

    /// A Sheets client authorized by the env token or, failing that, by a
    /// token minted from the service-account key.
    pub async fn sheets_client(&self, timeout: Duration) -> Result<SheetsClient, CredentialsError> {
        if let Some(token) = &self.access_token {
            return Ok(SheetsClient::new(token.clone(), timeout)?);
        }
        let Some(key) = self.service_account_key()? else {
            return Err(CredentialsError::Missing {
                guidance: self.guidance(),
            });
        };
        let auth = ServiceAccountAuth::new(key, timeout)?;
        let token = auth.fetch_token().await?;
        Ok(SheetsClient::new(token.access_token, timeout)?)
    }
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
