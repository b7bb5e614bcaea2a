//! Provider configuration: which project to manage instances in and which
//! credentials to use.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Endpoint of the Redis API.
pub const DEFAULT_ENDPOINT: &str = "https://redis.googleapis.com";

/// Resolved credentials for one provider config.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    pub project_id: String,
    pub access_token: String,
    /// Overrides [`DEFAULT_ENDPOINT`], e.g. for an emulator.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl ProviderConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    fn validate(self, name: &str) -> Result<Self> {
        if self.project_id.trim().is_empty() {
            return Err(Error::Connect(format!("provider config {name} has no project_id")));
        }
        if self.access_token.trim().is_empty() {
            return Err(Error::Connect(format!("provider config {name} has no access_token")));
        }
        Ok(self)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("project_id", &self.project_id)
            .field("access_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Resolves a provider config by name.
#[async_trait]
pub trait CredentialsSource: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<ProviderConfig>;
}

/// Reads `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    dir: PathBuf,
}

impl FileCredentials {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl CredentialsSource for FileCredentials {
    async fn resolve(&self, name: &str) -> Result<ProviderConfig> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(Error::Connect(format!("invalid provider config name {name:?}")));
        }

        let path = self.dir.join(format!("{name}.json"));
        debug!(path = %path.display(), "Reading provider config");

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::Connect(format!("cannot read {}: {e}", path.display())))?;
        let config: ProviderConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Connect(format!("cannot parse {}: {e}", path.display())))?;

        config.validate(name)
    }
}

/// In-memory provider configs.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    configs: BTreeMap<String, ProviderConfig>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, config: ProviderConfig) -> Self {
        self.configs.insert(name.into(), config);
        self
    }
}

#[async_trait]
impl CredentialsSource for StaticCredentials {
    async fn resolve(&self, name: &str) -> Result<ProviderConfig> {
        self.configs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Connect(format!("provider config {name} not found")))?
            .validate(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(format!("{name}.json")), body).unwrap();
    }

    #[tokio::test]
    async fn test_file_credentials_resolve() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "default",
            r#"{"project_id": "coolProject", "access_token": "ya29.token"}"#,
        );

        let creds = FileCredentials::new(dir.path());
        let config = creds.resolve("default").await.unwrap();
        assert_eq!(config.project_id, "coolProject");
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert!(!format!("{config:?}").contains("ya29"));
    }

    #[tokio::test]
    async fn test_file_credentials_missing() {
        let dir = tempfile::tempdir().unwrap();
        let creds = FileCredentials::new(dir.path());
        let err = creds.resolve("default").await.unwrap_err();
        assert!(matches!(err, Error::Connect(_)));
    }

    #[tokio::test]
    async fn test_file_credentials_empty_token() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "default",
            r#"{"project_id": "coolProject", "access_token": ""}"#,
        );

        let creds = FileCredentials::new(dir.path());
        let err = creds.resolve("default").await.unwrap_err();
        assert!(err.to_string().contains("access_token"));
    }

    #[tokio::test]
    async fn test_file_credentials_blank_project() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "default",
            r#"{"project_id": "  ", "access_token": "ya29.token"}"#,
        );

        let creds = FileCredentials::new(dir.path());
        let err = creds.resolve("default").await.unwrap_err();
        assert!(matches!(err, Error::Connect(_)));
        assert!(err.to_string().contains("project_id"));
    }

    #[tokio::test]
    async fn test_file_credentials_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "default", r#"{"project_id": "coolProject","#);

        let creds = FileCredentials::new(dir.path());
        let err = creds.resolve("default").await.unwrap_err();
        assert!(matches!(err, Error::Connect(_)));
        assert!(err.to_string().contains("cannot parse"));
    }

    #[tokio::test]
    async fn test_file_credentials_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let creds = FileCredentials::new(dir.path());
        assert!(creds.resolve("../secrets").await.is_err());
    }

    #[tokio::test]
    async fn test_static_credentials() {
        let creds = StaticCredentials::new().with(
            "gcp",
            ProviderConfig {
                project_id: "coolProject".to_string(),
                access_token: "t".to_string(),
                endpoint: Some("http://127.0.0.1:8085".to_string()),
            },
        );
        assert_eq!(creds.resolve("gcp").await.unwrap().endpoint(), "http://127.0.0.1:8085");
        assert!(creds.resolve("default").await.is_err());
    }
}
