//! Platform services reachable from a component
//!
//! These are implemented by the hosting worker; the SDK only forwards handles.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MASKED_VALUE;
use crate::error::ComponentError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub metadata: FileMetadata,
    pub content: Bytes,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn download_file(&self, file_id: &str) -> Result<StoredFile, ComponentError>;

    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata, ComponentError>;

    async fn upload_file(
        &self,
        name: &str,
        content: Bytes,
        mime_type: &str,
    ) -> Result<FileMetadata, ComponentError>;
}

/// Resolved secret; `Debug` never prints the value
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub value: String,
    pub version: u32,
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("value", &MASKED_VALUE)
            .field("version", &self.version)
            .finish()
    }
}

#[async_trait]
pub trait SecretsService: Send + Sync {
    /// Latest version when `version` is `None`; `Ok(None)` when the key is unknown
    async fn get(&self, key: &str, version: Option<u32>)
        -> Result<Option<SecretValue>, ComponentError>;

    async fn list(&self) -> Result<Vec<String>, ComponentError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUpload {
    pub name: String,
    pub content: Bytes,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    pub id: String,
    pub name: String,
    pub size: u64,
}

#[async_trait]
pub trait ArtifactService: Send + Sync {
    async fn upload(&self, artifact: ArtifactUpload) -> Result<ArtifactRef, ComponentError>;

    async fn download(&self, artifact_id: &str) -> Result<Bytes, ComponentError>;
}

/// Fixed secrets, one version per key (tests and local runs)
#[derive(Default)]
pub struct StaticSecrets {
    values: BTreeMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretsService for StaticSecrets {
    async fn get(
        &self,
        key: &str,
        version: Option<u32>,
    ) -> Result<Option<SecretValue>, ComponentError> {
        if matches!(version, Some(v) if v != 1) {
            return Err(ComponentError::not_found(
                format!("Secret '{}' has no version {:?}", key, version),
                Some(key.to_string()),
            ));
        }
        Ok(self.values.get(key).map(|value| SecretValue {
            value: value.clone(),
            version: 1,
        }))
    }

    async fn list(&self) -> Result<Vec<String>, ComponentError> {
        Ok(self.values.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_secrets_lookup() {
        let secrets = StaticSecrets::new().with("GITHUB_TOKEN", "ghp_x");
        let value = secrets.get("GITHUB_TOKEN", None).await.unwrap().unwrap();
        assert_eq!(value.value, "ghp_x");
        assert!(secrets.get("MISSING", None).await.unwrap().is_none());
        assert_eq!(secrets.list().await.unwrap(), vec!["GITHUB_TOKEN"]);

        let err = secrets.get("GITHUB_TOKEN", Some(3)).await.unwrap_err();
        assert_eq!(err.error_type(), "NotFoundError");
    }

    #[test]
    fn secret_debug_is_masked() {
        let value = SecretValue {
            value: "hunter2".into(),
            version: 1,
        };
        let shown = format!("{:?}", value);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("[REDACTED]"));
    }
}
