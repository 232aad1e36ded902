//! On-disk app version record served to mobile clients.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Latest published client build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    pub version: String,
    pub download_url: String,
    pub changelog: String,
}

impl Default for AppVersion {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            download_url: "https://github.com/Sedetil/AniWanTV-Mobile/releases/download/v1.0.0/app-arm64-v8a-release.apk"
                .to_string(),
            changelog: "Initial release".to_string(),
        }
    }
}

impl AppVersion {
    /// Build from an update request body; every field must be a string.
    pub fn from_update(body: &Value) -> Option<Self> {
        let field = |name: &str| body.get(name)?.as_str().map(str::to_string);
        Some(Self {
            version: field("version")?,
            download_url: field("download_url")?,
            changelog: field("changelog")?,
        })
    }
}

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid version record in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON file holding one [`AppVersion`]. Writes are serialized.
pub struct VersionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl VersionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record, creating it with defaults if the file is missing.
    pub async fn load(&self) -> Result<AppVersion, VersionError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| VersionError::Json {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let record = AppVersion::default();
                self.save(&record).await?;
                info!(path = %self.path.display(), "Created default version record");
                Ok(record)
            }
            Err(source) => Err(VersionError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub async fn save(&self, record: &AppVersion) -> Result<(), VersionError> {
        let _guard = self.write_lock.lock().await;
        let json = serde_json::to_vec_pretty(record).map_err(|source| VersionError::Json {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, json).await.map_err(|source| {
            error!(path = %self.path.display(), error = %source, "Error saving app version");
            VersionError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}
