//! On-disk client configuration: `~/.flare/config.json`, overridable via
//! `FLARE_WORKER_URL` and `FLARE_API_KEY`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    worker_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

#[derive(Debug)]
pub struct FlareConfig {
    data: ConfigFile,
    path: PathBuf,
}

impl FlareConfig {
    /// Load from the default location, falling back to an empty config when
    /// the file does not exist yet.
    pub fn load() -> Result<Self, ClientError> {
        let dirs = directories::BaseDirs::new()
            .ok_or_else(|| ClientError::Config("cannot resolve home directory".into()))?;
        let path = dirs.home_dir().join(".flare").join("config.json");
        Self::load_from(path)
    }

    pub fn load_from(path: PathBuf) -> Result<Self, ClientError> {
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| ClientError::Config(format!("cannot read {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| ClientError::Config(format!("invalid config file: {e}")))?
        } else {
            ConfigFile::default()
        };
        Ok(Self { data, path })
    }

    /// Write the config file, creating `~/.flare/` as needed. The file is
    /// chmod 0600 since it holds the API key.
    pub fn save(&self) -> Result<(), ClientError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| ClientError::Config(format!("cannot create {}: {e}", dir.display())))?;
        }
        let raw = serde_json::to_string_pretty(&self.data)
            .map_err(|e| ClientError::Config(format!("cannot serialize config: {e}")))?;
        fs::write(&self.path, raw)
            .map_err(|e| ClientError::Config(format!("cannot write {}: {e}", self.path.display())))?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Env var wins over the file, matching the original client behavior.
    pub fn worker_url(&self) -> Option<String> {
        std::env::var("FLARE_WORKER_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.data.worker_url.clone())
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var("FLARE_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.data.api_key.clone())
    }

    pub fn set_worker_url(&mut self, url: String) {
        self.data.worker_url = Some(url);
    }

    pub fn set_api_key(&mut self, key: String) {
        self.data.api_key = Some(key);
    }

    /// Stored api key without env override, for masked display.
    pub fn stored_api_key(&self) -> Option<&str> {
        self.data.api_key.as_deref()
    }

    pub fn stored_worker_url(&self) -> Option<&str> {
        self.data.worker_url.as_deref()
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), ClientError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| ClientError::Config(format!("cannot chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), ClientError> {
    Ok(())
}
