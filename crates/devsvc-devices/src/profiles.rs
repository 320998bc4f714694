//! Device profile cache.
//!
//! Profiles are cached by name. A miss falls through to the metadata
//! authority and the result is kept. Profiles carried by stored devices are
//! remembered as devices arrive.
//!
//! At start the service may upload a directory of YAML profiles; a profile
//! the authority already knows is left alone.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

use crate::metadata::{MetadataClient, MetadataError, MetadataResult};
use crate::model::DeviceProfile;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Cannot read profiles directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read profile {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No device profile name found in {}", .0.display())]
    MissingName(PathBuf),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Only the name is read from a profile file; the authority parses the rest.
#[derive(Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    name: String,
}

pub struct ProfileCache {
    metadata: Arc<dyn MetadataClient>,
    profiles: RwLock<HashMap<String, Arc<DeviceProfile>>>,
}

impl ProfileCache {
    pub fn new(metadata: Arc<dyn MetadataClient>) -> Self {
        Self {
            metadata,
            profiles: RwLock::new(HashMap::new()),
        }
    }

    pub fn cached(&self, name: &str) -> Option<Arc<DeviceProfile>> {
        self.profiles.read().get(name).cloned()
    }

    /// Cache `profile`, replacing any earlier profile of the same name.
    /// Unnamed profiles are ignored.
    pub fn remember(&self, profile: &DeviceProfile) {
        if profile.name.is_empty() {
            return;
        }
        self.profiles
            .write()
            .insert(profile.name.clone(), Arc::new(profile.clone()));
    }

    /// Profile by name, fetched from the authority on a cache miss.
    pub async fn get(&self, name: &str) -> MetadataResult<Arc<DeviceProfile>> {
        if let Some(profile) = self.cached(name) {
            return Ok(profile);
        }
        let profile = Arc::new(self.metadata.fetch_profile(name).await?);
        debug!("Cached device profile {}", name);
        self.profiles
            .write()
            .insert(name.to_string(), Arc::clone(&profile));
        Ok(profile)
    }

    /// Every cached profile, sorted by name.
    pub fn list(&self) -> Vec<Arc<DeviceProfile>> {
        let mut profiles: Vec<_> = self.profiles.read().values().cloned().collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    pub fn clear(&self) {
        self.profiles.write().clear();
    }

    /// Upload every `*.yaml` profile in `dir` that the authority does not
    /// have yet. Returns the number uploaded. Stops at the first failure.
    pub async fn upload_dir(&self, dir: &Path) -> Result<usize, ProfileError> {
        let files = yaml_files(dir).await?;
        info!("Processing device profiles from {}", dir.display());

        let mut uploaded = 0;
        for path in files {
            if self.upload_file(&path).await? {
                uploaded += 1;
            }
        }
        Ok(uploaded)
    }

    async fn upload_file(&self, path: &Path) -> Result<bool, ProfileError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ProfileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let document: ProfileDocument =
            serde_yaml::from_str(&text).map_err(|source| ProfileError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if document.name.is_empty() {
            return Err(ProfileError::MissingName(path.to_path_buf()));
        }

        debug!("Checking existence of device profile {}", document.name);
        match self.get(&document.name).await {
            Ok(_) => {
                info!("Device profile {} already exists: skipped", document.name);
                return Ok(false);
            }
            Err(MetadataError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        info!("Uploading device profile from {}", path.display());
        self.metadata.upload_profile(&text).await?;
        self.get(&document.name).await?;
        Ok(true)
    }
}

async fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>, ProfileError> {
    let directory_error = |source: std::io::Error| ProfileError::Directory {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(directory_error)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(directory_error)? {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml"));
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
