//! Ebuild repository metadata cache
//!
//! Reads the md5-cache shipped with synced repositories:
//!
//! ```text
//! <repo>/metadata/md5-cache/<category>/<package>-<version>
//! ```
//!
//! Each cache entry is a list of `KEY=value` lines.

use super::PackageDatabase;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Metadata cache of a single ebuild repository
#[derive(Debug, Clone)]
pub struct RepositoryDb {
    location: PathBuf,
}

impl RepositoryDb {
    /// Open a repository; the location must be a directory
    pub fn open(location: impl Into<PathBuf>) -> Result<Self> {
        let location = location.into();
        if !location.is_dir() {
            return Err(Error::RepositoryNotFound(location));
        }
        Ok(Self { location })
    }

    /// Repository root
    pub fn location(&self) -> &Path {
        &self.location
    }

    fn cache_dir(&self) -> PathBuf {
        self.location.join("metadata").join("md5-cache")
    }

    /// Cache entry path for a cpv; rejects anything but `category/pf`
    fn entry_path(&self, cpv: &str) -> Result<PathBuf> {
        let relative = Path::new(cpv);
        let components: Vec<_> = relative.components().collect();
        let valid = components.len() == 2
            && components
                .iter()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(Error::InvalidPackageSpec(cpv.to_string()));
        }
        Ok(self.cache_dir().join(relative))
    }

    /// Read and parse one cache entry
    fn read_entry(&self, cpv: &str) -> Result<HashMap<String, String>> {
        let path = self.entry_path(cpv)?;
        if !path.is_file() {
            return Err(Error::PackageNotFound(cpv.to_string()));
        }

        let content = std::fs::read_to_string(&path)?;
        parse_cache_entry(cpv, &content)
    }
}

/// Parse md5-cache `KEY=value` lines
fn parse_cache_entry(cpv: &str, content: &str) -> Result<HashMap<String, String>> {
    let mut metadata = HashMap::new();

    for (idx, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| Error::InvalidMetadata {
            cpv: cpv.to_string(),
            message: format!("line {} is not KEY=value", idx + 1),
        })?;
        metadata.insert(key.to_string(), value.to_string());
    }

    Ok(metadata)
}

impl PackageDatabase for RepositoryDb {
    fn aux_get(&self, cpv: &str, keys: &[&str]) -> Result<Vec<String>> {
        let mut metadata = self.read_entry(cpv)?;
        debug!("Read {} metadata keys for {}", metadata.len(), cpv);

        Ok(keys
            .iter()
            .map(|key| metadata.remove(*key).unwrap_or_default())
            .collect())
    }

    fn cpv_exists(&self, cpv: &str) -> bool {
        self.entry_path(cpv).map(|p| p.is_file()).unwrap_or(false)
    }

    fn cpv_all(&self) -> Result<Vec<String>> {
        let cache_dir = self.cache_dir();
        if !cache_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut cpvs = Vec::new();
        for entry in WalkDir::new(&cache_dir).min_depth(2).max_depth(2) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let pf = entry.file_name().to_string_lossy();
            let category = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|c| c.to_string_lossy());

            match category {
                Some(category) if !pf.starts_with('.') => {
                    cpvs.push(format!("{}/{}", category, pf));
                }
                _ => {}
            }
        }

        cpvs.sort();
        Ok(cpvs)
    }
}
