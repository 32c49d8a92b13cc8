//! Package databases
//!
//! A package database answers metadata queries (`IUSE`, `USE`, `SLOT`, ...)
//! for a package version identified by its cpv. Three backends exist:
//!
//! - [`RepositoryDb`]: the md5-cache of an ebuild repository
//! - [`InstalledDb`]: SQLite database of installed packages
//! - [`MemoryDb`]: in-memory metadata, for embedding and tests

pub mod installed;
pub mod repository;

pub use installed::InstalledDb;
pub use repository::RepositoryDb;

use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};

/// Metadata lookup by package identifier
pub trait PackageDatabase {
    /// Fetch metadata values for `cpv`, one per requested key, in order.
    ///
    /// Keys the package does not define yield empty strings. Unknown
    /// packages fail with [`Error::PackageNotFound`].
    fn aux_get(&self, cpv: &str, keys: &[&str]) -> Result<Vec<String>>;

    /// Whether the database knows `cpv`
    fn cpv_exists(&self, cpv: &str) -> bool {
        self.aux_get(cpv, &[]).is_ok()
    }

    /// Every cpv in the database, sorted
    fn cpv_all(&self) -> Result<Vec<String>>;
}

/// In-memory package database
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    packages: BTreeMap<String, HashMap<String, String>>,
}

impl MemoryDb {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a package with its metadata
    pub fn insert<K, V>(
        &mut self,
        cpv: impl Into<String>,
        metadata: impl IntoIterator<Item = (K, V)>,
    ) where
        K: Into<String>,
        V: Into<String>,
    {
        let metadata = metadata
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.packages.insert(cpv.into(), metadata);
    }

    /// Remove a package, returning whether it existed
    pub fn remove(&mut self, cpv: &str) -> bool {
        self.packages.remove(cpv).is_some()
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the database is empty
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageDatabase for MemoryDb {
    fn aux_get(&self, cpv: &str, keys: &[&str]) -> Result<Vec<String>> {
        let metadata = self
            .packages
            .get(cpv)
            .ok_or_else(|| Error::PackageNotFound(cpv.to_string()))?;

        Ok(keys
            .iter()
            .map(|key| metadata.get(*key).cloned().unwrap_or_default())
            .collect())
    }

    fn cpv_exists(&self, cpv: &str) -> bool {
        self.packages.contains_key(cpv)
    }

    fn cpv_all(&self) -> Result<Vec<String>> {
        Ok(self.packages.keys().cloned().collect())
    }
}
