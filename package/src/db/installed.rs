//! Installed package database
//!
//! Uses SQLite to record the metadata installed packages were built with
//! (USE, IUSE, SLOT, ...), the counterpart of /var/db/pkg.

use super::PackageDatabase;
use crate::{Error, Result};
use buckos_config::Cpv;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Installed package database
pub struct InstalledDb {
    conn: Connection,
}

impl InstalledDb {
    /// Open or create the database under `path`
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let db_file = path.join("packages.db");
        let conn = Connection::open(&db_file)?;

        let db = Self { conn };
        db.init_schema()?;

        Ok(db)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Installed packages table
            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cpv TEXT NOT NULL UNIQUE,
                category TEXT NOT NULL,
                name TEXT NOT NULL,
                version TEXT NOT NULL
            );

            -- Package metadata (USE, IUSE, SLOT, ...)
            CREATE TABLE IF NOT EXISTS package_metadata (
                package_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE,
                PRIMARY KEY (package_id, key)
            );

            -- Indices
            CREATE INDEX IF NOT EXISTS idx_packages_name ON packages(category, name);

            -- Cascade metadata deletes
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        Ok(())
    }

    /// Record an installed package, replacing any previous record
    pub fn add_package(&mut self, cpv: &str, metadata: &[(&str, &str)]) -> Result<i64> {
        let parsed = Cpv::parse(cpv).map_err(|_| Error::InvalidPackageSpec(cpv.to_string()))?;

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM packages WHERE cpv = ?", params![cpv])?;
        tx.execute(
            "INSERT INTO packages (cpv, category, name, version) VALUES (?, ?, ?, ?)",
            params![cpv, parsed.category, parsed.name, parsed.version],
        )?;
        let pkg_id = tx.last_insert_rowid();

        for (key, value) in metadata {
            tx.execute(
                "INSERT OR REPLACE INTO package_metadata (package_id, key, value)
                 VALUES (?, ?, ?)",
                params![pkg_id, key, value],
            )?;
        }
        tx.commit()?;

        debug!("Recorded {} with {} metadata keys", cpv, metadata.len());
        Ok(pkg_id)
    }

    /// Remove a package, returning whether it was recorded
    pub fn remove_package(&mut self, cpv: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM packages WHERE cpv = ?", params![cpv])?;
        Ok(removed > 0)
    }

    fn package_id(&self, cpv: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM packages WHERE cpv = ?",
                params![cpv],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.into())
    }
}

impl PackageDatabase for InstalledDb {
    fn aux_get(&self, cpv: &str, keys: &[&str]) -> Result<Vec<String>> {
        let pkg_id = self
            .package_id(cpv)?
            .ok_or_else(|| Error::PackageNotFound(cpv.to_string()))?;

        let mut stmt = self
            .conn
            .prepare("SELECT value FROM package_metadata WHERE package_id = ? AND key = ?")?;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value: Option<String> = stmt
                .query_row(params![pkg_id, key], |row| row.get(0))
                .optional()?;
            values.push(value.unwrap_or_default());
        }
        Ok(values)
    }

    fn cpv_exists(&self, cpv: &str) -> bool {
        matches!(self.package_id(cpv), Ok(Some(_)))
    }

    fn cpv_all(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT cpv FROM packages ORDER BY cpv")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}
