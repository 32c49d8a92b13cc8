//! Package atom and cpv parsing
//!
//! Implements the subset of Gentoo atoms used by per-package configuration
//! files (package.use, package.use.mask, package.use.force):
//! - `category/package`
//! - `>=category/package-1.0`
//! - `=category/package-1.0*`
//! - `category/package:slot::repo`
//! - `*/package`, `category/*`

use crate::version::Version;
use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VersionOp {
    /// No version constraint
    #[default]
    Any,
    /// Exact version match (=)
    Equal,
    /// Greater than (>)
    Greater,
    /// Greater than or equal (>=)
    GreaterEqual,
    /// Less than (<)
    Less,
    /// Less than or equal (<=)
    LessEqual,
    /// Version glob match (=*), e.g., =category/package-1.0*
    GlobEqual,
    /// Any revision of a version (~)
    RevisionBump,
}

/// A concrete category/package-version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpv {
    pub category: String,
    pub name: String,
    /// Version string as written (e.g., "1.2.3-r1")
    pub version: String,
}

impl Cpv {
    /// Parse a `category/package-version` string
    pub fn parse(s: &str) -> Result<Self> {
        let (category, name_version) = s
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidCpv(s.to_string()))?;

        match split_version(name_version) {
            (name, Some(version)) if !category.is_empty() && !name.is_empty() => Ok(Cpv {
                category: category.to_string(),
                name: name.to_string(),
                version: version.to_string(),
            }),
            _ => Err(ConfigError::InvalidCpv(s.to_string())),
        }
    }

    /// The category/name part
    pub fn cpn(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Parsed version, if it is well formed
    pub fn parsed_version(&self) -> Option<Version> {
        self.version.parse().ok()
    }
}

impl fmt::Display for Cpv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{}", self.category, self.name, self.version)
    }
}

/// A package atom representing a package specification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageAtom {
    /// Version operator
    pub operator: VersionOp,
    /// Package category (e.g., "sys-apps")
    pub category: String,
    /// Package name (e.g., "systemd")
    pub name: String,
    /// Version string (optional)
    pub version: Option<String>,
    /// Slot specification (optional)
    pub slot: Option<String>,
    /// Repository restriction (optional)
    pub repository: Option<String>,
}

impl PackageAtom {
    /// Create a new package atom with just category and name
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            operator: VersionOp::Any,
            category: category.into(),
            name: name.into(),
            version: None,
            slot: None,
            repository: None,
        }
    }

    /// Set the version operator
    pub fn with_operator(mut self, op: VersionOp) -> Self {
        self.operator = op;
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Get the fully qualified package name (category/name)
    pub fn cpn(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Check if this atom matches a given category/name, honouring `*`
    pub fn matches_cpn(&self, category: &str, name: &str) -> bool {
        (self.category == "*" || self.category == category)
            && (self.name == "*" || self.name == name)
    }

    /// Check if this is a wildcard match (e.g., */package or category/*)
    pub fn is_wildcard(&self) -> bool {
        self.category == "*" || self.name == "*"
    }

    /// Check if this atom matches a concrete package version.
    ///
    /// Slot and repository restrictions are not checked since a bare cpv
    /// carries neither.
    pub fn matches(&self, cpv: &Cpv) -> bool {
        if !self.matches_cpn(&cpv.category, &cpv.name) {
            return false;
        }

        let wanted = match (&self.operator, &self.version) {
            (VersionOp::Any, _) | (_, None) => return true,
            (VersionOp::GlobEqual, Some(ver)) => return cpv.version.starts_with(ver.as_str()),
            (_, Some(ver)) => ver,
        };

        let (Ok(wanted), Some(have)) = (wanted.parse::<Version>(), cpv.parsed_version()) else {
            return false;
        };

        match self.operator {
            VersionOp::Equal => have == wanted,
            VersionOp::Greater => have > wanted,
            VersionOp::GreaterEqual => have >= wanted,
            VersionOp::Less => have < wanted,
            VersionOp::LessEqual => have <= wanted,
            VersionOp::RevisionBump => have.eq_without_revision(&wanted),
            VersionOp::Any | VersionOp::GlobEqual => true,
        }
    }
}

impl FromStr for PackageAtom {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::InvalidAtom("empty atom".to_string()));
        }

        let mut remaining = s;

        // Parse operator
        let mut operator = if let Some(rest) = remaining.strip_prefix(">=") {
            remaining = rest;
            VersionOp::GreaterEqual
        } else if let Some(rest) = remaining.strip_prefix("<=") {
            remaining = rest;
            VersionOp::LessEqual
        } else if let Some(rest) = remaining.strip_prefix('>') {
            remaining = rest;
            VersionOp::Greater
        } else if let Some(rest) = remaining.strip_prefix('<') {
            remaining = rest;
            VersionOp::Less
        } else if let Some(rest) = remaining.strip_prefix('~') {
            remaining = rest;
            VersionOp::RevisionBump
        } else if let Some(rest) = remaining.strip_prefix('=') {
            remaining = rest;
            VersionOp::Equal
        } else {
            VersionOp::Any
        };

        // Extract repository ::repo
        let mut repository = None;
        if let Some(idx) = remaining.find("::") {
            repository = Some(remaining[idx + 2..].to_string());
            remaining = &remaining[..idx];
        }

        // Extract slot :slot
        let mut slot = None;
        if let Some(idx) = remaining.find(':') {
            slot = Some(remaining[idx + 1..].to_string());
            remaining = &remaining[..idx];
        }

        // =cat/pkg-1.0*:slot globs on the version, not the slot
        if operator == VersionOp::Equal {
            if let Some(rest) = remaining.strip_suffix('*') {
                operator = VersionOp::GlobEqual;
                remaining = rest;
            }
        }

        let (category, name_version) = remaining
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidAtom(format!("missing category: {}", s)))?;

        let (name, version) = if operator != VersionOp::Any {
            match split_version(name_version) {
                (name, Some(version)) => (name, Some(version.to_string())),
                _ => {
                    return Err(ConfigError::InvalidAtom(format!(
                        "operator without version: {}",
                        s
                    )))
                }
            }
        } else {
            (name_version, None)
        };

        if category.is_empty() || name.is_empty() {
            return Err(ConfigError::InvalidAtom(format!("invalid atom: {}", s)));
        }

        Ok(PackageAtom {
            operator,
            category: category.to_string(),
            name: name.to_string(),
            version,
            slot,
            repository,
        })
    }
}

impl fmt::Display for PackageAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            VersionOp::Any => {}
            VersionOp::Equal | VersionOp::GlobEqual => write!(f, "=")?,
            VersionOp::Greater => write!(f, ">")?,
            VersionOp::GreaterEqual => write!(f, ">=")?,
            VersionOp::Less => write!(f, "<")?,
            VersionOp::LessEqual => write!(f, "<=")?,
            VersionOp::RevisionBump => write!(f, "~")?,
        }

        write!(f, "{}/{}", self.category, self.name)?;

        if let Some(ref ver) = self.version {
            write!(f, "-{}", ver)?;
        }
        if self.operator == VersionOp::GlobEqual {
            write!(f, "*")?;
        }
        if let Some(ref slot) = self.slot {
            write!(f, ":{}", slot)?;
        }
        if let Some(ref repo) = self.repository {
            write!(f, "::{}", repo)?;
        }

        Ok(())
    }
}

/// Split `name-version` at the last `-` followed by a digit. A trailing
/// `-rN` revision stays attached to the version.
fn split_version(name_version: &str) -> (&str, Option<&str>) {
    let bytes = name_version.as_bytes();
    let mut candidate = None;

    for (i, b) in bytes.iter().enumerate() {
        if *b == b'-' && bytes.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
            candidate = Some(i);
        }
    }

    match candidate {
        Some(idx) => (&name_version[..idx], Some(&name_version[idx + 1..])),
        None => (name_version, None),
    }
}
