//! Profile directory loading
//!
//! A profile directory (usually reached through `make.profile`) provides:
//! - `make.defaults`: default variables (USE, USE_EXPAND, ARCH, ...)
//! - `arch.list`: known architecture names
//! - `use.mask` / `use.force`: globally masked or forced flags
//! - `package.use.mask` / `package.use.force`: per-package masks and forces
//!
//! Parent profiles are not followed.

use crate::make_conf::MakeConf;
use crate::use_flags::{PackageUseEntry, UseConfig, UseFlag};
use crate::{PackageAtom, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Contents of a single profile directory
#[derive(Debug, Clone, Default)]
pub struct Profile {
    /// Profile directory
    pub path: PathBuf,
    /// make.defaults assignments
    pub make_defaults: MakeConf,
    /// Architectures from arch.list
    pub arch_list: Vec<String>,
    /// use.mask entries, incremental
    pub use_mask: Vec<UseFlag>,
    /// use.force entries, incremental
    pub use_force: Vec<UseFlag>,
    /// package.use.mask entries
    pub package_use_mask: Vec<PackageUseEntry>,
    /// package.use.force entries
    pub package_use_force: Vec<PackageUseEntry>,
}

impl Profile {
    /// Load a profile directory. Missing files are skipped.
    pub fn load(path: &Path, env: &IndexMap<String, String>) -> Result<Self> {
        debug!("Loading profile from {}", path.display());

        let mut profile = Profile {
            path: path.to_path_buf(),
            ..Default::default()
        };

        let make_defaults = path.join("make.defaults");
        if make_defaults.is_file() {
            profile.make_defaults = MakeConf::load(&make_defaults, env)?;
        }

        let arch_list = path.join("arch.list");
        if arch_list.is_file() {
            profile.arch_list = read_lines(&std::fs::read_to_string(arch_list)?)
                .map(str::to_string)
                .collect();
        }

        let use_mask = path.join("use.mask");
        if use_mask.is_file() {
            profile.use_mask = read_flag_list(&std::fs::read_to_string(use_mask)?);
        }

        let use_force = path.join("use.force");
        if use_force.is_file() {
            profile.use_force = read_flag_list(&std::fs::read_to_string(use_force)?);
        }

        let package_use_mask = path.join("package.use.mask");
        if package_use_mask.exists() {
            profile.package_use_mask = parse_package_use(&read_config_path(&package_use_mask)?);
        }

        let package_use_force = path.join("package.use.force");
        if package_use_force.exists() {
            profile.package_use_force = parse_package_use(&read_config_path(&package_use_force)?);
        }

        Ok(profile)
    }

    /// Apply masks and forces of this profile to a USE configuration
    pub fn apply_to(&self, config: &mut UseConfig) {
        apply_incremental(&mut config.mask, &self.use_mask);
        apply_incremental(&mut config.force, &self.use_force);
        config.package_mask.extend(self.package_use_mask.iter().cloned());
        config.package_force.extend(self.package_use_force.iter().cloned());
    }
}

fn apply_incremental(set: &mut indexmap::IndexSet<String>, flags: &[UseFlag]) {
    for flag in flags {
        if flag.enabled {
            set.insert(flag.name.clone());
        } else {
            set.shift_remove(&flag.name);
        }
    }
}

/// Non-empty, non-comment lines with inline comments removed
fn read_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
}

/// Parse a use.mask / use.force style list
pub fn read_flag_list(content: &str) -> Vec<UseFlag> {
    read_lines(content).map(UseFlag::parse).collect()
}

/// Parse `atom flag1 -flag2 ...` lines (package.use and friends).
/// Lines with an unparsable atom are skipped with a warning.
pub fn parse_package_use(content: &str) -> Vec<PackageUseEntry> {
    let mut entries = Vec::new();

    for line in read_lines(content) {
        let mut parts = line.split_whitespace();
        let Some(atom_str) = parts.next() else {
            continue;
        };

        match atom_str.parse::<PackageAtom>() {
            Ok(atom) => {
                let flags: Vec<UseFlag> = parts.map(UseFlag::parse).collect();
                if !flags.is_empty() {
                    entries.push(PackageUseEntry { atom, flags });
                }
            }
            Err(e) => warn!("Skipping invalid entry '{}': {}", line, e),
        }
    }

    entries
}

/// Read content from a path (file or directory)
pub fn read_config_path(path: &Path) -> Result<String> {
    if path.is_dir() {
        let mut content = String::new();
        let mut entries: Vec<_> = std::fs::read_dir(path)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let file_path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if file_path.is_file() && !hidden {
                content.push_str(&std::fs::read_to_string(file_path)?);
                content.push('\n');
            }
        }
        Ok(content)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}
