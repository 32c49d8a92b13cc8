//! USE flag configuration system
//!
//! Implements Gentoo-style USE flag handling including:
//! - Incremental global USE flags (make.defaults, make.conf)
//! - Per-package USE flags (package.use)
//! - USE_EXPAND variables (CPU_FLAGS_*, VIDEO_CARDS, etc.)
//! - Profile masks and forces (use.mask, use.force and their per-package forms)

use crate::{Cpv, PackageAtom};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Complete USE flag configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UseConfig {
    /// Global USE tokens in the order they were read, e.g. ["X", "-gtk"]
    pub global: Vec<UseFlag>,
    /// Per-package USE flags (from package.use)
    pub package: Vec<PackageUseEntry>,
    /// USE_EXPAND variables (e.g., VIDEO_CARDS -> {intel, radeon})
    pub expand: IndexMap<String, IndexSet<String>>,
    /// USE flag masks (use.mask)
    pub mask: IndexSet<String>,
    /// USE flag forces (use.force)
    pub force: IndexSet<String>,
    /// Per-package masks (package.use.mask)
    pub package_mask: Vec<PackageUseEntry>,
    /// Per-package forces (package.use.force)
    pub package_force: Vec<PackageUseEntry>,
}

impl UseConfig {
    /// Create a new empty USE configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a global USE token
    pub fn add_global(&mut self, flag: UseFlag) {
        self.global.push(flag);
    }

    /// Append every token of a USE string
    pub fn apply_use_string(&mut self, s: &str) {
        self.global.extend(Self::parse_use_string(s));
    }

    /// Add a per-package USE flag entry
    pub fn add_package_use(&mut self, atom: PackageAtom, flags: Vec<UseFlag>) {
        self.package.push(PackageUseEntry { atom, flags });
    }

    /// Add a USE_EXPAND variable value
    pub fn add_expand(&mut self, variable: impl Into<String>, value: impl Into<String>) {
        self.expand
            .entry(variable.into())
            .or_default()
            .insert(value.into());
    }

    /// Declare a USE_EXPAND variable without values
    pub fn declare_expand(&mut self, variable: impl Into<String>) {
        self.expand.entry(variable.into()).or_default();
    }

    /// Flags generated by the USE_EXPAND variables, e.g. `video_cards_intel`
    pub fn expand_flags(&self) -> Vec<String> {
        self.expand
            .iter()
            .flat_map(|(prefix, values)| {
                values
                    .iter()
                    .map(move |value| format!("{}_{}", prefix.to_lowercase(), value))
            })
            .collect()
    }

    /// Whether a flag belongs to one of the USE_EXPAND variables
    pub fn is_expand_flag(&self, flag: &str) -> bool {
        self.expand.keys().any(|prefix| {
            flag.strip_prefix(prefix.to_lowercase().as_str())
                .is_some_and(|rest| rest.starts_with('_'))
        })
    }

    /// Compute the effective USE flags.
    ///
    /// Order of precedence, lowest first: IUSE defaults, global USE,
    /// USE_EXPAND values, matching package.use entries. Masks are then
    /// removed and forces added.
    pub fn effective_flags(
        &self,
        cpv: Option<&Cpv>,
        iuse_defaults: &[UseFlag],
    ) -> IndexSet<String> {
        let mut flags = IndexSet::new();

        apply_flags(&mut flags, iuse_defaults.iter());
        apply_flags(&mut flags, self.global.iter());

        for flag in self.expand_flags() {
            flags.insert(flag);
        }

        if let Some(cpv) = cpv {
            for entry in self.package.iter().filter(|e| e.atom.matches(cpv)) {
                apply_flags(&mut flags, entry.flags.iter());
            }
        }

        for flag in self.usemask(cpv) {
            flags.shift_remove(&flag);
        }
        for flag in self.useforce(cpv) {
            flags.insert(flag);
        }

        flags
    }

    /// Masked flags, including per-package entries when a cpv is given
    pub fn usemask(&self, cpv: Option<&Cpv>) -> IndexSet<String> {
        stack_package_entries(&self.mask, &self.package_mask, cpv)
    }

    /// Forced flags, including per-package entries when a cpv is given
    pub fn useforce(&self, cpv: Option<&Cpv>) -> IndexSet<String> {
        stack_package_entries(&self.force, &self.package_force, cpv)
    }

    /// Parse a USE string (e.g., "X wayland -gtk systemd")
    pub fn parse_use_string(s: &str) -> Vec<UseFlag> {
        s.split_whitespace().map(UseFlag::parse).collect()
    }

    /// Merge another USE configuration into this one
    pub fn merge(&mut self, other: &UseConfig) {
        self.global.extend(other.global.iter().cloned());
        self.package.extend(other.package.iter().cloned());

        for (key, values) in &other.expand {
            self.expand
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }

        self.mask.extend(other.mask.iter().cloned());
        self.force.extend(other.force.iter().cloned());
        self.package_mask.extend(other.package_mask.iter().cloned());
        self.package_force.extend(other.package_force.iter().cloned());
    }
}

/// Apply incremental tokens: `flag` enables, `-flag` disables, `-*` clears.
fn apply_flags<'a>(flags: &mut IndexSet<String>, tokens: impl Iterator<Item = &'a UseFlag>) {
    for token in tokens {
        if token.enabled {
            flags.insert(token.name.clone());
        } else if token.name == "*" {
            flags.clear();
        } else {
            flags.shift_remove(&token.name);
        }
    }
}

fn stack_package_entries(
    base: &IndexSet<String>,
    entries: &[PackageUseEntry],
    cpv: Option<&Cpv>,
) -> IndexSet<String> {
    let mut flags = base.clone();
    if let Some(cpv) = cpv {
        for entry in entries.iter().filter(|e| e.atom.matches(cpv)) {
            apply_flags(&mut flags, entry.flags.iter());
        }
    }
    flags
}

/// A single USE flag with enable/disable state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseFlag {
    /// The flag name
    pub name: String,
    /// Whether the flag is enabled
    pub enabled: bool,
}

impl UseFlag {
    /// Create a new enabled USE flag
    pub fn enabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    /// Create a new disabled USE flag
    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
        }
    }

    /// Parse a USE flag string (e.g., "-gtk" or "systemd")
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.strip_prefix('-') {
            Some(name) => Self::disabled(name),
            None => Self::enabled(s),
        }
    }

    /// Parse an IUSE token, returning the flag only when it carries a
    /// `+` or `-` default
    pub fn parse_iuse_default(s: &str) -> Option<Self> {
        if let Some(name) = s.strip_prefix('+') {
            Some(Self::enabled(name))
        } else {
            s.strip_prefix('-').map(Self::disabled)
        }
    }
}

impl std::fmt::Display for UseFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.enabled {
            write!(f, "-")?;
        }
        write!(f, "{}", self.name)
    }
}

/// Per-package USE flag entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageUseEntry {
    /// The package atom
    pub atom: PackageAtom,
    /// USE flags for this package
    pub flags: Vec<UseFlag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpv(s: &str) -> Cpv {
        Cpv::parse(s).unwrap()
    }

    #[test]
    fn test_parse_use_flag() {
        let flag = UseFlag::parse("systemd");
        assert_eq!(flag.name, "systemd");
        assert!(flag.enabled);

        let flag = UseFlag::parse("-gtk");
        assert_eq!(flag.name, "gtk");
        assert!(!flag.enabled);
    }

    #[test]
    fn test_parse_iuse_default() {
        assert_eq!(UseFlag::parse_iuse_default("+X"), Some(UseFlag::enabled("X")));
        assert_eq!(UseFlag::parse_iuse_default("-doc"), Some(UseFlag::disabled("doc")));
        assert_eq!(UseFlag::parse_iuse_default("static"), None);
    }

    #[test]
    fn test_effective_flags() {
        let mut config = UseConfig::new();
        config.apply_use_string("X wayland systemd");

        let atom = PackageAtom::new("app-editors", "vim");
        config.add_package_use(atom, vec![UseFlag::disabled("X")]);

        let flags = config.effective_flags(Some(&cpv("app-editors/vim-9.0")), &[]);
        assert!(!flags.contains("X"));
        assert!(flags.contains("wayland"));
        assert!(flags.contains("systemd"));

        let flags = config.effective_flags(Some(&cpv("app-misc/neofetch-7.1.0")), &[]);
        assert!(flags.contains("X"));
    }

    #[test]
    fn test_incremental_global() {
        let mut config = UseConfig::new();
        config.apply_use_string("X gtk");
        config.apply_use_string("-gtk qt5");

        let flags = config.effective_flags(None, &[UseFlag::enabled("doc")]);
        assert_eq!(flags.iter().collect::<Vec<_>>(), vec!["doc", "X", "qt5"]);

        config.apply_use_string("-* minimal");
        let flags = config.effective_flags(None, &[UseFlag::enabled("doc")]);
        assert_eq!(flags.iter().collect::<Vec<_>>(), vec!["minimal"]);
    }

    #[test]
    fn test_use_expand() {
        let mut config = UseConfig::new();
        config.add_expand("CPU_FLAGS_X86", "avx2");
        config.add_expand("CPU_FLAGS_X86", "sse4_2");
        config.declare_expand("VIDEO_CARDS");

        let flags = config.effective_flags(None, &[]);
        assert!(flags.contains("cpu_flags_x86_avx2"));
        assert!(flags.contains("cpu_flags_x86_sse4_2"));

        assert!(config.is_expand_flag("video_cards_intel"));
        assert!(!config.is_expand_flag("video_cardsintel"));
        assert!(!config.is_expand_flag("static"));
    }

    #[test]
    fn test_mask_and_force() {
        let mut config = UseConfig::new();
        config.apply_use_string("systemd elogind");
        config.mask.insert("elogind".to_string());
        config.force.insert("pam".to_string());
        config.package_mask.push(PackageUseEntry {
            atom: "sys-auth/polkit".parse().unwrap(),
            flags: vec![UseFlag::parse("systemd"), UseFlag::parse("-elogind")],
        });

        let polkit = cpv("sys-auth/polkit-123");
        let mask = config.usemask(Some(&polkit));
        assert!(mask.contains("systemd"));
        assert!(!mask.contains("elogind"));

        let flags = config.effective_flags(Some(&polkit), &[]);
        assert!(flags.contains("elogind"));
        assert!(flags.contains("pam"));
        assert!(!flags.contains("systemd"));

        let flags = config.effective_flags(None, &[]);
        assert!(!flags.contains("elogind"));
        assert!(flags.contains("systemd"));
    }
}
