//! Configuration loading utilities
//!
//! Builds [`Settings`] from a Portage-style configuration tree:
//!
//! ```text
//! /etc/portage/
//! ├── make.conf          # Global settings
//! ├── make.profile/      # Profile (make.defaults, arch.list, use.mask, ...)
//! └── package.use        # Per-package USE flags (file or directory)
//! ```

use crate::make_conf::{stack_incremental, MakeConf, INCREMENTALS};
use crate::profile::{parse_package_use, read_config_path, Profile};
use crate::use_flags::UseConfig;
use crate::{ConfigError, Result, Settings};
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration root
pub const DEFAULT_CONFIG_ROOT: &str = "/etc/portage";

/// Configuration loader for building [`Settings`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Configuration root (e.g., /etc/portage)
    config_root: PathBuf,
    /// Profile directory override
    profile: Option<PathBuf>,
    /// Filesystem root override (ROOT)
    root: Option<PathBuf>,
    /// Whether a missing configuration root yields default settings
    use_defaults: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
            profile: None,
            root: None,
            use_defaults: false,
        }
    }

    /// Create a loader for the default system configuration
    pub fn system() -> Self {
        Self::new(DEFAULT_CONFIG_ROOT)
    }

    /// Use a specific profile directory instead of `make.profile`
    pub fn profile(mut self, profile: impl Into<PathBuf>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Override the filesystem root
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Set whether to use defaults for a missing configuration root
    pub fn use_defaults(mut self, use_defaults: bool) -> Self {
        self.use_defaults = use_defaults;
        self
    }

    /// Get path to a configuration file
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.config_root.join(name)
    }

    /// Load and stack the configuration into locked [`Settings`]
    pub fn load(&self) -> Result<Settings> {
        if !self.config_root.exists() {
            if self.use_defaults {
                debug!(
                    "{} does not exist, using default settings",
                    self.config_root.display()
                );
                return Ok(self.finish(IndexMap::new(), UseConfig::default()));
            }
            return Err(ConfigError::NotFound(self.config_root.clone()));
        }

        info!("Loading configuration from {}", self.config_root.display());

        let mut stack = VarStack::default();
        let mut use_config = UseConfig::new();

        let profile_dir = self
            .profile
            .clone()
            .unwrap_or_else(|| self.config_path("make.profile"));
        let profile = if profile_dir.is_dir() {
            let profile = Profile::load(&profile_dir, &stack.vars)?;
            stack.apply(&profile.make_defaults, &mut use_config);
            Some(profile)
        } else {
            debug!("No profile at {}", profile_dir.display());
            None
        };

        let make_conf = self.config_path("make.conf");
        if make_conf.exists() {
            let content = read_config_path(&make_conf)?;
            let conf = MakeConf::parse(&content, &make_conf, &stack.vars)?;
            stack.apply(&conf, &mut use_config);
        }

        let mut vars = stack.finish();

        if let Some(profile) = &profile {
            profile.apply_to(&mut use_config);
            if !vars.contains_key("PORTAGE_ARCHLIST") && !profile.arch_list.is_empty() {
                vars.insert("PORTAGE_ARCHLIST".to_string(), profile.arch_list.join(" "));
            }
        }

        // USE_EXPAND variables become prefixed flags (VIDEO_CARDS="intel")
        for name in split(vars.get("USE_EXPAND")) {
            use_config.declare_expand(name.clone());
            for value in split(vars.get(&name)) {
                use_config.add_expand(name.clone(), value);
            }
        }

        let package_use = self.config_path("package.use");
        if package_use.exists() {
            use_config
                .package
                .extend(parse_package_use(&read_config_path(&package_use)?));
        }

        Ok(self.finish(vars, use_config))
    }

    fn finish(&self, mut vars: IndexMap<String, String>, use_config: UseConfig) -> Settings {
        if let Some(root) = &self.root {
            vars.insert("ROOT".to_string(), root.display().to_string());
        }
        Settings::new(vars, use_config)
    }
}

/// Variables stacked across make.defaults and make.conf
#[derive(Debug, Default)]
struct VarStack {
    vars: IndexMap<String, String>,
    incrementals: IndexMap<String, IndexSet<String>>,
}

impl VarStack {
    fn apply(&mut self, conf: &MakeConf, use_config: &mut UseConfig) {
        for (key, value) in &conf.vars {
            if key == "USE" {
                use_config.apply_use_string(value);
            }

            if INCREMENTALS.contains(&key.as_str()) {
                let current = self.incrementals.entry(key.clone()).or_default();
                stack_incremental(current, value);
                let joined = current.iter().cloned().collect::<Vec<_>>().join(" ");
                self.vars.insert(key.clone(), joined);
            } else {
                self.vars.insert(key.clone(), value.clone());
            }
        }
    }

    fn finish(self) -> IndexMap<String, String> {
        self.vars
    }
}

fn split(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Load the system configuration, falling back to defaults
pub fn load_system_config() -> Result<Settings> {
    ConfigLoader::system().use_defaults(true).load()
}

/// Load the configuration of an alternate root, e.g. a chroot in /mnt/gentoo
pub fn load_root_config(root: &Path) -> Result<Settings> {
    ConfigLoader::new(root.join(DEFAULT_CONFIG_ROOT.trim_start_matches('/')))
        .root(root)
        .use_defaults(true)
        .load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write_tree(root: &Path) {
        let profile = root.join("make.profile");
        fs::create_dir_all(&profile).unwrap();
        fs::write(
            profile.join("make.defaults"),
            r#"ARCH="amd64"
USE="X gtk"
USE_EXPAND="VIDEO_CARDS INPUT_DEVICES ABI_X86"
USE_EXPAND_HIDDEN="ABI_X86"
ABI_X86="64"
"#,
        )
        .unwrap();
        fs::write(profile.join("arch.list"), "amd64\nx86\narm64\n").unwrap();
        fs::write(profile.join("use.mask"), "systemd\n").unwrap();
        fs::write(profile.join("package.use.force"), "media-libs/mesa llvm\n").unwrap();

        fs::write(
            root.join("make.conf"),
            r#"USE="${USE} -gtk wayland"
VIDEO_CARDS="intel"
USE_EXPAND_HIDDEN="-ABI_X86 INPUT_DEVICES"
"#,
        )
        .unwrap();

        fs::create_dir(root.join("package.use")).unwrap();
        fs::write(root.join("package.use").join("vim"), "app-editors/vim python\n").unwrap();
    }

    #[test]
    fn test_load_tree() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());

        let settings = ConfigLoader::new(dir.path()).load().unwrap();
        assert!(settings.is_locked());
        assert_eq!(settings.get("ARCH"), Some("amd64"));
        assert_eq!(settings.get("USE_EXPAND_HIDDEN"), Some("INPUT_DEVICES"));
        assert_eq!(settings.arch_list(), vec!["amd64", "x86", "arm64"]);

        let use_config = settings.use_config();
        let flags = use_config.effective_flags(None, &[]);
        assert!(flags.contains("X"));
        assert!(flags.contains("wayland"));
        assert!(!flags.contains("gtk"));
        assert!(flags.contains("video_cards_intel"));
        assert!(flags.contains("abi_x86_64"));
        assert!(use_config.mask.contains("systemd"));
        assert_eq!(use_config.package.len(), 1);
        assert_eq!(use_config.package_force.len(), 1);
    }

    #[test]
    fn test_root_override() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path());

        let settings = ConfigLoader::new(dir.path())
            .root("/mnt/gentoo")
            .load()
            .unwrap();
        assert_eq!(settings.root(), Path::new("/mnt/gentoo"));
    }

    #[test]
    fn test_missing_config_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        assert_matches!(
            ConfigLoader::new(&missing).load(),
            Err(ConfigError::NotFound(_))
        );

        let settings = ConfigLoader::new(&missing).use_defaults(true).load().unwrap();
        assert_eq!(settings.root(), Path::new("/"));
        assert!(settings.arch_list().is_empty());
    }

    #[test]
    fn test_explicit_profile_dir() {
        let dir = TempDir::new().unwrap();
        let profile = dir.path().join("profiles/default");
        fs::create_dir_all(&profile).unwrap();
        fs::write(profile.join("arch.list"), "riscv\n").unwrap();
        let config_root = dir.path().join("etc");
        fs::create_dir(&config_root).unwrap();

        let settings = ConfigLoader::new(&config_root)
            .profile(&profile)
            .load()
            .unwrap();
        assert_eq!(settings.arch_list(), vec!["riscv"]);
    }
}
