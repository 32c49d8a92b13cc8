//! Resolved settings for a root filesystem
//!
//! [`Settings`] is the dictionary-like view of the stacked configuration
//! (profile make.defaults, make.conf, masks and forces). It is normally
//! locked; narrowing it to a single package requires unlocking it first.
//! [`Settings::scope_cpv`] does the unlock, narrowing, reset and relock as
//! one guarded operation so callers cannot leak a package context.

use crate::use_flags::{UseConfig, UseFlag};
use crate::{ConfigError, Cpv, Result};
use indexmap::{IndexMap, IndexSet};
use std::ops::Deref;
use std::path::Path;
use tracing::{debug, trace};

/// Key holding the effective USE flags of the current package
pub const PORTAGE_USE: &str = "PORTAGE_USE";

/// Per-package state computed by [`Settings::setcpv`]
#[derive(Debug, Clone)]
struct PackageContext {
    cpv: String,
    portage_use: String,
    usemask: IndexSet<String>,
    useforce: IndexSet<String>,
}

/// Resolved configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    vars: IndexMap<String, String>,
    use_config: UseConfig,
    locked: bool,
    package: Option<PackageContext>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(IndexMap::new(), UseConfig::default())
    }
}

impl Settings {
    /// Create locked settings from stacked variables and USE configuration.
    /// `ROOT` defaults to `/`.
    pub fn new(mut vars: IndexMap<String, String>, use_config: UseConfig) -> Self {
        vars.entry("ROOT".to_string())
            .or_insert_with(|| "/".to_string());

        Self {
            vars,
            use_config,
            locked: true,
            package: None,
        }
    }

    /// Look up a configuration key
    pub fn get(&self, key: &str) -> Option<&str> {
        if key == PORTAGE_USE {
            return self.package.as_ref().map(|p| p.portage_use.as_str());
        }
        self.vars.get(key).map(String::as_str)
    }

    /// Look up a configuration key, failing when it is absent
    pub fn var(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Whitespace-split value of a key; empty when the key is absent
    pub fn split_var(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Set a configuration key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.modifying()?;
        self.vars.insert(key.into(), value.into());
        Ok(())
    }

    /// All plain variables in stacking order
    pub fn vars(&self) -> &IndexMap<String, String> {
        &self.vars
    }

    /// Filesystem root these settings describe
    pub fn root(&self) -> &Path {
        Path::new(self.get("ROOT").unwrap_or("/"))
    }

    /// Known architectures (`PORTAGE_ARCHLIST`)
    pub fn arch_list(&self) -> Vec<String> {
        self.split_var("PORTAGE_ARCHLIST")
    }

    /// USE flag configuration backing these settings
    pub fn use_config(&self) -> &UseConfig {
        &self.use_config
    }

    /// Mutable USE flag configuration; fails while locked
    pub fn use_config_mut(&mut self) -> Result<&mut UseConfig> {
        self.modifying()?;
        Ok(&mut self.use_config)
    }

    /// Forbid modifications
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Allow modifications
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Whether modifications are currently forbidden
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn modifying(&self) -> Result<()> {
        if self.locked {
            Err(ConfigError::Locked)
        } else {
            Ok(())
        }
    }

    /// The package these settings are narrowed to, if any
    pub fn cpv(&self) -> Option<&str> {
        self.package.as_ref().map(|p| p.cpv.as_str())
    }

    /// Narrow the settings to one package.
    ///
    /// `iuse` is the package's declared IUSE when known. It supplies `+flag`
    /// defaults and restricts `PORTAGE_USE` to declared flags plus the
    /// implicit ones (`ARCH` and USE_EXPAND flags). A cpv that does not parse
    /// only sees the global configuration.
    pub fn setcpv(&mut self, cpv: &str, iuse: Option<&[String]>) -> Result<()> {
        self.modifying()?;

        let parsed = Cpv::parse(cpv).ok();
        if parsed.is_none() {
            debug!("Unparsable cpv '{}', using global settings only", cpv);
        }

        let defaults: Vec<UseFlag> = iuse
            .unwrap_or_default()
            .iter()
            .filter_map(|token| UseFlag::parse_iuse_default(token))
            .collect();

        let mut effective = self.use_config.effective_flags(parsed.as_ref(), &defaults);
        let arch = self.get("ARCH").map(str::to_string);
        if let Some(ref arch) = arch {
            effective.insert(arch.clone());
        }

        if let Some(iuse) = iuse {
            let declared: IndexSet<&str> = iuse
                .iter()
                .map(|token| token.trim_start_matches(['+', '-']))
                .collect();
            effective.retain(|flag| {
                declared.contains(flag.as_str())
                    || arch.as_deref() == Some(flag.as_str())
                    || self.use_config.is_expand_flag(flag)
            });
        }

        let mut portage_use: Vec<String> = effective.into_iter().collect();
        portage_use.sort();

        trace!("{} PORTAGE_USE={:?}", cpv, portage_use);

        self.package = Some(PackageContext {
            cpv: cpv.to_string(),
            portage_use: portage_use.join(" "),
            usemask: self.use_config.usemask(parsed.as_ref()),
            useforce: self.use_config.useforce(parsed.as_ref()),
        });

        Ok(())
    }

    /// Drop any per-package context
    pub fn reset(&mut self) -> Result<()> {
        self.modifying()?;
        self.package = None;
        Ok(())
    }

    /// Masked flags for the current package, or the global ones
    pub fn usemask(&self) -> IndexSet<String> {
        match &self.package {
            Some(p) => p.usemask.clone(),
            None => self.use_config.usemask(None),
        }
    }

    /// Forced flags for the current package, or the global ones
    pub fn useforce(&self) -> IndexSet<String> {
        match &self.package {
            Some(p) => p.useforce.clone(),
            None => self.use_config.useforce(None),
        }
    }

    /// Unlock and narrow to `cpv` for the lifetime of the returned guard.
    ///
    /// Dropping the guard resets the package context and locks the settings,
    /// including when narrowing fails or the caller unwinds.
    pub fn scope_cpv(&mut self, cpv: &str, iuse: Option<&[String]>) -> Result<PackageScope<'_>> {
        self.unlock();
        let scope = PackageScope { settings: self };
        scope.settings.setcpv(cpv, iuse)?;
        Ok(scope)
    }
}

/// Read-only view of [`Settings`] narrowed to one package
#[derive(Debug)]
pub struct PackageScope<'a> {
    settings: &'a mut Settings,
}

impl Deref for PackageScope<'_> {
    type Target = Settings;

    fn deref(&self) -> &Settings {
        self.settings
    }
}

impl Drop for PackageScope<'_> {
    fn drop(&mut self) {
        self.settings.package = None;
        self.settings.lock();
        trace!("Settings reset and locked");
    }
}
