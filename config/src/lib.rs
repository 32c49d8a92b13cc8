//! Buckos Settings
//!
//! Portage-style configuration for USE flag queries, inspired by Gentoo's
//! make.conf and /etc/portage structure.
//!
//! # Overview
//!
//! - [`settings`]: the resolved, lockable settings object
//! - [`loader`]: builds settings from a configuration tree
//! - [`make_conf`]: make.conf / make.defaults parsing
//! - [`profile`]: profile directories (arch.list, use.mask, use.force)
//! - [`use_flags`]: USE flag system
//! - [`atom`]: package atoms and cpv parsing
//! - [`version`]: package version ordering
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use buckos_config::ConfigLoader;
//!
//! let mut settings = ConfigLoader::system().load().unwrap();
//!
//! let scope = settings.scope_cpv("app-editors/vim-9.0.2092", None).unwrap();
//! println!("USE: {:?}", scope.get("PORTAGE_USE"));
//! ```

pub mod atom;
pub mod error;
pub mod loader;
pub mod make_conf;
pub mod profile;
pub mod settings;
pub mod use_flags;
pub mod version;

pub use atom::{Cpv, PackageAtom, VersionOp};
pub use error::{ConfigError, Result};
pub use loader::{load_root_config, load_system_config, ConfigLoader, DEFAULT_CONFIG_ROOT};
pub use make_conf::MakeConf;
pub use profile::Profile;
pub use settings::{PackageScope, Settings, PORTAGE_USE};
pub use use_flags::{PackageUseEntry, UseConfig, UseFlag};
pub use version::Version;
