//! Buckos package queries
//!
//! Package metadata databases and the USE flag queries built on them.
//!
//! # Architecture
//!
//! - **Database**: metadata lookup by cpv ([`db::PackageDatabase`]) backed by
//!   a repository md5-cache, an SQLite installed-package database or memory
//! - **Flags**: displayable USE flags of a package ([`flag`]), computed from
//!   its IUSE and the [`buckos_config::Settings`] of a root
//!
//! # Example
//!
//! ```rust,no_run
//! use buckos_config::ConfigLoader;
//! use buckos_package::{flag, RepositoryDb};
//!
//! let mut settings = ConfigLoader::system().load().unwrap();
//! let portdb = RepositoryDb::open("/var/db/repos/gentoo").unwrap();
//!
//! let report = flag::get_flags("app-editors/vim-9.0.2092", true, &portdb, &mut settings);
//! println!("IUSE: {}", report.iuse.join(" "));
//! ```

pub mod db;
pub mod error;
pub mod flag;

pub use db::{InstalledDb, MemoryDb, PackageDatabase, RepositoryDb};
pub use error::{Error, Result};
pub use flag::{CpvUse, FlagReport};
