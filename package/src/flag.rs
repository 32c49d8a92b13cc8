//! USE flag queries for display
//!
//! Determines which of a package's USE flags are worth showing to a user.
//! Architecture flags, hidden USE_EXPAND flags and flags fixed by profile
//! masks or forces are removed.
//!
//! # Fallback policy
//!
//! These queries are best effort. A package missing from the database, or a
//! configuration key missing from the settings, produces empty flag lists
//! instead of an error. Each fallback is logged at `debug` level. Callers who
//! need the underlying error use [`try_get_iuse`].

use crate::db::PackageDatabase;
use crate::Result;
use buckos_config::{ConfigError, Settings, PORTAGE_USE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Effective USE settings of a package, see [`get_all_cpv_use`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpvUse {
    /// Final USE flags the package would be built with
    pub use_flags: Vec<String>,
    /// USE_EXPAND prefixes hidden from display
    pub use_expand_hidden: Vec<String>,
    /// Masked flags
    pub usemask: Vec<String>,
    /// Forced flags
    pub useforce: Vec<String>,
}

/// Result of [`get_flags`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagReport {
    /// Displayable IUSE flags
    pub iuse: Vec<String>,
    /// Displayable final USE flags, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_flags: Option<Vec<String>>,
}

/// Get the IUSE flags of a package, propagating lookup errors
pub fn try_get_iuse(cpv: &str, db: &dyn PackageDatabase) -> Result<Vec<String>> {
    let mut values = db.aux_get(cpv, &["IUSE"])?;
    let iuse = values.pop().unwrap_or_default();
    Ok(iuse.split_whitespace().map(str::to_string).collect())
}

/// Get the IUSE flags of a package.
///
/// Returns an empty list when the lookup fails for any reason, including
/// nonexistent packages. IUSE default markers (`+flag`) are kept.
pub fn get_iuse(cpv: &str, db: &dyn PackageDatabase) -> Vec<String> {
    try_get_iuse(cpv, db).unwrap_or_else(|e| {
        debug!("No IUSE for {}: {}", cpv, e);
        Vec::new()
    })
}

/// Remove flags not normally shown to a user.
///
/// In order, removes flags containing a hidden USE_EXPAND prefix
/// (`lowercase(prefix)_`), flags naming an architecture in
/// `PORTAGE_ARCHLIST`, and flags that are masked or forced. Remaining flags
/// keep their order.
pub fn filter_flags(
    mut use_flags: Vec<String>,
    use_expand_hidden: &[String],
    usemasked: &[String],
    useforced: &[String],
    settings: &Settings,
) -> Vec<String> {
    let hidden: Vec<String> = use_expand_hidden
        .iter()
        .map(|prefix| format!("{}_", prefix.to_lowercase()))
        .collect();
    use_flags.retain(|flag| !hidden.iter().any(|prefix| flag.contains(prefix.as_str())));

    let archlist: HashSet<String> = settings.arch_list().into_iter().collect();
    use_flags.retain(|flag| !archlist.contains(flag));

    let masked: HashSet<&str> = usemasked
        .iter()
        .chain(useforced)
        .map(String::as_str)
        .collect();
    use_flags.retain(|flag| !masked.contains(flag.as_str()));

    use_flags
}

/// Determine the final USE flags, hidden USE_EXPAND prefixes, masks and
/// forces for a package.
///
/// The settings are narrowed to `cpv` for the duration of the call and are
/// reset and locked again before returning, on every path. A missing
/// configuration key, or a package the database does not know, yields four
/// empty lists.
pub fn get_all_cpv_use(cpv: &str, db: &dyn PackageDatabase, settings: &mut Settings) -> CpvUse {
    let iuse = match try_get_iuse(cpv, db) {
        Ok(iuse) => iuse,
        Err(e) => {
            debug!("Cannot narrow settings to {}: {}", cpv, e);
            return CpvUse::default();
        }
    };

    let scope = match settings.scope_cpv(cpv, Some(&iuse)) {
        Ok(scope) => scope,
        Err(e) => {
            warn!("Unable to narrow settings to {}: {}", cpv, e);
            return CpvUse::default();
        }
    };

    let result = read_cpv_use(&scope);
    drop(scope);

    match result {
        Ok(cpv_use) => cpv_use,
        Err(ConfigError::MissingKey(key)) => {
            debug!("{} is not set for {}, no USE information", key, cpv);
            CpvUse::default()
        }
        Err(e) => {
            warn!("Unable to read settings for {}: {}", cpv, e);
            CpvUse::default()
        }
    }
}

fn read_cpv_use(settings: &Settings) -> buckos_config::Result<CpvUse> {
    let split = |value: &str| -> Vec<String> {
        value.split_whitespace().map(str::to_string).collect()
    };

    Ok(CpvUse {
        use_flags: split(settings.var(PORTAGE_USE)?),
        use_expand_hidden: split(settings.var("USE_EXPAND_HIDDEN")?),
        usemask: settings.usemask().into_iter().collect(),
        useforce: settings.useforce().into_iter().collect(),
    })
}

/// Retrieve the displayable flags of a package.
///
/// Returns the filtered IUSE flags and, when `final_setting` is set, the
/// filtered final USE flags as well.
pub fn get_flags(
    cpv: &str,
    final_setting: bool,
    db: &dyn PackageDatabase,
    settings: &mut Settings,
) -> FlagReport {
    let CpvUse {
        use_flags,
        use_expand_hidden,
        usemask,
        useforce,
    } = get_all_cpv_use(cpv, db, settings);
    let settings: &Settings = settings;

    let iuse = filter_flags(
        get_iuse(cpv, db),
        &use_expand_hidden,
        &usemask,
        &useforce,
        settings,
    );

    let final_flags = final_setting
        .then(|| filter_flags(use_flags, &use_expand_hidden, &usemask, &useforce, settings));

    FlagReport { iuse, final_flags }
}

/// Strip an IUSE default marker: `+flag` and `-flag` become `flag`
pub fn reduce_flag(flag: &str) -> &str {
    flag.strip_prefix(['+', '-']).unwrap_or(flag)
}

/// [`reduce_flag`] over a list
pub fn reduce_flags(flags: &[String]) -> Vec<String> {
    flags.iter().map(|f| reduce_flag(f).to_string()).collect()
}

/// Flags carrying an IUSE default, mapped to their marker (`"+"` or `"-"`)
pub fn defaulted_flags(flags: &[String]) -> BTreeMap<String, String> {
    flags
        .iter()
        .filter_map(|flag| {
            let marker = flag.get(..1)?;
            matches!(marker, "+" | "-").then(|| (flag[1..].to_string(), marker.to_string()))
        })
        .collect()
}

/// USE flags an installed package was built with; empty on failure
pub fn get_installed_use(cpv: &str, vardb: &dyn PackageDatabase) -> Vec<String> {
    match vardb.aux_get(cpv, &["USE"]) {
        Ok(mut values) => values
            .pop()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        Err(e) => {
            debug!("No installed USE for {}: {}", cpv, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use buckos_config::UseConfig;
    use pretty_assertions::assert_eq;

    fn settings_with(vars: &[(&str, &str)], use_config: UseConfig) -> Settings {
        let mut settings = Settings::new(Default::default(), use_config);
        settings.unlock();
        for (key, value) in vars {
            settings.set(*key, *value).unwrap();
        }
        settings.lock();
        settings
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn arch_settings() -> Settings {
        settings_with(&[("PORTAGE_ARCHLIST", "x86 amd64")], UseConfig::new())
    }

    #[test]
    fn test_filter_flags_example() {
        let settings = arch_settings();
        let result = filter_flags(
            strings(&["x86", "video_cards_intel", "static", "masked_flag"]),
            &strings(&["video_cards"]),
            &strings(&["masked_flag"]),
            &[],
            &settings,
        );
        assert_eq!(result, vec!["static"]);
    }

    #[test]
    fn test_filter_flags_hidden_prefix_is_case_insensitive() {
        let settings = arch_settings();
        let result = filter_flags(
            strings(&["abi_x86_64", "abi_x86_32", "python", "xabi_x86_y"]),
            &strings(&["ABI_X86"]),
            &[],
            &[],
            &settings,
        );
        // containment, not prefix matching
        assert_eq!(result, vec!["python"]);
    }

    #[test]
    fn test_filter_flags_preserves_order_and_duplicates() {
        let settings = arch_settings();
        let result = filter_flags(
            strings(&["doc", "amd64", "X", "doc", "forced", "ssl"]),
            &[],
            &[],
            &strings(&["forced"]),
            &settings,
        );
        assert_eq!(result, vec!["doc", "X", "doc", "ssl"]);
    }

    #[test]
    fn test_filter_flags_is_idempotent() {
        let settings = arch_settings();
        let hidden = strings(&["video_cards", "input_devices"]);
        let masked = strings(&["systemd"]);
        let forced = strings(&["pam"]);
        let flags = strings(&[
            "video_cards_intel",
            "input_devices_evdev",
            "systemd",
            "pam",
            "x86",
            "gtk",
            "wayland",
        ]);

        let once = filter_flags(flags, &hidden, &masked, &forced, &settings);
        let twice = filter_flags(once.clone(), &hidden, &masked, &forced, &settings);
        assert_eq!(once, vec!["gtk", "wayland"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_flags_without_archlist() {
        let settings = Settings::default();
        let result = filter_flags(strings(&["x86", "static"]), &[], &[], &[], &settings);
        assert_eq!(result, vec!["x86", "static"]);
    }

    #[test]
    fn test_get_iuse() {
        let mut db = MemoryDb::new();
        db.insert("dev-libs/openssl-3.1.4", [("IUSE", "+asm static-libs test")]);

        assert_eq!(
            get_iuse("dev-libs/openssl-3.1.4", &db),
            vec!["+asm", "static-libs", "test"]
        );
        assert!(get_iuse("dev-libs/nope-1.0", &db).is_empty());
        assert!(try_get_iuse("dev-libs/nope-1.0", &db).is_err());
    }

    #[test]
    fn test_reduce_flags() {
        assert_eq!(reduce_flag("+asm"), "asm");
        assert_eq!(reduce_flag("-doc"), "doc");
        assert_eq!(reduce_flag("ssl"), "ssl");
        assert_eq!(
            reduce_flags(&strings(&["+asm", "-doc", "ssl"])),
            vec!["asm", "doc", "ssl"]
        );
    }

    #[test]
    fn test_defaulted_flags() {
        let defaults = defaulted_flags(&strings(&["+asm", "-doc", "ssl", ""]));
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults.get("asm").map(String::as_str), Some("+"));
        assert_eq!(defaults.get("doc").map(String::as_str), Some("-"));
    }

    #[test]
    fn test_get_installed_use() {
        let mut vardb = MemoryDb::new();
        vardb.insert("app-editors/vim-9.0", [("USE", "X amd64 python")]);

        assert_eq!(
            get_installed_use("app-editors/vim-9.0", &vardb),
            vec!["X", "amd64", "python"]
        );
        assert!(get_installed_use("app-editors/vim-8.0", &vardb).is_empty());
    }
}
