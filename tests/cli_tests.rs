//! CLI integration tests for buckos-flags
//!
//! Each test runs the binary against a configuration tree and repository
//! written to a temporary directory.

use package::InstalledDb;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const MESA: &str = "media-libs/mesa-23.1.9";
const MESA_IUSE: &str =
    "X gtk systemd pam +llvm video_cards_intel video_cards_radeon abi_x86_32 abi_x86_64 x86 static";

/// Write a configuration tree under `etc/portage` and a repository under `repo`
fn write_fixture(root: &Path) {
    let etc = root.join("etc/portage");
    let profile = etc.join("make.profile");
    fs::create_dir_all(&profile).unwrap();
    fs::write(
        profile.join("make.defaults"),
        r#"ARCH="amd64"
USE="X gtk"
USE_EXPAND="VIDEO_CARDS ABI_X86"
USE_EXPAND_HIDDEN="ABI_X86"
ABI_X86="64"
"#,
    )
    .unwrap();
    fs::write(profile.join("arch.list"), "amd64\nx86\n").unwrap();
    fs::write(profile.join("use.mask"), "systemd\n").unwrap();
    fs::write(profile.join("use.force"), "pam\n").unwrap();
    fs::write(etc.join("make.conf"), "VIDEO_CARDS=\"intel\"\n").unwrap();

    let cache = root.join("repo/metadata/md5-cache/media-libs");
    fs::create_dir_all(&cache).unwrap();
    fs::write(
        cache.join("mesa-23.1.9"),
        format!("EAPI=8\nIUSE={}\nSLOT=0\n", MESA_IUSE),
    )
    .unwrap();
}

fn create_fixture() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_fixture(temp_dir.path());
    temp_dir
}

/// Helper to run buckos-flags with the fixture's config root and repository
fn run_flags(fixture: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_buckos-flags"))
        .arg("--config-root")
        .arg(fixture.join("etc/portage"))
        .arg("--repo")
        .arg(fixture.join("repo"))
        .args(args)
        .env_remove("ROOT")
        .env_remove("BUCKOS_REPO")
        .env_remove("BUCKOS_CONFIG_ROOT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

/// Helper to run buckos-flags with only the given arguments
fn run_bare(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_buckos-flags"))
        .args(args)
        .env_remove("ROOT")
        .env_remove("BUCKOS_REPO")
        .env_remove("BUCKOS_CONFIG_ROOT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

mod cli_parsing {
    use super::*;

    #[test]
    fn test_help_flag() {
        let output = run_bare(&["--help"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("displayable USE flags"));
    }

    #[test]
    fn test_version_flag() {
        let output = run_bare(&["--version"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("buckos-flags"));
    }

    #[test]
    fn test_missing_subcommand() {
        let output = run_bare(&[]);
        assert!(!output.status.success());
    }

    #[test]
    fn test_iuse_requires_package() {
        let output = run_bare(&["iuse"]);
        assert!(!output.status.success());
    }
}

mod queries {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_iuse() {
        let fixture = create_fixture();
        let output = run_flags(fixture.path(), &["iuse", MESA]);

        assert!(output.status.success());
        assert_eq!(stdout(&output), format!("{}: {}\n", MESA, MESA_IUSE));
    }

    #[test]
    fn test_iuse_unknown_package_is_empty() {
        let fixture = create_fixture();
        let output = run_flags(fixture.path(), &["iuse", "media-libs/mesa-1.0"]);

        assert!(output.status.success());
        assert_eq!(stdout(&output), "media-libs/mesa-1.0: \n");
    }

    #[test]
    fn test_show() {
        let fixture = create_fixture();
        let output = run_flags(fixture.path(), &["show", MESA]);

        assert!(output.status.success());
        assert_eq!(
            stdout(&output),
            format!(
                "{}\n  IUSE: X gtk +llvm video_cards_intel video_cards_radeon static\n",
                MESA
            )
        );
    }

    #[test]
    fn test_show_final() {
        let fixture = create_fixture();
        let output = run_flags(fixture.path(), &["show", "--final", MESA]);

        assert!(output.status.success());
        let out = stdout(&output);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                MESA,
                "  IUSE: X gtk +llvm video_cards_intel video_cards_radeon static",
                "  USE:  X gtk llvm video_cards_intel",
            ]
        );
    }

    #[test]
    fn test_show_json() {
        let fixture = create_fixture();
        let output = run_flags(fixture.path(), &["--json", "show", "--final", MESA]);

        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
        assert_eq!(value["cpv"], MESA);
        assert_eq!(
            value["report"]["iuse"],
            serde_json::json!(["X", "gtk", "+llvm", "video_cards_intel", "video_cards_radeon", "static"])
        );
        assert_eq!(
            value["report"]["final_flags"],
            serde_json::json!(["X", "gtk", "llvm", "video_cards_intel"])
        );
    }

    #[test]
    fn test_show_json_without_final() {
        let fixture = create_fixture();
        let output = run_flags(fixture.path(), &["--json", "show", MESA]);

        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
        assert!(value["report"].get("final_flags").is_none());
    }

    #[test]
    fn test_show_missing_config_root() {
        let fixture = create_fixture();
        let output = run_bare(&[
            "--config-root",
            fixture.path().join("nope").to_str().unwrap(),
            "--repo",
            fixture.path().join("repo").to_str().unwrap(),
            "show",
            MESA,
        ]);
        assert!(!output.status.success());
        assert!(stdout(&output).is_empty());
    }

    #[test]
    fn test_no_database() {
        let output = run_bare(&["iuse", MESA]);
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("no package database"));
    }
}

mod installed {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_installed_use() {
        let fixture = create_fixture();
        let vardb = fixture.path().join("vardb");
        {
            let mut db = InstalledDb::open(&vardb).unwrap();
            db.add_package(MESA, &[("USE", "X amd64 gtk llvm")]).unwrap();
        }

        let output = run_flags(
            fixture.path(),
            &["--installed-db", vardb.to_str().unwrap(), "installed", MESA],
        );

        assert!(output.status.success());
        assert_eq!(stdout(&output), format!("{}: X amd64 gtk llvm\n", MESA));
    }

    #[test]
    fn test_installed_json() {
        let fixture = create_fixture();
        let vardb = fixture.path().join("vardb");
        {
            let mut db = InstalledDb::open(&vardb).unwrap();
            db.add_package(MESA, &[("USE", "X llvm")]).unwrap();
        }

        let output = run_flags(
            fixture.path(),
            &["--json", "--installed-db", vardb.to_str().unwrap(), "installed", MESA],
        );

        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
        assert_eq!(value["flags"], serde_json::json!(["X", "llvm"]));
    }

    #[test]
    fn test_installed_requires_database() {
        let fixture = create_fixture();
        let output = run_flags(fixture.path(), &["installed", MESA]);
        assert!(!output.status.success());
    }
}

mod filtering {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filter() {
        let fixture = create_fixture();
        let output = run_flags(
            fixture.path(),
            &[
                "filter",
                "x86",
                "video_cards_intel",
                "static",
                "masked_flag",
                "--hidden",
                "VIDEO_CARDS",
                "--masked",
                "masked_flag",
            ],
        );

        assert!(output.status.success());
        assert_eq!(stdout(&output), "static\n");
    }

    #[test]
    fn test_filter_comma_lists_and_json() {
        let fixture = create_fixture();
        let output = run_flags(
            fixture.path(),
            &[
                "--json",
                "filter",
                "amd64",
                "abi_x86_64",
                "pam",
                "doc",
                "gtk",
                "--hidden",
                "ABI_X86,PYTHON_TARGETS",
                "--forced",
                "pam,gtk",
            ],
        );

        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
        assert_eq!(value, serde_json::json!(["doc"]));
    }
}
