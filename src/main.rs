//! Buckos flags CLI
//!
//! Shows the USE flags of packages the way a user wants to see them:
//! without architecture flags, hidden USE_EXPAND flags or flags pinned by
//! profile masks and forces.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{ConfigLoader, Settings, DEFAULT_CONFIG_ROOT};
use package::flag::{self, FlagReport};
use package::{InstalledDb, PackageDatabase, RepositoryDb};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "buckos-flags",
    about = "Show the displayable USE flags of Buckos packages",
    version,
    author
)]
struct Cli {
    /// Configuration root
    #[arg(long, global = true, env = "BUCKOS_CONFIG_ROOT", default_value = DEFAULT_CONFIG_ROOT)]
    config_root: PathBuf,

    /// Profile directory (defaults to <config-root>/make.profile)
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Target root filesystem
    #[arg(long, global = true, env = "ROOT")]
    root: Option<PathBuf>,

    /// Repository with a metadata/md5-cache directory
    #[arg(long, global = true, env = "BUCKOS_REPO")]
    repo: Option<PathBuf>,

    /// Directory of the installed package database
    #[arg(long = "installed-db", global = true)]
    installed_db: Option<PathBuf>,

    /// Print JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the declared IUSE of packages
    Iuse(PackageArgs),
    /// Print the displayable flags of packages
    Show(ShowArgs),
    /// Print the USE flags installed packages were built with
    Installed(PackageArgs),
    /// Filter a list of flags against the configuration
    Filter(FilterArgs),
}

#[derive(Args)]
struct PackageArgs {
    /// Packages (category/name-version)
    #[arg(required = true)]
    cpvs: Vec<String>,
}

#[derive(Args)]
struct ShowArgs {
    /// Packages (category/name-version)
    #[arg(required = true)]
    cpvs: Vec<String>,

    /// Also show the final USE flags
    #[arg(long = "final")]
    final_setting: bool,
}

#[derive(Args)]
struct FilterArgs {
    /// Flags to filter
    flags: Vec<String>,

    /// Hidden USE_EXPAND prefixes
    #[arg(long, value_delimiter = ',')]
    hidden: Vec<String>,

    /// Masked flags
    #[arg(long, value_delimiter = ',')]
    masked: Vec<String>,

    /// Forced flags
    #[arg(long, value_delimiter = ',')]
    forced: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Iuse(args) => cmd_iuse(cli, args),
        Commands::Show(args) => cmd_show(cli, args),
        Commands::Installed(args) => cmd_installed(cli, args),
        Commands::Filter(args) => cmd_filter(cli, args),
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut loader = ConfigLoader::new(&cli.config_root);
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile);
    }
    if let Some(root) = &cli.root {
        loader = loader.root(root);
    }

    loader
        .load()
        .with_context(|| format!("failed to load {}", cli.config_root.display()))
}

fn open_installed_db(cli: &Cli) -> Result<Option<InstalledDb>> {
    cli.installed_db
        .as_deref()
        .map(|dir| {
            InstalledDb::open(dir)
                .with_context(|| format!("failed to open installed database in {}", dir.display()))
        })
        .transpose()
}

/// The repository when given, the installed database otherwise
fn open_db(cli: &Cli) -> Result<Box<dyn PackageDatabase>> {
    if let Some(repo) = &cli.repo {
        debug!("Using repository {}", repo.display());
        let db = RepositoryDb::open(repo)
            .with_context(|| format!("failed to open repository {}", repo.display()))?;
        return Ok(Box::new(db));
    }

    match open_installed_db(cli)? {
        Some(db) => Ok(Box::new(db)),
        None => bail!("no package database, pass --repo or --installed-db"),
    }
}

fn print_flags(cli: &Cli, cpv: &str, flags: &[String]) {
    if cli.json {
        println!("{}", json!({ "cpv": cpv, "flags": flags }));
    } else {
        println!("{}: {}", cpv, flags.join(" "));
    }
}

fn cmd_iuse(cli: &Cli, args: &PackageArgs) -> Result<()> {
    let db = open_db(cli)?;

    for cpv in &args.cpvs {
        print_flags(cli, cpv, &flag::get_iuse(cpv, db.as_ref()));
    }
    Ok(())
}

fn cmd_show(cli: &Cli, args: &ShowArgs) -> Result<()> {
    let db = open_db(cli)?;
    let mut settings = load_settings(cli)?;

    for cpv in &args.cpvs {
        let report = flag::get_flags(cpv, args.final_setting, db.as_ref(), &mut settings);
        print_report(cli, cpv, &report);
    }
    Ok(())
}

fn print_report(cli: &Cli, cpv: &str, report: &FlagReport) {
    if cli.json {
        println!("{}", json!({ "cpv": cpv, "report": report }));
        return;
    }

    println!("{}", cpv);
    println!("  IUSE: {}", report.iuse.join(" "));
    if let Some(final_flags) = &report.final_flags {
        println!("  USE:  {}", final_flags.join(" "));
    }
}

fn cmd_installed(cli: &Cli, args: &PackageArgs) -> Result<()> {
    let Some(vardb) = open_installed_db(cli)? else {
        bail!("--installed-db is required");
    };

    for cpv in &args.cpvs {
        print_flags(cli, cpv, &flag::get_installed_use(cpv, &vardb));
    }
    Ok(())
}

fn cmd_filter(cli: &Cli, args: &FilterArgs) -> Result<()> {
    let settings = load_settings(cli)?;
    let flags = flag::filter_flags(
        args.flags.clone(),
        &args.hidden,
        &args.masked,
        &args.forced,
        &settings,
    );

    if cli.json {
        println!("{}", json!(flags));
    } else {
        println!("{}", flags.join(" "));
    }
    Ok(())
}
