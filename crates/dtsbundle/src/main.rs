use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;

use dtsbundle::{BundleConfig, ModuleKind, ScriptTarget, bundle_with_progress};

#[derive(Parser, Debug)]
#[command(name = "dtsbundle", version, about = "Bundle per-module .d.ts files into a single declaration file")]
struct Cli {
    /// Entry source files, in bundle order
    files: Vec<PathBuf>,

    /// TOML configuration file; command-line flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory all bundled files must live under
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Output file path
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Library name used as the module-identifier prefix
    #[arg(long)]
    name: Option<String>,

    /// Module aliased as the library's default surface
    #[arg(long)]
    main: Option<String>,

    /// Reference-directive path written ahead of any module content
    #[arg(long = "extern", value_name = "PATH")]
    externs: Vec<String>,

    /// File to omit from the bundle, relative to the base directory
    #[arg(long = "exclude", value_name = "PATH")]
    excludes: Vec<PathBuf>,

    /// Indentation for module-block bodies (default: one tab)
    #[arg(long)]
    indent: Option<String>,

    /// Line terminator (default: host line terminator)
    #[arg(long)]
    eol: Option<String>,

    /// Target language level
    #[arg(long, value_enum)]
    target: Option<ScriptTarget>,

    /// Module kind forwarded to the compiler front-end
    #[arg(long, value_enum)]
    module: Option<ModuleKind>,

    /// Increase log verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn merge_config(cli: Cli) -> Result<BundleConfig> {
    let mut config = match &cli.config {
        Some(path) => BundleConfig::from_file(path)?,
        None => BundleConfig::default(),
    };
    if let Some(base_dir) = cli.base_dir {
        config.base_dir = base_dir;
    }
    if !cli.files.is_empty() {
        config.files = cli.files;
    }
    if let Some(out) = cli.out {
        config.out = out;
    }
    if let Some(name) = cli.name {
        config.name = name;
    }
    if cli.main.is_some() {
        config.main = cli.main;
    }
    if !cli.externs.is_empty() {
        config.externs = cli.externs;
    }
    if !cli.excludes.is_empty() {
        config.excludes = cli.excludes;
    }
    if cli.indent.is_some() {
        config.indent = cli.indent;
    }
    if cli.eol.is_some() {
        config.eol = cli.eol;
    }
    if let Some(target) = cli.target {
        config.target = target;
    }
    if cli.module.is_some() {
        config.module = cli.module;
    }

    if config.base_dir.as_os_str().is_empty() {
        bail!("--base-dir is required (or set base-dir in the config file)");
    }
    if config.files.is_empty() {
        bail!("at least one entry file is required");
    }
    if config.out.as_os_str().is_empty() {
        bail!("--out is required (or set out in the config file)");
    }
    if config.name.is_empty() {
        bail!("--name is required (or set name in the config file)");
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = merge_config(cli)?;
    bundle_with_progress(&config, &mut |message| info!("{message}"))?;
    Ok(())
}
