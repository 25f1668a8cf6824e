use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use threatscan::{
    config::Config,
    db::ThreatDb,
    error::Error,
    output::{print_report, OutputFormat},
    registry::NpmRegistry,
    resolve::resolve_with_checkpoint,
    scan_log::ScanLog,
    scanner::Scanner,
};
use tracing::debug;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const MALICIOUS_FOUND: u8 = 1;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "threatscan")]
#[command(
    author,
    version,
    about = "Check npm lockfiles against a database of known malicious package versions"
)]
struct Cli {
    /// Load configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a project's manifests and lockfiles
    Scan {
        /// Project directory, or a single manifest file
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Vulnerability database (defaults to threats_file from config)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output format (text, table, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Append diagnostics to scan-compromised.log in the project root
        #[arg(long)]
        log: bool,
    },

    /// Resolve advisory ranges against the registry and update the database
    Resolve {
        /// Advisory map (defaults to advisories_file from config)
        #[arg(long)]
        advisories: Option<PathBuf>,

        /// Vulnerability database to update (defaults to threats_file from config)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Scan {
            dir,
            db,
            format,
            log,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let format = format.unwrap_or_else(|| config.default_format.clone());
            let db_path = db.unwrap_or_else(|| config.threats_file.clone());
            run_scan(&dir, &db_path, &format, log || config.scan_log)
        }
        Commands::Resolve { advisories, db } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(path) = advisories {
                config.advisories_file = path;
            }
            if let Some(path) = db {
                config.threats_file = path;
            }
            run_resolve(&config).await
        }
        Commands::Config { init, path } => {
            handle_config(cli.config.as_deref(), init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let config = match explicit {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate()?;
    debug!(?config, "loaded configuration");
    Ok(config)
}

fn run_scan(dir: &Path, db_path: &Path, format: &str, write_log: bool) -> Result<u8> {
    let format = OutputFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))?;

    if !db_path.exists() {
        return Err(Error::config(
            "threats_file",
            format!(
                "{} not found; run `threatscan resolve` first",
                db_path.display()
            ),
        )
        .into());
    }
    let db = ThreatDb::load(db_path)?;
    debug!(path = %db_path.display(), packages = db.len(), "loaded database");

    let project_dir = if dir.is_file() {
        dir.parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    } else {
        dir
    };

    let mut scanner = Scanner::new(&db);
    if write_log {
        scanner = scanner.with_log(ScanLog::for_project(project_dir));
    }
    let report = if dir.is_file() {
        scanner.scan_paths(&[dir.to_path_buf()])
    } else {
        scanner.scan_dir(dir)
    };

    print_report(&report, format)?;

    Ok(if report.is_clean() {
        exit_codes::SUCCESS
    } else {
        exit_codes::MALICIOUS_FOUND
    })
}

async fn run_resolve(config: &Config) -> Result<u8> {
    let registry = Arc::new(NpmRegistry::new(config)?);
    let show_progress = std::io::stderr().is_terminal();

    match resolve_with_checkpoint(config, registry, show_progress).await {
        Ok(summary) => {
            debug!(
                tasks = summary.tasks,
                matched = summary.matched_tasks,
                "resolution finished"
            );
            println!("{}", summary);
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(exit_codes::ERROR)
        }
    }
}

fn handle_config(explicit: Option<&Path>, init: bool, show_path: bool) -> Result<()> {
    let config_path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        Config::default().save_to(&config_path)?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'threatscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
