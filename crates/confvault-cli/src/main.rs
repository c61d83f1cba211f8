use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use confvault::{ConfigStore, Snapshot, StoreConfig, UploadOutcome, VersionToken};

mod demo;
mod model;
mod telemetry;

/// Exit status of `put` when the update was rejected.
const EXIT_CONFLICT: u8 = 3;

/// Versioned configuration store
///
/// Stores one JSON document per repository. Every read returns a version
/// token; every write names the token it was derived from and is merged
/// against whatever landed since. Writes that overlap other writes are
/// rejected and must be re-read and retried.
///
/// QUICK START:
///
///   confvault init ./flags
///   confvault put ./flags --file flags.json
///   confvault get ./flags            # prints the document, token on stderr
///   confvault put ./flags --file edited.json --base <token>
#[derive(Parser)]
#[command(name = "confvault")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Store configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true, env = "CONFVAULT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty store
    Init {
        /// Directory to create the store in
        path: PathBuf,
    },

    /// Print the document
    ///
    /// The document goes to stdout and its version token to stderr, so the
    /// output can be redirected into a file and edited.
    Get {
        path: PathBuf,

        /// Read this version instead of the main line's tip
        #[arg(long = "at", value_name = "TOKEN")]
        at: Option<String>,
    },

    /// Upload a new version of the document
    ///
    /// Exits with status 3 if the update conflicts with changes made since
    /// --base.
    Put {
        path: PathBuf,

        /// JSON file holding the new document
        #[arg(long)]
        file: PathBuf,

        /// Version the new document was derived from (default: the current
        /// tip)
        #[arg(long)]
        base: Option<String>,
    },

    /// List main-line history, newest first
    Log {
        path: PathBuf,

        /// Maximum number of entries
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Run the two-writer walkthrough against a scratch store
    Demo {
        /// Store directory (default: a temporary directory)
        path: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    telemetry::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { path } => init(&path, config),
        Commands::Get { path, at } => get(&path, config, at.as_deref()),
        Commands::Put { path, file, base } => put(&path, config, &file, base.as_deref()),
        Commands::Log { path, limit } => log(&path, config, limit),
        Commands::Demo { path } => demo::run(path.as_deref(), config),
    }
}

fn load_config(path: Option<&Path>) -> Result<StoreConfig> {
    let config = match path {
        Some(p) => StoreConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => StoreConfig::default(),
    };
    tracing::debug!(?config, "store configuration");
    Ok(config)
}

fn open(path: &Path, config: StoreConfig) -> Result<ConfigStore> {
    ConfigStore::open(path, config)
        .with_context(|| format!("Failed to open store at {}", path.display()))
}

fn parse_token(s: &str) -> Result<VersionToken> {
    s.parse()
        .with_context(|| format!("Invalid version token '{s}'"))
}

fn init(path: &Path, config: StoreConfig) -> Result<ExitCode> {
    ConfigStore::create(path, config)
        .with_context(|| format!("Failed to create store at {}", path.display()))?;
    println!("Initialized empty store in {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn get(path: &Path, config: StoreConfig, at: Option<&str>) -> Result<ExitCode> {
    let mut store = open(path, config)?;
    let snapshot: Snapshot<serde_json::Value> = match at {
        Some(v) => store.get_snapshot_at(&confvault::JsonCodec::new(), parse_token(v)?)?,
        None => store.get_json_snapshot()?,
    };

    println!("{}", serde_json::to_string_pretty(&snapshot.data)?);
    if let Some(token) = snapshot.version {
        eprintln!("version: {token}");
    }
    Ok(ExitCode::SUCCESS)
}

fn put(path: &Path, config: StoreConfig, file: &Path, base: Option<&str>) -> Result<ExitCode> {
    let mut store = open(path, config)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let data: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let base = match base {
        Some(b) => Some(parse_token(b)?),
        None => store.current_tip()?,
    };
    let candidate = Snapshot { data, version: base };

    match store.upload_json_update(&candidate)? {
        UploadOutcome::Applied { version } => {
            println!("{version}");
            Ok(ExitCode::SUCCESS)
        }
        UploadOutcome::Conflict { base, reason } => {
            let base = base.map_or_else(|| "none".to_owned(), |b| b.short());
            eprintln!("Rejected: {reason:?} (base {base})");
            eprintln!("  Re-read with: confvault get {}", path.display());
            Ok(ExitCode::from(EXIT_CONFLICT))
        }
    }
}

fn log(path: &Path, config: StoreConfig, limit: usize) -> Result<ExitCode> {
    let store = open(path, config)?;
    let history = store.history(limit)?;
    if history.is_empty() {
        println!("(no history)");
    }
    for entry in history {
        let marker = if entry.is_merge { "M" } else { " " };
        println!("{marker} {} {}", entry.version.short(), entry.message);
    }
    Ok(ExitCode::SUCCESS)
}
