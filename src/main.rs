//! # Schema Drift CLI (`drift`)
//!
//! ## Usage
//!
//! ```bash
//! drift --config ./config/drift.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `drift init` | Create the SQLite database and tables |
//! | `drift ingest <path>` | Ingest a file or directory as new schema versions |
//! | `drift detect <file>` | Show the fragments a file splits into |
//! | `drift sources` | List sources with recorded history |
//! | `drift history <source>` | List a source's schema versions |
//! | `drift show <source>` | Print one stored schema version |
//! | `drift diff <source>` | Diff two stored versions |
//! | `drift render <source>` | Render a schema for a storage target |
//! | `drift migrate <source>` | Print migration statements between versions |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use schema_drift::config::{self, Config};
use schema_drift::ingest::IngestArgs;
use schema_drift::{detect_cmd, history, ingest, migrate, render_cmd, sources};
use schema_drift_core::render::RenderTarget;

/// Schema Drift CLI: infer schemas from mixed-format documents and track
/// how they change.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/drift.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "drift",
    about = "Infer schemas from mixed-format documents and track how they evolve",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/drift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database.
    ///
    /// Idempotent; running it again leaves existing history untouched.
    Init,

    /// Ingest a file or directory.
    ///
    /// Each file becomes the next schema version of its source. Directory
    /// inputs use the `[ingest]` globs, and each file's relative path is its
    /// source id unless `--source` is given.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Record under this source id instead of the file path.
        #[arg(long)]
        source: Option<String>,

        /// Expected version number; fails if it is not the next one.
        #[arg(long)]
        version: Option<u32>,

        /// Show what would be recorded without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Print reports as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show how a file splits into fragments. Needs no database.
    Detect {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// List sources and their latest versions.
    Sources {
        #[arg(long)]
        json: bool,
    },

    /// List the schema versions of a source, oldest first.
    History {
        source: String,

        /// Only the most recent N versions.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Print a stored schema version as JSON (latest by default).
    Show {
        source: String,

        #[arg(long)]
        version: Option<u32>,
    },

    /// Diff two stored versions (defaults: previous vs latest).
    Diff {
        source: String,

        #[arg(long)]
        from: Option<u32>,

        #[arg(long)]
        to: Option<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Render a stored schema for a storage target.
    Render {
        source: String,

        /// `relational`, `document`, `graph`, or `jsonschema`.
        #[arg(long, default_value = "relational")]
        target: RenderTarget,

        #[arg(long)]
        version: Option<u32>,
    },

    /// Print statements that migrate data between two versions.
    ///
    /// Supported for the `relational` and `document` targets.
    Migrate {
        source: String,

        #[arg(long)]
        from: Option<u32>,

        #[arg(long)]
        to: Option<u32>,

        #[arg(long, default_value = "relational")]
        target: RenderTarget,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `detect` works without a config file
    if let Commands::Detect { file, json } = &cli.command {
        let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
        init_tracing(&cfg.logging.level);
        detect_cmd::run_detect(&cfg, file, *json)?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            source,
            version,
            dry_run,
            json,
        } => {
            let args = IngestArgs {
                source,
                version,
                dry_run,
                json,
            };
            ingest::run_ingest(&cfg, &path, &args).await?;
        }
        Commands::Detect { .. } => {}
        Commands::Sources { json } => {
            sources::list_sources(&cfg, json).await?;
        }
        Commands::History {
            source,
            limit,
            json,
        } => {
            history::run_history(&cfg, &source, limit, json).await?;
        }
        Commands::Show { source, version } => {
            history::run_show(&cfg, &source, version).await?;
        }
        Commands::Diff {
            source,
            from,
            to,
            json,
        } => {
            history::run_diff(&cfg, &source, from, to, json).await?;
        }
        Commands::Render {
            source,
            target,
            version,
        } => {
            render_cmd::run_render(&cfg, &source, target, version).await?;
        }
        Commands::Migrate {
            source,
            from,
            to,
            target,
        } => {
            history::run_migrate(&cfg, &source, from, to, target).await?;
        }
    }

    Ok(())
}
