//! projvault command-line tool.
//!
//! Provides subcommands for creating projects, saving and checking out
//! versions, managing branches and tags, previewing and applying merges,
//! viewing the audit log, and generating / validating configuration files.

mod commands;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use projvault_core::config::AppConfig;
use projvault_core::db::Database;

use commands::{BranchAction, MergeAction, ProjectAction, Session, TagAction, VersionAction};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// projvault command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "projvault",
    version,
    about = "Versioned, branchable project state with three-way merge"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value_os_t = AppConfig::default_path())]
    config: PathBuf,

    /// Answer yes to every confirmation prompt.
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file (defaults to --config).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file.
    Validate,

    // Commands that need the configuration and the database.
    #[command(flatten)]
    Session(SessionCommand),
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Create, select and inspect projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Save, list and check out versions of the active project.
    Version {
        #[command(subcommand)]
        action: VersionAction,
    },

    /// Manage branches of the active project.
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },

    /// Manage tags of the active project.
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Preview and apply merges into the current version.
    Merge {
        #[command(subcommand)]
        action: MergeAction,
    },

    /// Show recent audit log entries.
    Audit {
        /// Maximum number of entries to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The config decides the log level, so it is read before logging starts.
    let config = match &cli.command {
        Commands::Init { .. } | Commands::Validate => None,
        Commands::Session(_) => match load_config(&cli.config) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let level = config
        .as_ref()
        .map(|c| c.logging.level.as_str())
        .unwrap_or("warn");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .without_time()
        .init();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Option<AppConfig>) -> Result<()> {
    let command = match cli.command {
        Commands::Init { output } => {
            return cmd_init(output.as_deref().unwrap_or(cli.config.as_path()));
        }
        Commands::Validate => return cmd_validate(&cli.config),
        Commands::Session(command) => command,
    };

    let config = config.context("configuration was not loaded")?;
    let db = open_database(&config)?;
    let session = Session::new(config, db, cli.yes);

    match command {
        SessionCommand::Project { action } => commands::project::run(&session, action),
        SessionCommand::Version { action } => commands::version::run(&session, action),
        SessionCommand::Branch { action } => commands::branch::run(&session, action),
        SessionCommand::Tag { action } => commands::tag::run(&session, action),
        SessionCommand::Merge { action } => commands::merge::run(&session, action).await,
        SessionCommand::Audit { limit } => cmd_audit(&session.db, limit),
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load the configuration, falling back to defaults when the file is absent.
fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config.validate().context("invalid default configuration")?;
        return Ok(config);
    }
    AppConfig::load_and_validate(path).context("failed to load configuration file")
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let db_path = config.database_path();
    let db = Database::new(&db_path).context("failed to open database")?;
    db.initialize().context("failed to initialize database")?;
    Ok(db)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    let rendered = AppConfig::default()
        .to_toml()
        .context("failed to render default configuration")?;
    let contents = format!(
        "# projvault configuration\n# PROJVAULT_DATA_DIR and PROJVAULT_LOG_LEVEL override the values below.\n\n{}",
        rendered
    );

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    std::fs::write(output, contents).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!(
            "Default configuration written to {}",
            output.display()
        ))
    );
    println!();
    println!("Next steps:");
    println!("  1. Edit the data directory and merge tunables if needed");
    println!(
        "  2. Validate with: projvault validate --config {}",
        output.display()
    );
    println!("  3. Create a project: projvault project create <name>");

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config.apply_env_overrides();
    println!("  [OK] Environment overrides processed");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All values are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Database        : {}", config.database_path().display());
    println!("  Log level       : {}", config.logging.level);
    println!(
        "  Similarity      : {:.2} (margin {:.2})",
        config.merge.similarity_threshold, config.merge.suggestion_margin
    );
    println!(
        "  Two-way conf.   : {:.2}",
        config.merge.two_way_confidence
    );
    println!(
        "  Merge commits   : {}",
        if config.merge.create_new_version {
            "new version"
        } else {
            "in place"
        }
    );
    println!(
        "  Auto-apply      : {}",
        if config.merge.auto_apply_suggestions {
            "on"
        } else {
            "off"
        }
    );
    println!("  Default branch  : {}", config.branches.default_name);
    println!("  Branch colours  : {}", config.branches.palette.len());
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_audit(db: &Database, limit: u32) -> Result<()> {
    let entries = db
        .list_audit_log(limit)
        .context("failed to list audit entries")?;

    if entries.is_empty() {
        println!("No audit log entries found.");
        return Ok(());
    }

    println!("{:<35} {:<20} DETAILS", "TIMESTAMP", "ACTION");
    println!("{}", "-".repeat(80));

    for entry in &entries {
        println!(
            "{:<35} {:<20} {}",
            entry.created_at,
            entry.action,
            commands::truncate(entry.details.as_deref().unwrap_or(""), 50),
        );
    }

    println!();
    println!("{} entries shown", entries.len());

    Ok(())
}
