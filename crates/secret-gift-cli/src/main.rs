//! Secret-Gift CLI - Run a secret gift exchange from the terminal.
//!
//! The exchange lives in a `.gift` folder under `--path` (the current
//! directory by default). Every command loads it, applies one change and
//! saves it again.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use secret_gift_ops::{Config, OpsContext, RuleRequest};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

mod commands;

use commands::{config as config_cmd, exchange, faces};

/// Secret-Gift CLI - Draw gift pairings under rules, reveal them face-verified.
///
/// Typical flow: `sg init`, `sg participant add "Ann, Bob, Cid"`,
/// `sg rule restrict Ann Bob`, `sg setup`, then each giver runs `sg reveal`.
#[derive(Parser, Debug)]
#[command(
    name = "sg",
    author,
    version,
    about = "Secret-Gift: constrained secret gift exchange",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory holding the exchange.
    #[arg(long, global = true, default_value = ".")]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new exchange in the `.gift` folder.
    Init {
        /// Wipe an existing exchange.
        #[arg(short, long)]
        force: bool,
    },

    /// Manage participants.
    #[command(subcommand)]
    Participant(ParticipantCommands),

    /// Manage restrictions and mandates.
    #[command(subcommand)]
    Rule(RuleCommands),

    /// Complete setup and draw the first assignment.
    Setup,

    /// Draw a fresh assignment. Clears every verification.
    Shuffle,

    /// Register a participant's face.
    Register {
        /// Participant name.
        name: String,

        /// Face file (a JSON array of feature values).
        #[arg(long, alias = "image")]
        vector: PathBuf,
    },

    /// Verify your face and reveal who you give to.
    Reveal {
        /// Your participant name.
        name: String,

        /// Probe face file (a JSON array of feature values).
        #[arg(long, alias = "image")]
        probe: PathBuf,
    },

    /// Show exchange status.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Back up and restore face data.
    #[command(subcommand)]
    Faces(FacesCommands),

    /// Remove all participants, rules, faces and the assignment.
    Reset,

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Participant commands.
#[derive(Subcommand, Debug)]
enum ParticipantCommands {
    /// Add participants (comma-separated names).
    Add {
        /// Names, e.g. "Ann, Bob, Cid".
        names: String,
    },

    /// Rename a participant everywhere.
    Rename {
        /// Current name.
        old: String,
        /// New name.
        new: String,
    },

    /// Remove a participant and their rules.
    Remove {
        /// Participant name.
        name: String,
    },

    /// List participants.
    List,
}

/// Rule commands.
#[derive(Subcommand, Debug)]
enum RuleCommands {
    /// Forbid GIVER from drawing RECEIVER.
    Restrict { giver: String, receiver: String },

    /// Require GIVER to draw RECEIVER.
    Mandate { giver: String, receiver: String },

    /// Drop a restriction.
    Unrestrict { giver: String, receiver: String },

    /// Drop a mandate.
    Unmandate { giver: String, receiver: String },

    /// List all rules.
    List,
}

/// Face-data commands.
#[derive(Subcommand, Debug)]
enum FacesCommands {
    /// Write a timestamped backup of all registered faces.
    Export {
        /// Directory for the backup (defaults to config or `.gift/backups`).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Replace registered faces with a backup.
    Import {
        /// Backup file.
        file: PathBuf,
    },

    /// List backups in `.gift/backups`.
    List,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Configuration key.
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Get a configuration value.
    Get {
        /// Configuration key.
        key: String,
    },

    /// Reset configuration to defaults.
    Reset,

    /// Show path to config file.
    Path,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::load()?;
    let root = cli.path;

    let mut ctx = OpsContext::new(config);

    match cli.command {
        Commands::Init { force } => exchange::init(&ctx, &root, force)?,

        Commands::Participant(cmd) => match cmd {
            ParticipantCommands::Add { names } => exchange::add_participants(&ctx, &root, &names)?,
            ParticipantCommands::Rename { old, new } => {
                exchange::rename_participant(&ctx, &root, &old, &new)?
            }
            ParticipantCommands::Remove { name } => {
                exchange::remove_participant(&ctx, &root, &name)?
            }
            ParticipantCommands::List => exchange::list_participants(&ctx, &root)?,
        },

        Commands::Rule(cmd) => match cmd {
            RuleCommands::Restrict { giver, receiver } => {
                exchange::add_rule(&ctx, &root, RuleRequest::restriction(giver, receiver))?
            }
            RuleCommands::Mandate { giver, receiver } => {
                exchange::add_rule(&ctx, &root, RuleRequest::mandate(giver, receiver))?
            }
            RuleCommands::Unrestrict { giver, receiver } => {
                exchange::remove_rule(&ctx, &root, RuleRequest::restriction(giver, receiver))?
            }
            RuleCommands::Unmandate { giver, receiver } => {
                exchange::remove_rule(&ctx, &root, RuleRequest::mandate(giver, receiver))?
            }
            RuleCommands::List => exchange::list_rules(&ctx, &root)?,
        },

        Commands::Setup => exchange::setup(&ctx, &root)?,
        Commands::Shuffle => exchange::shuffle(&ctx, &root)?,
        Commands::Register { name, vector } => faces::register(&ctx, &root, &name, &vector)?,
        Commands::Reveal { name, probe } => faces::reveal(&ctx, &root, &name, &probe)?,
        Commands::Status { json } => exchange::status(&ctx, &root, json)?,

        Commands::Faces(cmd) => match cmd {
            FacesCommands::Export { dir } => faces::export(&ctx, &root, dir.as_deref())?,
            FacesCommands::Import { file } => faces::import(&ctx, &root, &file)?,
            FacesCommands::List => faces::list(&ctx, &root)?,
        },

        Commands::Reset => exchange::reset(&ctx, &root)?,

        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => config_cmd::show(&ctx.config)?,
            ConfigCommands::Set { key, value } => config_cmd::set(&mut ctx.config, &key, &value)?,
            ConfigCommands::Get { key } => config_cmd::get(&ctx.config, &key)?,
            ConfigCommands::Reset => config_cmd::reset()?,
            ConfigCommands::Path => {
                if let Some(path) = Config::config_file_path() {
                    println!("{}", path.display());
                } else {
                    println!("(no config file path available)");
                }
            }
        },
    }

    Ok(())
}
