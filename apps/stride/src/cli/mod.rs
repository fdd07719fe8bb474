//! # Stride CLI Module
//!
//! This module implements the CLI interface for Stride.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `show` - Show the full progression state
//! - `summary` - Show the progress overview
//! - `badges` - List the badge catalog
//! - `progress` - Show progress towards locked badges
//! - `onboard` - Set the profile and complete onboarding
//! - `check-in` - Record today's check-in
//! - `add-xp` - Grant XP
//! - `save` / `unsave` / `apply` / `complete` - Opportunity interactions
//! - `unlock` - Unlock a badge directly
//! - `export` - Write the snapshot to a file

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stride_core::{ProfileId, StrideError};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Stride - progression engine
///
/// XP, levels, streaks and badges for learner profiles.
#[derive(Parser, Debug)]
#[command(name = "stride")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML config file (default: ./stride.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage backend: "memory", "file" (JSON per profile) or "redb"
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Data directory (file backend) or database file (redb backend)
    #[arg(short = 'D', long, global = true)]
    pub data: Option<PathBuf>,

    /// Profile to operate on
    #[arg(short, long, global = true, default_value = "default")]
    pub profile: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short = 'P', long)]
        port: Option<u16>,
    },

    /// Show the full progression state
    Show,

    /// Show XP, level, streak and recent badges
    Summary,

    /// List the badge catalog
    Badges,

    /// Show progress towards badges not yet unlocked
    Progress,

    /// Complete onboarding, optionally setting the profile first
    Onboard {
        /// Learner name
        #[arg(short, long)]
        name: Option<String>,

        /// School grade
        #[arg(short, long, default_value = "9")]
        grade: u8,

        /// Interest tags (repeatable)
        #[arg(short, long)]
        interest: Vec<String>,

        /// Goal tags (repeatable)
        #[arg(long)]
        goal: Vec<String>,
    },

    /// Record today's check-in
    CheckIn,

    /// Grant XP
    AddXp {
        /// Amount of XP
        amount: u64,
    },

    /// Save an opportunity
    Save {
        /// Opportunity id
        id: String,
    },

    /// Remove a saved opportunity
    Unsave {
        /// Opportunity id
        id: String,
    },

    /// Record an application
    Apply {
        /// Opportunity id
        id: String,
    },

    /// Record a completion
    Complete {
        /// Opportunity id
        id: String,
    },

    /// Unlock a badge directly
    Unlock {
        /// Badge id
        badge: String,
    },

    /// Write the persisted snapshot to a file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (binary, json)
        #[arg(short = 't', long, default_value = "binary")]
        format: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve the layered configuration: file, environment, then CLI flags.
pub fn resolve_config(cli: &Cli) -> Result<AppConfig, StrideError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(backend) = &cli.backend {
        config.storage.backend = backend.parse()?;
    }
    if let Some(data) = &cli.data {
        config.storage.path = Some(data.clone());
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), StrideError> {
    let mut ctx = CliContext {
        config: resolve_config(&cli)?,
        profile: ProfileId::new(cli.profile.as_str())?,
        json_mode: cli.json_mode,
    };

    // No subcommand - show the summary by default
    match cli.command.unwrap_or(Commands::Summary) {
        Commands::Server { host, port } => {
            if let Some(host) = host {
                ctx.config.server.host = host;
            }
            if let Some(port) = port {
                ctx.config.server.port = port;
            }
            cmd_server(&ctx.config).await
        }
        Commands::Show => cmd_show(&ctx).await,
        Commands::Summary => cmd_summary(&ctx).await,
        Commands::Badges => cmd_badges(&ctx).await,
        Commands::Progress => cmd_progress(&ctx).await,
        Commands::Onboard {
            name,
            grade,
            interest,
            goal,
        } => cmd_onboard(&ctx, name, grade, interest, goal).await,
        Commands::CheckIn => cmd_check_in(&ctx).await,
        Commands::AddXp { amount } => cmd_add_xp(&ctx, amount).await,
        Commands::Save { id } => cmd_interaction(&ctx, Interaction::Save, &id).await,
        Commands::Unsave { id } => cmd_interaction(&ctx, Interaction::Unsave, &id).await,
        Commands::Apply { id } => cmd_interaction(&ctx, Interaction::Apply, &id).await,
        Commands::Complete { id } => cmd_interaction(&ctx, Interaction::Complete, &id).await,
        Commands::Unlock { badge } => cmd_unlock(&ctx, &badge).await,
        Commands::Export { output, format } => cmd_export(&ctx, &output, &format).await,
    }
}

// =============================================================================
// TESTS
// =============================================================================
