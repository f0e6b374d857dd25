// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! MindFlow: mood tracking and wellness API
//!
//! Serves the HTTP API and doubles as a local client for the daily scan
//! gate, wellness reminders and one-off mood analysis of an image file.

use base64::{engine::general_purpose, Engine as _};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use mindflow::analysis::heuristic::HeuristicAnalyzer;
use mindflow::analysis::{Analysis, AnalysisRequest, Analyzer};
use mindflow::client_state::ClientState;
use mindflow::config::AppConfig;
use mindflow::db::Database;
use mindflow::gateway::GatewayClient;
use mindflow::web::{build_analyzer, start_server};
use mindflow::{MindflowError, Result};

/// MindFlow CLI - mood tracking and wellness API
#[derive(Parser, Debug)]
#[command(name = "mindflow")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Mood tracking and wellness API with AI-assisted analysis", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "mindflow.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Estimate the mood in an image file
    Analyze {
        /// Image to analyze (JPEG, PNG, ...)
        image: PathBuf,

        /// Count this as today's mood scan
        #[arg(long)]
        mark_scanned: bool,

        /// Skip the AI gateway and use the brightness heuristic
        #[arg(long)]
        offline: bool,
    },

    /// Daily mood scan gate
    Scan {
        #[command(subcommand)]
        action: ScanCommands,
    },

    /// Wellness reminders
    Reminders {
        #[command(subcommand)]
        action: ReminderCommands,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show gateway, database and client state status
    Status,

    /// Initialize a new MindFlow setup
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ScanCommands {
    /// Show whether today's scan is still due
    Status,

    /// Record today's scan
    Done,
}

#[derive(Subcommand, Debug)]
enum ReminderCommands {
    /// List all reminders
    List,

    /// Add a reminder
    Add {
        /// Reminder title
        title: String,

        /// Time of day (HH:MM)
        time: String,

        /// Message shown when it fires
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Turn a reminder on or off
    Toggle {
        /// Reminder id
        id: String,
    },

    /// Delete a reminder
    Remove {
        /// Reminder id
        id: String,
    },

    /// Show active reminders due at a time (default: now)
    Due {
        /// Time of day (HH:MM)
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Show database statistics
    Stats,

    /// Export users, moods and events to JSON
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Vacuum database (reclaim space)
    Vacuum,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "mindflow.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => run_serve(config, host, port, cli.quiet).await,
        Some(Commands::Analyze { image, mark_scanned, offline }) => {
            run_analyze(config, &image, mark_scanned, offline, &cli.format).await
        }
        Some(Commands::Scan { action }) => run_scan_command(config, action),
        Some(Commands::Reminders { action }) => run_reminder_command(config, action, &cli.format),
        Some(Commands::Db { action }) => run_db_command(config, action),
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Init { dir, force }) => run_init(dir, force),
        // Default: run the API
        None => run_serve(config, None, None, cli.quiet).await,
    }
}

async fn run_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>, quiet: bool) -> Result<()> {
    if let Some(host) = host {
        config.web.host = host;
    }
    if let Some(port) = port {
        config.web.port = port;
    }

    if !quiet {
        info!("MindFlow v{}", env!("CARGO_PKG_VERSION"));
    }
    if config.auth.uses_dev_secret() {
        warn!("Using the built-in development JWT secret. Set MINDFLOW_JWT_SECRET before exposing this server");
    }

    let db = Database::open(&config.database.path)?;
    info!("Database: {}", config.database.path);

    start_server(config, db).await
}

async fn run_analyze(config: AppConfig, image: &Path, mark_scanned: bool, offline: bool, format: &str) -> Result<()> {
    let bytes = std::fs::read(image)?;
    let request = AnalysisRequest::facial(general_purpose::STANDARD.encode(&bytes));

    let analyzer = if offline {
        let mut analyzer = Analyzer::new();
        analyzer.register(Box::new(HeuristicAnalyzer::new()));
        analyzer
    } else {
        build_analyzer(&config)
    };

    let analysis = analyzer.analyze(&request).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else if let Analysis::Facial(reading) = &analysis {
        let mood = reading.mood;
        println!("{} {} ({:.0}% confidence, {:?})", mood.emoji(), mood, reading.confidence, reading.source);
        println!("  Insight: {}", reading.insight);
        println!("  Suggestion: {}", reading.suggestion);
    } else {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    }

    if mark_scanned {
        let path = PathBuf::from(&config.client.state_path);
        let mut state = ClientState::load(&path)?;
        let streak = state.mark_scanned(Local::now().date_naive());
        state.save(&path)?;
        println!("Scan recorded. Streak: {} day(s)", streak);
    }

    Ok(())
}

fn run_scan_command(config: AppConfig, action: ScanCommands) -> Result<()> {
    let path = PathBuf::from(&config.client.state_path);
    let mut state = ClientState::load(&path)?;
    let today = Local::now().date_naive();

    match action {
        ScanCommands::Status => {
            if state.needs_scan(today) {
                println!("Mood scan due today");
            } else {
                println!("Already scanned today");
            }
            match state.last_scan {
                Some(last) => println!("  Last scan: {}", last),
                None => println!("  Last scan: never"),
            }
            println!("  Streak: {} day(s)", state.streak);
        }
        ScanCommands::Done => {
            let streak = state.mark_scanned(today);
            state.save(&path)?;
            println!("Scan recorded for {}. Streak: {} day(s)", today, streak);
        }
    }

    Ok(())
}

fn run_reminder_command(config: AppConfig, action: ReminderCommands, format: &str) -> Result<()> {
    let path = PathBuf::from(&config.client.state_path);
    let mut state = ClientState::load(&path)?;

    match action {
        ReminderCommands::List => {
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&state.reminders)?);
            } else {
                println!("Reminders:");
                for r in &state.reminders {
                    let marker = if r.is_active { "on " } else { "off" };
                    println!("  [{}] {} {} {}", r.id, marker, r.time, r.title);
                }
            }
        }
        ReminderCommands::Add { title, time, message } => {
            let added = state.add_reminder(&title, &time, message)?.clone();
            state.save(&path)?;
            println!("Added reminder {} at {} ({})", added.id, added.time, added.title);
        }
        ReminderCommands::Toggle { id } => {
            let active = state.toggle_reminder(&id)?;
            state.save(&path)?;
            println!("Reminder {} is now {}", id, if active { "on" } else { "off" });
        }
        ReminderCommands::Remove { id } => {
            let removed = state.remove_reminder(&id)?;
            state.save(&path)?;
            println!("Removed reminder {} ({})", removed.id, removed.title);
        }
        ReminderCommands::Due { at } => {
            let at = at.unwrap_or_else(|| Local::now().format("%H:%M").to_string());
            let due = state.due_reminders(&at)?;
            if due.is_empty() {
                println!("No reminders due at {}", at);
            }
            for r in due {
                println!("{} - {}", r.title, r.message.as_deref().unwrap_or("Time for a wellness check"));
            }
        }
    }

    Ok(())
}

fn run_db_command(config: AppConfig, action: DbCommands) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        DbCommands::Stats => {
            let stats = db.get_stats()?;
            println!("Database Statistics:");
            println!("  Users: {}", stats.user_count);
            println!("  Mood entries: {}", stats.mood_count);
            println!("  Events: {}", stats.event_count);
        }
        DbCommands::Export { output } => {
            let export = db.export_all()?;
            let json = serde_json::to_string_pretty(&export)?;
            std::fs::write(&output, json)?;
            println!(
                "Exported {} users, {} moods and {} events to {:?}",
                export.users.len(),
                export.moods.len(),
                export.events.len(),
                output
            );
        }
        DbCommands::Vacuum => {
            db.vacuum()?;
            println!("Database vacuumed successfully");
        }
    }

    Ok(())
}

/// Copy of the config safe to print
fn redacted(config: &AppConfig) -> AppConfig {
    let mut shown = config.clone();
    shown.auth.jwt_secret = "<redacted>".to_string();
    if shown.gateway.api_key.is_some() {
        shown.gateway.api_key = Some("<redacted>".to_string());
    }
    shown
}

fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&redacted(&config))?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Listen: {}:{}", config.web.host, config.web.port);
            println!("  Database: {}", config.database.path);
            println!("  Gateway: {}", if config.gateway.is_configured() { "configured" } else { "not configured" });
        }
    }

    Ok(())
}

async fn run_status(config: AppConfig) -> Result<()> {
    println!("MindFlow v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    match GatewayClient::new(&config.gateway, &config.prompts) {
        Ok(client) => match client.health_check().await {
            Ok(()) => println!("AI gateway: reachable ({})", config.gateway.model),
            Err(e) => println!("AI gateway: Error - {}", e),
        },
        Err(_) => println!("AI gateway: not configured (heuristic only)"),
    }

    match Database::open(&config.database.path) {
        Ok(db) => {
            let stats = db.get_stats()?;
            println!("\nDatabase ({}):", config.database.path);
            println!("  Users: {}", stats.user_count);
            println!("  Mood entries: {}", stats.mood_count);
            println!("  Events: {}", stats.event_count);
        }
        Err(e) => println!("\nDatabase: ✗ Error - {}", e),
    }

    let state = ClientState::load(Path::new(&config.client.state_path))?;
    let today = Local::now().date_naive();
    println!("\nClient state ({}):", config.client.state_path);
    println!("  Scan due today: {}", if state.needs_scan(today) { "yes" } else { "no" });
    println!("  Streak: {} day(s)", state.streak);
    println!(
        "  Active reminders: {}/{}",
        state.reminders.iter().filter(|r| r.is_active).count(),
        state.reminders.len()
    );

    if config.auth.uses_dev_secret() {
        println!("\nWarning: using the development JWT secret");
    }

    Ok(())
}

fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("mindflow.json");

    if config_path.exists() && !force {
        return Err(MindflowError::Config(
            "mindflow.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    std::fs::create_dir_all(&target)?;

    let mut config = AppConfig::default();
    config.database.path = target.join("mindflow.db").to_string_lossy().to_string();
    config.client.state_path = target.join("mindflow_state.json").to_string_lossy().to_string();
    config.save(&config_path)?;

    println!("MindFlow initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - mindflow.json");
    println!("\nNext steps:");
    println!("  1. Set MINDFLOW_JWT_SECRET (and MINDFLOW_GATEWAY_API_KEY for AI analysis)");
    println!("  2. Start the API: mindflow serve");

    Ok(())
}
