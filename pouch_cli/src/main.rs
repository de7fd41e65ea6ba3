use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use pouch_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pouch")]
#[command(about = "Nicotine pouch level estimator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the absorption window for this run (minutes: 30, 45, 60)
    #[arg(long, global = true)]
    full_release: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the estimated nicotine level (default)
    Level {
        /// Query time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Show each pouch that currently contributes
    Status {
        /// Query time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the level curve over a time window
    Chart {
        /// Window start (RFC 3339)
        #[arg(long)]
        from: DateTime<Utc>,

        /// Window end (RFC 3339)
        #[arg(long)]
        to: DateTime<Utc>,

        /// Minutes between samples
        #[arg(long, default_value_t = 15)]
        step_minutes: i64,
    },

    /// Show or change the absorption settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings
    Show,

    /// Persist a new absorption window
    Set {
        /// Full release time in minutes: 30, 45 or 60
        minutes: u32,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    pouch_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    // `config set` persists its own value and never computes with the override
    let stores_setting = matches!(
        cli.command,
        Some(Commands::Config {
            action: ConfigAction::Set { .. }
        })
    );
    if let Some(minutes) = cli.full_release.filter(|_| !stores_setting) {
        config.absorption.full_release = FullReleaseTime::try_from(minutes)?;
    }

    match cli.command {
        Some(Commands::Level { at }) => cmd_level(&config, at.unwrap_or_else(Utc::now)),
        Some(Commands::Status { at, json }) => {
            cmd_status(&config, at.unwrap_or_else(Utc::now), json)
        }
        Some(Commands::Chart {
            from,
            to,
            step_minutes,
        }) => cmd_chart(&config, from, to, step_minutes),
        Some(Commands::Config { action }) => cmd_config(&config, action),
        None => {
            // Default to "level" command
            cmd_level(&config, Utc::now())
        }
    }
}

/// Load the snapshot of events relevant at `at`
fn load_snapshot(config: &Config, at: DateTime<Utc>) -> Result<Vec<DoseEvent>> {
    load_recent_events(
        &config.events_jsonl_path(),
        &config.events_csv_path(),
        config.data.history_days,
        at,
    )
}

fn cmd_level(config: &Config, at: DateTime<Utc>) -> Result<()> {
    let events = load_snapshot(config, at)?;
    let absorption = config.absorption_config();

    let level = calculate_total_nicotine_level(&events, &absorption, at);
    tracing::debug!("Level at {} over {} events: {}", at, events.len(), level);

    println!("Nicotine level: {:.3} mg", level);
    Ok(())
}

fn cmd_status(config: &Config, at: DateTime<Utc>, json: bool) -> Result<()> {
    let events = load_snapshot(config, at)?;
    let snapshot = LevelSnapshot::capture(&events, &config.absorption_config(), at);

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  NICOTINE LEVEL  {:>8.3} mg", snapshot.total_mg);
    println!("╰─────────────────────────────────────────╯");
    println!(
        "  As of {} (full release {})",
        format_time(at),
        config.absorption.full_release
    );
    println!();

    if snapshot.pouches.is_empty() {
        println!("  No active pouches.");
        println!();
        return Ok(());
    }

    for pouch in &snapshot.pouches {
        println!(
            "  {:>5.1} mg pouch  {:<9}  {:>6.3} mg  [{}] {:>3.0}%",
            pouch.dose_mg,
            pouch.phase.to_string(),
            pouch.level_mg,
            progress_bar(pouch.progress, 20),
            pouch.progress * 100.0
        );
        if let Some(full_at) = pouch.full_absorption_at(at) {
            println!("        → fully absorbed at {}", format_time(full_at));
        }
    }
    println!();
    Ok(())
}

fn cmd_chart(
    config: &Config,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    step_minutes: i64,
) -> Result<()> {
    if to < from {
        return Err(Error::Other(format!(
            "--to ({}) is before --from ({})",
            format_time(to),
            format_time(from)
        )));
    }
    if step_minutes <= 0 {
        return Err(Error::Other("--step-minutes must be positive".into()));
    }
    let step = TimeDelta::try_minutes(step_minutes).ok_or_else(|| {
        Error::Other(format!("--step-minutes {} is out of range", step_minutes))
    })?;

    // Events removed shortly before the window still contribute to it
    let events = load_snapshot(config, from)?;
    let absorption = config.absorption_config();
    let points = sample_curve(&events, &absorption, from, to, step);

    for point in &points {
        println!("{}  {:>8.3} mg", format_time(point.at), point.level_mg);
    }

    if let Some(top) = peak(&points) {
        println!();
        println!("Peak: {:.3} mg at {}", top.level_mg, format_time(top.at));
    }
    Ok(())
}

fn cmd_config(config: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Full release time: {}", config.absorption.full_release);
            println!("Data directory: {}", config.data.data_dir.display());
            println!("History window: {} days", config.data.history_days);
            println!("Config file: {}", Config::default_config_path().display());
        }
        ConfigAction::Set { minutes } => {
            let full_release = FullReleaseTime::try_from(minutes)?;
            let path = Config::default_config_path();
            let mut stored = load_or_default(&path)?;
            stored.absorption.full_release = full_release;
            stored.save_to(&path)?;
            println!("✓ Full release time set to {}", full_release);
        }
    }
    Ok(())
}

/// Load the on-disk config without the command-line overrides
fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load_from(path)
    } else {
        Ok(Config::default())
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}
