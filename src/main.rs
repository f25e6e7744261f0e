//! FPL Autopilot
//!
//! Predicts near-term player returns and makes budget-constrained squad
//! transfers through the Fantasy Premier League API.

mod api;
mod config;
mod db;
mod engine;
mod models;
mod prediction;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::FplClient;
use crate::config::BotConfig;
use crate::db::SqliteRecordStore;
use crate::engine::{CycleReport, TransferEngine};
use crate::models::{InjuryStatus, TransferCandidate};
use crate::prediction::LinearPredictor;

/// Fantasy Premier League transfer bot CLI.
#[derive(Parser)]
#[command(name = "fpl-autopilot")]
#[command(about = "Automated Fantasy Premier League transfers", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, env = "FPL_DATABASE_URL", default_value = "sqlite:./fpl_autopilot.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one transfer decision cycle
    Run {
        /// Select transfers without executing or recording them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the current squad with availability and prices
    Squad,

    /// Show details for one player
    Player {
        /// Player (element) id
        id: u32,
    },

    /// Show recorded transfers
    History {
        /// Maximum number of transfers to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = BotConfig::from_env()?;

    match cli.command {
        Commands::Run { dry_run } => {
            let client = FplClient::new(config.api.clone()).context("Failed to build API client")?;
            let store = SqliteRecordStore::connect(&cli.database).await?;
            let mut engine =
                TransferEngine::new(config.transfers.clone(), LinearPredictor::default(), store);

            info!(
                dry_run = dry_run,
                credentials = %config.api.credentials.mode(),
                "Starting transfer cycle"
            );

            match engine.run_cycle(&client, dry_run).await {
                CycleReport::Executed(transfers) => {
                    println!("\nExecuted {} transfer(s):", transfers.len());
                    print_transfers(&transfers);
                }
                CycleReport::DryRun(transfers) => {
                    println!("\nDRY RUN, would make {} transfer(s):", transfers.len());
                    print_transfers(&transfers);
                }
                CycleReport::NoTransfers => println!("No beneficial transfers this gameweek."),
                CycleReport::Skipped { reason } => println!("Cycle skipped: {}", reason),
            }

            for (feature, weight) in engine.predictor().feature_importance().iter().take(5) {
                debug!(feature = *feature, weight = *weight, "Feature importance");
            }
        }

        Commands::Squad => {
            let client = FplClient::new(config.api.clone())?;

            let entry = client.get_entry().await.context("Failed to fetch team entry")?;
            let bootstrap = client
                .get_bootstrap_static()
                .await
                .context("Failed to fetch bootstrap data")?;
            let gameweek = bootstrap
                .current_gameweek()
                .context("Could not determine the current gameweek")?;
            let picks = client
                .get_picks(Some(gameweek))
                .await
                .context("Failed to fetch picks")?;

            println!(
                "\n=== {} (#{}, GW {}) ===",
                entry.name,
                client.team_id().unwrap_or_default(),
                gameweek
            );
            println!(
                "Bank: {:.1}m   Squad value: {:.1}m",
                picks.entry_history.bank as f64 / 10.0,
                picks.entry_history.value as f64 / 10.0
            );

            println!(
                "\n{:<4} {:<20} {:<4} {:>5} {:>7} {:<12} {:>6}",
                "POS", "NAME", "CLUB", "PRICE", "FORM", "STATUS", "CHANCE"
            );
            println!("{}", "-".repeat(65));

            for pick in &picks.picks {
                let Some(player) = bootstrap.element(pick.element).and_then(|e| e.to_snapshot())
                else {
                    println!("{:<4} {:<20}", "?", pick.element);
                    continue;
                };
                let injury = InjuryStatus::from(&player);
                let name = if pick.is_captain {
                    format!("{} (C)", player.web_name)
                } else {
                    player.web_name.clone()
                };

                println!(
                    "{:<4} {:<20} {:<4} {:>5.1} {:>7.1} {:<12} {:>5}%",
                    player.position.short_name(),
                    truncate(&name, 20),
                    bootstrap.team_short_name(player.team).unwrap_or("?"),
                    player.price_millions(),
                    player.form,
                    injury.status.as_str(),
                    injury.chance_of_playing_next_round
                );
            }
        }

        Commands::Player { id } => {
            let client = FplClient::new(config.api.clone())?;

            let player = client
                .get_player_info(id)
                .await
                .with_context(|| format!("Player {} not found", id))?;
            let injury = client.get_player_injury_status(id).await;

            println!("\n=== {} ===", player.web_name);
            println!("Position:       {}", player.position.short_name());
            println!("Price:          {:.1}m", player.price_millions());
            println!("Form:           {:.1}", player.form);
            println!("Points/game:    {:.1}", player.stats.points_per_game);
            println!("Total points:   {}", player.stats.total_points);
            println!("Selected by:    {:.1}%", player.selected_by_percent);
            println!("Net transfers:  {}", player.net_transfers());

            println!("\n--- Availability ---");
            println!("Status:         {}", injury.status.as_str());
            println!("Chance (next):  {}%", injury.chance_of_playing_next_round);
            println!("Chance (this):  {}%", injury.chance_of_playing_this_round);
            if !injury.news.is_empty() {
                println!("News:           {}", injury.news);
            }

            if let Ok(bootstrap) = client.get_bootstrap_static().await {
                if let Some(gameweek) = bootstrap.next_gameweek() {
                    let difficulty = client.get_fixture_difficulty(player.team, gameweek).await;
                    println!("\nGW {} difficulty: {}", gameweek, difficulty);
                }
            }
        }

        Commands::History { limit } => {
            let store = SqliteRecordStore::connect(&cli.database).await?;
            let records = store.recent_transfers(limit).await?;

            if records.is_empty() {
                println!("No transfers recorded yet. Use 'fpl-autopilot run' to make some.");
                return Ok(());
            }

            println!(
                "\n{:<17} {:>3} {:<18} {:<18} {:>6} {:>4}",
                "TIME", "GW", "OUT", "IN", "GAIN", "COST"
            );
            println!("{}", "-".repeat(71));

            for record in records {
                println!(
                    "{:<17} {:>3} {:<18} {:<18} {:>6.2} {:>4}",
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.gameweek,
                    truncate(&record.player_out_name, 18),
                    truncate(&record.player_in_name, 18),
                    record.projected_gain,
                    record.cost
                );
            }
        }

        Commands::Config => {
            let api = &config.api;
            let transfers = &config.transfers;

            println!("\n=== API Configuration ===\n");
            println!("  Base URL:             {}", api.base_url);
            println!(
                "  Team ID:              {}",
                api.team_id.map_or_else(|| "not set".to_string(), |id| id.to_string())
            );
            println!("  Credentials:          {:?}", api.credentials);
            println!("  Timeout:              {}s", api.timeout.as_secs());
            println!("  Retry Attempts:       {}", api.retry.max_attempts);
            println!("  Retry Base Delay:     {}ms", api.retry.base_delay.as_millis());
            println!(
                "  Rate Limit Retries:   {}",
                api.retry
                    .max_rate_limit_retries
                    .map_or_else(|| "uncapped".to_string(), |n| n.to_string())
            );

            println!("\n=== Transfer Configuration ===\n");
            println!("  Max Transfers:        {}", transfers.max_transfers);
            println!("  Free Transfers:       {}", transfers.free_transfers);
            println!("  Transfer Cost:        {} pts", transfers.transfer_cost);
            println!("  Budget Buffer:        {:.1}m", f64::from(transfers.budget_buffer) / 10.0);
            println!("  Min Chance:           {}%", transfers.min_chance_of_playing);
            println!("  Shortlist/Position:   {}", transfers.shortlist_per_position);
            println!("  Max Per Club:         {}", transfers.max_per_club);
            println!("  Train Predictor:      {}", transfers.train_predictor);
        }
    }

    Ok(())
}

fn print_transfers(transfers: &[TransferCandidate]) {
    for t in transfers {
        println!(
            "  {:<18} -> {:<18} gain {:>5.2}  {}  bank {:+.1}m",
            truncate(&t.player_out.web_name, 18),
            truncate(&t.player_in.web_name, 18),
            t.projected_gain,
            if t.is_free() { "free".to_string() } else { format!("-{} pts", t.cost) },
            t.bank_delta() as f64 / 10.0
        );
    }
}

/// Truncate a string to max length, adding "..." if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
