//! # agendabot CLI
//!
//! Reminder and dosing scheduler for a personal calendar assistant.
//!
//! Usage:
//!   agendabot run                          # Start the scheduler loop
//!   agendabot digest --send                # Today's pending/upcoming items
//!   agendabot renew --date 2024-01-01      # Carry open tasks to the next day
//!   agendabot supplement add Omega3 09:00  # Schedule a daily dose
//!   agendabot config show                  # Show configuration

use agendabot_core::AgendaConfig;
use agendabot_core::traits::CalendarStore;
use agendabot_scheduler::digest::DigestPolicy;
use agendabot_scheduler::{render, rollup, AgendaDigest, DoseStore, DoseTracker, NotifyRouter, SchedulerEngine, TaskRenewer};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "agendabot",
    version,
    about = "📅 agendabot: calendar digests, task renewal and supplement reminders",
    long_about = "Time-driven reminders over your calendar.\nDigests, near-term alerts, nightly task renewal and daily dose reminders with Telegram buttons."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until Ctrl+C
    Run,

    /// Show today's digest
    Digest {
        /// Also push it through the configured channels
        #[arg(long)]
        send: bool,
    },

    /// Carry uncompleted all-day tasks to the following day
    Renew {
        /// Day to renew from (YYYY-MM-DD, default today)
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Completion rate over the last 7 days
    Rollup {
        /// Also push it through the configured channels
        #[arg(long)]
        send: bool,
    },

    /// Delete same-title duplicates on one day
    Dedupe {
        /// Day to clean (YYYY-MM-DD, default today)
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Mark a calendar item as completed
    Complete {
        /// Calendar item id
        id: String,
    },

    /// Supplement dose schedules
    Supplement {
        #[command(subcommand)]
        action: SupplementAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show system info
    Info,
}

#[derive(Subcommand)]
enum SupplementAction {
    /// Schedule a daily dose
    Add {
        /// Supplement name
        name: String,
        /// Daily time (HH:MM)
        time: String,
    },
    /// List dose schedules
    List,
    /// Stop reminding for a schedule
    Pause { id: String },
    /// Resume a paused schedule
    Resume { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Reset to defaults
    Reset,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn build_tracker(config: &AgendaConfig) -> Result<DoseTracker> {
    let store = DoseStore::open(config.doses.resolved_path())?;
    Ok(DoseTracker::new(store, config.tz()?))
}

fn build_router(config: &AgendaConfig) -> Result<NotifyRouter> {
    let mut router = NotifyRouter::new(config.authorized_recipient.clone());
    for channel in agendabot_channels::create_channels(&config.channel)? {
        router = router.with_channel(channel);
    }
    Ok(router)
}

async fn push(config: &AgendaConfig, text: String) -> Result<()> {
    let router = build_router(config)?;
    if router.send(&agendabot_core::types::Notice::text(text)).await? {
        println!("📨 Sent.");
    } else {
        println!("⚠️ Not sent (no recipient or no channel configured).");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "agendabot=debug,agendabot_core=debug,agendabot_scheduler=debug,agendabot_calendar=debug,agendabot_channels=debug"
    } else {
        "agendabot=info,agendabot_scheduler=info,agendabot_calendar=info,agendabot_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Load config
    let config = if let Some(path) = &cli.config {
        AgendaConfig::load_from(std::path::Path::new(path))?
    } else {
        AgendaConfig::load()?
    };

    match cli.command {
        Commands::Run => {
            let calendar = agendabot_calendar::create_calendar(&config)?;
            let tracker = build_tracker(&config)?;
            let router = build_router(&config)?;

            println!("📅 agendabot v{} scheduler", env!("CARGO_PKG_VERSION"));
            println!("   Timezone: {} | Calendar: {}", config.timezone, calendar.name());
            println!("   Channels: {}", router.channel_names().join(", "));
            if router.recipient().is_none() {
                println!("   ⚠️ No authorized recipient (set AUTHORIZED_USER_ID); notices are skipped");
            }

            let (tx, rx) = tokio::sync::mpsc::channel(32);

            // Telegram button presses feed the engine's action channel.
            if let Some(tg) = config.channel.telegram.as_ref().filter(|c| c.enabled) {
                let telegram = agendabot_channels::TelegramChannel::new(tg.clone())?;
                match telegram.get_me().await {
                    Ok(me) => tracing::info!("📱 Telegram bot: @{}", me.username.unwrap_or_default()),
                    Err(e) => tracing::warn!("⚠️ Telegram getMe failed: {e}"),
                }
                let mut stream = telegram.start_callback_listener(config.authorized_recipient.clone());
                tokio::spawn(async move {
                    while let Some(action) = stream.next().await {
                        if tx.send(action).await.is_err() {
                            break;
                        }
                    }
                });
            } else {
                drop(tx);
            }

            let engine = SchedulerEngine::new(&config, calendar, tracker, router)?;
            println!("\nScheduler is running. Press Ctrl+C to stop.");
            engine
                .run(rx, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Ctrl+C handler failed: {e}");
                    }
                })
                .await;
            println!("\n👋 Scheduler stopped.");
        }

        Commands::Digest { send } => {
            let tz = config.tz()?;
            let calendar = agendabot_calendar::create_calendar(&config)?;
            let composer = AgendaDigest::new(calendar, tz, DigestPolicy::from(&config.jobs));
            let now = Utc::now().with_timezone(&tz);
            let digest = composer.today(&now).await?;
            let text = render::digest(&digest, &now, false);
            println!("{text}");
            if send {
                push(&config, text).await?;
            }
        }

        Commands::Renew { date } => {
            let tz = config.tz()?;
            let calendar = agendabot_calendar::create_calendar(&config)?;
            let target = date.unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive());
            let report = TaskRenewer::new(calendar, tz).renew(target).await?;
            println!("{}", render::renewal(&report));
            if report.failed > 0 {
                println!("⚠️ {} item(s) failed; run again to retry.", report.failed);
            }
        }

        Commands::Rollup { send } => {
            let tz = config.tz()?;
            let calendar = agendabot_calendar::create_calendar(&config)?;
            let today = Utc::now().with_timezone(&tz).date_naive();
            let summary = rollup::weekly_rollup(calendar.as_ref(), tz, today).await?;
            let text = render::rollup(&summary);
            println!("{text}");
            if send {
                push(&config, text).await?;
            }
        }

        Commands::Dedupe { date } => {
            let tz = config.tz()?;
            let calendar: Arc<dyn CalendarStore> = agendabot_calendar::create_calendar(&config)?;
            let day = date.unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive());
            let report = agendabot_scheduler::dedupe::dedupe_day(calendar.as_ref(), tz, day).await?;
            if report.duplicated_titles.is_empty() {
                println!("✅ No duplicates on {day}.");
            } else {
                println!("🧹 {day}: deleted {} duplicate(s)", report.deleted);
                for title in &report.duplicated_titles {
                    println!("  - {title}");
                }
                if report.failed > 0 {
                    println!("⚠️ {} deletion(s) failed", report.failed);
                }
            }
        }

        Commands::Complete { id } => {
            let tz = config.tz()?;
            let calendar = agendabot_calendar::create_calendar(&config)?;
            let composer = AgendaDigest::new(calendar, tz, DigestPolicy::from(&config.jobs));
            let item = composer.complete_item(&id).await?;
            println!("✅ Completed: {}", item.title);
        }

        Commands::Supplement { action } => {
            let tracker = build_tracker(&config)?;
            match action {
                SupplementAction::Add { name, time } => {
                    if tracker.add_supplement(&name, &time)? {
                        println!("💊 {name} scheduled daily at {time}.");
                    } else {
                        println!("ℹ️ {name} is already scheduled at {time}.");
                    }
                }
                SupplementAction::List => {
                    let doses = tracker.list();
                    if doses.is_empty() {
                        println!("(no supplements scheduled)");
                        println!("  Use: agendabot supplement add <name> <HH:MM>");
                    }
                    for dose in doses {
                        let taken = dose
                            .last_taken_date
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "never".into());
                        println!(
                            "  {} {} {:<20} last taken: {taken}  ({})",
                            if dose.active { "✅" } else { "⏸️" },
                            dose.time,
                            dose.name,
                            dose.id
                        );
                    }
                }
                SupplementAction::Pause { id } => {
                    if tracker.set_active(&id, false)? {
                        println!("⏸️ Paused {id}.");
                    } else {
                        println!("❌ No supplement with id {id}");
                    }
                }
                SupplementAction::Resume { id } => {
                    if tracker.set_active(&id, true)? {
                        println!("▶️ Resumed {id}.");
                    } else {
                        println!("❌ No supplement with id {id}");
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let content = toml::to_string_pretty(&config.redacted())?;
                println!("{content}");
            }
            ConfigAction::Reset => {
                AgendaConfig::default().save()?;
                println!("✅ Configuration reset to defaults: {}", AgendaConfig::default_path().display());
            }
        },

        Commands::Info => {
            println!("📅 agendabot v{}", env!("CARGO_PKG_VERSION"));
            println!("   Platform: {} / {}", std::env::consts::OS, std::env::consts::ARCH);
            println!("   Config: {}", AgendaConfig::default_path().display());
            println!("   Timezone: {}", config.timezone);
            println!("   Calendar: {} ({})", config.calendar.backend, config.calendar.calendar_id);
            println!("   Doses: {}", config.doses.resolved_path().display());
            let slots: Vec<String> = config.schedule.digest_times.iter().map(|t| t.to_string()).collect();
            println!("   Digests: {}", slots.join(", "));
            println!("   Renewal: {}", config.schedule.renewal_time);
            println!(
                "   Recipient: {}",
                if config.authorized_recipient.is_some() { "set" } else { "not set" }
            );
            println!(
                "   Telegram: {}",
                if config.channel.telegram.as_ref().is_some_and(|t| t.enabled) { "enabled" } else { "disabled" }
            );
            println!(
                "   Webhook: {}",
                if config.channel.webhook.as_ref().is_some_and(|w| w.enabled && w.outbound_url.is_some()) {
                    "enabled"
                } else {
                    "disabled"
                }
            );
        }
    }

    Ok(())
}
