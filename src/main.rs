#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use moltbot::adaptive::ThreadRngDice;
use moltbot::config::Config;
use moltbot::pipeline::stubs::{
    NullPublisher, SilentRssSource, SilentSearchSource, TemplateGenerator,
};
use moltbot::pipeline::{Orchestrator, StatusReport};
use moltbot::store::JsonFileStore;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "moltbot", version, about = "Autonomous reply decision pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single decision cycle and print the outcome.
    Cycle,
    /// Run cycles continuously with the adaptive interval between them.
    Run,
    /// Print scheduler, rate-limit, and adaptive-selection status.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = Config::load_or_init()?;
    let orchestrator = build_orchestrator(config)?;

    match cli.command {
        Commands::Cycle => {
            let outcome = orchestrator.run_cycle(Utc::now()).await?;
            println!("{}: {}", outcome.outcome, outcome.message);
        }
        Commands::Run => loop {
            let outcome = orchestrator.run_cycle(Utc::now()).await?;
            let delay = orchestrator.next_cycle_delay();
            info!(
                outcome = %outcome.outcome,
                next_in_mins = delay.as_secs() / 60,
                "cycle finished"
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("shutting down");
                    break;
                }
            }
        },
        Commands::Status => {
            print_status(&orchestrator.status(Utc::now()));
        }
    }

    Ok(())
}

fn build_orchestrator(config: Config) -> Result<Orchestrator> {
    let store = Arc::new(JsonFileStore::open(config.state_path())?);
    Ok(Orchestrator::new(
        config,
        store,
        Arc::new(TemplateGenerator),
        Arc::new(NullPublisher),
        Arc::new(SilentRssSource),
        Arc::new(SilentSearchSource),
        Arc::new(ThreadRngDice),
    ))
}

fn print_status(status: &StatusReport) {
    println!("Last action: {}", status.home.last_action_message);
    println!("Actions today: {}", status.home.actions_today);
    println!("Errors: {}", status.home.errors);
    println!(
        "Posts in window: {} (can post now: {})",
        status.rate.posts_in_window, status.rate.can_post_now
    );
    println!("Next interval: {} mins", status.next_interval_mins);
    println!("Tracked topics: {}", status.topics.tracked_topics);
    if let Some(top) = &status.topics.top_topic {
        println!("Top topic: {} (score {})", top.topic, top.score);
    }
    if let Some(last) = &status.topics.last_topic_used {
        println!("Last topic: {}", last.topic);
    }
    if let Some(style) = &status.top_style {
        println!("Top style: {} (score {})", style.style, style.score);
    }
    if !status.recent_events.is_empty() {
        println!("Recent events:");
        for event in &status.recent_events {
            println!("  {} {}", event.kind, event.detail);
        }
    }
}
