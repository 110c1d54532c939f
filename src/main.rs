use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use review_insight::{
    render_highlight, render_result, render_review, render_reviews, Config, HttpReviewClient,
    LastError, MutationFlow, Operation, ReviewError, ReviewId, ReviewService, ReviewStore,
    RotationController,
};

type Flow = MutationFlow<HttpReviewClient>;

#[derive(Parser)]
#[command(name = "review-insight")]
#[command(about = "Submit product reviews for sentiment analysis and key point extraction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, default_value = review_insight::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Review service base URL (overrides config)
    #[arg(long, env = "REVIEW_API_URL")]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all analyzed reviews, newest first
    List,

    /// Submit a review for analysis
    Submit {
        /// Review text (or read from --file / stdin if not provided)
        text: Option<String>,

        /// Read review text from a file
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Delete a review after confirmation
    Delete {
        /// Review ID
        id: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show a rotating highlight of the newest reviews
    Highlights {
        /// Stop after this many rotation steps (runs until Ctrl-C otherwise)
        #[arg(long)]
        ticks: Option<usize>,
    },

    /// Check that the review service is up
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("review_insight=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    let service_url = config.api.base_url.clone();

    let store = ReviewStore::new(HttpReviewClient::new(service_url.as_str()));
    let rotation =
        RotationController::new(config.rotation.window_size, config.rotation.interval());
    let mut flow = MutationFlow::new(store, rotation);

    match cli.command {
        Commands::List => list_reviews(&mut flow, &service_url).await,
        Commands::Submit { text, file } => {
            let text = read_review_text(text, file)?;
            submit_review(&mut flow, &service_url, text).await
        }
        Commands::Delete { id, yes } => delete_review(&mut flow, &service_url, &id, yes).await,
        Commands::Highlights { ticks } => show_highlights(&mut flow, &service_url, ticks).await,
        Commands::Health => check_health(&flow, &service_url).await,
    }
}

/// Turn a store failure into the message the user sees
fn failure(flow: &Flow, service_url: &str, err: ReviewError) -> anyhow::Error {
    let message = flow
        .error_message(service_url)
        .unwrap_or_else(|| err.to_string());
    anyhow::anyhow!(message)
}

/// A failed initial load is reported but does not stop a mutation
fn report_load_failure(flow: &Flow, service_url: &str, err: ReviewError) {
    warn!(error = %err, "Initial review load failed");
    if let Some(message) = flow.error_message(service_url) {
        eprintln!("{}", message);
    }
}

fn read_review_text(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("Failed to read review file: {}", path.display())),
        (None, None) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read review from stdin")?;
            Ok(buffer)
        }
    }
}

async fn list_reviews(flow: &mut Flow, service_url: &str) -> Result<()> {
    if let Err(err) = flow.start().await {
        return Err(failure(flow, service_url, err));
    }

    print!("{}", render_reviews(&flow.store().snapshot()));
    Ok(())
}

async fn submit_review(flow: &mut Flow, service_url: &str, text: String) -> Result<()> {
    if let Err(err) = flow.start().await {
        report_load_failure(flow, service_url, err);
    }

    flow.set_draft(text);
    let review = match flow.submit().await {
        Ok(review) => review,
        Err(err) => return Err(failure(flow, service_url, err)),
    };

    println!("{}", render_result(&review));

    // The list refresh after a submission can fail on its own
    match flow.error_message(service_url) {
        Some(message) => eprintln!("{}", message),
        None => println!("{} reviews stored.", flow.store().reviews().len()),
    }

    Ok(())
}

async fn delete_review(flow: &mut Flow, service_url: &str, id: &str, yes: bool) -> Result<()> {
    if let Err(err) = flow.start().await {
        report_load_failure(flow, service_url, err);
    }

    let id = ReviewId::from(id);
    match flow.store().reviews().iter().find(|r| r.id == id) {
        Some(review) => print!("{}", render_review(review)),
        None => println!("Review #{} is not in the current list.", id),
    }

    flow.request_delete(id);

    if !yes && !confirm("Delete this review? [y/N] ")? {
        flow.cancel_delete();
        println!("Cancelled.");
        return Ok(());
    }

    match flow.confirm_delete().await {
        Ok(Some(id)) => {
            info!(id = %id, "Deleted review");
            println!("Deleted review #{}.", id);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => Err(failure(flow, service_url, err)),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;

    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

async fn show_highlights(flow: &mut Flow, service_url: &str, ticks: Option<usize>) -> Result<()> {
    if let Err(err) = flow.start().await {
        return Err(failure(flow, service_url, err));
    }

    let reviews = flow.store().reviews();
    let mut updates = flow.rotation().subscribe();
    print!("{}", render_highlight(&updates.borrow_and_update(), &reviews));

    if reviews.is_empty() {
        return Ok(());
    }

    flow.rotation_mut().mount();

    let mut shown = 0;
    while ticks.map_or(true, |limit| shown < limit) {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                println!();
                print!("{}", render_highlight(&state, &reviews));
                shown += 1;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    flow.rotation_mut().unmount();
    Ok(())
}

async fn check_health(flow: &Flow, service_url: &str) -> Result<()> {
    match flow.store().service().health().await {
        Ok(()) => {
            println!("Review service at {} is healthy.", service_url);
            Ok(())
        }
        Err(ReviewError::Unreachable) => {
            let message = LastError::new(Operation::Refresh, ReviewError::Unreachable)
                .user_message(service_url)
                .unwrap_or_default();
            anyhow::bail!(message)
        }
        Err(err) => anyhow::bail!("Review service unhealthy: {}", err),
    }
}
