// firescrape: scrape pages to markdown from the command line, or serve the
// scrape tools over stdio.
//
// Logs go to stderr; stdout carries protocol frames in server mode.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use firescrape::actions::parse_actions;
use firescrape::mcp::{LocalBackend, RemoteBackend, serve_stdio};
use firescrape::{BrowserManager, Config, Format, ScrapeRequest, load_yaml_config, local_scraper};

#[derive(Parser)]
#[command(name = "firescrape")]
#[command(about = "Scrape web pages into LLM-ready markdown")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one URL and print the result
    Scrape {
        url: String,

        /// Comma-separated formats: markdown, html, rawHtml, links, screenshot, json
        #[arg(long = "format", value_delimiter = ',', default_value = "markdown")]
        formats: Vec<Format>,

        /// JSON array of page actions
        #[arg(long)]
        actions: Option<String>,

        /// Extraction prompt; adds the json format
        #[arg(long)]
        prompt: Option<String>,

        /// Ignore cached results
        #[arg(long)]
        no_cache: bool,

        /// Convert the whole document instead of the main content
        #[arg(long)]
        full: bool,
    },

    /// Serve the scrape tools over stdio with the local browser
    Serve,

    /// Serve the scrape tools over stdio, forwarding calls to a scrape API
    ServeRemote {
        /// Base URL of the scrape API
        #[arg(long)]
        api: Option<String>,
    },
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("firescrape=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false),
        )
        .init();
}

/// Cancel on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            token.cancel();
        }
    });
    cancel
}

async fn shutdown_browser() {
    let manager = BrowserManager::global();
    if !manager.is_browser_running().await {
        return;
    }
    if let Err(e) = manager.shutdown().await {
        warn!("Browser shutdown failed: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_yaml_config().context("Failed to load config")?;

    match cli.command {
        Commands::Scrape {
            url,
            formats,
            actions,
            prompt,
            no_cache,
            full,
        } => {
            let actions = match actions {
                Some(json) => parse_actions(&json)?,
                None => Vec::new(),
            };
            let max_age = if no_cache {
                Duration::ZERO
            } else {
                Duration::from_secs(config.cache.default_max_age_secs)
            };

            let mut request = ScrapeRequest::new(url)
                .with_formats(formats)
                .with_only_main_content(!full)
                .with_actions(actions)
                .with_max_cache_age(max_age);
            if let Some(prompt) = prompt {
                request = request.with_extraction_prompt(prompt);
            }

            let succeeded = run_scrape(&config, request).await;
            shutdown_browser().await;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Serve => {
            let backend = LocalBackend::new(
                local_scraper(&config),
                Duration::from_secs(config.cache.default_max_age_secs),
            );
            let served = serve_stdio(backend, cancel_on_ctrl_c()).await;
            shutdown_browser().await;
            served?;
        }
        Commands::ServeRemote { api } => {
            let api = api.unwrap_or_else(|| config.remote.api_base.clone());
            let backend = RemoteBackend::new(
                api,
                Duration::from_secs(config.remote.request_timeout_secs),
            )?;
            info!("Forwarding tool calls to {}", backend.api_base());
            serve_stdio(backend, cancel_on_ctrl_c()).await?;
        }
    }

    Ok(())
}

/// Print one scrape; returns whether it succeeded
async fn run_scrape(config: &Config, request: ScrapeRequest) -> bool {
    let started = Instant::now();
    let result = local_scraper(config).scrape(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    if !result.success {
        eprintln!(
            "Error scraping {}: {}",
            result.url,
            result.error.as_deref().unwrap_or("unknown error")
        );
        return false;
    }

    if let Some(markdown) = &result.markdown {
        println!("{markdown}");
    }
    if let Some(html) = result.html.as_ref().or(result.raw_html.as_ref()) {
        println!("{html}");
    }
    if let Some(json) = &result.json {
        match serde_json::to_string_pretty(json) {
            Ok(pretty) => println!("\n{pretty}"),
            Err(_) => println!("\n{json}"),
        }
    }
    if let Some(links) = &result.links {
        println!("\nLinks ({}):", links.len());
        for link in links {
            println!("- [{}]({})", link.text, link.url);
        }
    }
    if let Some(path) = &result.screenshot_path {
        println!("\nScreenshot: {path}");
    }
    if let Some(outcomes) = &result.action_outcomes {
        for path in &outcomes.screenshot_paths {
            println!("Action screenshot: {path}");
        }
        for snapshot in &outcomes.snapshots {
            println!("\nSnapshot of {}:\n{}", snapshot.url, snapshot.html);
        }
    }

    println!(
        "\n--- [{}] {:.1}s | {} ---",
        if result.from_cache { "CACHE" } else { "LIVE" },
        elapsed,
        result.title().unwrap_or("untitled")
    );
    true
}
