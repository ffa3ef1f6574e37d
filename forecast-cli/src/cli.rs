use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use forecast_core::{
    Config, FileCache, ForecastCache, ForecastClient, Horizon, HttpTransport, NoRender, Render,
    spawn_periodic_refresh,
};
use inquire::{CustomType, Text};

use crate::render::TerminalRenderer;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Forecast client with offline fallback")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Clone, Copy)]
pub struct HorizonArg {
    /// Use the six-month forecast instead of the weekly one.
    #[arg(long)]
    pub long_term: bool,
}

impl HorizonArg {
    fn horizon(self) -> Horizon {
        if self.long_term {
            Horizon::LongTerm
        } else {
            Horizon::ShortTerm
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the backend URL and refresh interval.
    Configure {
        /// Skip the prompts and store this base URL.
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Fetch once and print the forecast.
    Show {
        #[command(flatten)]
        horizon: HorizonArg,

        /// Print the outcome as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Keep refreshing the forecast until interrupted.
    Watch {
        #[command(flatten)]
        horizon: HorizonArg,

        /// Minutes between refreshes; defaults to the configured interval.
        #[arg(long)]
        interval_mins: Option<u64>,
    },

    /// Inspect or clear the local forecast cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show when the cached forecast was fetched.
    Show {
        #[command(flatten)]
        horizon: HorizonArg,
    },
    /// Remove cached forecasts for both horizons.
    Clear,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { base_url } => configure(base_url),
            Command::Show { horizon, json } => show(horizon.horizon(), json).await,
            Command::Watch { horizon, interval_mins } => {
                watch(horizon.horizon(), interval_mins).await
            }
            Command::Cache { action } => cache(action),
        }
    }
}

fn build_client(config: &Config, render: Arc<dyn Render>) -> anyhow::Result<ForecastClient> {
    let transport = HttpTransport::new(config.base_url(), config.request_timeout())
        .context("Failed to build HTTP client")?;
    let cache = FileCache::new(config.cache_dir()?);

    Ok(ForecastClient::new(
        Arc::new(transport),
        Arc::new(cache),
        render,
        config.client_options(),
    ))
}

fn configure(base_url: Option<String>) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    match base_url {
        Some(url) => config.base_url = Some(url),
        None => {
            let url = Text::new("Forecast backend URL:")
                .with_default(config.base_url())
                .prompt()
                .context("Failed to read backend URL")?;

            let minutes = CustomType::<u64>::new("Refresh interval (minutes):")
                .with_default(config.refresh_interval().as_secs() / 60)
                .with_error_message("Please enter a whole number of minutes")
                .prompt()
                .context("Failed to read refresh interval")?;

            config.base_url = Some(url.trim().to_string());
            config.refresh_interval_mins = Some(minutes);
        }
    }

    config.validate()?;
    config.save()?;

    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(horizon: Horizon, json: bool) -> anyhow::Result<()> {
    let config = Config::load()?;

    let render: Arc<dyn Render> = if json {
        Arc::new(NoRender)
    } else {
        Arc::new(TerminalRenderer::new(horizon))
    };
    let client = build_client(&config, render)?;

    let outcome = client.fetch_forecast(horizon).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let Some(notice) = &outcome.notice {
        println!("\n{notice}");
    }

    Ok(())
}

async fn watch(horizon: Horizon, interval_mins: Option<u64>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(minutes) = interval_mins {
        config.refresh_interval_mins = Some(minutes);
        config.validate()?;
    }

    let client = build_client(&config, Arc::new(TerminalRenderer::new(horizon)))?;
    let handle = spawn_periodic_refresh(client, horizon, config.refresh_interval());

    println!(
        "Refreshing every {} min. Press Ctrl-C to stop.",
        config.refresh_interval().as_secs() / 60
    );
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;

    handle.shutdown().await;
    Ok(())
}

fn cache(action: CacheAction) -> anyhow::Result<()> {
    let config = Config::load()?;
    let cache = FileCache::new(config.cache_dir()?);

    match action {
        CacheAction::Show { horizon } => {
            let horizon = horizon.horizon();
            match cache.load(horizon)? {
                Some(entry) => {
                    let fetched = entry
                        .fetched_at()
                        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "an unknown time".to_string());
                    let fresh = entry.is_fresh(chrono::Utc::now(), config.cache_max_age());
                    println!(
                        "{horizon}: {} day(s) fetched at {fetched} ({})",
                        entry.data.len(),
                        if fresh { "fresh" } else { "too old to serve" }
                    );
                }
                None => println!("{horizon}: nothing cached in {}", cache.dir().display()),
            }
        }
        CacheAction::Clear => {
            for horizon in Horizon::all() {
                cache.clear(*horizon)?;
            }
            println!("Cleared cached forecasts in {}", cache.dir().display());
        }
    }

    Ok(())
}
