use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tactile_browser::{
    AttachPolicy, BrowserDriver, InputConfig, InputDispatcher, Offset, OffsetSource, RemoteHandle,
};
use tracing_subscriber::EnvFilter;

/// tactile-probe -- inspect and poke elements of a live Chrome page.
#[derive(Parser, Debug)]
#[command(name = "tactile-probe", version, about)]
struct Cli {
    /// DevTools WebSocket URL of the page target
    #[arg(long, env = "TACTILE_WS_URL")]
    ws_url: String,

    /// TOML file with input timeouts and pacing
    #[arg(long)]
    config: Option<PathBuf>,

    /// Retry while the element is not rendered yet
    #[arg(long)]
    wait_attached: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the element's box model and clickable point as JSON
    Inspect {
        selector: String,

        /// Offset from the element's top-left corner, as "x,y"
        #[arg(long)]
        offset: Option<String>,
    },

    /// Click the element
    Click {
        selector: String,

        #[arg(long)]
        offset: Option<String>,

        /// Number of clicks (2 for a double click)
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Focus the element and press a key
    Press { selector: String, key: String },

    /// Focus the element and type text into it
    Type { selector: String, text: String },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<InputConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(InputConfig::from_toml(&content)?)
        }
        None => Ok(InputConfig::default()),
    }
}

fn parse_offset(raw: Option<&str>) -> anyhow::Result<OffsetSource> {
    let Some(raw) = raw else {
        return Ok(OffsetSource::Absent);
    };
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| anyhow::anyhow!("offset must look like \"x,y\", got {raw:?}"))?;
    let x: f64 = x.trim().parse().context("offset x is not a number")?;
    let y: f64 = y.trim().parse().context("offset y is not a number")?;
    Ok(Offset::new(x, y)?.into())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with env filter (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let driver = Arc::new(
        BrowserDriver::connect(&cli.ws_url, &config)
            .await
            .with_context(|| format!("failed to attach to {}", cli.ws_url))?,
    );
    tracing::info!(url = %cli.ws_url, "attached to page");

    let policy = if cli.wait_attached {
        AttachPolicy::WaitForAttached
    } else {
        AttachPolicy::FailFast
    };
    let dispatcher = InputDispatcher::new(driver.clone(), driver.clone(), config)
        .with_attach_policy(policy);

    let selector = match &cli.command {
        Commands::Inspect { selector, .. }
        | Commands::Click { selector, .. }
        | Commands::Press { selector, .. }
        | Commands::Type { selector, .. } => selector.clone(),
    };
    let handle = driver.require_selector(&selector).await?;

    let outcome = run(&cli.command, &driver, &dispatcher, &handle).await;
    driver.dispose(&handle).await?;
    outcome
}

async fn run(
    command: &Commands,
    driver: &BrowserDriver,
    dispatcher: &InputDispatcher,
    handle: &RemoteHandle,
) -> anyhow::Result<()> {
    let cancel = driver.cancel_signal();

    match command {
        Commands::Inspect { offset, .. } => {
            let offset = parse_offset(offset.as_deref())?;
            let model = dispatcher.box_model(handle).await?;
            let report = dispatcher.clickable_point(handle, offset, &cancel).await?;
            let output = serde_json::json!({
                "handle": handle.to_string(),
                "box_model": model,
                "bounding_box": model.map(|m| m.bounding_box()),
                "clickable_point": report.point,
                "attempts": report.attempts,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Click { offset, count, .. } => {
            let offset = parse_offset(offset.as_deref())?;
            let options = tactile_browser::ClickOptions {
                click_count: *count,
                ..dispatcher.default_click_options()
            };
            let report = dispatcher.click(handle, &options, offset, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Press { key, .. } => {
            let report = dispatcher.press(handle, key, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Type { text, .. } => {
            let report = dispatcher.type_into(handle, text, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
