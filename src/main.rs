//! Thin reference CLI driver: loads configuration and a wallet directory,
//! runs one swap campaign, and writes a run report. The orchestration core
//! lives in the library; this binary is not the general-purpose front-end
//! (spec §1 Non-goals).

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wallet_swap_orchestrator::config::SwapConfig;
#[cfg(feature = "live")]
use wallet_swap_orchestrator::manager::{CancellationToken, WalletSwapManager};
#[cfg(feature = "live")]
use wallet_swap_orchestrator::reporting::RunReport;
use wallet_swap_orchestrator::wallet::JsonFileWalletStore;

/// Single-tenant reference driver: the wallet store isn't namespaced by
/// caller, so every run uses the same nominal user id.
const LOCAL_USER_ID: &str = "local";

#[derive(Parser, Debug)]
#[command(about = "Run a multi-wallet swap campaign against the upstream exchange API")]
struct Cli {
    /// Directory containing parent.json and children.json wallet files.
    #[arg(long)]
    wallet_dir: PathBuf,

    /// Base URL of the upstream exchange API (requires the `live` feature).
    #[arg(long)]
    api_base_url: String,

    /// Directory to write the run report (report.json/.csv/.yaml) into.
    #[arg(long, default_value = "./report")]
    report_dir: PathBuf,
}

#[cfg(feature = "live")]
fn build_api(base_url: &str) -> wallet_swap_orchestrator::exchange_api::http::HttpExchangeApi {
    wallet_swap_orchestrator::exchange_api::http::HttpExchangeApi::new(base_url)
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("failed to create EnvFilter");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_line_number(true))
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = SwapConfig::load().context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    info!(wallet_dir = %cli.wallet_dir.display(), "loading wallet set");
    let wallet_store = JsonFileWalletStore::new(cli.wallet_dir.clone());
    let wallets = wallet_store
        .load_wallet_set(LOCAL_USER_ID)
        .await
        .context("loading wallet set")?;
    info!(children = wallets.children.len(), "wallet set loaded");

    if wallets.children.is_empty() {
        warn!("no child wallets found, nothing to do");
        return Ok(());
    }

    #[cfg(not(feature = "live"))]
    {
        let _ = cli.api_base_url;
        return Err(anyhow::anyhow!(
            "this binary was built without the `live` feature; rebuild with --features live,cli"
        ));
    }

    #[cfg(feature = "live")]
    {
        let api = build_api(&cli.api_base_url);
        let manager = WalletSwapManager::new(&api);
        let cancellation = CancellationToken::new();

        info!("starting swap campaign");
        let summary = manager.run(&config, &wallets, cancellation).await?;
        info!(
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            "swap campaign finished"
        );

        let report = RunReport::new(config, summary, chrono::Utc::now());
        std::fs::create_dir_all(&cli.report_dir).context("creating report directory")?;
        report.write_json(cli.report_dir.join("report.json"))?;
        report.write_csv(cli.report_dir.join("report.csv"))?;
        report.write_yaml(cli.report_dir.join("report.yaml"))?;
        println!("{}", report.format_markdown());
    }

    Ok(())
}
