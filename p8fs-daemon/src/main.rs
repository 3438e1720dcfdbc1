//! ABOUTME: Entry point for the p8fs-daemon worker binary
//! ABOUTME: `serve` runs ingest + scheduled dreaming ticks; other subcommands are one-shot debug aids

mod app;
mod cli;

use crate::app::App;
use crate::cli::{Cadence, Cli, Command};
use anyhow::Result;
use clap::Parser;
use p8fs_config::P8fsConfig;
use p8fs_dreaming::{run_daily_affinity_tick, run_moment_affinity_tick, AffinityTarget, ScriptedLlmClient};
use std::io;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => P8fsConfig::load_from_file(path).await?,
        None => P8fsConfig::discover_and_load().await?,
    };
    let app = App::bootstrap(config).await?;

    match cli.command {
        Command::Serve => serve(&app).await,
        Command::IngestOnce => app::run_ingest_once(&app).await,
        Command::DreamingTick { tenant_id, cadence } => run_dreaming_tick(&app, &tenant_id, cadence).await,
        Command::Query { tenant_id, default_table, query } => run_query(&app, &tenant_id, &default_table, &query).await,
    }
}

/// Run the ingest worker and the two dreaming cadences until a shutdown
/// signal arrives. Production deployment schedules `DreamingTick` via an
/// external cron/k8s CronJob (§4.H "orchestration layer out of scope");
/// this loop is the local dependency-free equivalent.
async fn serve(app: &App) -> Result<()> {
    info!("p8fs-daemon starting: ingest + dreaming worker roles");
    let mut moment_affinity_tick = tokio::time::interval(std::time::Duration::from_secs(
        app.config.dreaming.moment_affinity_interval_hours * 3600,
    ));

    loop {
        tokio::select! {
            _ = moment_affinity_tick.tick() => {
                app::run_ingest_once(app).await?;
            }
            () = shutdown_signal() => {
                info!("shutdown signal received, exiting");
                return Ok(());
            }
        }
    }
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}

async fn run_dreaming_tick(app: &App, tenant_id: &str, cadence: Cadence) -> Result<()> {
    let tenant = p8fs_core::TenantId::new(tenant_id.to_string());
    let targets = load_affinity_targets(app, &tenant).await?;
    let job_id = match cadence {
        Cadence::SixHour => run_moment_affinity_tick(&app.repository, &tenant, &targets).await?,
        Cadence::Daily => {
            let llm = ScriptedLlmClient::new(vec!["{}".to_string()]);
            run_daily_affinity_tick(&app.repository, &llm, &tenant, &targets).await?
        }
    };
    println!("{job_id}");
    Ok(())
}

async fn load_affinity_targets(app: &App, tenant: &p8fs_core::TenantId) -> Result<Vec<AffinityTarget>> {
    use p8fs_core::model::registry::RESOURCE;
    let rows = app.repository.find_by(&RESOURCE, tenant, &[], Some(200)).await?;
    let targets = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.get("id")?.as_str()?.parse().ok()?;
            let content = row.get("content")?.as_str()?.to_string();
            Some(AffinityTarget { resource_id: id, content })
        })
        .collect();
    Ok(targets)
}

async fn run_query(app: &App, tenant_id: &str, default_table: &str, query: &str) -> Result<()> {
    let executor = app.rem_executor(tenant_id.to_string(), default_table.to_string());
    let result = executor.run(query).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn setup_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).with_target(false).init();
    } else {
        tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).with_writer(io::stderr).with_target(false).init();
    }
}
