//! ABOUTME: CLI surface for the p8fs-daemon binary — a thin dispatcher over the worker roles
//! ABOUTME: Global `--config` resolves through `p8fs_config::P8fsConfig::discover_and_load`/`load_from_file`

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "p8fs-daemon", about = "Storage-event ingest, dreaming, and REM worker roles")]
pub struct Cli {
    /// Path to a `p8fs.toml` config file. Falls back to the standard search
    /// path list, then built-in defaults with environment overrides.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the ingest worker and dreaming scheduler until interrupted.
    Serve,
    /// Drain every currently-queued ingest event once, then exit.
    IngestOnce,
    /// Run one dreaming tick (`six-hour` or `daily`) for one tenant, then exit.
    DreamingTick {
        #[arg(long)]
        tenant_id: String,
        #[arg(long, value_enum, default_value = "six-hour")]
        cadence: Cadence,
    },
    /// Evaluate one REM query against a tenant and print the JSON result.
    Query {
        #[arg(long)]
        tenant_id: String,
        #[arg(long)]
        default_table: String,
        query: String,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Cadence {
    SixHour,
    Daily,
}
