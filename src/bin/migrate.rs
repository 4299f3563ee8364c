// ─────────────────────────────────────────────────────────────────────────────
//  Database Migration Tool
//
//  Creates the graph tables (accounts, hotspots, payments, poc_receipts,
//  follower_info) before the follower is started.
//
//  In the name of Allah, the Most Gracious, the Most Merciful.
// ─────────────────────────────────────────────────────────────────────────────
use std::path::PathBuf;

use clap::Parser;
use tabi::config::load_config;
use tabi::error::Result;
use tabi::storage::migration::Migrator;
use tabi::storage::postgres::make_postgres_pool;
use tabi::tracing::setup_tracing;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "migrate", about = "Apply database migrations")]
struct Args {
    #[arg(long, default_value = "Config.toml")]
    config: PathBuf,

    /// Only report whether the schema is current
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args.config)?;
    let _guards = setup_tracing("migrate", &config.logging)?;

    let pool = make_postgres_pool("migrate", &config.storage_postgres).await?;
    let migrator = Migrator::new(pool);

    if args.check {
        let current = migrator.check_schema_version().await?;
        info!("migrate::schema_current::{}", current);
        if !current {
            std::process::exit(1);
        }
        return Ok(());
    }

    migrator.run_migrations().await?;
    info!("migrate::completed");
    Ok(())
}
