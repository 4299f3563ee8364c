// ─────────────────────────────────────────────────────────────────────────────
//  Tabi — Chain Follower
//
//  Tabi (تابع): "The One Who Follows" — walks the chain block by block and
//  mirrors accounts, hotspots, payments and proof-of-coverage receipts into a
//  graph store, resuming exactly where it left off.
//
//  Designed to follow patiently, never skip, never duplicate.
//
//  In the name of Allah, the Most Gracious, the Most Merciful.
// ─────────────────────────────────────────────────────────────────────────────
use std::path::PathBuf;

use clap::Parser;
use tabi::engine::Tabi;
use tabi::error::Result;

#[derive(Debug, Parser)]
#[command(name = "tabi", about = "Follow the chain into the graph store")]
struct Args {
    /// Path to the TOML configuration
    #[arg(long, default_value = "Config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    Tabi::run(&args.config).await
}
