//! Filter the Sonar UDP study by source subnet. Records whose source address
//! falls inside any block of the subnets file are dumped to stdout. Without a
//! subnets file nothing ever matches; that is the documented behavior, not an
//! accident.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sonarsift::matcher::SubnetList;
use sonarsift::pipeline::{self, Config, Mode};

#[derive(Parser, Debug, Clone)]
struct Args {
    /// File with subnets of interest, newline-separated CIDR blocks
    #[arg(short = 'i', long)]
    subnets_file: Option<String>,
    /// Lines buffered between reader and filter worker
    #[arg(long, default_value_t = 1000)]
    queue_depth: usize,
    /// Stats interval seconds
    #[arg(long, default_value_t = 30)]
    stats_every: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let subnets = match args.subnets_file.as_deref() {
        Some(path) => SubnetList::load(path)?,
        None => SubnetList::empty(),
    };
    if subnets.is_empty() {
        tracing::warn!("no subnets configured, no record will match");
    }

    pipeline::run(
        Config {
            mode: Mode::Subnet { subnets },
            queue_depth: args.queue_depth,
            stats_every: args.stats_every,
        },
        std::io::stdin(),
        Box::new(std::io::stdout()),
    )
    .await?;
    Ok(())
}
