//! Grep the Sonar https study. Same record shape as the http study plus the
//! certificate subject; unlike `hgrep` the search is exact-case by default.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sonarsift::matcher::WordMatcher;
use sonarsift::pipeline::{self, Config, Mode};

#[derive(Parser, Debug, Clone)]
struct Args {
    /// Word to grep for in the decoded payload
    #[arg(short, long, default_value = "")]
    word: String,
    /// Ignore case (off by default for this study)
    #[arg(short, long, default_value_t = false, action = clap::ArgAction::Set)]
    ignore_case: bool,
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
    let matcher = WordMatcher::new(&args.word, args.ignore_case)?;

    pipeline::run(
        Config {
            mode: Mode::Word { matcher },
            queue_depth: args.queue_depth,
            stats_every: args.stats_every,
        },
        std::io::stdin(),
        Box::new(std::io::stdout()),
    )
    .await?;
    Ok(())
}
