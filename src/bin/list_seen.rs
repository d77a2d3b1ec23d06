use std::path::PathBuf;

use clap::Parser;
use itertools::Itertools;
use toi_review_watcher::config::Config;

/// Prints every record in the seen store, sorted by title.
#[derive(Parser)]
struct Opts {
    #[arg(default_value = "config.toml")]
    config_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    let config = Config::load(opts.config_path)?;
    let seen = config.seen_store().load()?;

    for record in seen.iter().sorted_by(|a, b| {
        (a.title(), a.display_rating()).cmp(&(b.title(), b.display_rating()))
    }) {
        println!(
            "{:>4}  {}  ({})  {}",
            record.numeric_rating(),
            record.title(),
            record.display_rating(),
            record.link()
        );
    }
    println!("{} records", seen.len());

    Ok(())
}
