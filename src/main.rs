use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use log::{error, info, warn};
use toi_review_watcher::{
    api::{reqwest_client, ReviewClient},
    config::Config,
    run::{watch, RunOptions, RunReport},
};

/// Notifies about well-rated movie reviews that have not been seen before.
#[derive(Parser)]
struct Opts {
    #[arg(default_value = "config.toml")]
    config_path: PathBuf,
    /// Log the notifications instead of sending them, and do not remember anything.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    match watch_once(&opts).await {
        Ok(report) if report.is_clean() => {
            info!("Done: {report:?}");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            warn!("Finished with failures: {report:?}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn watch_once(opts: &Opts) -> anyhow::Result<RunReport> {
    let config = Config::load(&opts.config_path)?;
    config.validate()?;
    info!("Loaded the configuration from {:?}", opts.config_path);

    let client = reqwest_client(config.request_timeout())?;
    let notifier = config.notifier(client.clone())?;

    let store = config.seen_store();
    let options = RunOptions {
        base_url: &config.base_url,
        sources: &config.sources,
        threshold: config.threshold,
        retry: config.notify.retry(),
        dry_run: opts.dry_run,
    };
    watch(&options, &ReviewClient::new(client), &notifier, &store).await
}
