//! One pass: scrape every source, keep what is new and good enough,
//! notify about it and remember it.
//!
//! Notification and persistence are separate side effects.  A record whose
//! notification succeeded but whose append failed (or a crash in between)
//! is notified again on the next run.

use std::collections::HashSet;

use anyhow::Context;
use itertools::Itertools;
use joinery::JoinableIterator;
use log::{debug, error, info};
use scraper::Html;
use url::Url;

use crate::{
    api::ListingFetcher,
    differ::diff,
    extract::{self, listing_url},
    filter::filter_by_threshold,
    notify::{send_with_retry, Note, Notifier, RetryPolicy},
    record::{Rating, Record},
    seen_store::SeenStore,
};

pub struct RunOptions<'a> {
    pub base_url: &'a Url,
    pub sources: &'a [String],
    pub threshold: Rating,
    pub retry: RetryPolicy,
    /// Log instead of notifying, and leave the seen store untouched.
    pub dry_run: bool,
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct RunReport {
    pub sources_processed: usize,
    pub sources_failed: usize,
    pub candidates: usize,
    pub rating_parse_failures: usize,
    pub new_records: usize,
    pub notified: usize,
    pub notify_failures: usize,
    pub persist_failures: usize,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.sources_failed == 0
            && self.rating_parse_failures == 0
            && self.notify_failures == 0
            && self.persist_failures == 0
    }
}

/// Checks the notifier's credentials, then runs one pass.
/// A rejected credential ends the pass before any listing is fetched.
pub async fn watch<F, N>(
    options: &RunOptions<'_>,
    fetcher: &F,
    notifier: &N,
    store: &SeenStore,
) -> anyhow::Result<RunReport>
where
    F: ListingFetcher,
    N: Notifier,
{
    notifier
        .verify()
        .await
        .context("The notifier could not be set up.  Quitting.")?;
    run(options, fetcher, notifier, store).await
}

pub async fn run<F, N>(
    options: &RunOptions<'_>,
    fetcher: &F,
    notifier: &N,
    store: &SeenStore,
) -> anyhow::Result<RunReport>
where
    F: ListingFetcher,
    N: Notifier,
{
    let mut report = RunReport::default();

    // Page order is kept so that notifications go out in listing order.
    let mut candidates = vec![];
    for source in options.sources {
        match collect_source(options, fetcher, source, &mut report).await {
            Ok(records) => {
                report.sources_processed += 1;
                candidates.extend(records);
            }
            Err(e) => {
                error!("Failed to process source {source:?}: {e:#}");
                report.sources_failed += 1;
            }
        }
    }
    let candidates = candidates.into_iter().unique().collect_vec();
    report.candidates = candidates.len();
    let candidate_set: HashSet<_> = candidates.iter().cloned().collect();

    let seen = store
        .load()
        .with_context(|| format!("While loading {:?}", store.path()))?;

    debug!(
        "Candidates: {}",
        candidates.iter().map(Record::title).join_with(", ")
    );
    debug!("Seen: {}", seen.iter().map(Record::title).join_with(", "));

    let new = diff(&candidate_set, &seen);
    report.new_records = new.len();
    if new.is_empty() {
        info!("No new movies this time.  Check back another time.");
        return Ok(report);
    }

    for record in candidates.iter().filter(|r| new.contains(*r)) {
        let note = Note::for_record(record);
        if options.dry_run {
            info!("[dry run] Would notify: {} / {}", note.title, note.body);
            continue;
        }
        match send_with_retry(notifier, &note, options.retry).await {
            Ok(()) => {
                info!("{} sent to the notifier", record.title());
                report.notified += 1;
            }
            Err(e) => {
                // Not remembered, so that the next run tries again.
                error!("Failed to notify about {record}: {e}");
                report.notify_failures += 1;
                continue;
            }
        }
        match store.append(record) {
            Ok(()) => info!("Added {} to the seen store", record.title()),
            Err(e) => {
                error!("Failed to remember {record}: {e}");
                report.persist_failures += 1;
            }
        }
    }

    Ok(report)
}

async fn collect_source<F: ListingFetcher>(
    options: &RunOptions<'_>,
    fetcher: &F,
    source: &str,
    report: &mut RunReport,
) -> anyhow::Result<Vec<Record>> {
    let url = listing_url(options.base_url, source)
        .with_context(|| format!("Invalid source {source:?}"))?;
    info!("Processing {url}");
    let body = fetcher.fetch(&url).await?;
    let entries = extract::parse(&Html::parse_document(&body), &url)?;

    let mut records = vec![];
    for entry in entries {
        match entry.clone().into_record() {
            Ok(Some(record)) => records.push(record),
            Ok(None) => debug!("Dropping incomplete entry {entry:?}"),
            Err(e) => {
                error!("Cannot read the rating of {entry:?}: {e}");
                report.rating_parse_failures += 1;
            }
        }
    }

    let matched = filter_by_threshold(records, options.threshold).collect_vec();
    for record in &matched {
        info!("{record} matches the threshold");
    }
    Ok(matched)
}
