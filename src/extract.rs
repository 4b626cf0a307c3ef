use rayon::prelude::*;
use std::io::BufRead;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::aggregate::{AggregationResult, Aggregator, UnresolvedPolicy};
use crate::header::{self, MessageRecord, ParseOutcome};
use crate::mbox::MboxSource;
use crate::result::AppResult;

const BATCH_SIZE: usize = 512;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub messages_read: usize,
    pub entries_skipped: usize,
    pub unresolved: usize,
    pub partial: usize,
    pub dropped: usize,
    pub facts_ingested: usize,
}

#[derive(Debug)]
pub struct Extraction {
    pub result: AggregationResult,
    pub summary: RunSummary,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractOptions {
    pub workers: Option<usize>,
    pub unresolved: UnresolvedPolicy,
}

pub fn extract_archive(path: &Path, options: ExtractOptions) -> AppResult<Extraction> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "extraction", path = ?path, "Starting archive extraction");

    let source = MboxSource::open(path)?;
    let extraction = extract_from_source(source, options)?;

    info!(
        action = "complete",
        component = "extraction",
        messages_read = extraction.summary.messages_read,
        entries_skipped = extraction.summary.entries_skipped,
        unresolved = extraction.summary.unresolved,
        partial = extraction.summary.partial,
        dropped = extraction.summary.dropped,
        facts_ingested = extraction.summary.facts_ingested,
        duration_ms = total_start_time.elapsed().as_millis(),
        "Extraction completed"
    );

    Ok(extraction)
}

/// Reads the whole source, parsing each batch in parallel and folding the
/// outcomes in stream order so the result does not depend on the worker count.
pub fn extract_from_source<R: BufRead>(
    mut source: MboxSource<R>,
    options: ExtractOptions,
) -> AppResult<Extraction> {
    let workers = options.workers.unwrap_or_else(|| {
        let cpu_count = num_cpus::get();
        std::cmp::min(cpu_count, 8)
    });
    info!(action = "configure", component = "extraction", worker_count = workers, "Using workers for header parsing");

    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;

    let mut aggregator = Aggregator::new();
    let mut summary = RunSummary::default();
    let mut batch: Vec<MessageRecord> = Vec::with_capacity(BATCH_SIZE);

    while let Some(entry) = source.read_record()? {
        match entry {
            Ok(record) => batch.push(record),
            Err(e) => {
                summary.entries_skipped += 1;
                warn!(action = "skip", component = "mbox_source", error = %e, "Skipping unreadable archive entry");
            }
        }

        if batch.len() >= BATCH_SIZE {
            drain_batch(&pool, &mut batch, &mut aggregator, &mut summary, options.unresolved);
        }
    }
    drain_batch(&pool, &mut batch, &mut aggregator, &mut summary, options.unresolved);

    info!(
        action = "read",
        component = "mbox_source",
        entries = source.entries_read(),
        "Finished reading archive"
    );

    Ok(Extraction {
        result: aggregator.into_result(),
        summary,
    })
}

fn drain_batch(
    pool: &rayon::ThreadPool,
    batch: &mut Vec<MessageRecord>,
    aggregator: &mut Aggregator,
    summary: &mut RunSummary,
    policy: UnresolvedPolicy,
) {
    // collect() keeps stream order
    let outcomes: Vec<ParseOutcome> = pool.install(|| batch.par_iter().map(header::parse).collect());
    for (record, outcome) in batch.iter().zip(&outcomes) {
        fold(aggregator, summary, record, outcome, policy);
    }
    batch.clear();
}

fn fold(
    aggregator: &mut Aggregator,
    summary: &mut RunSummary,
    record: &MessageRecord,
    outcome: &ParseOutcome,
    policy: UnresolvedPolicy,
) {
    summary.messages_read += 1;

    match outcome {
        ParseOutcome::Unresolved(reason) => {
            summary.unresolved += 1;
            warn!(
                action = "unresolved",
                component = "header_parser",
                reason = ?reason,
                date = %record.sent_date,
                "Could not resolve sender or receivers"
            );
        }
        resolved if resolved.is_partial() => {
            summary.partial += 1;
            warn!(
                action = "partial",
                component = "header_parser",
                date = %record.sent_date,
                "Substituted unknown for an unresolved side"
            );
        }
        _ => {}
    }

    let ingested = aggregator.ingest_outcome(outcome, record.sent_date, policy);
    if ingested == 0 {
        summary.dropped += 1;
    }
    summary.facts_ingested += ingested;
}
