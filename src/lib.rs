pub mod address;
pub mod aggregate;
pub mod args;
pub mod errors;
pub mod extract;
pub mod header;
pub mod mbox;
pub mod output;
pub mod result;
pub mod utils;

pub use address::Address;
pub use aggregate::{AggregationResult, Aggregator, SenderStats, UnresolvedPolicy};
pub use args::Args;
pub use errors::AppError;
pub use extract::{extract_archive, ExtractOptions, Extraction, RunSummary};
pub use header::{parse, MessageRecord, ParseOutcome, UnresolvedReason};
