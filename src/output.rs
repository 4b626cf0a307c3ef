use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::aggregate::AggregationResult;
use crate::errors::AppError;
use crate::result::AppResult;

fn output_error(e: anyhow::Error) -> AppError {
    AppError::Output(format!("{:#}", e))
}

pub fn write_json_file(result: &AggregationResult, path: &Path) -> AppResult<()> {
    File::create(path)
        .with_context(|| format!("Failed to create JSON output file {:?}", path))
        .and_then(|file| {
            write_json(result, &mut BufWriter::new(file))
                .with_context(|| format!("Failed to write JSON output file {:?}", path))
        })
        .map_err(output_error)?;

    info!(action = "write", component = "json_output", path = ?path, "Wrote JSON report");
    Ok(())
}

pub fn write_json<W: Write>(result: &AggregationResult, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, result)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// One distinct sender per line, in first-seen order.
pub fn write_senders<W: Write>(result: &AggregationResult, writer: &mut W) -> Result<()> {
    for sender in result.senders() {
        writeln!(writer, "{}", sender)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn print_json(result: &AggregationResult) -> AppResult<()> {
    let stdout = std::io::stdout();
    write_json(result, &mut stdout.lock())
        .context("Failed to print JSON report")
        .map_err(output_error)
}

pub fn print_senders(result: &AggregationResult) -> AppResult<()> {
    let stdout = std::io::stdout();
    write_senders(result, &mut stdout.lock())
        .context("Failed to print sender list")
        .map_err(output_error)
}
