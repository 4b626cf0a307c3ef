use chrono::{DateTime, Local, NaiveDateTime};
use mail_parser::{Message, MessageParser};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::address::{extract_addresses, Address};
use crate::errors::{AppError, SourceError};
use crate::header::{field_values, MessageRecord};
use crate::result::AppResult;
use crate::utils::local_from_unix;

const SEPARATOR: &[u8] = b"From ";
const DELIVERY_FIELDS: &[&str] = &["Delivered-To", "X-Original-To"];

pub type Entry = Result<MessageRecord, SourceError>;

pub struct MboxSource<R: BufRead> {
    reader: R,
    path: PathBuf,
    pending_separator: Option<String>,
    entries_read: usize,
}

impl MboxSource<BufReader<File>> {
    pub fn open(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::ArchiveNotFound(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => AppError::ArchiveNotFound(path.to_path_buf()),
            _ => AppError::ArchiveUnreadable {
                path: path.to_path_buf(),
                source,
            },
        })?;

        info!(action = "open", component = "mbox_source", path = ?path, "Opened archive");
        Self::new(BufReader::new(file), path)
    }
}

impl<R: BufRead> MboxSource<R> {
    /// Wraps a reader positioned at the start of an mbox container. Fails
    /// when the first non-blank line is not a `From ` separator.
    pub fn new(reader: R, path: &Path) -> AppResult<Self> {
        let mut source = Self {
            reader,
            path: path.to_path_buf(),
            pending_separator: None,
            entries_read: 0,
        };

        let mut line = Vec::new();
        loop {
            line.clear();
            if source.read_line(&mut line)? == 0 {
                return Ok(source);
            }
            if is_blank(&line) {
                continue;
            }
            if line.starts_with(SEPARATOR) {
                source.pending_separator = Some(decode_line(&line));
                return Ok(source);
            }
            return Err(AppError::ArchiveUnparsable {
                path: source.path,
                reason: "first line is not a `From ` separator".to_string(),
            });
        }
    }

    pub fn entries_read(&self) -> usize {
        self.entries_read
    }

    /// Reads the next entry. `Ok(None)` at the end of the archive; the inner
    /// result carries per-entry problems that should not stop the caller.
    pub fn read_record(&mut self) -> AppResult<Option<Entry>> {
        let Some(separator) = self.pending_separator.take() else {
            return Ok(None);
        };
        self.entries_read += 1;

        let mut content = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            if self.read_line(&mut line)? == 0 {
                break;
            }
            if line.starts_with(SEPARATOR) {
                self.pending_separator = Some(decode_line(&line));
                break;
            }
            match line.strip_prefix(b">") {
                Some(rest) if rest.starts_with(SEPARATOR) => content.extend_from_slice(rest),
                _ => content.extend_from_slice(&line),
            }
        }

        Ok(Some(build_record(self.entries_read, &separator, &content)))
    }

    fn read_line(&mut self, buf: &mut Vec<u8>) -> AppResult<usize> {
        self.reader
            .read_until(b'\n', buf)
            .map_err(|source| AppError::ArchiveUnreadable {
                path: self.path.clone(),
                source,
            })
    }
}

fn build_record(index: usize, separator: &str, content: &[u8]) -> Entry {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Err(SourceError::EmptyEntry { index });
    }

    let raw_header = header_block(content);
    let parsed = MessageParser::default().parse(content);

    let sent_date = parsed
        .as_ref()
        .and_then(|message| message.date())
        .and_then(|date| local_from_unix(date.to_timestamp()))
        .or_else(|| separator_date(separator))
        .ok_or(SourceError::MissingDate { index })?;

    let fallback_sender = parsed
        .as_ref()
        .and_then(|message| message.from())
        .and_then(|from| from.first())
        .and_then(|addr| addr.address())
        .and_then(Address::normalize)
        .or_else(|| envelope_sender(separator));

    let mut receivers = parsed.as_ref().map(listed_receivers).unwrap_or_default();
    if receivers.is_empty() {
        if let Some(raw) = raw_header.as_deref() {
            receivers = field_values(raw, DELIVERY_FIELDS)
                .iter()
                .flat_map(|value| extract_addresses(value))
                .collect();
        }
    }

    Ok(MessageRecord {
        raw_header,
        sent_date,
        fallback_sender,
        fallback_receivers: (!receivers.is_empty()).then_some(receivers),
    })
}

fn listed_receivers(message: &Message) -> Vec<Address> {
    [message.to(), message.cc()]
        .into_iter()
        .flatten()
        .flat_map(|list| list.iter())
        .filter_map(|addr| addr.address())
        .filter_map(Address::normalize)
        .collect()
}

/// Text before the first empty line, or `None` when that is empty.
fn header_block(content: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(content);
    let header: Vec<&str> = text
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .take_while(|line| !line.is_empty())
        .collect();

    if header.is_empty() {
        None
    } else {
        Some(header.join("\r\n"))
    }
}

fn envelope_sender(separator: &str) -> Option<Address> {
    separator.split_whitespace().nth(1).and_then(Address::normalize)
}

/// Parses the asctime date on a separator line such as
/// `From someone@example.com Sun Jun 11 20:53:34 2023`, with or without a
/// numeric zone before the year.
fn separator_date(separator: &str) -> Option<NaiveDateTime> {
    let date = separator.trim_end().splitn(3, ' ').nth(2)?.trim();

    if let Ok(zoned) = DateTime::parse_from_str(date, "%a %b %e %H:%M:%S %z %Y") {
        return Some(zoned.with_timezone(&Local).naive_local());
    }
    NaiveDateTime::parse_from_str(date, "%a %b %e %H:%M:%S %Y").ok()
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn decode_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line).trim_end().to_string()
}
