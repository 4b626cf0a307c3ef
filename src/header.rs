use chrono::NaiveDateTime;

use crate::address::{extract_addresses, Address};

pub const SENDER_FIELDS: &[&str] = &["From"];
pub const RECIPIENT_FIELDS: &[&str] = &["To", "Cc"];

/// One archived message as handed over by a message source.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub raw_header: Option<String>,
    pub sent_date: NaiveDateTime,
    pub fallback_sender: Option<Address>,
    pub fallback_receivers: Option<Vec<Address>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    MissingHeader,
    MalformedHeader,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Resolved {
        sender: Address,
        receivers: Vec<Address>,
    },
    Unresolved(UnresolvedReason),
}

impl ParseOutcome {
    /// True when one side of a resolved outcome fell back to the sentinel.
    pub fn is_partial(&self) -> bool {
        match self {
            ParseOutcome::Resolved { sender, receivers } => {
                sender.is_unknown() || receivers.iter().any(Address::is_unknown)
            }
            ParseOutcome::Unresolved(_) => false,
        }
    }
}

/// Splits a raw header block into `(name, value)` pairs, joining folded
/// continuation lines onto the field they belong to. Lines that are neither
/// a field nor a continuation are skipped.
pub fn unfold_fields(raw_header: &str) -> Vec<(&str, String)> {
    let mut fields: Vec<(&str, String)> = Vec::new();
    let mut in_field = false;

    for line in raw_header.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(' ') || line.starts_with('\t') {
            if let (true, Some((_, value))) = (in_field, fields.last_mut()) {
                let continuation = line.trim();
                if !continuation.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(continuation);
                }
            }
            continue;
        }

        match line.split_once(':') {
            Some((name, value)) if is_field_name(name) => {
                fields.push((name, value.trim().to_string()));
                in_field = true;
            }
            _ => in_field = false,
        }
    }

    fields
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

fn values_named<'f>(
    fields: &'f [(&'f str, String)],
    names: &'f [&'f str],
) -> impl Iterator<Item = &'f str> + 'f {
    fields
        .iter()
        .filter(move |(name, _)| names.iter().any(|wanted| name.eq_ignore_ascii_case(wanted)))
        .map(|(_, value)| value.as_str())
}

/// Joined values of every occurrence of the named fields, in header order.
pub fn field_values(raw_header: &str, names: &[&str]) -> Vec<String> {
    let fields = unfold_fields(raw_header);
    values_named(&fields, names).map(String::from).collect()
}

/// Derives the (sender, receivers) pair for one message.
pub fn parse(record: &MessageRecord) -> ParseOutcome {
    let fallback_sender = record.fallback_sender.clone();
    let fallback_receivers = record
        .fallback_receivers
        .as_ref()
        .filter(|receivers| !receivers.is_empty())
        .map(|receivers| dedup(receivers.clone()));

    let raw_header = match record.raw_header.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => {
            return match (fallback_sender, fallback_receivers) {
                (Some(sender), Some(receivers)) => ParseOutcome::Resolved { sender, receivers },
                _ => ParseOutcome::Unresolved(UnresolvedReason::MissingHeader),
            };
        }
    };

    let fields = unfold_fields(raw_header);
    let values_of = |wanted: &[&str]| {
        values_named(&fields, wanted)
            .flat_map(extract_addresses)
            .collect::<Vec<Address>>()
    };

    let sender = values_of(SENDER_FIELDS).into_iter().next().or(fallback_sender);

    let scanned_receivers = dedup(values_of(RECIPIENT_FIELDS));
    let receivers = if scanned_receivers.is_empty() {
        fallback_receivers.unwrap_or_default()
    } else {
        scanned_receivers
    };

    match (sender, receivers.is_empty()) {
        (None, true) => ParseOutcome::Unresolved(UnresolvedReason::MalformedHeader),
        (sender, empty) => ParseOutcome::Resolved {
            sender: sender.unwrap_or_else(Address::unknown),
            receivers: if empty { vec![Address::unknown()] } else { receivers },
        },
    }
}

fn dedup(addresses: Vec<Address>) -> Vec<Address> {
    let mut unique: Vec<Address> = Vec::with_capacity(addresses.len());
    for address in addresses {
        if !unique.contains(&address) {
            unique.push(address);
        }
    }
    unique
}
