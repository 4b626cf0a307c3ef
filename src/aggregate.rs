use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::hash::Hash;

use crate::address::Address;
use crate::header::ParseOutcome;
use crate::utils::format_timestamp;

/// A map that iterates and serializes in first-insertion order.
#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K: Clone + Eq + Hash, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    /// Returns the value for `key`, appending `default()` at the end first if absent.
    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.index.insert(key.clone(), slot);
                self.entries.push((key, default()));
                slot
            }
        };
        &mut self.entries[slot].1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }
}

impl<K: Clone + Eq + Hash, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for OrderedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Serialize, V: Serialize> Serialize for OrderedMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SenderStats {
    pub n_mails: u32,
    #[serde(serialize_with = "serialize_dates")]
    pub dates: Vec<NaiveDateTime>,
}

impl SenderStats {
    fn new() -> Self {
        Self {
            n_mails: 0,
            dates: Vec::new(),
        }
    }

    fn record(&mut self, date: NaiveDateTime) {
        self.n_mails += 1;
        self.dates.push(date);
    }
}

fn serialize_dates<S: Serializer>(dates: &[NaiveDateTime], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(dates.len()))?;
    for date in dates {
        seq.serialize_element(&format_timestamp(date))?;
    }
    seq.end()
}

/// receiver -> sender -> stats, both levels in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregationResult {
    receivers: OrderedMap<Address, OrderedMap<Address, SenderStats>>,
}

impl AggregationResult {
    pub fn get(&self, receiver: &Address, sender: &Address) -> Option<&SenderStats> {
        self.receivers.get(receiver).and_then(|senders| senders.get(sender))
    }

    pub fn receivers(&self) -> impl Iterator<Item = (&Address, &OrderedMap<Address, SenderStats>)> {
        self.receivers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Distinct senders across every receiver, in first-seen order.
    pub fn senders(&self) -> Vec<&Address> {
        let mut seen = OrderedMap::new();
        for (_, senders) in self.receivers.iter() {
            for sender in senders.keys() {
                seen.get_or_insert_with(sender, || ());
            }
        }
        seen.keys().copied().collect()
    }

    pub fn total_mails(&self) -> u64 {
        self.receivers
            .iter()
            .flat_map(|(_, senders)| senders.iter())
            .map(|(_, stats)| u64::from(stats.n_mails))
            .sum()
    }
}

/// What to do with messages for which neither sender nor receivers resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UnresolvedPolicy {
    /// Count them under (unknown, unknown)
    #[default]
    Bucket,
    /// Leave them out of the report
    Drop,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    result: AggregationResult,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one (receiver, sender) fact. Calling twice for the same
    /// message counts it twice.
    pub fn ingest(&mut self, receiver: Address, sender: Address, date: NaiveDateTime) {
        self.result
            .receivers
            .get_or_insert_with(receiver, OrderedMap::new)
            .get_or_insert_with(sender, SenderStats::new)
            .record(date);
    }

    /// One fact per receiver, all sharing the sender and date.
    pub fn expand(&mut self, sender: &Address, receivers: &[Address], date: NaiveDateTime) {
        for receiver in receivers {
            self.ingest(receiver.clone(), sender.clone(), date);
        }
    }

    /// Folds a parse outcome in. Returns the number of facts ingested.
    pub fn ingest_outcome(
        &mut self,
        outcome: &ParseOutcome,
        date: NaiveDateTime,
        policy: UnresolvedPolicy,
    ) -> usize {
        match (outcome, policy) {
            (ParseOutcome::Resolved { sender, receivers }, _) => {
                self.expand(sender, receivers, date);
                receivers.len()
            }
            (ParseOutcome::Unresolved(_), UnresolvedPolicy::Bucket) => {
                self.ingest(Address::unknown(), Address::unknown(), date);
                1
            }
            (ParseOutcome::Unresolved(_), UnresolvedPolicy::Drop) => 0,
        }
    }

    pub fn finalize(&self) -> AggregationResult {
        self.result.clone()
    }

    pub fn into_result(self) -> AggregationResult {
        self.result
    }
}

#[cfg(test)]
mod ordered_map_tests {
    use super::*;

    #[test]
    fn keeps_first_insertion_order() {
        let mut map = OrderedMap::new();
        *map.get_or_insert_with("zeta", || 0) += 1;
        *map.get_or_insert_with("alpha", || 0) += 1;
        *map.get_or_insert_with("zeta", || 0) += 1;

        assert_eq!(vec![&"zeta", &"alpha"], map.keys().collect::<Vec<_>>());
        assert_eq!(Some(&2), map.get(&"zeta"));
        assert_eq!(2, map.len());
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut map = OrderedMap::new();
        map.get_or_insert_with("b", || 1);
        map.get_or_insert_with("a", || 2);

        assert_eq!(r#"{"b":1,"a":2}"#, serde_json::to_string(&map).unwrap());
    }
}
