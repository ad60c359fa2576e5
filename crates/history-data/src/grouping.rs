//! Grouping primitives shared by the aggregator and the drill-downs.
//!
//! Groups accumulate in a `BTreeMap`, so iteration is in ascending key order;
//! [`top_n`] then sorts stably by value, which makes key order the tie-break.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use history_core::models::CanonicalRecord;

/// Sum `value` per key. Records for which `key` returns `None` are ignored.
pub fn group_sum<K, F, V>(records: &[&CanonicalRecord], key: F, value: V) -> BTreeMap<K, f64>
where
    K: Ord,
    F: Fn(&CanonicalRecord) -> Option<K>,
    V: Fn(&CanonicalRecord) -> f64,
{
    let mut groups = BTreeMap::new();
    for &record in records {
        if let Some(k) = key(record) {
            *groups.entry(k).or_insert(0.0) += value(record);
        }
    }
    groups
}

/// Count records per key. Records for which `key` returns `None` are ignored.
pub fn group_count<K, F>(records: &[&CanonicalRecord], key: F) -> BTreeMap<K, u64>
where
    K: Ord,
    F: Fn(&CanonicalRecord) -> Option<K>,
{
    let mut groups = BTreeMap::new();
    for &record in records {
        if let Some(k) = key(record) {
            *groups.entry(k).or_insert(0) += 1;
        }
    }
    groups
}

/// Hours played per key.
pub fn group_hours<K, F>(records: &[&CanonicalRecord], key: F) -> BTreeMap<K, f64>
where
    K: Ord,
    F: Fn(&CanonicalRecord) -> Option<K>,
{
    group_sum(records, key, CanonicalRecord::hours_played)
}

/// All groups ordered by value, largest first; equal values keep key order.
pub fn ranked<K, V>(groups: BTreeMap<K, V>) -> Vec<(K, V)>
where
    V: PartialOrd,
{
    let mut entries: Vec<(K, V)> = groups.into_iter().collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    entries
}

/// The `n` largest groups by value, ties broken by ascending key.
pub fn top_n<K, V>(groups: BTreeMap<K, V>, n: usize) -> Vec<(K, V)>
where
    V: PartialOrd,
{
    let mut entries = ranked(groups);
    entries.truncate(n);
    entries
}

/// [`top_n`] over summed hours. Zero-hour groups are left out whenever some
/// group has hours.
pub fn top_n_listened<K>(groups: BTreeMap<K, f64>, n: usize) -> Vec<(K, f64)>
where
    K: Ord,
{
    if groups.values().any(|hours| *hours > 0.0) {
        let listened = groups.into_iter().filter(|(_, hours)| *hours > 0.0).collect();
        top_n(listened, n)
    } else {
        top_n(groups, n)
    }
}
