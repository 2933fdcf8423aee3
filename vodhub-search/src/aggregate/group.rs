//! Grouping identity and per-group statistics.
//!
//! Records that share a normalised title, a year and a film/series kind
//! belong to the same [`AggregationGroup`]. A group's statistics are
//! recomputed from its whole member set, visiting members in a canonical
//! order (by source key, then provider id) so the result does not depend on
//! which provider answered first.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::Serialize;

use crate::types::{MediaKind, ResultRecord};

/// Identity of a group: `(normalized_title, year_or_unknown, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    /// Title with whitespace removed.
    pub title: String,
    /// Four-digit year or `unknown`.
    pub year: String,
    /// Film or series.
    pub kind: MediaKind,
}

impl GroupKey {
    /// Compute the key for a record. Pure function of the record.
    pub fn for_record(record: &ResultRecord) -> Self {
        Self {
            title: record.normalized_title(),
            year: record.year_or_unknown().to_owned(),
            kind: record.kind(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.title, self.year, self.kind)
    }
}

/// Statistics derived from a group's full member set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    /// Most frequent non-zero episode count; `0` when every member has none.
    pub episodes_mode: usize,
    /// Distinct provider display names, in canonical member order.
    pub source_names: Vec<String>,
    /// Most frequent positive catalog id, if any member carries one.
    pub douban_id_majority: Option<u64>,
}

impl GroupStats {
    /// Recompute statistics for `members`.
    pub fn compute(members: &[ResultRecord]) -> Self {
        let mut ordered: Vec<&ResultRecord> = members.iter().collect();
        ordered.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then_with(|| a.id.cmp(&b.id))
                .then_with(|| a.episode_count().cmp(&b.episode_count()))
                .then_with(|| a.douban_id.cmp(&b.douban_id))
                .then_with(|| a.source_name.cmp(&b.source_name))
        });

        let episodes_mode = mode(
            ordered
                .iter()
                .map(|r| r.episode_count())
                .filter(|count| *count > 0),
        )
        .unwrap_or(0);

        let douban_id_majority = mode(
            ordered
                .iter()
                .filter_map(|r| r.douban_id)
                .filter(|id| *id > 0),
        );

        let mut source_names: Vec<String> = Vec::new();
        for record in &ordered {
            if !source_names.contains(&record.source_name) {
                source_names.push(record.source_name.clone());
            }
        }

        Self {
            episodes_mode,
            source_names,
            douban_id_majority,
        }
    }
}

/// Most frequent value; ties go to the value encountered first.
pub fn mode<T>(values: impl IntoIterator<Item = T>) -> Option<T>
where
    T: Copy + Eq + Hash,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut first_seen: Vec<T> = Vec::new();
    for value in values {
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            first_seen.push(value);
        }
        *count += 1;
    }

    let mut best: Option<(T, usize)> = None;
    for value in first_seen {
        let count = counts.get(&value).copied().unwrap_or(0);
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value)
}

/// A set of records considered the same title.
///
/// Groups only grow. Membership and key never change once assigned.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationGroup {
    key: GroupKey,
    label: String,
    members: Vec<ResultRecord>,
    stats: GroupStats,
}

impl AggregationGroup {
    pub(crate) fn new(key: GroupKey, first: ResultRecord) -> Self {
        let label = key.to_string();
        let members = vec![first];
        let stats = GroupStats::compute(&members);
        Self {
            key,
            label,
            members,
            stats,
        }
    }

    pub(crate) fn push(&mut self, record: ResultRecord) {
        self.members.push(record);
    }

    pub(crate) fn refresh(&mut self) {
        self.stats = GroupStats::compute(&self.members);
    }

    /// The grouping key.
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// The key rendered as `title-year-kind`, used for tie-breaking.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Members in arrival order.
    pub fn members(&self) -> &[ResultRecord] {
        &self.members
    }

    /// The first member to arrive. Views filter and sort on it.
    pub fn representative(&self) -> &ResultRecord {
        // Groups are created with one member and never shrink.
        &self.members[0]
    }

    /// Derived statistics.
    pub fn stats(&self) -> &GroupStats {
        &self.stats
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
