//! Incremental aggregation of flushed batches.
//!
//! The [`Aggregator`] owns two live views of everything a session has
//! received: the flat list in arrival order and the groups keyed by
//! [`GroupKey`]. Ingestion is append-only. Nothing already placed is ever
//! moved to another group or re-keyed.

pub mod group;

use std::collections::{HashMap, HashSet};

pub use group::{mode, AggregationGroup, GroupKey, GroupStats};

use crate::types::ResultRecord;

/// Flat and grouped collections for one session.
#[derive(Debug, Default)]
pub struct Aggregator {
    flat: Vec<ResultRecord>,
    groups: Vec<AggregationGroup>,
    index: HashMap<GroupKey, usize>,
}

impl Aggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a flushed batch into both collections.
    ///
    /// Records are appended to the flat list in batch order. Each record
    /// joins the group for its key, creating the group on first sight.
    /// Statistics are recomputed once for every group the batch touched.
    /// Returns the number of groups created by this batch.
    pub fn ingest(&mut self, batch: Vec<ResultRecord>) -> usize {
        let before = self.groups.len();
        let mut touched: HashSet<usize> = HashSet::new();

        for record in batch {
            let key = GroupKey::for_record(&record);
            self.flat.push(record.clone());
            match self.index.get(&key) {
                Some(&slot) => {
                    self.groups[slot].push(record);
                    touched.insert(slot);
                }
                None => {
                    let slot = self.groups.len();
                    self.index.insert(key.clone(), slot);
                    self.groups.push(AggregationGroup::new(key, record));
                }
            }
        }

        for slot in touched {
            self.groups[slot].refresh();
        }

        let created = self.groups.len() - before;
        tracing::debug!(
            records = self.flat.len(),
            groups = self.groups.len(),
            created,
            "batch ingested"
        );
        created
    }

    /// Every record, in arrival order.
    pub fn records(&self) -> &[ResultRecord] {
        &self.flat
    }

    /// Every group, in creation order.
    pub fn groups(&self) -> &[AggregationGroup] {
        &self.groups
    }

    /// Look up a group by key.
    pub fn group(&self, key: &GroupKey) -> Option<&AggregationGroup> {
        self.index.get(key).map(|&slot| &self.groups[slot])
    }

    /// Number of records ingested.
    pub fn len(&self) -> usize {
        self.flat.len()
    }

    /// Whether nothing has been ingested yet.
    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, title: &str, year: &str, episodes: usize) -> ResultRecord {
        ResultRecord {
            id: format!("{source}-{title}"),
            source: source.into(),
            source_name: source.to_uppercase(),
            title: title.into(),
            year: year.into(),
            episodes: (0..episodes).map(|i| i.to_string()).collect(),
            poster: None,
            douban_id: None,
            type_name: None,
        }
    }

    #[test]
    fn groups_by_title_year_and_kind() {
        let mut agg = Aggregator::new();
        let created = agg.ingest(vec![
            record("a", "Foo", "2020", 1),
            record("b", "Foo", "2020", 1),
            record("a", "Foo", "2020", 10),
            record("a", "Foo", "2021", 1),
        ]);
        assert_eq!(created, 3);
        assert_eq!(agg.len(), 4);

        let key = GroupKey::for_record(&record("x", "Foo", "2020", 1));
        let group = agg.group(&key).expect("movie group");
        assert_eq!(group.len(), 2);
        assert_eq!(group.stats().source_names, vec!["A", "B"]);
    }

    #[test]
    fn flat_list_keeps_arrival_order_across_batches() {
        let mut agg = Aggregator::new();
        agg.ingest(vec![record("a", "One", "2020", 1)]);
        agg.ingest(vec![record("b", "Two", "2020", 1), record("c", "Three", "", 1)]);
        let titles: Vec<&str> = agg.records().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
    }

    #[test]
    fn later_batches_join_existing_groups() {
        let mut agg = Aggregator::new();
        assert_eq!(agg.ingest(vec![record("a", "Foo", "2020", 3)]), 1);
        assert_eq!(agg.ingest(vec![record("b", "F oo", "2020", 5)]), 0);
        assert_eq!(agg.groups().len(), 1);
        let group = &agg.groups()[0];
        assert_eq!(group.len(), 2);
        assert_eq!(group.representative().source, "a");
    }

    #[test]
    fn empty_batch_changes_nothing() {
        let mut agg = Aggregator::new();
        assert_eq!(agg.ingest(vec![]), 0);
        assert!(agg.is_empty());
        assert!(agg.groups().is_empty());
    }
}
