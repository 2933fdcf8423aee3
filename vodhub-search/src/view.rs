//! Flat and grouped views over a session's live state.
//!
//! Both views take the same [`ViewFilter`] and [`SortOrder`]. Years compare
//! numerically and a record without a parseable year sorts after every
//! dated record whichever direction is selected.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationGroup;
use crate::error::SearchError;
use crate::types::{parse_year, ResultRecord};

/// Ordering mode for a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Arrival order (flat) or creation order (grouped).
    #[default]
    None,
    /// Oldest year first.
    Asc,
    /// Newest year first.
    Desc,
}

impl SortOrder {
    /// The lowercase name used in query strings and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(SearchError::Config(format!(
                "unknown sort order {other:?}, expected none, asc or desc"
            ))),
        }
    }
}

/// Exact-match filters. `None` on a field means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFilter {
    /// Provider key.
    pub source: Option<String>,
    /// Title, compared after trimming.
    pub title: Option<String>,
    /// Year string; `unknown` selects records without a year.
    pub year: Option<String>,
}

impl ViewFilter {
    /// A filter that keeps everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one provider.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Restrict to one title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Restrict to one year.
    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    /// Whether no field is restricted.
    pub fn is_all(&self) -> bool {
        self.source.is_none() && self.title.is_none() && self.year.is_none()
    }

    /// Whether `record` passes every restricted field.
    pub fn matches(&self, record: &ResultRecord) -> bool {
        if let Some(source) = &self.source {
            if record.source != *source {
                return false;
            }
        }
        if let Some(title) = &self.title {
            if record.title.trim() != title.trim() {
                return false;
            }
        }
        if let Some(year) = &self.year {
            if record.year_or_unknown() != year.trim() {
                return false;
            }
        }
        true
    }

    /// Keep the records that match, in their given order.
    pub fn apply<'a, I>(&self, records: I) -> Vec<&'a ResultRecord>
    where
        I: IntoIterator<Item = &'a ResultRecord>,
    {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Compare two optional years; a missing year is always greater.
fn compare_years(a: Option<u16>, b: Option<u16>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match order {
            SortOrder::Desc => b.cmp(&a),
            _ => a.cmp(&b),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn exact_first(a: &ResultRecord, b: &ResultRecord, query: &str) -> Ordering {
    b.is_exact_match(query).cmp(&a.is_exact_match(query))
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Desc => ordering.reverse(),
        _ => ordering,
    }
}

/// Full comparison for an explicit sort: year, then exact title match, then
/// title in the selected direction.
fn compare_records(a: &ResultRecord, b: &ResultRecord, order: SortOrder, query: &str) -> Ordering {
    compare_years(a.year_value(), b.year_value(), order)
        .then_with(|| exact_first(a, b, query))
        .then_with(|| directed(a.title.cmp(&b.title), order))
}

/// Order one incoming batch before it is buffered: exact title matches
/// first, then newest year, undated last. Stable within equal keys.
pub fn presort_batch(batch: &mut [ResultRecord], query: &str) {
    batch.sort_by(|a, b| {
        exact_first(a, b, query)
            .then_with(|| compare_years(a.year_value(), b.year_value(), SortOrder::Desc))
    });
}

/// The flat view: filtered records, in arrival order or sorted.
pub fn flat_view<'a>(
    records: &'a [ResultRecord],
    filter: &ViewFilter,
    order: SortOrder,
    query: &str,
) -> Vec<&'a ResultRecord> {
    let mut view = filter.apply(records);
    if order != SortOrder::None {
        view.sort_by(|a, b| compare_records(a, b, order, query));
    }
    view
}

/// The grouped view: groups whose representative passes the filter, in
/// creation order or sorted by representative with key as the last tie-break.
pub fn grouped_view<'a>(
    groups: &'a [AggregationGroup],
    filter: &ViewFilter,
    order: SortOrder,
    query: &str,
) -> Vec<&'a AggregationGroup> {
    let mut view: Vec<&AggregationGroup> = groups
        .iter()
        .filter(|g| filter.matches(g.representative()))
        .collect();
    if order != SortOrder::None {
        view.sort_by(|a, b| {
            let (ra, rb) = (a.representative(), b.representative());
            compare_years(ra.year_value(), rb.year_value(), order)
                .then_with(|| exact_first(ra, rb, query))
                .then_with(|| directed(a.label().cmp(b.label()), order))
        });
    }
    view
}

/// One provider entry for a filter picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceOption {
    /// Provider key, the value a [`ViewFilter`] matches on.
    pub key: String,
    /// Display name.
    pub name: String,
}

/// Distinct values present in a result set, for populating filter pickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    /// Providers, first appearance order.
    pub sources: Vec<SourceOption>,
    /// Titles, first appearance order.
    pub titles: Vec<String>,
    /// Years, newest first, `unknown` last.
    pub years: Vec<String>,
}

impl FilterOptions {
    /// Collect options from records.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ResultRecord>,
    {
        let mut options = Self::default();
        for record in records {
            if !options.sources.iter().any(|s| s.key == record.source) {
                options.sources.push(SourceOption {
                    key: record.source.clone(),
                    name: record.source_name.clone(),
                });
            }
            let title = record.title.trim();
            if !options.titles.iter().any(|t| t == title) {
                options.titles.push(title.to_owned());
            }
            let year = record.year_or_unknown();
            if !options.years.iter().any(|y| y == year) {
                options.years.push(year.to_owned());
            }
        }
        options.years.sort_by(|a, b| {
            compare_years(parse_year(a), parse_year(b), SortOrder::Desc).then_with(|| a.cmp(b))
        });
        options
    }
}
