//! Core types: the uniform result record every provider adapter produces.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Sentinel year for records whose release year is not known.
pub const UNKNOWN_YEAR: &str = "unknown";

/// One candidate match from one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Provider-scoped identifier.
    pub id: String,
    /// Provider key.
    pub source: String,
    /// Provider display name.
    pub source_name: String,
    /// Title as reported by the provider.
    pub title: String,
    /// Four-digit year, or [`UNKNOWN_YEAR`].
    #[serde(default = "unknown_year")]
    pub year: String,
    /// Ordered episode descriptors. Its length is the episode count.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub episodes: Vec<String>,
    /// Poster URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// External catalog id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub douban_id: Option<u64>,
    /// Free-text category, consumed only by the content pre-filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

fn unknown_year() -> String {
    UNKNOWN_YEAR.to_owned()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Whether a record looks like a film or a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Exactly one episode.
    Movie,
    /// Zero or several episodes.
    Tv,
}

impl MediaKind {
    /// Classify by episode count.
    pub fn from_episode_count(count: usize) -> Self {
        if count == 1 {
            Self::Movie
        } else {
            Self::Tv
        }
    }

    /// Returns the lowercase name used in group keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ResultRecord {
    /// Number of episodes.
    pub fn episode_count(&self) -> usize {
        self.episodes.len()
    }

    /// Film or series, derived from the episode count.
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_episode_count(self.episode_count())
    }

    /// The year as an integer, or `None` for the sentinel, empty, or anything
    /// that is not a four-digit number.
    pub fn year_value(&self) -> Option<u16> {
        parse_year(&self.year)
    }

    /// The trimmed year, or [`UNKNOWN_YEAR`] for anything [`parse_year`]
    /// rejects. Grouping, filtering and ordering all read the year through
    /// this.
    pub fn year_or_unknown(&self) -> &str {
        match self.year_value() {
            Some(_) => self.year.trim(),
            None => UNKNOWN_YEAR,
        }
    }

    /// Title with all whitespace removed.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    /// Whether the title equals the query after trimming.
    pub fn is_exact_match(&self, query: &str) -> bool {
        let query = query.trim();
        !query.is_empty() && self.title.trim() == query
    }
}

/// Fan-out progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Number of providers queried.
    pub total_sources: usize,
    /// Providers that have answered, successfully or not.
    pub completed_sources: usize,
}

impl Progress {
    /// Progress for a fan-out that has not heard back from anyone yet.
    pub fn new(total_sources: usize) -> Self {
        Self {
            total_sources,
            completed_sources: 0,
        }
    }

    /// Whether every provider has been accounted for.
    pub fn is_complete(&self) -> bool {
        self.completed_sources >= self.total_sources
    }
}

/// Parse a four-digit year string.
pub fn parse_year(raw: &str) -> Option<u16> {
    let raw = raw.trim();
    if raw.len() != 4 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Strip every whitespace character from a title.
pub fn normalize_title(title: &str) -> String {
    title.chars().filter(|c| !c.is_whitespace()).collect()
}
