//! Video CMS adapter for the JSON "videolist" API most resource sites expose.
//!
//! Queries `GET {api}?ac=videolist&wd={query}` and maps each entry of the
//! returned `list` array onto a [`ResultRecord`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::SearchError;
use crate::http;
use crate::provider::Provider;
use crate::types::{parse_year, ResultRecord, UNKNOWN_YEAR};

/// Separator between play sources inside `vod_play_url`.
const PLAY_SOURCE_SEPARATOR: &str = "$$$";

/// Adapter for a single CMS endpoint.
#[derive(Debug, Clone)]
pub struct CmsProvider {
    key: String,
    name: String,
    api: Url,
    client: reqwest::Client,
}

impl CmsProvider {
    /// Create an adapter for the CMS API at `api`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `api` is not a valid URL, or
    /// [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        api: &str,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let api = Url::parse(api)
            .map_err(|e| SearchError::Config(format!("invalid provider api {api}: {e}")))?;
        Ok(Self {
            key: key.into(),
            name: name.into(),
            api,
            client: http::build_client(timeout)?,
        })
    }

    fn search_url(&self, query: &str) -> Url {
        let mut url = self.api.clone();
        url.query_pairs_mut()
            .append_pair("ac", "videolist")
            .append_pair("wd", query);
        url
    }
}

#[async_trait]
impl Provider for CmsProvider {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Vec<ResultRecord>, SearchError> {
        tracing::trace!(provider = %self.key, query, "CMS search");

        let response = self
            .client
            .get(self.search_url(query))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("{} request failed: {e}", self.key)))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("{} HTTP error: {e}", self.key)))?;

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Http(format!("{} response read failed: {e}", self.key)))?;

        tracing::trace!(provider = %self.key, bytes = body.len(), "CMS response received");

        parse_cms_json(&body, &self.key, &self.name)
    }
}

#[derive(Debug, Deserialize)]
struct CmsResponse {
    #[serde(default)]
    list: Option<Vec<CmsItem>>,
}

#[derive(Debug, Deserialize)]
struct CmsItem {
    #[serde(default)]
    vod_id: Value,
    #[serde(default)]
    vod_name: Option<String>,
    #[serde(default)]
    vod_year: Option<Value>,
    #[serde(default)]
    vod_pic: Option<String>,
    #[serde(default)]
    vod_play_url: Option<String>,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    vod_douban_id: Option<Value>,
}

/// Parse a CMS `videolist` response body.
///
/// Entries without an id or a title are skipped. Extracted as a separate
/// function for testability with canned JSON.
pub(crate) fn parse_cms_json(
    body: &str,
    key: &str,
    name: &str,
) -> Result<Vec<ResultRecord>, SearchError> {
    let response: CmsResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("{key} returned invalid JSON: {e}")))?;

    let records = response
        .list
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            let id = scalar_to_string(&item.vod_id)?;
            let title = item.vod_name.as_deref().map(str::trim).unwrap_or_default();
            if title.is_empty() {
                return None;
            }
            Some(ResultRecord {
                id,
                source: key.to_owned(),
                source_name: name.to_owned(),
                title: title.to_owned(),
                year: item
                    .vod_year
                    .as_ref()
                    .and_then(scalar_to_string)
                    .as_deref()
                    .and_then(extract_year)
                    .unwrap_or_else(|| UNKNOWN_YEAR.to_owned()),
                episodes: item
                    .vod_play_url
                    .as_deref()
                    .map(parse_episodes)
                    .unwrap_or_default(),
                poster: item.vod_pic.filter(|p| !p.trim().is_empty()),
                douban_id: item.vod_douban_id.as_ref().and_then(parse_douban_id),
                type_name: item.type_name.filter(|t| !t.trim().is_empty()),
            })
        })
        .collect();

    Ok(records)
}

/// Episode URLs from the first play source of a `vod_play_url` field.
///
/// Episodes are `#`-separated `label$url` pairs; entries without a `$` are
/// taken verbatim.
fn parse_episodes(play_url: &str) -> Vec<String> {
    let first = play_url
        .split(PLAY_SOURCE_SEPARATOR)
        .next()
        .unwrap_or_default();
    first
        .split('#')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let url = entry.rsplit_once('$').map_or(entry, |(_, url)| url).trim();
            (!url.is_empty()).then(|| url.to_owned())
        })
        .collect()
}

/// First run of exactly four digits in a free-form year field.
fn extract_year(raw: &str) -> Option<String> {
    raw.as_bytes()
        .windows(4)
        .enumerate()
        .find(|(start, window)| {
            let bounded_left = *start == 0 || !raw.as_bytes()[start - 1].is_ascii_digit();
            let bounded_right = raw
                .as_bytes()
                .get(start + 4)
                .is_none_or(|b| !b.is_ascii_digit());
            window.iter().all(u8::is_ascii_digit) && bounded_left && bounded_right
        })
        .and_then(|(start, _)| parse_year(&raw[start..start + 4]))
        .map(|year| year.to_string())
}

fn parse_douban_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "code": 1,
        "list": [
            {
                "vod_id": 42,
                "vod_name": " Foo ",
                "vod_year": "2020",
                "vod_pic": "https://img.example/foo.jpg",
                "vod_play_url": "EP1$https://v.example/1.m3u8#EP2$https://v.example/2.m3u8$$$HD$https://alt.example/1",
                "type_name": "Drama",
                "vod_douban_id": "1234567"
            },
            {
                "vod_id": "abc",
                "vod_name": "Bar",
                "vod_year": "",
                "vod_play_url": "Full$https://v.example/bar.m3u8",
                "vod_douban_id": 0
            },
            { "vod_id": "", "vod_name": "No id" },
            { "vod_id": 7, "vod_name": "   " }
        ]
    }"#;

    #[test]
    fn parses_entries_into_records() {
        let records = parse_cms_json(SAMPLE, "alpha", "Alpha").expect("parse");
        assert_eq!(records.len(), 2);

        let foo = &records[0];
        assert_eq!(foo.id, "42");
        assert_eq!(foo.source, "alpha");
        assert_eq!(foo.source_name, "Alpha");
        assert_eq!(foo.title, "Foo");
        assert_eq!(foo.year, "2020");
        assert_eq!(
            foo.episodes,
            vec!["https://v.example/1.m3u8", "https://v.example/2.m3u8"]
        );
        assert_eq!(foo.poster.as_deref(), Some("https://img.example/foo.jpg"));
        assert_eq!(foo.douban_id, Some(1_234_567));
        assert_eq!(foo.type_name.as_deref(), Some("Drama"));

        let bar = &records[1];
        assert_eq!(bar.id, "abc");
        assert_eq!(bar.year, UNKNOWN_YEAR);
        assert_eq!(bar.episode_count(), 1);
        assert!(bar.douban_id.is_none());
    }

    #[test]
    fn missing_list_yields_no_records() {
        let records = parse_cms_json(r#"{"code":1,"list":null}"#, "a", "A").expect("parse");
        assert!(records.is_empty());
        let records = parse_cms_json(r#"{"code":1}"#, "a", "A").expect("parse");
        assert!(records.is_empty());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_cms_json("<html>blocked</html>", "alpha", "Alpha").unwrap_err();
        assert!(matches!(err, SearchError::Parse(_)));
        assert!(err.to_string().contains("alpha"));
    }

    #[test]
    fn extract_year_finds_bounded_four_digit_run() {
        assert_eq!(extract_year("2019").as_deref(), Some("2019"));
        assert_eq!(extract_year("2019-05-01").as_deref(), Some("2019"));
        assert_eq!(extract_year("aired 1998").as_deref(), Some("1998"));
        assert_eq!(extract_year("12345"), None);
        assert_eq!(extract_year(""), None);
    }

    #[test]
    fn episodes_without_label_are_kept() {
        assert_eq!(
            parse_episodes("https://a/1#https://a/2"),
            vec!["https://a/1", "https://a/2"]
        );
        assert!(parse_episodes("").is_empty());
    }

    #[test]
    fn numeric_year_field_is_accepted() {
        let body = r#"{"list":[{"vod_id":1,"vod_name":"N","vod_year":2001}]}"#;
        let records = parse_cms_json(body, "a", "A").expect("parse");
        assert_eq!(records[0].year, "2001");
    }

    #[test]
    fn search_url_carries_query_parameters() {
        let provider =
            CmsProvider::new("alpha", "Alpha", "https://cms.example/api.php/provide/vod", Duration::from_secs(1))
                .expect("provider");
        let url = provider.search_url("foo bar");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("ac".into(), "videolist".into())));
        assert!(pairs.contains(&("wd".into(), "foo bar".into())));
    }

    #[test]
    fn invalid_api_url_rejected() {
        let err = CmsProvider::new("a", "A", "not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }
}
