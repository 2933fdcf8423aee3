//! CMS adapter against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vodhub_search::providers::CmsProvider;
use vodhub_search::{AggregateConfig, Provider, SearchError, SharedProvider};

const BODY: &str = r#"{
    "code": 1,
    "list": [
        {
            "vod_id": 1,
            "vod_name": "Foo",
            "vod_year": "2020",
            "vod_play_url": "HD$https://v.example/foo.m3u8",
            "type_name": "Movie"
        },
        {
            "vod_id": 2,
            "vod_name": "Foo",
            "vod_year": "2021",
            "vod_play_url": "1$https://v.example/1.m3u8#2$https://v.example/2.m3u8"
        }
    ]
}"#;

fn provider_for(server: &MockServer, key: &str) -> CmsProvider {
    let api = format!("{}/api.php/provide/vod", server.uri());
    CmsProvider::new(key, key.to_uppercase(), &api, Duration::from_secs(2)).expect("provider")
}

#[tokio::test]
async fn search_sends_videolist_query_and_parses_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api.php/provide/vod"))
        .and(query_param("ac", "videolist"))
        .and(query_param("wd", "Foo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, "alpha");
    let records = provider.search("Foo").await.expect("search");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source, "alpha");
    assert_eq!(records[0].source_name, "ALPHA");
    assert_eq!(records[0].episode_count(), 1);
    assert_eq!(records[1].episode_count(), 2);
}

#[tokio::test]
async fn server_error_is_reported_as_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = provider_for(&server, "beta");
    let err = provider.search("Foo").await.expect_err("should fail");
    assert!(matches!(err, SearchError::Http(_)));
}

#[tokio::test]
async fn fan_out_isolates_a_broken_provider() {
    let good = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
        .mount(&good)
        .await;

    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&broken)
        .await;

    let providers: Vec<SharedProvider> = vec![
        Arc::new(provider_for(&good, "good")),
        Arc::new(provider_for(&broken, "broken")),
    ];
    let report = vodhub_search::search("Foo", providers, &AggregateConfig::default())
        .await
        .expect("search");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].source, "broken");
    assert_eq!(report.progress.completed_sources, 2);
}

#[tokio::test]
async fn slow_provider_times_out_without_blocking_others() {
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(BODY)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&slow)
        .await;

    let fast = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
        .mount(&fast)
        .await;

    let config = AggregateConfig {
        provider_timeout_seconds: 1,
        ..Default::default()
    };
    let providers: Vec<SharedProvider> = vec![
        Arc::new(provider_for(&slow, "slow")),
        Arc::new(provider_for(&fast, "fast")),
    ];
    let report = vodhub_search::search("Foo", providers, &config)
        .await
        .expect("search");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].source, "slow");
}
