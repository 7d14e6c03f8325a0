//! End-to-end refresh against a mocked Wikidata and a mocked LeanCloud.
//!
//! These tests verify:
//! 1. A stale history leads to a new unread item that gets saved back
//! 2. A fresh history returns the latest item and saves nothing
//! 3. A LeanCloud save failure does not hide the picked item

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lyre_core::config::{BackendConfig, SelectionConfig, WikidataConfig};
use lyre_core::{LeanCloudStore, Refresher, UserSession, WikidataClient};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sparql_response(ids: &[&str]) -> serde_json::Value {
    let bindings: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| json!({ "id": { "type": "uri", "value": format!("http://www.wikidata.org/entity/{}", id) } }))
        .collect();
    json!({ "head": { "vars": ["id"] }, "results": { "bindings": bindings } })
}

fn entity_response(id: &str, title: &str) -> serde_json::Value {
    json!({
        "entities": { id: { "type": "item", "id": id, "sitelinks": {
            "enwiki": {
                "site": "enwiki",
                "title": title,
                "badges": [],
                "url": format!("https://en.wikipedia.org/wiki/{}", title)
            }
        }}},
        "success": 1
    })
}

async fn mount_wikidata(server: &MockServer, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/sparql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sparql_response(ids)))
        .mount(server)
        .await;

    for id in ids {
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("ids", *id))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(entity_response(id, &format!("Title_{}", id))),
            )
            .mount(server)
            .await;
    }
}

fn create_refresher(wikidata: &MockServer, leancloud: &MockServer) -> Refresher {
    let source = WikidataClient::new(WikidataConfig {
        query_endpoint: format!("{}/sparql", wikidata.uri()),
        api_endpoint: format!("{}/w/api.php", wikidata.uri()),
        ..WikidataConfig::default()
    })
    .expect("Failed to create Wikidata client");

    let store = LeanCloudStore::new(BackendConfig {
        server_url: leancloud.uri(),
        app_id: "app-id".to_string(),
        app_key: "app-key".to_string(),
        session_token: String::new(),
    })
    .expect("Failed to create LeanCloud store");

    Refresher::with_rng(
        Arc::new(source),
        Arc::new(store),
        SelectionConfig::default(),
        StdRng::seed_from_u64(9),
    )
}

#[tokio::test]
async fn test_stale_history_picks_unread_and_saves() {
    let wikidata = MockServer::start().await;
    let leancloud = MockServer::start().await;
    mount_wikidata(&wikidata, &["Q6607", "Q5994"]).await;

    Mock::given(method("GET"))
        .and(path("/1.1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objectId": "u1",
            "history": [
                { "id": "Q6607", "time": { "__type": "Date", "iso": "2024-02-28T09:00:00.000Z" } }
            ]
        })))
        .mount(&leancloud)
        .await;

    Mock::given(method("PUT"))
        .and(path("/1.1/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "objectId": "u1" })))
        .expect(1)
        .mount(&leancloud)
        .await;

    let refresher = create_refresher(&wikidata, &leancloud);
    let item = refresher.refresh_token("token-1").await.unwrap();

    assert_eq!(item.id, "Q5994");
    assert_eq!(item.title.as_deref(), Some("Title_Q5994"));
    assert_eq!(
        item.url.as_deref(),
        Some("https://en.m.wikipedia.org/wiki/Title_Q5994")
    );

    let requests = leancloud.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .expect("history was not saved");
    let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
    let ids: Vec<&str> = body["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["Q6607", "Q5994"]);
    assert_eq!(body["history"][1]["time"]["__type"], "Date");
}

#[tokio::test]
async fn test_fresh_history_keeps_latest_without_saving() {
    let wikidata = MockServer::start().await;
    let leancloud = MockServer::start().await;
    mount_wikidata(&wikidata, &["Q6607", "Q5994"]).await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&leancloud)
        .await;

    Mock::given(method("GET"))
        .and(path("/sparql"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .with_priority(1)
        .mount(&wikidata)
        .await;

    let refresher = create_refresher(&wikidata, &leancloud);
    let mut session = UserSession::from_user_object(
        json!({
            "objectId": "u1",
            "history": [
                { "id": "Q5994", "time": { "__type": "Date", "iso": "2024-03-01T08:00:00.000Z" } },
                { "id": "Q6607", "time": { "__type": "Date", "iso": "2024-03-01T11:00:00.000Z" } }
            ]
        }),
        "token-1",
    )
    .unwrap();

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let first = refresher.refresh_at(&mut session, now).await.unwrap();
    let second = refresher.refresh_at(&mut session, now).await.unwrap();

    assert_eq!(first.id, "Q6607");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_save_failure_still_returns_item() {
    let wikidata = MockServer::start().await;
    let leancloud = MockServer::start().await;
    mount_wikidata(&wikidata, &["Q6607"]).await;

    Mock::given(method("GET"))
        .and(path("/1.1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "objectId": "u1" })))
        .mount(&leancloud)
        .await;

    Mock::given(method("PUT"))
        .and(path("/1.1/users/u1"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "code": 1,
            "error": "The service is temporarily unavailable."
        })))
        .expect(1)
        .mount(&leancloud)
        .await;

    let refresher = create_refresher(&wikidata, &leancloud);
    let item = refresher.refresh_token("token-1").await.unwrap();

    assert_eq!(item.id, "Q6607");
}
