//! GraphQL state access and reconciliation against a mock indexer.

use std::sync::Arc;

use serde_json::{json, Value};
use xipoll_bridge::config::{GraphQlConfig, ReconcilerConfig};
use xipoll_bridge::state::{GraphQlClient, StateError, StateReconciler, StateSource};

mod common;

fn edges(entries: &[(&str, Value)]) -> String {
    let edges: Vec<Value> = entries
        .iter()
        .map(|(key, value)| json!({ "node": { "key": key, "value": value } }))
        .collect();
    json!({ "data": { "allStates": { "edges": edges } } }).to_string()
}

fn client(addr: std::net::SocketAddr) -> GraphQlClient {
    GraphQlClient::new(&GraphQlConfig {
        url: format!("http://{}/graphql", addr),
        page_size: 2,
        timeout_secs: 2,
    })
}

/// Indexer holding three polls, a counter and one vote by alice.
fn indexer(request: &common::MockRequest) -> (u16, String) {
    let body = request.json();
    let variables = &body["variables"];

    if let Some(key) = variables["key"].as_str() {
        return match key {
            "con_t.user_votes:alice:2" => (200, edges(&[(key, json!({ "option_id": 1 }))])),
            _ => (200, edges(&[])),
        };
    }

    let offset = variables["offset"].as_u64().unwrap_or(0);
    let page = match (variables["prefix"].as_str().unwrap_or_default(), offset) {
        ("con_t.poll_counter", 0) => vec![
            ("con_t.poll_counter", json!("3")),
            ("con_t.poll_counter_legacy", json!("9")),
        ],
        ("con_t.polls:", 0) => vec![
            (
                "con_t.polls:1",
                json!({
                    "id": 1,
                    "title": "Lunch",
                    "options": ["Pizza", "Tacos"],
                    "creator": "alice",
                    "end_date": "2000-01-01 00:00:00"
                }),
            ),
            (
                "con_t.polls:2",
                Value::String(
                    json!({
                        "id": 2,
                        "title": "Venue",
                        "options": [{ "id": 1, "text": "Park", "votes": 4 }],
                        "total_votes": 4,
                        "end_date": "2999-01-01T00:00:00Z"
                    })
                    .to_string(),
                ),
            ),
        ],
        ("con_t.polls:", 2) => vec![("con_t.polls:3", json!({ "id": 3 }))],
        ("con_t.user_votes:", 0) => vec![("con_t.user_votes:alice:2", json!({ "option_id": 1 }))],
        _ => Vec::new(),
    };
    (200, edges(&page))
}

#[tokio::test]
async fn test_prefix_scan_stops_on_short_page() {
    let (addr, log) = common::start_programmable_backend(indexer).await;

    let entries = client(addr).scan_prefix("con_t.polls:").await.unwrap();
    let keys: Vec<&str> = entries.iter().map(|entry| entry.key.as_str()).collect();
    assert_eq!(keys, vec!["con_t.polls:1", "con_t.polls:2", "con_t.polls:3"]);

    let requests = log.lock().unwrap();
    let offsets: Vec<u64> = requests
        .iter()
        .map(|request| request.json()["variables"]["offset"].as_u64().unwrap())
        .collect();
    assert_eq!(offsets, vec![0, 2]);
    assert!(requests
        .iter()
        .all(|request| request.method == "POST" && request.path() == "/graphql"));
    assert_eq!(requests[0].json()["variables"]["first"], 2);
}

#[tokio::test]
async fn test_prefix_scan_ends_when_offset_is_ignored() {
    let (addr, log) = common::start_programmable_backend(|_| {
        let page = [("con_t.polls:1", json!({ "id": 1 })), ("con_t.polls:2", json!({ "id": 2 }))];
        (200, edges(&page))
    })
    .await;

    let entries = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        client(addr).scan_prefix("con_t.polls:"),
    )
    .await
    .expect("scan terminates")
    .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_point_lookup() {
    let (addr, _log) = common::start_programmable_backend(indexer).await;
    let client = client(addr);

    assert_eq!(
        client.get_state("con_t.user_votes:alice:2").await.unwrap(),
        Some(json!({ "option_id": 1 }))
    );
    assert_eq!(client.get_state("con_t.user_votes:bob:2").await.unwrap(), None);
}

#[tokio::test]
async fn test_graphql_errors_are_reported() {
    let (addr, _log) = common::start_programmable_backend(|_| {
        (
            200,
            json!({
                "data": null,
                "errors": [{ "message": "bad filter" }, { "message": "try again" }]
            })
            .to_string(),
        )
    })
    .await;

    match client(addr).scan_prefix("con_t.polls:").await {
        Err(StateError::GraphQl(message)) => assert_eq!(message, "bad filter; try again"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_is_transport() {
    let (addr, _log) = common::start_programmable_backend(|_| (500, "{}".to_string())).await;

    let err = client(addr).get_state("con_t.poll_counter").await.unwrap_err();
    assert!(matches!(err, StateError::Transport(_)));
}

#[tokio::test]
async fn test_reconciler_builds_snapshot_from_indexer() {
    let (addr, _log) = common::start_programmable_backend(indexer).await;
    let config = ReconcilerConfig {
        contract: "con_t".to_string(),
        user: Some("alice".to_string()),
        ..ReconcilerConfig::default()
    };
    let reconciler = StateReconciler::new(Arc::new(client(addr)), &config);

    let snapshot = reconciler.refresh().await.unwrap();
    assert_eq!(snapshot.poll_counter, 3);
    assert_eq!(snapshot.user.as_deref(), Some("alice"));

    let ids: Vec<u64> = snapshot.polls.iter().map(|poll| poll.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let lunch = &snapshot.polls[0];
    assert_eq!(lunch.title, "Lunch");
    assert_eq!(lunch.options.len(), 2);
    assert!(!lunch.is_active);
    assert_eq!(lunch.user_choice, None);

    let venue = &snapshot.polls[1];
    assert!(venue.is_active);
    assert_eq!(venue.total_votes, 4);
    assert_eq!(venue.user_choice, Some(1));
    assert_eq!(venue.creator, "Unknown");

    assert_eq!(snapshot.polls[2].title, "Untitled Poll");
    assert_eq!(reconciler.user_vote("alice", 2).await.unwrap(), Some(1));

    // A local vote shows immediately and is superseded by the next cycle.
    reconciler.record_local_vote(1, 2);
    assert_eq!(reconciler.view()[0].user_choice, Some(2));
    reconciler.refresh().await.unwrap();
    assert_eq!(reconciler.view()[0].user_choice, None);
}
