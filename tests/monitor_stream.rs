//! Realtime monitor against a scripted websocket endpoint.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use xipoll_bridge::config::MonitorConfig;
use xipoll_bridge::monitor::{
    MonitorEvent, PaintEvent, RealtimeMonitor, StreamStatus, SUBSCRIBE_MESSAGE,
};

mod common;

fn tx_frame(hash: &str, function: &str, kwargs: Value) -> String {
    let payload = json!({
        "payload": {
            "contract": "con_pixel",
            "function": function,
            "kwargs": kwargs,
            "sender": "alice"
        }
    });
    let tx = STANDARD.encode(hex::encode(payload.to_string()));
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "events": { "tx.hash": [hash] },
            "data": { "value": { "TxResult": { "tx": tx } } }
        }
    })
    .to_string()
}

fn monitor_config(ws_url: String) -> MonitorConfig {
    MonitorConfig {
        ws_url,
        contract: "con_pixel".to_string(),
        designated_method: "paint".to_string(),
        reconnect_initial_ms: 100,
        reconnect_multiplier: 2.0,
        reconnect_max_ms: 1_000,
        report_status: true,
        ..MonitorConfig::default()
    }
}

#[tokio::test]
async fn test_stream_decodes_dedups_and_reconnects() {
    let (ws_url, connections) = common::start_ws_server(|n| match n {
        0 => vec![
            tx_frame("H1", "paint", json!({ "x": 3, "y": "4", "color": "#FF0000" })),
            tx_frame("H1", "paint", json!({ "x": 3, "y": "4", "color": "#FF0000" })),
            tx_frame("H2", "vote", json!({ "poll_id": 1, "option_id": 2 })),
        ],
        1 => vec![
            tx_frame("H1", "paint", json!({ "x": 3, "y": "4", "color": "#FF0000" })),
            tx_frame("H3", "create_poll", json!({ "title": "Lunch" })),
        ],
        _ => Vec::new(),
    })
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = RealtimeMonitor::spawn(monitor_config(ws_url), tx);

    let mut events = Vec::new();
    let mut delays = Vec::new();
    while delays.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("monitor stalled")
            .expect("monitor stopped early");
        match event {
            MonitorEvent::Status(StreamStatus::Reconnecting { delay }) => delays.push(delay),
            MonitorEvent::Status(_) => {}
            other => events.push(other),
        }
    }

    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        MonitorEvent::Paint(PaintEvent {
            x: 3.0,
            y: 4.0,
            color: "#ff0000".to_string(),
            sender: Some("alice".to_string()),
            tx_hash: Some("H1".to_string()),
        })
    );
    match (&events[1], &events[2]) {
        (MonitorEvent::ContractTx(vote), MonitorEvent::ContractTx(create)) => {
            assert_eq!(vote.function, "vote");
            assert_eq!(vote.kwargs["option_id"], 2);
            assert_eq!(create.tx_hash.as_deref(), Some("H3"));
        }
        other => panic!("unexpected events {:?}", other),
    }

    // Productive sessions reset the schedule; the empty third one does not.
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(100),
            Duration::from_millis(200)
        ]
    );

    let reconnected =
        common::wait_until(Duration::from_secs(2), || connections.lock().unwrap().len() >= 4).await;
    assert!(reconnected);
    {
        let log = connections.lock().unwrap();
        assert!(log
            .iter()
            .all(|c| c.first_message.as_deref() == Some(SUBSCRIBE_MESSAGE)));
        assert!(log[3].accepted_at - log[2].accepted_at >= Duration::from_millis(200));
    }

    handle.stop().await;
    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    assert_eq!(last, Some(MonitorEvent::Status(StreamStatus::Stopped)));
}

#[tokio::test]
async fn test_status_events_suppressed_by_default() {
    let (ws_url, _connections) = common::start_ws_server(|n| {
        if n == 0 {
            vec![tx_frame("H9", "vote", json!({ "poll_id": 1 }))]
        } else {
            Vec::new()
        }
    })
    .await;

    let config = MonitorConfig {
        report_status: false,
        ..monitor_config(ws_url)
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = RealtimeMonitor::spawn(config, tx);

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    assert!(matches!(
        first,
        Some(MonitorEvent::ContractTx(ref event)) if event.tx_hash.as_deref() == Some("H9")
    ));

    handle.stop().await;
    assert_eq!(rx.recv().await, None);
}
