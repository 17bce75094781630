//! End-to-end tests: the real client stack against real `td-test-server`
//! child processes over stdio.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};

use td_domain::config::ServerSpec;
use td_mcp_client::SessionManager;

fn live_spec(name: &str, label: &str) -> ServerSpec {
    ServerSpec {
        name: name.into(),
        command: env!("CARGO_BIN_EXE_td-test-server").into(),
        args: vec!["--label".into(), label.into()],
        env: BTreeMap::new(),
    }
}

fn dead_spec(name: &str) -> ServerSpec {
    ServerSpec {
        name: name.into(),
        command: "td-no-such-server".into(),
        args: vec![],
        env: BTreeMap::new(),
    }
}

fn manager_for(specs: Vec<ServerSpec>) -> SessionManager {
    SessionManager::new(Arc::new(move || specs.clone()))
}

fn error_field(text: &str) -> Option<String> {
    serde_json::from_str::<Value>(text)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}

#[tokio::test]
async fn dead_server_does_not_block_live_ones() {
    let manager = manager_for(vec![dead_spec("dead"), live_spec("live", "live")]);
    let session = manager.get_or_create().await;

    // Only the live server's tools are present.
    assert_eq!(session.tool_count(), 3);
    let names: Vec<String> = session
        .tools()
        .into_iter()
        .map(|spec| spec.function.name)
        .collect();
    assert!(names.contains(&"echo".to_string()));
    assert!(names.contains(&"search".to_string()));
    assert!(names.contains(&"sleep".to_string()));

    let text = session.call("echo", json!({ "text": "hello" })).await;
    assert_eq!(text, "hello");

    session.close();
}

#[tokio::test]
async fn unknown_tool_comes_back_as_error_text() {
    let manager = manager_for(vec![live_spec("live", "live")]);
    let session = manager.get_or_create().await;

    let text = session.call("no_such_tool", json!({})).await;
    let error = error_field(&text).expect("error-shaped JSON");
    assert!(error.contains("not found"));
    assert!(error.contains("no_such_tool"));

    session.close();
}

#[tokio::test]
async fn duplicate_tool_names_go_to_the_later_configured_server() {
    let manager = manager_for(vec![
        live_spec("first", "first"),
        live_spec("second", "second"),
    ]);
    let session = manager.get_or_create().await;

    // Both servers advertise the same three names; each name survives
    // exactly once.
    assert_eq!(session.tool_count(), 3);

    // The later entry in configuration order owns the name, no matter
    // which server finished connecting first.
    let text = session.call("search", json!({ "query": "rust" })).await;
    assert_eq!(text, "second: results for 'rust'");

    session.close();
}

#[tokio::test]
async fn unchanged_config_reuses_the_session() {
    let manager = manager_for(vec![live_spec("live", "live")]);

    let first = manager.get_or_create().await;
    let second = manager.get_or_create().await;
    assert!(Arc::ptr_eq(&first, &second));

    first.close();
}

#[tokio::test]
async fn config_change_rebuilds_the_session() {
    let config = Arc::new(Mutex::new(vec![live_spec("live", "before")]));
    let source = Arc::clone(&config);
    let manager = SessionManager::new(Arc::new(move || source.lock().clone()));

    let before = manager.get_or_create().await;
    let text = before.call("search", json!({ "query": "x" })).await;
    assert_eq!(text, "before: results for 'x'");

    *config.lock() = vec![live_spec("live", "after")];

    let after = manager.get_or_create().await;
    assert!(!Arc::ptr_eq(&before, &after));
    assert_ne!(before.fingerprint(), after.fingerprint());

    let text = after.call("search", json!({ "query": "x" })).await;
    assert_eq!(text, "after: results for 'x'");

    after.close();
}

#[tokio::test]
async fn reload_reconnects_even_with_identical_config() {
    let manager = manager_for(vec![live_spec("live", "live")]);

    let first = manager.get_or_create().await;
    manager.reload().await;
    let second = manager.get_or_create().await;

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.fingerprint(), second.fingerprint());

    // The fresh session is fully functional.
    let text = second.call("echo", json!({ "text": "again" })).await;
    assert_eq!(text, "again");

    second.close();
}

#[tokio::test]
async fn calls_after_close_report_unavailable() {
    let manager = manager_for(vec![live_spec("live", "live")]);
    let session = manager.get_or_create().await;

    session.close();
    // Give the connection task time to observe the cancellation.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let text = session.call("echo", json!({ "text": "late" })).await;
    let error = error_field(&text).expect("error-shaped JSON");
    assert!(error.contains("unavailable"));
}

#[tokio::test]
async fn close_lets_the_in_flight_call_finish() {
    let manager = manager_for(vec![live_spec("live", "live")]);
    let session = manager.get_or_create().await;

    let in_flight = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.call("sleep", json!({ "millis": 500 })).await })
    };

    // Let the call reach the server before closing.
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.close();

    let text = in_flight.await.expect("call task completes");
    assert_eq!(text, "slept 500ms");
}
