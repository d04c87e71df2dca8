use std::{sync::Arc, time::Duration};

use serde_json::json;
use shared::domain::{rule_codes, QueueId};

use super::*;
use crate::{
    error::ErrorCategory,
    test_support::{
        client_with, memory_store, quiet_settings, settle, status_json, FakeQueueApi,
    },
    types::{ActionResultKind, ToastKind},
};

async fn client_on_queue_one(api: &Arc<FakeQueueApi>) -> Arc<QueueClient> {
    let client = client_with(api, memory_store(), &quiet_settings());
    client.select_queue(QueueId(1), "Clinic A").await.unwrap();
    settle().await;
    client
}

fn waiting_queue(api: &FakeQueueApi) {
    api.script(
        "status:1",
        Ok(status_json(
            1,
            false,
            &[(1, "Ann Lee", "SERVED"), (2, "Bo Chen", "WAITING")],
        )),
    );
}

fn rule_violation(status: u16, message: &str, rule_code: &str) -> RequestError {
    RequestError::Status {
        status,
        message: message.to_string(),
        rule_code: Some(rule_code.to_string()),
        request_id: Some("req-engine-7".to_string()),
        validation: false,
    }
}

#[tokio::test]
async fn actions_need_a_selected_queue() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_with(&api, memory_store(), &quiet_settings());

    assert!(matches!(
        client.join("Ann Lee", false).await,
        Err(ClientError::NoQueueSelected)
    ));
    assert!(matches!(
        client.toggle_pause().await,
        Err(ClientError::NoQueueSelected)
    ));
    assert!(api.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_name_never_reaches_the_engine() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;

    let err = client.join("   ", false).await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidName(_)));
    assert!(api.calls().iter().all(|call| !call.starts_with("join")));
}

#[tokio::test(start_paused = true)]
async fn live_join_refreshes_status_and_clears_the_panel() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;
    api.script(
        "join",
        Ok(json!({"entry_id": 5, "user_name": "Ann Lee", "position": 1, "status": "WAITING"})),
    );
    api.script(
        "status:1",
        Ok(status_json(1, false, &[(5, "Ann Lee", "WAITING")])),
    );

    let outcome = client.join(" Ann Lee ", false).await.unwrap();

    assert!(!outcome.is_simulated());
    assert_eq!(outcome.live().unwrap().position, 1);
    assert_eq!(api.count("join:1:Ann Lee:live"), 1);
    assert_eq!(api.count("status:1"), 2);

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.state.waiting_count(), Some(1));
    assert_eq!(
        snapshot.state.last_request_id.as_deref(),
        Some(outcome.meta().request_id.as_str())
    );
    assert!(snapshot.state.action_in_flight.is_none());
    assert!(snapshot.action_result.is_none());
    let toast = snapshot.toast.unwrap();
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.message, "Ann Lee joined the queue!");
}

#[tokio::test(start_paused = true)]
async fn dry_run_join_reports_the_verdict_without_refreshing() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;
    api.script(
        "join",
        Ok(json!({
            "dry_run": true,
            "result": "would_fail",
            "user_name": "Ann Lee",
            "reason": "Ann Lee is already waiting in this queue.",
            "rule_code": "DUPLICATE_JOIN"
        })),
    );

    let outcome = client.join("Ann Lee", true).await.unwrap();

    assert!(outcome.is_simulated());
    assert_eq!(api.count("join:1:Ann Lee:dry"), 1);
    assert_eq!(api.count("status:1"), 1);

    let snapshot = client.snapshot().await;
    assert!(snapshot.toast.is_none());
    let panel = snapshot.action_result.unwrap();
    assert_eq!(panel.kind, ActionResultKind::Blocked);
    assert_eq!(panel.message, "Join would fail for \"Ann Lee\"");
    assert_eq!(panel.rule_code.as_deref(), Some(rule_codes::DUPLICATE_JOIN));
    assert_eq!(
        panel.reason.as_deref(),
        Some("Ann Lee is already waiting in this queue.")
    );
    assert_eq!(panel.request_id, outcome.meta().request_id);
}

#[tokio::test(start_paused = true)]
async fn serve_is_refused_locally_when_nobody_waits() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;

    assert!(matches!(
        client.serve_next(false).await,
        Err(ClientError::NothingWaiting)
    ));
    assert!(matches!(
        client.skip_next(true).await,
        Err(ClientError::NothingWaiting)
    ));
    assert!(api
        .calls()
        .iter()
        .all(|call| !call.starts_with("serve") && !call.starts_with("skip")));
    assert!(client.snapshot().await.state.action_in_flight.is_none());
}

#[tokio::test(start_paused = true)]
async fn live_serve_refreshes_status_and_summary() {
    let api = Arc::new(FakeQueueApi::default());
    waiting_queue(&api);
    let client = client_on_queue_one(&api).await;
    api.script(
        "serve",
        Ok(json!({"entry_id": 2, "user_name": "Bo Chen", "status": "SERVED"})),
    );

    let outcome = client.serve_next(false).await.unwrap();

    let served = outcome.live().unwrap();
    assert_eq!(served.user_name, "Bo Chen");
    assert_eq!(api.count("status:1"), 2);
    assert_eq!(api.count("summary:1"), 2);
    assert_eq!(api.count("events:1:20"), 1);

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.toast.unwrap().message, "Bo Chen has been served!");
    let panel = snapshot.action_result.unwrap();
    assert_eq!(panel.kind, ActionResultKind::Success);
    assert_eq!(panel.message, "Served: Bo Chen");
    assert_eq!(panel.request_id, outcome.meta().request_id);
}

#[tokio::test(start_paused = true)]
async fn dry_run_skip_names_the_entry_it_would_move() {
    let api = Arc::new(FakeQueueApi::default());
    waiting_queue(&api);
    let client = client_on_queue_one(&api).await;
    api.script(
        "skip",
        Ok(json!({
            "dry_run": true,
            "result": "would_succeed",
            "user_name": "Bo Chen",
            "explanation": "Bo Chen would be skipped."
        })),
    );

    let outcome = client.skip_next(true).await.unwrap();

    assert!(outcome.is_simulated());
    assert_eq!(api.count("skip:1:dry"), 1);
    assert_eq!(api.count("summary:1"), 1);
    let snapshot = client.snapshot().await;
    assert!(snapshot.toast.is_none());
    let panel = snapshot.action_result.unwrap();
    assert_eq!(panel.kind, ActionResultKind::DryRun);
    assert_eq!(panel.message, "Skip would succeed: \"Bo Chen\"");
}

#[tokio::test(start_paused = true)]
async fn rule_violation_is_toasted_and_shown_as_blocked() {
    let api = Arc::new(FakeQueueApi::default());
    waiting_queue(&api);
    let client = client_on_queue_one(&api).await;
    api.script(
        "serve",
        Err(rule_violation(409, "Queue is paused.", rule_codes::QUEUE_PAUSED)),
    );

    let err = client.serve_next(false).await.unwrap_err();

    assert_eq!(err.rule_code(), Some(rule_codes::QUEUE_PAUSED));
    let snapshot = client.snapshot().await;
    assert!(snapshot.state.action_in_flight.is_none());
    let toast = snapshot.toast.unwrap();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.message, "Queue is paused.");
    let panel = snapshot.action_result.unwrap();
    assert_eq!(panel.kind, ActionResultKind::Blocked);
    assert_eq!(panel.rule_code.as_deref(), Some(rule_codes::QUEUE_PAUSED));
    assert_eq!(panel.request_id, "req-engine-7");
}

#[tokio::test(start_paused = true)]
async fn transport_failure_without_trace_falls_back_to_unknown() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;

    let err = client.join("Ann Lee", false).await.unwrap_err();

    let ClientError::Request(request_err) = err else {
        panic!("expected a request error");
    };
    assert_eq!(request_err.category(), ErrorCategory::Transport);
    let panel = client.snapshot().await.action_result.unwrap();
    assert_eq!(panel.kind, ActionResultKind::Blocked);
    assert_eq!(panel.request_id, UNKNOWN_META);
    assert!(panel.rule_code.is_none());
}

#[tokio::test(start_paused = true)]
async fn failure_after_a_traced_action_reuses_the_last_request_id() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;
    api.script(
        "join",
        Ok(json!({"dry_run": true, "result": "would_succeed", "user_name": "Ann Lee", "position": 1})),
    );
    let traced = client.join("Ann Lee", true).await.unwrap();

    client.join("Ann Lee", false).await.unwrap_err();

    let panel = client.snapshot().await.action_result.unwrap();
    assert_eq!(panel.request_id, traced.meta().request_id);
}

#[tokio::test(start_paused = true)]
async fn pause_toggle_follows_the_known_state() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;

    let paused = client.toggle_pause().await.unwrap();
    assert!(paused.data.status.is_paused());
    let snapshot = client.snapshot().await;
    assert!(snapshot.state.is_paused);
    assert_eq!(
        snapshot.toast.unwrap().message,
        "Queue paused; joins blocked"
    );
    assert_eq!(snapshot.action_result.unwrap().message, "Queue paused");

    let resumed = client.toggle_pause().await.unwrap();
    assert!(!resumed.data.status.is_paused());
    assert!(!client.snapshot().await.state.is_paused);
    assert_eq!(api.count("pause:1"), 1);
    assert_eq!(api.count("resume:1"), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_pause_keeps_the_previous_state() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;
    api.script(
        "pause",
        Err(rule_violation(409, "Queue is already paused.", rule_codes::ALREADY_PAUSED)),
    );

    client.toggle_pause().await.unwrap_err();

    let snapshot = client.snapshot().await;
    assert!(!snapshot.state.is_paused);
    assert_eq!(
        snapshot.action_result.unwrap().rule_code.as_deref(),
        Some(rule_codes::ALREADY_PAUSED)
    );
}

#[tokio::test(start_paused = true)]
async fn second_action_is_refused_while_one_is_in_flight() {
    let api = Arc::new(FakeQueueApi::default());
    waiting_queue(&api);
    let client = client_on_queue_one(&api).await;
    api.delay("serve", Duration::from_millis(500));
    api.script(
        "serve",
        Ok(json!({"entry_id": 2, "user_name": "Bo Chen", "status": "SERVED"})),
    );

    let background = Arc::clone(&client);
    let serving = tokio::spawn(async move { background.serve_next(false).await });
    settle().await;

    let err = client.join("Ann Lee", false).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::ActionInFlight(ActionKind::ServeNext)
    ));
    assert!(serving.await.unwrap().is_ok());
    assert_eq!(api.count("serve:1:live"), 1);
    assert!(api.calls().iter().all(|call| !call.starts_with("join")));
    assert!(client.snapshot().await.state.action_in_flight.is_none());
}

#[tokio::test(start_paused = true)]
async fn live_answer_to_a_dry_run_is_not_reported_as_a_simulation() {
    let api = Arc::new(FakeQueueApi::default());
    waiting_queue(&api);
    let client = client_on_queue_one(&api).await;
    api.script(
        "serve",
        Ok(json!({"entry_id": 2, "user_name": "Bo Chen", "status": "SERVED"})),
    );

    let err = client.serve_next(true).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Request(RequestError::Decode(_))
    ));
    let panel = client.snapshot().await.action_result.unwrap();
    assert_eq!(panel.kind, ActionResultKind::Blocked);
}

#[tokio::test(start_paused = true)]
async fn skipping_a_specific_entry_refreshes_status_only() {
    let api = Arc::new(FakeQueueApi::default());
    waiting_queue(&api);
    let client = client_on_queue_one(&api).await;
    api.script(
        "skip_entry",
        Ok(json!({"entry_id": 2, "user_name": "Bo Chen", "status": "SKIPPED"})),
    );

    let response = client.skip_entry(EntryId(2)).await.unwrap();

    assert_eq!(response.data.user_name, "Bo Chen");
    assert_eq!(api.count("skip_entry:1:2"), 1);
    assert_eq!(api.count("status:1"), 2);
    assert_eq!(api.count("summary:1"), 1);
    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.toast.unwrap().message, "Bo Chen has been skipped.");
    assert_eq!(snapshot.action_result.unwrap().message, "Skipped: Bo Chen");
}

#[tokio::test(start_paused = true)]
async fn toast_expires_after_its_ttl() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;

    client.toggle_pause().await.unwrap();
    assert!(client.snapshot().await.toast.is_some());

    tokio::time::sleep(Duration::from_millis(3600)).await;
    assert!(client.snapshot().await.toast.is_none());
}

#[tokio::test(start_paused = true)]
async fn switching_queues_mid_action_keeps_its_feedback_off_the_new_queue() {
    let api = Arc::new(FakeQueueApi::default());
    waiting_queue(&api);
    let client = client_on_queue_one(&api).await;
    api.delay("serve", Duration::from_millis(500));
    api.script(
        "serve",
        Ok(json!({"entry_id": 2, "user_name": "Bo Chen", "status": "SERVED"})),
    );

    let background = Arc::clone(&client);
    let serving = tokio::spawn(async move { background.serve_next(false).await });
    settle().await;
    client.select_queue(QueueId(2), "Clinic B").await.unwrap();
    settle().await;

    // The new queue accepts its own action while the old one is still out.
    api.script(
        "join",
        Ok(json!({"entry_id": 9, "user_name": "Cy Dee", "position": 1, "status": "WAITING"})),
    );
    let joined = client.join("Cy Dee", false).await.unwrap();
    assert_eq!(api.count("join:2:Cy Dee:live"), 1);

    let served = serving.await.unwrap().unwrap();
    assert_eq!(served.live().unwrap().user_name, "Bo Chen");

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.state.selected.unwrap().id, QueueId(2));
    assert!(snapshot.action_result.is_none());
    assert_eq!(snapshot.toast.unwrap().message, "Cy Dee joined the queue!");
    assert_eq!(
        snapshot.state.last_request_id.as_deref(),
        Some(joined.meta().request_id.as_str())
    );
    assert!(snapshot.state.action_in_flight.is_none());
}

#[tokio::test(start_paused = true)]
async fn failure_after_switching_queues_is_returned_but_not_shown() {
    let api = Arc::new(FakeQueueApi::default());
    let client = client_on_queue_one(&api).await;
    api.delay("pause", Duration::from_millis(500));
    api.script(
        "pause",
        Err(rule_violation(409, "Queue is already paused.", rule_codes::ALREADY_PAUSED)),
    );

    let background = Arc::clone(&client);
    let pausing = tokio::spawn(async move { background.toggle_pause().await });
    settle().await;
    client.select_queue(QueueId(2), "Clinic B").await.unwrap();

    let err = pausing.await.unwrap().unwrap_err();

    assert_eq!(err.rule_code(), Some(rule_codes::ALREADY_PAUSED));
    let snapshot = client.snapshot().await;
    assert!(snapshot.toast.is_none());
    assert!(snapshot.action_result.is_none());
    assert!(!snapshot.state.is_paused);
}

#[tokio::test(start_paused = true)]
async fn live_serve_drops_the_outdated_preview() {
    let api = Arc::new(FakeQueueApi::default());
    waiting_queue(&api);
    let client = client_on_queue_one(&api).await;
    api.script(
        "preview:1",
        Ok(json!({
            "next_if_served": "Cy Dee",
            "next_if_skipped": "Cy Dee",
            "skip_target": "Bo Chen",
            "projected_wait_change": "-5 min",
            "waiting_count": 1
        })),
    );
    assert!(client.preview().await.unwrap().is_some());
    assert!(client.snapshot().await.state.preview.is_some());

    api.script(
        "serve",
        Ok(json!({"entry_id": 2, "user_name": "Bo Chen", "status": "SERVED"})),
    );
    client.serve_next(false).await.unwrap();

    assert!(client.snapshot().await.state.preview.is_none());
}

#[tokio::test(start_paused = true)]
async fn dry_run_keeps_the_preview() {
    let api = Arc::new(FakeQueueApi::default());
    waiting_queue(&api);
    let client = client_on_queue_one(&api).await;
    api.script(
        "preview:1",
        Ok(json!({
            "next_if_served": "Cy Dee",
            "next_if_skipped": "Cy Dee",
            "skip_target": "Bo Chen",
            "projected_wait_change": "-5 min",
            "waiting_count": 1
        })),
    );
    client.preview().await.unwrap();
    api.script(
        "serve",
        Ok(json!({"dry_run": true, "result": "would_succeed", "user_name": "Bo Chen"})),
    );

    client.serve_next(true).await.unwrap();

    assert!(client.snapshot().await.state.preview.is_some());
}
