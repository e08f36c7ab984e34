use greenhouse_core::dashboard::{Dashboard, InboundEffect};
use greenhouse_core::intent::{DispatchOutcome, IgnoreReason, Interaction};
use greenhouse_core::staleness::Staleness;
use greenhouse_core::view::{Marker, TIMER_DELAYED};
use greenhouse_core::wire::{
    ModeChangePayload, NdjsonFrameDecoder, WeatherActionResultPayload, WireEnvelope, WireMsg,
};
use greenhouse_core::{FieldValue, Mode};
use serde_json::json;

fn push(dashboard: &mut Dashboard, line: serde_json::Value) -> InboundEffect {
    let mut decoder = NdjsonFrameDecoder::<WireEnvelope>::default();
    let mut bytes = serde_json::to_vec(&line).expect("encode");
    bytes.push(b'\n');
    let report = decoder.push_chunk(&bytes);
    assert!(report.errors.is_empty(), "decode errors: {:?}", report.errors);
    let envelope = report.frames.into_iter().next().expect("one frame");
    dashboard.apply_inbound(envelope.msg)
}

fn update(payload: serde_json::Value) -> serde_json::Value {
    json!({
        "version": 1,
        "sender_id": "greenhouse-server",
        "timestamp": "2026-10-16T08:00:00Z",
        "type": "update_data",
        "payload": payload,
    })
}

#[test]
fn partial_update_keeps_previous_fields() {
    let mut dashboard = Dashboard::new();
    push(
        &mut dashboard,
        update(json!({"g1": {"temperature": 20.0, "humidity": 55.5, "mode": "auto"}})),
    );
    push(&mut dashboard, update(json!({"g1": {"temperature": 22.25}})));

    let entry = dashboard.store().get("g1").expect("tracked");
    assert_eq!(entry.field("temperature"), Some(&FieldValue::Number(22.25)));
    assert_eq!(entry.field("humidity"), Some(&FieldValue::Number(55.5)));
    assert_eq!(entry.mode, Mode::Auto);

    let card = dashboard.view().card("g1").expect("card");
    assert_eq!(card.temperature().text(), "22.25");
    assert_eq!(card.humidity().text(), "55.50");
}

#[test]
fn identical_snapshots_are_idempotent() {
    let mut dashboard = Dashboard::new();
    let snapshot = update(json!({"g1": {"temperature": 19.0, "door": "CLOSED"}}));
    push(&mut dashboard, snapshot.clone());
    let first = dashboard.view().card("g1").cloned();

    for _ in 0..3 {
        push(&mut dashboard, snapshot.clone());
    }

    assert_eq!(dashboard.view().len(), 1);
    assert_eq!(dashboard.view().created_total(), 1);
    assert_eq!(dashboard.view().card("g1").cloned(), first);
}

#[test]
fn eviction_removes_entry_card_and_countdown() {
    let mut dashboard = Dashboard::new();
    push(
        &mut dashboard,
        update(json!({
            "g1": {"interval": 5000},
            "g2": {"interval": 5000},
        })),
    );
    assert!(dashboard.panel().is_visible());

    let effect = push(&mut dashboard, update(json!({"g1": {"temperature": 21.0}})));
    let InboundEffect::Snapshot(diff) = effect else {
        panic!("expected snapshot effect");
    };
    assert!(diff.removed.contains("g2"));

    assert!(!dashboard.store().contains("g2"));
    assert!(!dashboard.view().contains("g2"));
    assert!(!dashboard.scheduler().is_tracking("g2"));
    assert_eq!(dashboard.store().len(), 1);
    assert!(!dashboard.panel().is_visible());
}

#[test]
fn null_group_value_still_merges_siblings_and_evicts() {
    let mut dashboard = Dashboard::new();
    push(
        &mut dashboard,
        update(json!({"g1": {"temperature": 20, "interval": 5000}, "g2": {}})),
    );
    dashboard.tick();

    let effect = push(
        &mut dashboard,
        update(json!({"g1": {"temperature": 25}, "g3": null})),
    );
    let InboundEffect::Snapshot(diff) = effect else {
        panic!("expected snapshot effect");
    };
    assert!(diff.updated.contains("g1"));
    assert!(diff.added.contains("g3"));
    assert!(diff.removed.contains("g2"));

    let entry = dashboard.store().get("g1").expect("tracked");
    assert_eq!(entry.field("temperature"), Some(&FieldValue::Number(25.0)));
    assert_eq!(
        dashboard.scheduler().countdown("g1").and_then(|c| c.remaining()),
        Some(5)
    );
    assert!(dashboard.store().contains("g3"));
    assert!(dashboard.view().contains("g3"));
    assert!(!dashboard.store().contains("g2"));
    assert!(!dashboard.view().contains("g2"));
}

#[test]
fn mode_update_with_non_string_value_applies_the_rest() {
    let mut dashboard = Dashboard::new();
    push(
        &mut dashboard,
        update(json!({"g1": {"mode": "manual"}, "g2": {"mode": "manual"}})),
    );
    let mut sent = Vec::new();
    dashboard
        .interact(
            Interaction::ModeToggled {
                group_id: Some("g1".to_string()),
                checked: true,
            },
            &mut sent,
        )
        .expect("toggle");
    assert!(dashboard.dispatcher().is_locked("g1"));

    push(
        &mut dashboard,
        json!({
            "version": 1,
            "sender_id": "greenhouse-server",
            "timestamp": "2026-10-16T08:00:05Z",
            "type": "mode_updated",
            "payload": {"g1": "auto", "g2": null},
        }),
    );

    assert_eq!(dashboard.store().get("g1").map(|e| e.mode), Some(Mode::Auto));
    assert_eq!(dashboard.store().get("g2").map(|e| e.mode), Some(Mode::Manual));
    assert!(!dashboard.dispatcher().is_locked("g1"));
    assert!(!dashboard.view().card("g1").expect("card").is_locked());
}

#[test]
fn countdown_reaches_delayed_after_interval() {
    let mut dashboard = Dashboard::new();
    push(&mut dashboard, update(json!({"g1": {"interval": 5000}})));
    assert_eq!(
        dashboard.view().card("g1").map(|c| c.timer().text().to_string()),
        Some("5".to_string())
    );

    for _ in 0..4 {
        dashboard.tick();
    }
    let countdown = dashboard.scheduler().countdown("g1").expect("tracked");
    assert_eq!(countdown.staleness(), Staleness::Fresh);

    let report = dashboard.tick();
    assert!(report.became_delayed.contains("g1"));
    let timer = dashboard.view().card("g1").expect("card").timer().clone();
    assert_eq!(timer.text(), TIMER_DELAYED);
    assert_eq!(timer.marker(), Some(Marker::Delayed));

    push(&mut dashboard, update(json!({"g1": {"humidity": 60.0}})));
    let countdown = dashboard.scheduler().countdown("g1").expect("tracked");
    assert_eq!(countdown.remaining(), Some(5));
}

#[test]
fn mode_toggle_emits_once_and_waits_for_push() {
    let mut dashboard = Dashboard::new();
    push(&mut dashboard, update(json!({"g1": {"mode": "manual"}})));
    let mut sent = Vec::new();
    let toggle = Interaction::ModeToggled {
        group_id: Some("g1".to_string()),
        checked: true,
    };

    dashboard
        .interact(toggle.clone(), &mut sent)
        .expect("first toggle");
    let second = dashboard
        .interact(toggle.clone(), &mut sent)
        .expect("second toggle");

    assert_eq!(
        second,
        DispatchOutcome::Ignored(IgnoreReason::Locked("g1".to_string()))
    );
    assert_eq!(
        sent,
        vec![WireMsg::ModeChangeEvent(ModeChangePayload {
            id: "g1".to_string(),
            mode: Mode::Auto,
        })]
    );
    let card = dashboard.view().card("g1").expect("card");
    assert!(card.is_locked());
    assert!(!card.mode_switch().is_checked());

    push(&mut dashboard, update(json!({"g1": {"mode": "auto"}})));
    let card = dashboard.view().card("g1").expect("card");
    assert!(!card.is_locked());
    assert!(card.mode_switch().is_checked());

    dashboard.interact(toggle, &mut sent).expect("third toggle");
    assert_eq!(sent.len(), 2);
}

#[test]
fn bulk_panel_follows_group_count() {
    let mut dashboard = Dashboard::new();
    push(&mut dashboard, update(json!({"g1": {}})));
    assert!(!dashboard.panel().is_visible());

    push(&mut dashboard, update(json!({"g1": {}, "g2": {}})));
    assert!(dashboard.panel().is_visible());

    let mut sent = Vec::new();
    dashboard
        .interact(
            Interaction::GlobalModeSelected { mode: Mode::Auto },
            &mut sent,
        )
        .expect("global mode");
    assert!(dashboard.dispatcher().is_locked("g1"));
    assert!(dashboard.dispatcher().is_locked("g2"));

    push(&mut dashboard, update(json!({"g1": {"mode": "auto"}})));
    assert!(!dashboard.panel().is_visible());
    assert!(!dashboard.dispatcher().is_locked("g1"));
    assert!(!dashboard.dispatcher().is_locked("g2"));
}

#[test]
fn weather_results_do_not_cross_talk() {
    let mut dashboard = Dashboard::new();
    push(&mut dashboard, update(json!({"g1": {}, "g2": {}})));
    let mut sent = Vec::new();
    for id in ["g1", "g2"] {
        dashboard
            .interact(
                Interaction::WeatherSuggestionRequested {
                    group_id: Some(id.to_string()),
                },
                &mut sent,
            )
            .expect("suggestion");
    }
    assert_eq!(sent.len(), 2);
    assert!(!dashboard.dispatcher().is_locked("g1"));

    dashboard.apply_inbound(WireMsg::WeatherActionResult(WeatherActionResultPayload {
        id: "g2".to_string(),
        message: "Close vents before the storm".to_string(),
    }));

    let g1 = dashboard.view().card("g1").expect("g1");
    let g2 = dashboard.view().card("g2").expect("g2");
    assert_eq!(g1.result().marker(), Some(Marker::Pending));
    assert_eq!(g2.result().text(), "Close vents before the storm");
    assert_eq!(g2.result().marker(), None);
}

#[test]
fn legacy_group_key_is_accepted_on_results() {
    let mut dashboard = Dashboard::new();
    push(&mut dashboard, update(json!({"g1": {}})));

    let effect = push(
        &mut dashboard,
        json!({
            "sender_id": "greenhouse-server",
            "timestamp": "2026-10-16T08:00:05Z",
            "type": "weather_action_result",
            "payload": {"gh_id": "g1", "message": "Open the roof"},
        }),
    );

    assert_eq!(
        effect,
        InboundEffect::GroupWeather {
            id: "g1".to_string(),
            routed: true
        }
    );
    assert_eq!(
        dashboard.view().card("g1").map(|c| c.result().text().to_string()),
        Some("Open the roof".to_string())
    );
}
