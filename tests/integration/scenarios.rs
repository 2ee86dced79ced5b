use super::Harness;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use vigil::*;

#[tokio::test]
async fn test_trigger_ack_clear() {
    let mut harness = Harness::new().await;
    let def = harness.define("T", ComparisonKind::High, 100.0).await;

    assert_eq!(harness.engine.process_value("T", 101.0).await, 1);
    let active = harness.engine.list_active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].state, AlarmState::UnackActive);
    assert_eq!(active[0].definition_id, def.id);
    let id = active[0].id;

    let events = harness.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "Alarm T transitioned to UnackActive");
    assert_eq!(events[0].value, 101.0);

    let acked = harness.engine.acknowledge(id).await.unwrap();
    assert_eq!(acked.state, AlarmState::AckActive);
    let events = harness.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state, AlarmState::AckActive);

    assert_eq!(harness.engine.process_value("T", 99.0).await, 1);
    assert!(harness.engine.list_active().await.is_empty());
    let events = harness.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state, AlarmState::Normal);
    assert_eq!(events[0].alarm_id, id);

    assert_eq!(harness.gateway.alarm(id).unwrap().state, AlarmState::Normal);
}

#[tokio::test]
async fn test_shelve_for_an_hour() {
    let mut harness = Harness::new().await;
    harness.define("T", ComparisonKind::High, 100.0).await;
    harness.engine.process_value("T", 101.0).await;
    let id = harness.engine.list_active().await[0].id;
    harness.drain();

    let before = Utc::now();
    harness.engine.shelve(id, Duration::from_secs(3600)).await.unwrap();

    let alarm = harness.engine.get_active(id).await.unwrap();
    assert_eq!(alarm.state, AlarmState::Shelved);
    let until = alarm.shelved_until.unwrap();
    assert!(until >= before + ChronoDuration::hours(1));
    assert!(until <= Utc::now() + ChronoDuration::hours(1));
    assert_eq!(harness.engine.list_active().await.len(), 1);

    let events = harness.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, format!("Alarm shelved until {}", until.to_rfc3339()));
    assert_eq!(harness.gateway.alarm(id).unwrap().shelved_until, Some(until));
}

#[tokio::test]
async fn test_sweep_releases_expired_shelving() {
    let gateway = Arc::new(InMemoryGateway::new());
    let def = gateway
        .create_definition(&NewAlarmDefinition::new("T", ComparisonKind::High, 100.0))
        .await
        .unwrap();
    let past = Utc::now() - ChronoDuration::minutes(5);
    gateway.insert_active_alarm(ActiveAlarm {
        id: 10,
        definition_id: def.id,
        state: AlarmState::Shelved,
        activation_time: past,
        ack_time: None,
        shelved_until: Some(past + ChronoDuration::minutes(1)),
        value: 130.0,
        created_at: past,
        updated_at: past,
    });

    let mut harness = Harness::with_gateway(gateway, 64).await;
    assert_eq!(harness.engine.list_active().await.len(), 1);

    assert_eq!(harness.engine.sweep_expired().await, 1);
    assert!(harness.engine.list_active().await.is_empty());

    let events = harness.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "Alarm unshelved (expired)");
    assert_eq!(events[0].state, AlarmState::Normal);
    let stored = harness.gateway.alarm(10).unwrap();
    assert_eq!(stored.state, AlarmState::Normal);
    assert_eq!(stored.shelved_until, None);

    // value is not re-evaluated; the next violation is a new alarm
    assert_eq!(harness.engine.process_value("T", 130.0).await, 1);
    let active = harness.engine.list_active().await;
    assert_eq!(active.len(), 1);
    assert_ne!(active[0].id, 10);
}

#[tokio::test]
async fn test_acknowledge_unknown_alarm() {
    let mut harness = Harness::new().await;
    harness.define("T", ComparisonKind::High, 100.0).await;

    let err = harness.engine.acknowledge(4242).await.unwrap_err();
    assert!(matches!(err, AlarmError::NotFound(4242)));
    assert!(harness.drain().is_empty());
}

#[tokio::test]
async fn test_repeated_measurement_is_idempotent() {
    let mut harness = Harness::new().await;
    harness.define("T", ComparisonKind::High, 100.0).await;
    let writes_before = harness.gateway.write_count();

    for _ in 0..5 {
        harness.engine.process_value("T", 150.0).await;
    }

    assert_eq!(harness.gateway.write_count(), writes_before + 1);
    assert_eq!(harness.drain().len(), 1);
    assert_eq!(harness.engine.list_active().await.len(), 1);
}

#[tokio::test]
async fn test_return_to_normal_needs_ack() {
    let mut harness = Harness::new().await;
    harness.define("L", ComparisonKind::Low, 10.0).await;

    harness.engine.process_value("L", 5.0).await;
    harness.engine.process_value("L", 20.0).await;
    let alarm = harness.engine.list_active().await.remove(0);
    assert_eq!(alarm.state, AlarmState::UnackRtn);

    let acked = harness.engine.acknowledge(alarm.id).await.unwrap();
    assert_eq!(acked.state, AlarmState::Normal);
    assert!(harness.engine.list_active().await.is_empty());
    assert_eq!(harness.gateway.alarm(alarm.id).unwrap().state, AlarmState::Normal);

    let states: Vec<AlarmState> = harness.drain().into_iter().map(|e| e.state).collect();
    assert_eq!(states, vec![AlarmState::UnackActive, AlarmState::UnackRtn, AlarmState::Normal]);
}

#[tokio::test]
async fn test_shelved_alarm_ignores_measurements() {
    let mut harness = Harness::new().await;
    harness.define("T", ComparisonKind::High, 100.0).await;
    harness.engine.process_value("T", 120.0).await;
    let id = harness.engine.list_active().await[0].id;
    harness.engine.shelve(id, Duration::from_secs(600)).await.unwrap();
    harness.drain();

    assert_eq!(harness.engine.process_value("T", 50.0).await, 0);
    assert_eq!(harness.engine.process_value("T", 500.0).await, 0);
    assert_eq!(harness.engine.get_active(id).await.unwrap().state, AlarmState::Shelved);
    assert!(harness.drain().is_empty());

    let err = harness.engine.acknowledge(id).await.unwrap_err();
    assert!(err.is_rejection());
}

#[tokio::test]
async fn test_command_fails_cleanly_when_store_is_down() {
    let mut harness = Harness::new().await;
    harness.define("T", ComparisonKind::High, 100.0).await;
    harness.engine.process_value("T", 120.0).await;
    let id = harness.engine.list_active().await[0].id;
    harness.drain();

    harness.gateway.set_unavailable(true);
    assert!(matches!(harness.engine.acknowledge(id).await, Err(AlarmError::Persistence(_))));
    assert!(matches!(
        harness.engine.shelve(id, Duration::from_secs(60)).await,
        Err(AlarmError::Persistence(_))
    ));
    assert_eq!(harness.engine.process_value("T", 10.0).await, 0);

    let alarm = harness.engine.get_active(id).await.unwrap();
    assert_eq!(alarm.state, AlarmState::UnackActive);
    assert!(harness.drain().is_empty());

    harness.gateway.set_unavailable(false);
    assert_eq!(harness.engine.acknowledge(id).await.unwrap().state, AlarmState::AckActive);
}

#[tokio::test]
async fn test_failed_sweep_retries_next_tick() {
    let mut harness = Harness::new().await;
    harness.define("T", ComparisonKind::High, 100.0).await;
    harness.engine.process_value("T", 120.0).await;
    let id = harness.engine.list_active().await[0].id;
    harness.engine.shelve(id, Duration::from_secs(60)).await.unwrap();
    harness.drain();

    let later = Utc::now() + ChronoDuration::minutes(2);
    harness.gateway.set_unavailable(true);
    assert_eq!(harness.engine.sweep_expired_at(later).await, 0);
    assert_eq!(harness.engine.get_active(id).await.unwrap().state, AlarmState::Shelved);

    harness.gateway.set_unavailable(false);
    assert_eq!(harness.engine.sweep_expired_at(later).await, 1);
    assert!(harness.engine.list_active().await.is_empty());
    assert_eq!(harness.drain().len(), 1);
}

#[tokio::test]
async fn test_sweep_leaves_open_windows() {
    let harness = Harness::new().await;
    harness.define("T", ComparisonKind::High, 100.0).await;
    harness.engine.process_value("T", 120.0).await;
    let id = harness.engine.list_active().await[0].id;
    harness.engine.shelve(id, Duration::from_secs(600)).await.unwrap();

    assert_eq!(harness.engine.sweep_expired().await, 0);
    assert_eq!(harness.engine.get_active(id).await.unwrap().state, AlarmState::Shelved);
}

#[tokio::test]
async fn test_reload_restores_state() {
    let harness = Harness::new().await;
    harness.define("T", ComparisonKind::High, 100.0).await;
    harness.define("L", ComparisonKind::Low, 0.0).await;
    harness.engine.process_value("T", 120.0).await;
    harness.engine.process_value("L", -3.0).await;
    let id = harness.engine.list_active().await[0].id;
    harness.engine.acknowledge(id).await.unwrap();
    let before = harness.engine.list_active().await;

    let restarted = Harness::with_gateway(harness.gateway.clone(), 16).await;
    let after = restarted.engine.list_active().await;
    assert_eq!(
        before.iter().map(|a| (a.id, a.state)).collect::<Vec<_>>(),
        after.iter().map(|a| (a.id, a.state)).collect::<Vec<_>>()
    );
    assert_eq!(restarted.engine.list_definitions().await.len(), 2);

    // load twice gives the same view
    restarted.engine.load().await.unwrap();
    assert_eq!(restarted.engine.list_active().await.len(), after.len());
}

#[tokio::test]
async fn test_definitions_sharing_a_tag() {
    let mut harness = Harness::new().await;
    let warn = harness.define("P", ComparisonKind::High, 50.0).await;
    let trip = harness
        .engine
        .create_definition(
            NewAlarmDefinition::new("P", ComparisonKind::High, 90.0)
                .with_priority(AlarmPriority::Critical),
        )
        .await
        .unwrap();
    assert_eq!(trip.priority, AlarmPriority::Critical);
    assert_eq!(warn.priority, AlarmPriority::default());
    harness.define("P", ComparisonKind::from_code("Deviation"), 10.0).await;

    assert_eq!(harness.engine.process_value("P", 60.0).await, 1);
    assert_eq!(harness.engine.process_value("P", 95.0).await, 1);

    let mut owners: Vec<DefinitionId> = harness
        .engine
        .list_active()
        .await
        .into_iter()
        .map(|a| a.definition_id)
        .collect();
    owners.sort_unstable();
    assert_eq!(owners, vec![warn.id, trip.id]);
    assert_eq!(harness.drain().len(), 2);
}

#[tokio::test]
async fn test_ack_time_survives_shelve_and_reload() {
    let harness = Harness::new().await;
    harness.define("T", ComparisonKind::High, 100.0).await;
    harness.engine.process_value("T", 150.0).await;
    let id = harness.engine.list_active().await[0].id;

    let acked = harness.engine.acknowledge(id).await.unwrap();
    let ack_time = acked.ack_time;
    assert!(ack_time.is_some());

    let shelved = harness.engine.shelve(id, Duration::from_secs(60)).await.unwrap();
    assert_eq!(shelved.state, AlarmState::Shelved);
    assert_eq!(shelved.ack_time, ack_time);

    harness.engine.load().await.unwrap();
    let reloaded = harness.engine.get_active(id).await.unwrap();
    assert_eq!(reloaded.state, AlarmState::Shelved);
    assert_eq!(reloaded.ack_time, ack_time);
    assert_eq!(harness.gateway.alarm(id).unwrap().ack_time, ack_time);
}
