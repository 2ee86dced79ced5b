use super::Harness;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use vigil::*;

const TAGS: usize = 16;
const SAMPLES: usize = 200;
const THRESHOLD: f64 = 50.0;

/// Replay a value sequence through the state machine alone.
fn expected_outcome(values: &[f64]) -> (AlarmState, usize) {
    let mut fsm = AlarmFsm::new(AlarmState::Normal);
    let mut changes = 0;
    for &value in values {
        let before = fsm.state();
        let event = LifecycleEvent::from_evaluation(value > THRESHOLD);
        if let Ok(after) = fsm.transition(event) {
            if after != before {
                changes += 1;
            }
        }
    }
    (fsm.state(), changes)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_tags_lose_no_updates() {
    let gateway = Arc::new(InMemoryGateway::new());
    let mut harness = Harness::with_gateway(gateway, TAGS * SAMPLES + 16).await;

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut plan: HashMap<String, (DefinitionId, Vec<f64>)> = HashMap::new();
    for i in 0..TAGS {
        let tag = format!("TT-{:03}", i);
        let def = harness.define(&tag, ComparisonKind::High, THRESHOLD).await;
        let values: Vec<f64> = (0..SAMPLES).map(|_| rng.gen_range(0.0..100.0)).collect();
        plan.insert(tag, (def.id, values));
    }

    let mut tasks = JoinSet::new();
    for (tag, (_, values)) in plan.clone() {
        let engine = harness.engine.clone();
        tasks.spawn(async move {
            for value in values {
                engine.process_value(&tag, value).await;
                tokio::task::yield_now().await;
            }
        });
    }
    for _ in 0..4 {
        let engine = harness.engine.clone();
        tasks.spawn(async move {
            for _ in 0..50 {
                engine.sweep_expired().await;
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    let active = harness.engine.list_active().await;
    let by_definition: HashMap<DefinitionId, &ActiveAlarm> =
        active.iter().map(|a| (a.definition_id, a)).collect();
    assert_eq!(by_definition.len(), active.len(), "more than one entry for a definition");

    let ids: HashSet<AlarmId> = active.iter().map(|a| a.id).collect();
    assert_eq!(ids.len(), active.len(), "duplicate alarm identity");

    let mut events_per_definition: HashMap<DefinitionId, usize> = HashMap::new();
    for event in harness.drain() {
        *events_per_definition.entry(event.definition_id).or_default() += 1;
    }

    for (tag, (definition_id, values)) in &plan {
        let (state, changes) = expected_outcome(values);
        let observed = by_definition
            .get(definition_id)
            .map(|a| a.state)
            .unwrap_or(AlarmState::Normal);
        assert_eq!(observed, state, "final state of {}", tag);
        let emitted = events_per_definition.get(definition_id).copied().unwrap_or(0);
        assert_eq!(emitted, changes, "events of {}", tag);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contended_tag_with_commands_stays_consistent() {
    let harness = Harness::with_gateway(Arc::new(InMemoryGateway::new()), 4096).await;
    let a = harness.define("PT-1", ComparisonKind::High, THRESHOLD).await;
    let b = harness.define("PT-1", ComparisonKind::Low, 20.0).await;

    let mut tasks = JoinSet::new();
    for seed in 0..8u64 {
        let engine = harness.engine.clone();
        tasks.spawn(async move {
            let values: Vec<f64> = {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..100).map(|_| rng.gen_range(0.0..100.0)).collect()
            };
            for value in values {
                engine.process_value("PT-1", value).await;
            }
        });
    }
    for round in 0..4u64 {
        let engine = harness.engine.clone();
        tasks.spawn(async move {
            for i in 0..100u64 {
                for alarm in engine.list_active().await {
                    // commands race with evaluation; rejections and misses are expected
                    let _ = if (i + round) % 3 == 0 {
                        engine.shelve(alarm.id, Duration::from_millis(2)).await
                    } else {
                        engine.acknowledge(alarm.id).await
                    };
                }
                engine.sweep_expired().await;
                tokio::task::yield_now().await;
            }
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    let active = harness.engine.list_active().await;
    assert!(active.len() <= 2);
    let owners: HashSet<DefinitionId> = active.iter().map(|alarm| alarm.definition_id).collect();
    assert_eq!(owners.len(), active.len());
    assert!(owners.is_subset(&HashSet::from([a.id, b.id])));

    for alarm in &active {
        assert_ne!(alarm.state, AlarmState::Normal);
        assert_eq!(alarm.shelved_until.is_some(), alarm.state == AlarmState::Shelved);
        let stored = harness.gateway.alarm(alarm.id).unwrap();
        assert_eq!(stored.state, alarm.state, "registry and store disagree on {}", alarm.id);
    }

    let stored_active = harness.gateway.get_active_alarms().await.unwrap();
    assert_eq!(stored_active.len(), active.len());
}
