use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use vigil::*;

#[derive(Debug, Clone)]
enum Op {
    Measure(f64),
    Ack,
    Shelve(u64),
    Sweep { minutes_ahead: i64 },
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0.0f64..200.0).prop_map(Op::Measure),
        2 => Just(Op::Ack),
        1 => (1u64..600).prop_map(Op::Shelve),
        1 => (0i64..20).prop_map(|minutes_ahead| Op::Sweep { minutes_ahead }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_registry_and_store_agree(ops in prop::collection::vec(any_op(), 1..60)) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let gateway = Arc::new(InMemoryGateway::new());
            let engine = AlarmEngine::new(gateway.clone(), Arc::new(LogPublisher));
            engine
                .create_definition(NewAlarmDefinition::new("TT-1", ComparisonKind::High, 100.0))
                .await
                .unwrap();

            for op in ops {
                let current = engine.list_active().await.first().map(|alarm| alarm.id);
                match (op, current) {
                    (Op::Measure(value), _) => {
                        engine.process_value("TT-1", value).await;
                    }
                    (Op::Ack, Some(id)) => {
                        let _ = engine.acknowledge(id).await;
                    }
                    (Op::Shelve(secs), Some(id)) => {
                        engine.shelve(id, Duration::from_secs(secs)).await.unwrap();
                    }
                    (Op::Sweep { minutes_ahead }, _) => {
                        let at = Utc::now() + ChronoDuration::minutes(minutes_ahead);
                        engine.sweep_expired_at(at).await;
                    }
                    (_, None) => {}
                }

                let active = engine.list_active().await;
                assert!(active.len() <= 1);
                for alarm in &active {
                    assert_ne!(alarm.state, AlarmState::Normal);
                    assert_eq!(alarm.shelved_until.is_some(), alarm.state == AlarmState::Shelved);
                    let stored = gateway.alarm(alarm.id).unwrap();
                    assert_eq!(stored.state, alarm.state);
                    assert_eq!(stored.shelved_until, alarm.shelved_until);
                    assert_eq!(stored.ack_time, alarm.ack_time);
                }
                assert_eq!(gateway.get_active_alarms().await.unwrap().len(), active.len());
            }
        });
    }
}
