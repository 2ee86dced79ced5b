use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use vigil::{fsm::next_state, AlarmError, AlarmFsm, AlarmState, LifecycleEvent};

fn any_state() -> impl Strategy<Value = AlarmState> {
    prop::sample::select(AlarmState::ALL.to_vec())
}

fn any_event() -> impl Strategy<Value = LifecycleEvent> {
    prop::sample::select(LifecycleEvent::ALL.to_vec())
}

#[test]
fn test_transition_table_is_total() {
    let mut accepted = 0;
    for state in AlarmState::ALL {
        for event in LifecycleEvent::ALL {
            match next_state(state, event) {
                Ok(next) => {
                    assert!(AlarmState::ALL.contains(&next));
                    accepted += 1;
                }
                Err(AlarmError::InvalidTransition { from, event: rejected }) => {
                    assert_eq!((from, rejected), (state, event));
                }
                Err(other) => panic!("unexpected error for {} + {}: {}", state, event, other),
            }
        }
    }
    assert_eq!(accepted, 12);
}

proptest! {
    #[test]
    fn test_rejection_leaves_state_unchanged(state in any_state(), event in any_event()) {
        let mut fsm = AlarmFsm::new(state);
        match fsm.transition(event) {
            Ok(next) => prop_assert_eq!(fsm.state(), next),
            Err(_) => prop_assert_eq!(fsm.state(), state),
        }
    }

    #[test]
    fn test_no_event_reaches_suppressed(events in prop::collection::vec(any_event(), 0..64)) {
        let mut fsm = AlarmFsm::new(AlarmState::Normal);
        for event in events {
            let _ = fsm.transition(event);
            prop_assert_ne!(fsm.state(), AlarmState::Suppressed);
        }
    }

    #[test]
    fn test_shelve_helper_window(
        state in any_state(),
        secs in 1u64..86_400,
        offset in 0i64..172_800,
    ) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut fsm = AlarmFsm::new(state);
        let result = fsm.shelve(std::time::Duration::from_secs(secs), now);

        if state == AlarmState::Suppressed {
            prop_assert!(matches!(result, Err(AlarmError::ShelveSuppressed)));
            prop_assert_eq!(fsm.state(), AlarmState::Suppressed);
        } else {
            let until = result.unwrap();
            prop_assert_eq!(fsm.state(), AlarmState::Shelved);
            prop_assert_eq!(fsm.shelved_until(), Some(until));
            let at = now + Duration::seconds(offset);
            prop_assert_eq!(fsm.is_shelved(at), at <= until);
        }
    }

    #[test]
    fn test_state_codes_round_trip(state in any_state()) {
        let code = state.as_str();
        prop_assert_eq!(code.parse::<AlarmState>().unwrap(), state);
        let json = serde_json::to_string(&state).unwrap();
        prop_assert_eq!(json, format!("\"{}\"", code));
    }
}
