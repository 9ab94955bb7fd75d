//! Test suite for the slot scheduler.

use super::*;
use crate::identity::AgentIdentity;

fn config(agent_count: usize) -> ScheduleConfig {
    ScheduleConfig {
        agent_count,
        ..ScheduleConfig::default()
    }
}

fn state(agent_count: usize) -> SchedulerState {
    SchedulerState::new(config(agent_count)).unwrap()
}

fn occupant(name: &str) -> Occupant {
    Occupant::connecting(Uuid::new_v4(), AgentIdentity::new(name).unwrap())
}

mod construction {
    use super::*;

    #[test]
    fn test_slots_start_empty_without_delay() {
        let s = state(3);
        assert_eq!(s.slot_count(), 3);
        assert_eq!(s.occupied_count(), 0);
        for slot in s.slots() {
            assert_eq!(slot.accumulated_delay().value(), 0.0);
        }
    }

    #[test]
    fn test_zero_slots_rejected() {
        assert_eq!(SchedulerState::new(config(0)).unwrap_err(), SchedulerError::NoSlots);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let cfg = ScheduleConfig {
            base_interval_secs: 400,
            max_interval_secs: 300,
            ..ScheduleConfig::default()
        };
        assert!(matches!(
            SchedulerState::new(cfg),
            Err(SchedulerError::InvertedWindow { base: 400, max: 300 })
        ));
    }
}

mod intervals {
    use super::*;

    #[test]
    fn test_first_slots_are_staggered_by_one_second() {
        let s = state(3);
        let got: Vec<f64> = (0..3).map(|i| s.interval_for(i).unwrap().value()).collect();
        assert_eq!(got, vec![300.0, 301.0, 302.0]);
    }

    #[test]
    fn test_every_interval_falls_in_window() {
        let s = state(20);
        let window = s.config().window();
        for i in 0..20 {
            assert!(window.contains(s.interval_for(i).unwrap()));
        }
    }

    #[test]
    fn test_stagger_wraps_around_window() {
        let cfg = ScheduleConfig {
            agent_count: 5,
            base_interval_secs: 10,
            max_interval_secs: 11,
            ..ScheduleConfig::default()
        };
        let s = SchedulerState::new(cfg).unwrap();
        let got: Vec<f64> = (0..5).map(|i| s.interval_for(i).unwrap().value()).collect();
        assert_eq!(got, vec![10.0, 11.0, 10.0, 11.0, 10.0]);
    }

    #[test]
    fn test_degenerate_window() {
        let cfg = ScheduleConfig {
            agent_count: 3,
            base_interval_secs: 5,
            max_interval_secs: 5,
            ..ScheduleConfig::default()
        };
        let s = SchedulerState::new(cfg).unwrap();
        assert!((0..3).all(|i| s.interval_for(i).unwrap().value() == 5.0));
    }

    #[test]
    fn test_widest_window_does_not_overflow() {
        let cfg = ScheduleConfig {
            agent_count: 3,
            base_interval_secs: 0,
            max_interval_secs: u64::MAX,
            ..ScheduleConfig::default()
        };
        let s = SchedulerState::new(cfg).unwrap();
        for i in 0..3 {
            assert_eq!(s.interval_for(i).unwrap().value(), i as f64);
        }
    }

    #[test]
    fn test_interval_is_deterministic() {
        let a = state(4);
        let b = state(4);
        for i in 0..4 {
            assert_eq!(a.interval_for(i), b.interval_for(i));
        }
    }

    #[test]
    fn test_out_of_range_slot() {
        let s = state(2);
        assert_eq!(
            s.interval_for(2),
            Err(SchedulerError::SlotOutOfRange { slot: 2, count: 2 })
        );
    }

    #[test]
    fn test_plan_duration_matches_interval() {
        let s = state(3);
        let plan = s.plan_wake(2, WakeReason::Rotation).unwrap();
        assert_eq!(plan.duration(), Duration::from_secs(302));
        assert_eq!(plan.reason, WakeReason::Rotation);
    }

    #[test]
    fn test_initial_plans_cover_all_slots() {
        let plans = state(4).initial_plans();
        assert_eq!(plans.len(), 4);
        assert!(plans.iter().all(|p| p.reason == WakeReason::Initial));
        assert_eq!(plans.iter().map(|p| p.slot).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }
}

mod global_backoff {
    use super::*;

    #[test]
    fn test_k_failures_add_k_penalty_units() {
        let mut s = state(5);
        let before: Vec<f64> = (0..5).map(|i| s.interval_for(i).unwrap().value()).collect();
        for _ in 0..3 {
            s.record_global_failure();
        }
        for i in 0..5 {
            let after = s.interval_for(i).unwrap().value();
            assert_eq!(after - before[i], 3.0 * 60.0);
        }
        assert_eq!(s.global_failures(), 3);
    }

    #[test]
    fn test_delayed_interval_stays_within_shifted_window() {
        let mut s = state(20);
        s.record_global_failure();
        for i in 0..20 {
            let window = s.config().window().shifted(s.accumulated_delay(i).unwrap());
            assert!(window.contains(s.interval_for(i).unwrap()));
        }
    }

    #[test]
    fn test_retry_uses_fixed_cooldown() {
        let mut s = state(3);
        s.record_global_failure();
        s.record_global_failure();
        let retry = s.plan_retry(1).unwrap();
        assert_eq!(retry.delay.value(), 60.0);
        assert_eq!(retry.reason, WakeReason::Retry);
    }

    #[test]
    fn test_delay_has_no_ceiling() {
        let mut s = state(1);
        for _ in 0..1000 {
            s.record_global_failure();
        }
        assert_eq!(s.accumulated_delay(0).unwrap().value(), 60_000.0);
    }
}

mod occupancy {
    use super::*;

    #[test]
    fn test_empty_slot_spawns() {
        let s = state(2);
        assert_eq!(s.on_wake(0).unwrap(), WakeDecision::Spawn);
    }

    #[test]
    fn test_occupied_slot_is_noop() {
        let mut s = state(2);
        let o = occupant("Alpha");
        let id = o.agent_id;
        s.occupy(0, o).unwrap();
        assert_eq!(s.on_wake(0).unwrap(), WakeDecision::Occupied(id));
        assert_eq!(s.on_wake(1).unwrap(), WakeDecision::Spawn);
    }

    #[test]
    fn test_double_occupy_rejected() {
        let mut s = state(1);
        let first = occupant("Alpha");
        let first_id = first.agent_id;
        s.occupy(0, first).unwrap();
        assert_eq!(
            s.occupy(0, occupant("Bravo")),
            Err(SchedulerError::SlotOccupied {
                slot: 0,
                occupant: first_id
            })
        );
    }

    #[test]
    fn test_mark_active() {
        let mut s = state(1);
        let o = occupant("Alpha");
        let id = o.agent_id;
        s.occupy(0, o).unwrap();
        assert!(s.mark_active(0, id).unwrap());
        assert_eq!(s.occupant(0).unwrap().phase, SlotPhase::Active);
        assert!(!s.mark_active(0, Uuid::new_v4()).unwrap());
    }

    #[test]
    fn test_stale_vacate_keeps_current_occupant() {
        let mut s = state(1);
        let o = occupant("Alpha");
        let id = o.agent_id;
        s.occupy(0, o).unwrap();

        assert_eq!(s.vacate(0, Uuid::new_v4()).unwrap(), None);
        assert!(s.is_occupied(0));

        let left = s.vacate(0, id).unwrap().unwrap();
        assert_eq!(left.agent_id, id);
        assert!(!s.is_occupied(0));
    }

    #[test]
    fn test_occupancy_does_not_touch_delay() {
        let mut s = state(2);
        s.record_global_failure();
        let o = occupant("Alpha");
        let id = o.agent_id;
        s.occupy(1, o).unwrap();
        s.vacate(1, id).unwrap();
        assert_eq!(s.accumulated_delay(1).unwrap().value(), 60.0);
    }

    #[test]
    fn test_occupants_iterates_held_slots() {
        let mut s = state(3);
        s.occupy(2, occupant("Charlie")).unwrap();
        let held: Vec<usize> = s.occupants().map(|(i, _)| i).collect();
        assert_eq!(held, vec![2]);
    }
}
