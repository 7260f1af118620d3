//! Tests for the behavior state machine.

#[cfg(test)]
mod tests {
    use bevy::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::super::{BehaviorState, BehaviorStateMachine, FsmInputs, FsmOutput, StateTransition};
    use crate::config::FsmConfig;
    use crate::effects::AnimationKey;
    use crate::navigation::LocomotionRequest;
    use crate::perception::PerceptionResult;

    const DT: f32 = 0.1;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(11)
    }

    /// Долгий Idle, чтобы таймеры не мешали сценарию
    fn calm_config() -> FsmConfig {
        FsmConfig {
            idle_duration: [100.0, 100.0],
            ..FsmConfig::default()
        }
    }

    fn quiet() -> FsmInputs {
        FsmInputs::default()
    }

    /// Видимая движущаяся цель на дистанции
    fn seen_at(distance: f32) -> FsmInputs {
        FsmInputs {
            perception: PerceptionResult {
                visible: true,
                heard: false,
                movement_confirmed: true,
                effective_range: 90.0,
                distance,
            },
            threat_position: Vec3::new(0.0, 0.0, distance),
            ..FsmInputs::default()
        }
    }

    fn run(fsm: &mut BehaviorStateMachine, inputs: &FsmInputs, ticks: usize, rng: &mut ChaCha8Rng) -> Vec<FsmOutput> {
        (0..ticks).map(|_| fsm.advance(DT, inputs, rng)).collect()
    }

    #[test]
    fn test_starts_idle() {
        let fsm = BehaviorStateMachine::new(FsmConfig::default());
        assert_eq!(fsm.state(), BehaviorState::Idle);
        assert!(!fsm.fallen());
    }

    #[test]
    fn test_killed_is_terminal() {
        let mut fsm = BehaviorStateMachine::new(FsmConfig::default());
        let mut rng = rng();
        assert!(fsm.enter_killed());

        let outputs = run(&mut fsm, &seen_at(5.0), 50, &mut rng);
        assert!(outputs.iter().all(|output| output.state == BehaviorState::Killed));
        assert!(outputs.iter().all(|output| output.locomotion == LocomotionRequest::Hold));
        assert_eq!(outputs.iter().filter(|output| output.cues.fallen).count(), 1);
        assert!(outputs.iter().all(|output| !output.cues.flee && !output.cues.alert));

        assert!(!fsm.request_transition(BehaviorState::Idle));
        assert!(!fsm.request_transition_by_name("Wandering"));
        assert!(!fsm.enter_wounded(Some(Vec3::ZERO)));
        assert!(!fsm.enter_killed());
        assert_eq!(fsm.state(), BehaviorState::Killed);
        assert_eq!(fsm.fall_events(), 1);
    }

    #[test]
    fn test_fatal_input_kills_with_die_then_dead() {
        let mut fsm = BehaviorStateMachine::new(FsmConfig::default());
        let mut rng = rng();
        fsm.request_transition(BehaviorState::Wandering);
        fsm.advance(DT, &quiet(), &mut rng);

        let fatal = FsmInputs {
            fatal: true,
            ..FsmInputs::default()
        };
        let output = fsm.advance(DT, &fatal, &mut rng);
        assert_eq!(output.state, BehaviorState::Killed);
        assert_eq!(output.animation.key, AnimationKey::Die);
        assert!(!output.animation.looped);
        assert_eq!(
            output.transitions,
            vec![StateTransition {
                from: BehaviorState::Wandering,
                to: BehaviorState::Killed,
            }]
        );

        let later = run(&mut fsm, &quiet(), 20, &mut rng);
        let last = later.last().expect("ticks ran");
        assert_eq!(last.animation.key, AnimationKey::Dead);
        assert_eq!(last.desired_speed, 0.0);
    }

    #[test]
    fn test_wandering_to_alert_cues_exactly_once() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        fsm.request_transition(BehaviorState::Wandering);

        let outputs = run(&mut fsm, &seen_at(40.0), 100, &mut rng);

        assert_eq!(fsm.state(), BehaviorState::Alert);
        assert_eq!(outputs.iter().filter(|output| output.cues.alert).count(), 1);
        assert!(fsm.has_alerted_target());
        assert!(matches!(outputs[1].locomotion, LocomotionRequest::Face(_)));
    }

    #[test]
    fn test_alert_hold_survives_flickering_detection() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        fsm.advance(DT, &seen_at(40.0), &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Alert);

        for tick in 0..50 {
            let inputs = if tick % 2 == 0 { quiet() } else { seen_at(40.0) };
            fsm.advance(DT, &inputs, &mut rng);
            assert_eq!(fsm.state(), BehaviorState::Alert);
        }

        // 2 секунды тишины: hold (2.5 с) ещё держит
        run(&mut fsm, &quiet(), 20, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Alert);

        run(&mut fsm, &quiet(), 10, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Idle);
        assert!(!fsm.has_alerted_target(), "re-armed in a calm state");
    }

    #[test]
    fn test_alert_cue_rearmed_after_calm() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();

        let first = run(&mut fsm, &seen_at(40.0), 5, &mut rng);
        run(&mut fsm, &quiet(), 40, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Idle);
        let second = run(&mut fsm, &seen_at(40.0), 5, &mut rng);

        let cues = first.iter().chain(second.iter()).filter(|output| output.cues.alert).count();
        assert_eq!(cues, 2);
    }

    #[test]
    fn test_alert_freezes_before_bolting() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        fsm.advance(DT, &seen_at(40.0), &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Alert);

        // Угроза рядом, но окно замирания ещё не прошло
        for _ in 0..4 {
            fsm.advance(DT, &seen_at(10.0), &mut rng);
            assert_eq!(fsm.state(), BehaviorState::Alert);
        }

        let outputs = run(&mut fsm, &seen_at(10.0), 6, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Fleeing);
        assert_eq!(outputs.iter().filter(|output| output.cues.flee).count(), 1);
    }

    #[test]
    fn test_close_detection_flees_immediately() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();

        let output = fsm.advance(DT, &seen_at(10.0), &mut rng);

        assert_eq!(output.state, BehaviorState::Fleeing);
        assert!(output.cues.flee);
        assert_eq!(output.desired_speed, fsm.config().flee_speed);
        assert_eq!(output.locomotion, LocomotionRequest::FleeFrom(Vec3::new(0.0, 0.0, 10.0)));
    }

    #[test]
    fn test_hearing_alone_is_detection() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        let heard = FsmInputs {
            perception: PerceptionResult {
                heard: true,
                distance: 15.0,
                ..PerceptionResult::default()
            },
            ..FsmInputs::default()
        };

        fsm.advance(DT, &heard, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Fleeing);
    }

    #[test]
    fn test_still_target_is_not_detected() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        let mut inputs = seen_at(10.0);
        inputs.perception.movement_confirmed = false;

        run(&mut fsm, &inputs, 30, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Idle);
    }

    #[test]
    fn test_flee_lasts_minimum_duration() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        fsm.advance(DT, &seen_at(10.0), &mut rng);

        run(&mut fsm, &quiet(), 55, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Fleeing);

        run(&mut fsm, &quiet(), 10, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Wandering);
    }

    #[test]
    fn test_flee_ends_in_alert_when_threat_still_near() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        fsm.advance(DT, &seen_at(10.0), &mut rng);

        run(&mut fsm, &seen_at(40.0), 65, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Alert);
    }

    #[test]
    fn test_close_threat_keeps_flight_going() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();

        run(&mut fsm, &seen_at(10.0), 100, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Fleeing);
    }

    #[test]
    fn test_exhausted_budget_ends_flight() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        fsm.advance(DT, &seen_at(10.0), &mut rng);

        let mut inputs = seen_at(10.0);
        inputs.flee_budget_exhausted = true;
        fsm.advance(DT, &inputs, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Alert);
    }

    #[test]
    fn test_wounded_persists_and_refreshes_flee_direction() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        assert!(fsm.enter_wounded(Some(Vec3::new(0.0, 0.0, -30.0))));
        assert_eq!(fsm.state(), BehaviorState::Wounded);

        let mut inputs = seen_at(10.0);
        inputs.energy = 0.3;
        let output = fsm.advance(DT, &inputs, &mut rng);

        assert_eq!(output.state, BehaviorState::Wounded);
        assert!(!output.cues.flee);
        assert_eq!(output.locomotion, LocomotionRequest::FleeFrom(Vec3::new(0.0, 0.0, 10.0)));
        assert!((output.desired_speed - fsm.config().wounded_speed * 0.3).abs() < 1e-5);

        run(&mut fsm, &quiet(), 150, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Wandering);
    }

    #[test]
    fn test_thirst_walks_to_water_and_drinks() {
        let config = FsmConfig {
            thirst_threshold: 1.0,
            ..calm_config()
        };
        let mut fsm = BehaviorStateMachine::new(config);
        let mut rng = rng();
        let water = Vec3::new(0.0, 0.0, 20.0);

        let mut inputs = FsmInputs {
            water_target: Some(water),
            ..FsmInputs::default()
        };
        run(&mut fsm, &inputs, 12, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Thirsty);

        let output = fsm.advance(DT, &inputs, &mut rng);
        assert_eq!(output.locomotion, LocomotionRequest::MoveTo(water));
        assert_eq!(output.desired_speed, fsm.config().thirsty_speed);

        inputs.position = Vec3::new(0.0, 0.0, 19.0);
        let output = fsm.advance(DT, &inputs, &mut rng);
        assert_eq!(output.state, BehaviorState::Drinking);
        assert_eq!(output.desired_speed, 0.0);
        assert_eq!(output.locomotion, LocomotionRequest::Hold);
        assert_eq!(fsm.time_since_drink(), 0.0);

        run(&mut fsm, &inputs, 85, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Wandering);
        assert!(fsm.time_since_drink() < 1.0);
    }

    #[test]
    fn test_thirst_without_water_is_abandoned() {
        let config = FsmConfig {
            thirst_threshold: 1.0,
            ..calm_config()
        };
        let mut fsm = BehaviorStateMachine::new(config);
        let mut rng = rng();

        for _ in 0..20 {
            if fsm.advance(DT, &quiet(), &mut rng).state != BehaviorState::Idle {
                break;
            }
        }
        assert_eq!(fsm.state(), BehaviorState::Thirsty);

        fsm.advance(DT, &quiet(), &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Wandering);
        assert!((fsm.time_since_drink() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_arrival_graze_or_pause() {
        let arrived = FsmInputs {
            arrived: true,
            ..FsmInputs::default()
        };

        let mut grazer = BehaviorStateMachine::new(FsmConfig {
            grazing_chance: 1.0,
            ..calm_config()
        });
        let mut rng = rng();
        grazer.request_transition(BehaviorState::Wandering);
        let output = grazer.advance(DT, &arrived, &mut rng);
        assert_eq!(output.state, BehaviorState::Grazing);
        assert_eq!(output.animation.key, AnimationKey::Eat);

        let mut walker = BehaviorStateMachine::new(FsmConfig {
            grazing_chance: 0.0,
            ..calm_config()
        });
        walker.request_transition(BehaviorState::Wandering);
        let output = walker.advance(DT, &arrived, &mut rng);
        assert_eq!(output.state, BehaviorState::Wandering);
        assert!(walker.is_wander_paused());
        assert_eq!(output.locomotion, LocomotionRequest::Hold);
        assert_eq!(output.desired_speed, 0.0);

        // Пауза ≤ 4 с, потом снова в путь
        let outputs = run(&mut walker, &quiet(), 45, &mut rng);
        assert!(!walker.is_wander_paused());
        assert_eq!(outputs.last().map(|output| output.locomotion), Some(LocomotionRequest::Wander));
    }

    #[test]
    fn test_idle_timer_leads_to_grazing_then_wandering() {
        let config = FsmConfig {
            idle_duration: [0.5, 0.5],
            graze_duration: [1.0, 1.0],
            grazing_chance: 1.0,
            ..FsmConfig::default()
        };
        let mut fsm = BehaviorStateMachine::new(config);
        let mut rng = rng();

        run(&mut fsm, &quiet(), 6, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Grazing);

        run(&mut fsm, &quiet(), 11, &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Wandering);
    }

    #[test]
    fn test_transition_requests() {
        let mut fsm = BehaviorStateMachine::new(FsmConfig::default());

        assert!(!fsm.request_transition(BehaviorState::Killed));
        assert!(!fsm.request_transition_by_name("killed"));
        assert!(!fsm.request_transition_by_name("Sleeping"));
        assert_eq!(fsm.state(), BehaviorState::Idle);

        assert!(fsm.request_transition_by_name("grazing"));
        assert_eq!(fsm.state(), BehaviorState::Grazing);
        assert_eq!(fsm.state_timer(), 0.0);
    }

    #[test]
    fn test_state_timer_resets_on_transition() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        run(&mut fsm, &quiet(), 10, &mut rng);
        assert!(fsm.state_timer() > 0.9);

        fsm.advance(DT, &seen_at(40.0), &mut rng);
        assert_eq!(fsm.state(), BehaviorState::Alert);
        assert_eq!(fsm.state_timer(), 0.0);
    }

    #[test]
    fn test_reset_restores_fresh_machine() {
        let mut fsm = BehaviorStateMachine::new(FsmConfig::default());
        let mut rng = rng();
        fsm.advance(DT, &seen_at(40.0), &mut rng);
        fsm.enter_killed();

        fsm.reset();

        assert_eq!(fsm.state(), BehaviorState::Idle);
        assert_eq!(fsm.state_timer(), 0.0);
        assert!(!fsm.fallen());
        assert_eq!(fsm.fall_events(), 0);
        assert!(!fsm.has_alerted_target());
        assert!(fsm.last_threat().is_none());
    }

    #[test]
    fn test_same_tick_transitions_are_all_reported() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();

        fsm.request_transition(BehaviorState::Wandering);
        fsm.enter_wounded(Some(Vec3::new(0.0, 0.0, 10.0)));
        let output = fsm.advance(DT, &quiet(), &mut rng);

        assert_eq!(
            &output.transitions[..2],
            &[
                StateTransition {
                    from: BehaviorState::Idle,
                    to: BehaviorState::Wandering,
                },
                StateTransition {
                    from: BehaviorState::Wandering,
                    to: BehaviorState::Wounded,
                },
            ]
        );
        // Очередь отдана целиком
        assert!(fsm.advance(DT, &quiet(), &mut rng).transitions.len() <= 1);
    }

    #[test]
    fn test_reset_reports_return_to_idle() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        fsm.enter_killed();
        fsm.advance(DT, &quiet(), &mut rng);

        fsm.reset();
        let output = fsm.advance(DT, &quiet(), &mut rng);

        assert_eq!(
            output.transitions,
            vec![StateTransition {
                from: BehaviorState::Killed,
                to: BehaviorState::Idle,
            }]
        );

        // Сброс уже спокойной машины ничего не сообщает
        fsm.reset();
        assert!(fsm.advance(DT, &quiet(), &mut rng).transitions.is_empty());
    }

    #[test]
    fn test_invalid_dt_does_not_advance_timers() {
        let mut fsm = BehaviorStateMachine::new(calm_config());
        let mut rng = rng();
        for dt in [0.0, -0.5, f32::NAN, f32::INFINITY] {
            fsm.advance(dt, &quiet(), &mut rng);
        }
        assert_eq!(fsm.state_timer(), 0.0);
        assert_eq!(fsm.time_since_drink(), 0.0);
    }
}
