//! Runtime 单元测试
//!
//! 测试运行器状态机、控制器生命周期和模拟时钟
#![allow(unused_imports)]
use crate::dispatch::{Command, Operation};
use crate::program::{MoveDirection, Program, ProgramError, StatementId, StatementKind, TurnDirection};
use crate::runtime::sim::{drain, sim_controller, simulate, Event, ManualTimer, Recorder, SimClock};
use crate::runtime::{
    Env, MotionProfile, RunOutcome, RunState, Runner, RunnerError, RunnerState, Timer, TimerId,
};
use std::time::Duration;

fn speak(text: &str) -> StatementKind {
    StatementKind::Speak {
        text: text.to_string(),
    }
}

fn wait(seconds: f64) -> StatementKind {
    StatementKind::Wait { seconds }
}

fn forward(distance: f64) -> StatementKind {
    StatementKind::Move {
        direction: MoveDirection::Forward,
        distance,
    }
}

fn motor(
    x: f64,
    y: f64,
) -> Command {
    Command::MoveMotor { x, y }
}

#[cfg(test)]
mod runner_tests {
    use super::*;

    #[test]
    fn test_move_then_speak() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![forward(10.0), speak("hi")]));

        assert_eq!(ctl.state(), RunState::Suspended);
        assert_eq!(rec.commands(), vec![motor(0.0, 0.8)]);

        drain(&mut ctl, 10);
        assert_eq!(ctl.state(), RunState::Stopped);
        assert_eq!(ctl.outcome(), Some(&RunOutcome::Completed));
        assert_eq!(
            rec.commands(),
            vec![
                motor(0.0, 0.8),
                motor(0.0, 0.0),
                Command::Speak {
                    text: "hi".to_string()
                },
            ]
        );

        let halt_at = rec
            .records()
            .into_iter()
            .find(|r| r.event == Event::Dispatched(motor(0.0, 0.0)))
            .map(|r| r.at)
            .unwrap();
        assert!((halt_at.as_secs_f64() - 0.588).abs() < 0.001);
    }

    #[test]
    fn test_empty_program_finishes_immediately() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::default());

        assert_eq!(ctl.state(), RunState::Stopped);
        assert_eq!(ctl.outcome(), Some(&RunOutcome::Rejected(ProgramError::Empty)));
        assert_eq!(rec.command_count(), 0);
        assert_eq!(ctl.timer_mut().pending(), 0);
    }

    #[test]
    fn test_invalid_program_issues_no_commands() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![speak("hi"), forward(-3.0)]));

        assert!(matches!(
            ctl.outcome(),
            Some(RunOutcome::Rejected(ProgramError::Negative { .. }))
        ));
        assert_eq!(rec.command_count(), 0);
    }

    #[test]
    fn test_non_suspending_statements_run_in_one_turn() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![
            speak("a"),
            StatementKind::Servo {
                servo: "G".to_string(),
                value: 30.0,
            },
            StatementKind::Audio {
                clip: "beep".to_string(),
            },
            StatementKind::Stop,
        ]));

        assert_eq!(ctl.state(), RunState::Stopped);
        assert_eq!(
            rec.commands(),
            vec![
                Command::Speak {
                    text: "a".to_string()
                },
                Command::SetServo {
                    servo: "G".to_string(),
                    value: 30.0
                },
                Command::PlayAudio {
                    clip: "beep".to_string()
                },
                motor(0.0, 0.0),
            ]
        );
    }

    #[test]
    fn test_wait_holds_for_its_duration() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![wait(2.0), speak("after")]));
        assert_eq!(ctl.state(), RunState::Suspended);

        let fired = ctl.timer_mut().advance(Duration::from_millis(1900));
        assert!(fired.is_empty());
        assert_eq!(ctl.state(), RunState::Suspended);
        assert_eq!(rec.command_count(), 0);

        let fired = ctl.timer_mut().advance(Duration::from_millis(200));
        assert_eq!(fired.len(), 1);
        assert!(ctl.on_timer(fired[0]));
        assert_eq!(rec.command_count(), 1);
        assert_eq!(ctl.state(), RunState::Stopped);

        let speak_at = rec.records().into_iter().find_map(|r| match r.event {
            Event::Dispatched(_) => Some(r.at),
            _ => None,
        });
        assert!(speak_at.unwrap() >= Duration::from_secs(2));
    }

    #[test]
    fn test_zero_wait_yields_before_continuing() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![wait(0.0), speak("x")]));

        // Not resolved inline: still suspended, nothing sent yet.
        assert_eq!(ctl.state(), RunState::Suspended);
        assert_eq!(rec.command_count(), 0);

        let (_, due) = ctl.timer_mut().next_due().unwrap();
        assert_eq!(due, Duration::ZERO);
        drain(&mut ctl, 5);
        assert_eq!(rec.command_count(), 1);
    }

    #[test]
    fn test_negative_wait_behaves_like_zero() {
        let (mut ctl, _rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![wait(-5.0)]));
        assert_eq!(ctl.state(), RunState::Suspended);
        assert_eq!(ctl.timer_mut().next_due().unwrap().1, Duration::ZERO);
        drain(&mut ctl, 5);
        assert_eq!(ctl.outcome(), Some(&RunOutcome::Completed));
    }

    #[test]
    fn test_turn_uses_turn_calibration() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![
            StatementKind::Turn {
                direction: TurnDirection::Left,
                degrees: 180.0,
            },
            StatementKind::Turn {
                direction: TurnDirection::Right,
                degrees: 90.0,
            },
        ]));
        drain(&mut ctl, 10);

        assert_eq!(
            rec.commands(),
            vec![motor(-0.5, 0.0), motor(0.0, 0.0), motor(0.5, 0.0), motor(0.0, 0.0)]
        );
        let elapsed = ctl.timer_mut().clock().now().as_secs_f64();
        assert!((elapsed - 5.4).abs() < 1e-6);
    }

    #[test]
    fn test_backward_move_with_custom_speed() {
        let profile = MotionProfile {
            motor_power: 0.6,
            motor_speed: 20.0,
            ..MotionProfile::default()
        };
        let (mut ctl, rec) = sim_controller(profile);
        ctl.run(Program::from_kinds(vec![StatementKind::Move {
            direction: MoveDirection::Backward,
            distance: 10.0,
        }]));
        drain(&mut ctl, 10);

        assert_eq!(rec.commands(), vec![motor(0.0, -0.6), motor(0.0, 0.0)]);
        assert_eq!(ctl.timer_mut().clock().now(), Duration::from_millis(500));
    }

    #[test]
    fn test_highlight_sequence() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![speak("a"), wait(1.0), speak("b")]));
        drain(&mut ctl, 10);

        let events: Vec<Event> = rec
            .records()
            .into_iter()
            .map(|r| r.event)
            .filter(|e| !matches!(e, Event::Dispatched(_)))
            .collect();
        assert_eq!(
            events,
            vec![
                Event::Highlight(Some(StatementId::from("s0"))),
                Event::Highlight(Some(StatementId::from("s1"))),
                Event::Highlight(Some(StatementId::from("s2"))),
                Event::Highlight(None),
                Event::Finished(RunOutcome::Completed),
            ]
        );
    }

    #[test]
    fn test_runner_refuses_second_start() {
        let clock = SimClock::new();
        let recorder = Recorder::new(clock.clone());
        let mut listener = recorder.clone();
        let mut timer = ManualTimer::new(clock);
        let mut env = Env {
            dispatcher: &recorder,
            timer: &mut timer,
            listener: &mut listener,
        };

        let mut runner = Runner::new(MotionProfile::default());
        runner
            .start(Program::from_kinds(vec![wait(1.0)]), &mut env)
            .unwrap();
        assert_eq!(runner.state(), RunnerState::Suspended);
        assert_eq!(runner.current().map(|s| s.id.as_str()), Some("s0"));

        let err = runner
            .start(Program::from_kinds(vec![speak("x")]), &mut env)
            .unwrap_err();
        assert_eq!(err, RunnerError::NotIdle(RunnerState::Suspended));
        assert_eq!(runner.reset(), Err(RunnerError::StillActive));

        assert!(runner.stop(&mut env));
        assert_eq!(runner.reset(), Ok(()));
        assert_eq!(runner.state(), RunnerState::Idle);
    }
}

#[cfg(test)]
mod cancellation_tests {
    use super::*;

    #[test]
    fn test_stop_during_wait_cancels_timer() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![wait(3.0), speak("never")]));
        let old = ctl.pending_timer().unwrap();

        ctl.stop();
        assert_eq!(ctl.state(), RunState::Stopped);
        assert_eq!(ctl.outcome(), Some(&RunOutcome::Stopped));
        assert!(!ctl.timer_mut().is_pending(old));

        // Force-fire the cancelled timer anyway.
        assert!(!ctl.on_timer(old));
        assert_eq!(rec.command_count(), 0);
        assert_eq!(ctl.state(), RunState::Stopped);
    }

    #[test]
    fn test_stop_during_move_halts_motors() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![forward(50.0), speak("never")]));
        let old = ctl.pending_timer().unwrap();

        ctl.stop();
        let after_stop = rec.command_count();
        assert_eq!(rec.commands(), vec![motor(0.0, 0.8), motor(0.0, 0.0)]);

        ctl.on_timer(old);
        assert_eq!(rec.command_count(), after_stop);
    }

    #[test]
    fn test_stop_when_idle_is_a_no_op() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.stop();
        ctl.stop();
        assert_eq!(ctl.state(), RunState::Idle);
        assert!(rec.records().is_empty());
    }

    #[test]
    fn test_stop_after_completion_keeps_outcome() {
        let (mut ctl, _rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![speak("a")]));
        ctl.stop();
        assert_eq!(ctl.outcome(), Some(&RunOutcome::Completed));
    }

    #[test]
    fn test_run_while_running_replaces_the_run() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![wait(1.0), speak("old")]));
        let old = ctl.pending_timer().unwrap();

        ctl.run(Program::new(vec![crate::program::Statement::new(
            "n0",
            speak("new"),
        )]));
        assert!(!ctl.on_timer(old));
        drain(&mut ctl, 10);

        assert_eq!(
            rec.commands(),
            vec![Command::Speak {
                text: "new".to_string()
            }]
        );
        assert_eq!(ctl.outcome(), Some(&RunOutcome::Completed));
        assert!(rec
            .records()
            .iter()
            .any(|r| r.event == Event::Finished(RunOutcome::Stopped)));
    }

    #[test]
    fn test_program_change_invalidates_run() {
        let (mut ctl, rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![wait(1.0), speak("stale")]));
        let old = ctl.pending_timer().unwrap();

        ctl.program_changed();
        assert_eq!(ctl.state(), RunState::Idle);
        assert!(!ctl.is_active());
        assert!(!ctl.on_timer(old));
        assert_eq!(rec.command_count(), 0);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let (mut ctl, _rec) = sim_controller(MotionProfile::default());
        ctl.run(Program::from_kinds(vec![speak("a")]));
        assert_eq!(ctl.state(), RunState::Stopped);
        ctl.reset();
        assert_eq!(ctl.state(), RunState::Idle);
        assert_eq!(ctl.outcome(), None);
    }
}

#[cfg(test)]
mod sim_tests {
    use super::*;

    #[test]
    fn test_manual_timer_orders_by_due_time() {
        let mut timer = ManualTimer::new(SimClock::new());
        let late = timer.schedule(Duration::from_secs(5));
        let early = timer.schedule(Duration::from_secs(1));
        let also_early = timer.schedule(Duration::from_secs(1));

        assert_eq!(timer.fire_next(), Some(early));
        assert_eq!(timer.fire_next(), Some(also_early));
        assert_eq!(timer.clock().now(), Duration::from_secs(1));
        assert_eq!(timer.fire_next(), Some(late));
        assert_eq!(timer.fire_next(), None);
    }

    #[test]
    fn test_manual_timer_cancel() {
        let mut timer = ManualTimer::new(SimClock::new());
        let id = timer.schedule(Duration::from_secs(1));
        timer.cancel(id);
        timer.cancel(TimerId(99));
        assert_eq!(timer.pending(), 0);
        assert!(timer.advance(Duration::from_secs(10)).is_empty());
        assert_eq!(timer.clock().now(), Duration::from_secs(10));
    }

    #[test]
    fn test_simulate_reports_elapsed_time() {
        let sim = simulate(
            Program::from_kinds(vec![wait(1.5), speak("done"), wait(0.5)]),
            MotionProfile::default(),
        );
        assert_eq!(sim.outcome, Some(RunOutcome::Completed));
        assert_eq!(sim.elapsed, Duration::from_secs(2));
    }
}

#[cfg(test)]
mod motion_tests {
    use super::*;
    use crate::runtime::MotionError;

    #[test]
    fn test_default_profile_is_valid() {
        assert!(MotionProfile::default().validate().is_ok());
    }

    #[test]
    fn test_profile_validation() {
        let profile = MotionProfile {
            motor_speed: -1.0,
            ..MotionProfile::default()
        };
        assert_eq!(
            profile.validate(),
            Err(MotionError::NotPositive {
                field: "motor_speed"
            })
        );

        let profile = MotionProfile {
            turn_power: 1.5,
            ..MotionProfile::default()
        };
        assert_eq!(
            profile.validate(),
            Err(MotionError::OutOfRange { field: "turn_power" })
        );
    }

    #[test]
    fn test_drive_maneuver() {
        let m = MotionProfile::default().drive(MoveDirection::Forward, 17.0);
        assert_eq!((m.x, m.y), (0.0, 0.8));
        assert_eq!(m.duration, Duration::from_secs(1));
    }
}

#[cfg(test)]
mod tokio_timer_tests {
    use super::*;
    use crate::runtime::TokioTimer;
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioTimer::new(Handle::current(), tx);
        let id = timer.schedule(Duration::from_millis(250));

        let start = tokio::time::Instant::now();
        assert_eq!(rx.recv().await, Some(id));
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_one_shot_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioTimer::new(Handle::current(), tx);
        let cancelled = timer.schedule(Duration::from_millis(100));
        let kept = timer.schedule(Duration::from_millis(200));
        timer.cancel(cancelled);

        assert_eq!(rx.recv().await, Some(kept));
        assert_eq!(timer.pending(), 0);
    }

    #[tokio::test]
    async fn test_zero_delay_is_asynchronous() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioTimer::new(Handle::current(), tx);
        let id = timer.schedule(Duration::ZERO);

        assert!(rx.try_recv().is_err());
        assert_eq!(rx.recv().await, Some(id));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn instant_statement() -> impl Strategy<Value = StatementKind> {
        prop_oneof![
            "[a-z ]{0,12}".prop_map(|text| StatementKind::Speak { text }),
            ("[A-Z]", 0.0..180.0f64).prop_map(|(servo, value)| StatementKind::Servo { servo, value }),
            "[a-z]{1,8}".prop_map(|clip| StatementKind::Audio { clip }),
            Just(StatementKind::Stop),
        ]
    }

    proptest! {
        #[test]
        fn instant_programs_dispatch_in_order(kinds in prop::collection::vec(instant_statement(), 1..20)) {
            let (mut ctl, rec) = sim_controller(MotionProfile::default());
            ctl.run(Program::from_kinds(kinds.clone()));

            prop_assert_eq!(ctl.state(), RunState::Stopped);
            prop_assert_eq!(rec.command_count(), kinds.len());
            let operations: Vec<Operation> = rec
                .commands()
                .iter()
                .map(|c| c.operation())
                .collect();
            let expected: Vec<Operation> = kinds
                .iter()
                .map(|k| match k {
                    StatementKind::Speak { .. } => Operation::Speak,
                    StatementKind::Servo { .. } => Operation::SetServo,
                    StatementKind::Audio { .. } => Operation::PlayAudio,
                    _ => Operation::MoveMotor,
                })
                .collect();
            prop_assert_eq!(operations, expected);
        }

        #[test]
        fn waits_take_their_total_time(waits in prop::collection::vec(0u64..5000, 1..8)) {
            let kinds: Vec<StatementKind> = waits
                .iter()
                .map(|ms| wait(*ms as f64 / 1000.0))
                .collect();
            let sim = simulate(Program::from_kinds(kinds), MotionProfile::default());
            let total: u64 = waits.iter().sum();

            prop_assert_eq!(sim.outcome, Some(RunOutcome::Completed));
            let drift = sim.elapsed.as_secs_f64() - total as f64 / 1000.0;
            prop_assert!(drift.abs() < 1e-6);
        }
    }
}
