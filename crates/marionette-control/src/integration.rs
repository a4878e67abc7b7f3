//! End-to-end tests for the control loop.
//!
//! These drive a [`ControlLoop`](crate::ControlLoop) over the mock biped:
//! scene synthesis, address resolution, PD sub-stepping, drag, pacing,
//! reset and motion requests, both through direct calls and through a
//! [`LoopHandle`](crate::LoopHandle) talking to a spawned loop.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_relative_eq;
    use marionette_core::config::{LoopConfig, PdConfig};
    use marionette_core::traits::Policy;
    use marionette_core::types::{JointMapping, PdGains, anchor_name};
    use marionette_mapping::{ModelIndex, resolve};
    use marionette_policy::prelude::*;
    use marionette_test_utils::{
        BIPED_MJCF, ConstantPolicy, FailingPolicy, MockPhysics, PhysicsProbe, SilentPolicy,
        biped_layout, biped_model, spawn_row,
    };
    use tokio::time::Instant;

    use crate::drag::Drag;
    use crate::error::LoopError;
    use crate::handle::LoopHandle;
    use crate::scheduler::{ControlLoop, LoopBuilder, TickOutcome};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn mappings(robots: usize) -> Vec<JointMapping> {
        let model = biped_model(robots);
        let index = ModelIndex::build(&model);
        let resolution = resolve(&index, robots, &biped_layout());
        assert!(resolution.is_complete());
        resolution.mappings
    }

    fn uniform_pd() -> LoopConfig {
        LoopConfig {
            pd: Some(PdConfig { kp: 100.0, kd: 2.0 }),
            ..LoopConfig::default()
        }
    }

    /// Frozen single-robot loop driven by `policy`.
    fn single(policy: Box<dyn Policy>) -> (ControlLoop, LoopHandle, PhysicsProbe) {
        let physics = MockPhysics::new(biped_model(1)).frozen();
        let probe = physics.probe();
        let (control, handle) = LoopBuilder::new(Box::new(physics))
            .with_config(uniform_pd())
            .with_mappings(mappings(1))
            .with_policy(0, policy)
            .build()
            .unwrap();
        (control, handle, probe)
    }

    fn ctrl_after_last_step(probe: &PhysicsProbe) -> Vec<f64> {
        probe.ctrl_at_step().last().cloned().unwrap()
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    #[test]
    fn build_derives_timing_from_model() {
        let (control, _handle, _probe) = single(Box::new(ConstantPolicy::new(vec![0.0; 4])));
        let timing = control.timing();
        assert_relative_eq!(timing.physics_dt, 0.004);
        assert_eq!(timing.decimation, 5);
        assert_eq!(timing.tick_period(), Duration::from_millis(20));
        assert!(!control.is_multi_robot());
        assert!(control.has_policy());
    }

    #[test]
    fn build_rejects_invalid_config() {
        let config = LoopConfig {
            control_dt: 0.0,
            ..LoopConfig::default()
        };
        let result = LoopBuilder::new(Box::new(MockPhysics::new(biped_model(1))))
            .with_config(config)
            .build();
        assert!(matches!(result, Err(LoopError::Config(_))));
    }

    #[test]
    fn build_rejects_infinite_physics_dt() {
        let config = LoopConfig {
            physics_dt: Some(f64::INFINITY),
            ..uniform_pd()
        };
        let result = LoopBuilder::new(Box::new(MockPhysics::new(biped_model(1))))
            .with_config(config)
            .build();
        assert!(matches!(result, Err(LoopError::Config(_))));
    }

    #[test]
    fn build_rejects_infinite_model_timestep() {
        let mut model = biped_model(1);
        model.timestep = f64::INFINITY;
        let result = LoopBuilder::new(Box::new(MockPhysics::new(model)))
            .with_mappings(mappings(1))
            .with_policy(0, Box::new(SilentPolicy::default()))
            .build();
        assert!(matches!(result, Err(LoopError::Config(_))));
    }

    #[test]
    fn policy_for_unmapped_robot_is_dropped() {
        let (control, _handle) = LoopBuilder::new(Box::new(MockPhysics::new(biped_model(1))))
            .with_mappings(mappings(1))
            .with_policy(3, Box::new(SilentPolicy::default()))
            .build()
            .unwrap();
        assert!(!control.has_policy());
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn tick_runs_decimation_substeps() {
        let policy = ConstantPolicy::new(vec![0.0; 4]);
        let counters = policy.counters();
        let (mut control, _handle, probe) = single(Box::new(policy));

        let outcome = control.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Stepped {
                controlled: 1,
                substeps: 5
            }
        );
        assert_eq!(counters.steps(), 1);
        assert_eq!(probe.steps(), 5);
        assert_eq!(control.ticks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pd_commands_are_written_every_substep() {
        let (mut control, _handle, probe) =
            single(Box::new(ConstantPolicy::new(vec![0.1, 0.2, -0.1, 0.0])));
        control.tick().await.unwrap();

        let history = probe.ctrl_at_step();
        assert_eq!(history.len(), 5);
        for ctrl in history {
            assert_relative_eq!(ctrl[0], 10.0, epsilon = 1e-4);
            assert_relative_eq!(ctrl[1], 20.0, epsilon = 1e-4);
            assert_relative_eq!(ctrl[2], -10.0, epsilon = 1e-4);
            assert_relative_eq!(ctrl[3], 0.0, epsilon = 1e-4);
        }
        assert_eq!(control.target(0).unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_clamped_to_ctrlrange() {
        let (mut control, _handle, probe) = single(Box::new(ConstantPolicy::new(vec![5.0; 4])));
        control.tick().await.unwrap();
        assert!(
            ctrl_after_last_step(&probe)
                .iter()
                .all(|&c| (c - 120.0).abs() < 1e-9)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn policy_gains_take_precedence() {
        let policy =
            ConstantPolicy::new(vec![0.1; 4]).with_gains(PdGains::uniform(4, 10.0, 0.0));
        let (mut control, _handle, probe) = single(Box::new(policy));
        control.tick().await.unwrap();
        assert_relative_eq!(ctrl_after_last_step(&probe)[0], 1.0, epsilon = 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn robot_without_gains_is_skipped() {
        let physics = MockPhysics::new(biped_model(1)).frozen();
        let probe = physics.probe();
        let (mut control, _handle) = LoopBuilder::new(Box::new(physics))
            .with_mappings(mappings(1))
            .with_policy(0, Box::new(ConstantPolicy::new(vec![0.5; 4])))
            .build()
            .unwrap();

        let outcome = control.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Stepped {
                controlled: 0,
                substeps: 5
            }
        );
        assert!(control.target(0).is_none());
        assert!(ctrl_after_last_step(&probe).iter().all(|&c| c == 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_action_skips_only_that_robot() {
        let physics = MockPhysics::new(biped_model(2)).frozen();
        let probe = physics.probe();
        let (mut control, _handle) = LoopBuilder::new(Box::new(physics))
            .with_config(uniform_pd())
            .with_mappings(mappings(2))
            .with_policy(0, Box::new(ConstantPolicy::new(vec![0.1; 4])))
            .with_policy(1, Box::new(ConstantPolicy::new(vec![0.1; 3])))
            .build()
            .unwrap();

        let outcome = control.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Stepped {
                controlled: 1,
                substeps: 5
            }
        );
        let ctrl = ctrl_after_last_step(&probe);
        assert!(ctrl[..4].iter().all(|&c| (c - 10.0).abs() < 1e-4));
        assert!(ctrl[4..].iter().all(|&c| c == 0.0));
        assert!(control.target(1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_robot_holds_last_command() {
        let physics = MockPhysics::new(biped_model(2)).frozen();
        let probe = physics.probe();
        let (mut control, _handle) = LoopBuilder::new(Box::new(physics))
            .with_config(uniform_pd())
            .with_mappings(mappings(2))
            .with_policy(0, Box::new(ConstantPolicy::new(vec![0.2; 4])))
            .with_policy(1, Box::new(ConstantPolicy::new(vec![0.1; 4])))
            .build()
            .unwrap();

        control.tick().await.unwrap();
        let first = ctrl_after_last_step(&probe);
        assert!(first[4..].iter().all(|&c| (c - 10.0).abs() < 1e-4));

        // Robot 1 now emits an action of the wrong length.
        assert!(control.attach_policy(1, Box::new(ConstantPolicy::new(vec![0.1; 3]))));
        let outcome = control.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Stepped {
                controlled: 1,
                substeps: 5
            }
        );
        assert!(control.target(1).is_none());
        assert_eq!(probe.steps(), 10);

        let history = probe.ctrl_at_step();
        for ctrl in &history[5..] {
            assert!(ctrl[..4].iter().all(|&c| (c - 20.0).abs() < 1e-4));
            assert!(ctrl[4..].iter().all(|&c| (c - 10.0).abs() < 1e-4));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silent_policy_leaves_robot_uncontrolled() {
        let policy = SilentPolicy::default();
        let counters = policy.counters();
        let (mut control, _handle, probe) = single(Box::new(policy));
        let outcome = control.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Stepped {
                controlled: 0,
                substeps: 5
            }
        );
        assert_eq!(counters.steps(), 1);
        assert_eq!(probe.steps(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn inference_failure_stops_before_physics() {
        let (mut control, handle, probe) = single(Box::new(FailingPolicy::on_step()));
        let err = control.tick().await.unwrap_err();
        assert!(matches!(err, LoopError::Inference { robot: 0, .. }));
        assert!(!handle.is_alive());
        assert_eq!(probe.steps(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_tick_is_idle() {
        let policy = ConstantPolicy::new(vec![0.0; 4]);
        let counters = policy.counters();
        let (mut control, handle, probe) = single(Box::new(policy));
        handle.pause();
        assert_eq!(control.tick().await.unwrap(), TickOutcome::Idle);
        assert_eq!(counters.steps(), 0);
        assert_eq!(probe.steps(), 0);

        handle.resume();
        assert!(matches!(
            control.tick().await.unwrap(),
            TickOutcome::Stepped { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_is_paced_to_wall_clock() {
        let (mut control, _handle, _probe) = single(Box::new(ConstantPolicy::new(vec![0.0; 4])));
        let period = control.timing().tick_period();
        let started = Instant::now();
        control.tick().await.unwrap();
        control.tick().await.unwrap();
        assert!(started.elapsed() >= period * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn drag_is_applied_every_substep() {
        let (mut control, handle, probe) = single(Box::new(ConstantPolicy::new(vec![0.0; 4])));
        handle.set_drag(Drag {
            body: 1,
            local_point: [0.0; 3],
            delta: [0.0, 0.1, 0.0],
        });
        control.tick().await.unwrap();
        let applied = probe.applied();
        assert_eq!(applied.len(), 5);
        // stiffness 250 * pelvis mass 5 * 0.1 up
        assert_relative_eq!(applied[0].force[2], 125.0, epsilon = 1e-9);

        handle.clear_drag();
        control.tick().await.unwrap();
        assert_eq!(probe.applied().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_published_after_tick() {
        let (mut control, handle, _probe) = single(Box::new(ConstantPolicy::new(vec![0.0; 4])));
        let mut snapshots = handle.snapshots();
        control.tick().await.unwrap();
        assert!(snapshots.has_changed().unwrap());
        let snapshot = snapshots.borrow_and_update().clone();
        assert_eq!(snapshot.tick, 1);
        assert_relative_eq!(snapshot.sim_time, 0.02, epsilon = 1e-12);
        assert_eq!(snapshot.nbody(), 6);
        assert_eq!(snapshot.light_xdir, vec![0.0, 0.0, -1.0]);
    }

    #[tokio::test]
    async fn run_without_policy_returns_immediately() {
        let (mut control, _handle) = LoopBuilder::new(Box::new(MockPhysics::new(biped_model(1))))
            .with_mappings(mappings(1))
            .build()
            .unwrap();
        assert!(control.run().await.is_ok());
        assert_eq!(control.ticks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn returned_loop_rejects_handle_requests() {
        let (mut control, handle) = LoopBuilder::new(Box::new(MockPhysics::new(biped_model(1))))
            .with_mappings(mappings(1))
            .build()
            .unwrap();
        control.run().await.unwrap();

        // The loop is still in scope but no longer serving requests.
        assert!(!handle.is_alive());
        let reset = tokio::time::timeout(Duration::from_secs(1), handle.reset())
            .await
            .unwrap();
        assert!(matches!(reset, Err(LoopError::Stopped)));
        assert!(!handle.request_motion("nod", None, false).await);
        assert_eq!(control.ticks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn attached_policy_takes_over() {
        let (mut control, _handle) = LoopBuilder::new(Box::new(MockPhysics::new(biped_model(1))))
            .with_config(uniform_pd())
            .with_mappings(mappings(1))
            .build()
            .unwrap();
        assert_eq!(control.tick().await.unwrap(), TickOutcome::Idle);

        assert!(!control.attach_policy(4, Box::new(ScriptedPolicy::new(vec![vec![0.0; 4]]))));
        assert!(control.attach_policy(0, Box::new(RandomPolicy::new(vec![0.0; 4], 0.1, 9))));
        assert!(matches!(
            control.tick().await.unwrap(),
            TickOutcome::Stepped { controlled: 1, .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    fn multi(
        robots: usize,
        policies: Vec<Box<dyn Policy>>,
    ) -> (ControlLoop, LoopHandle, PhysicsProbe) {
        let physics = MockPhysics::new(biped_model(robots));
        let probe = physics.probe();
        let config = LoopConfig {
            robots: spawn_row(robots),
            ..uniform_pd()
        };
        let mut builder = LoopBuilder::new(Box::new(physics))
            .with_config(config)
            .with_mappings(mappings(robots));
        for (robot, policy) in policies.into_iter().enumerate() {
            builder = builder.with_policy(robot, policy);
        }
        let (control, handle) = builder.build().unwrap();
        (control, handle, probe)
    }

    #[tokio::test(start_paused = true)]
    async fn reset_places_robots_at_spawns() {
        let a = ConstantPolicy::new(vec![0.0; 4]);
        let b = ConstantPolicy::new(vec![0.0; 4]);
        let (ca, cb) = (a.counters(), b.counters());
        let (mut control, handle, probe) = multi(2, vec![Box::new(a), Box::new(b)]);
        assert!(control.is_multi_robot());

        control.tick().await.unwrap();
        control.reset().await.unwrap();

        assert_eq!(probe.resets(), 1);
        assert_eq!((ca.resets(), cb.resets()), (1, 1));
        assert!(!handle.is_paused());
        assert!(control.target(0).is_none());

        let qpos = control.physics().qpos();
        assert_eq!(&qpos[..7], &[0.0, 0.0, 0.8, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(&qpos[11..18], &[1.5, 0.0, 0.8, 1.0, 0.0, 0.0, 0.0]);
        let model = control.physics().model();
        let pelvis = model.body_names.iter().position(|n| *n == anchor_name(1));
        assert_relative_eq!(control.physics().xpos()[3 * pelvis.unwrap()], 1.5);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_policy_reset_still_resumes() {
        let healthy = ConstantPolicy::new(vec![0.0; 4]);
        let counters = healthy.counters();
        let (mut control, handle, _probe) =
            multi(2, vec![Box::new(FailingPolicy::always()), Box::new(healthy)]);

        let err = control.reset().await.unwrap_err();
        assert!(matches!(err, LoopError::Reset { robot: 0, .. }));
        assert_eq!(counters.resets(), 1);
        assert!(!handle.is_paused());
    }

    // -----------------------------------------------------------------------
    // Motion requests
    // -----------------------------------------------------------------------

    fn nod() -> Motion {
        Motion::new(vec![
            Keyframe {
                time: 0.0,
                pose: vec![-0.1, 0.3, -0.1, 0.3],
            },
            Keyframe {
                time: 0.2,
                pose: vec![-0.4, 0.9, -0.4, 0.9],
            },
        ])
        .unwrap()
    }

    fn keyframe_policy() -> KeyframePolicy {
        KeyframePolicy::from_layout(&biped_layout(), 0.02)
            .with_motion("nod", nod())
            .with_settle_tolerance(0.5)
    }

    #[tokio::test(start_paused = true)]
    async fn motion_requests_are_routed() {
        let (mut control, _handle, _probe) = multi(
            2,
            vec![
                Box::new(keyframe_policy()),
                Box::new(ConstantPolicy::new(vec![0.0; 4])),
            ],
        );
        assert!(!control.request_motion("jump", Some(0), false));
        assert!(!control.request_motion("nod", Some(7), false));
        assert!(control.request_motion("nod", Some(0), false));
        // Robot 1 cannot track motions.
        assert!(!control.request_motion("nod", None, true));
    }

    #[tokio::test(start_paused = true)]
    async fn forced_motion_drives_targets() {
        let (mut control, _handle, _probe) = multi(
            2,
            vec![
                Box::new(keyframe_policy().with_blend(0.0)),
                Box::new(keyframe_policy().with_blend(0.0)),
            ],
        );
        assert!(control.request_motion("nod", None, true));
        for _ in 0..3 {
            control.tick().await.unwrap();
        }
        let target = control.target(1).unwrap().as_slice();
        assert!(target[1] > 0.3);
    }

    // -----------------------------------------------------------------------
    // Handle against a spawned loop
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn handle_steers_spawned_loop() {
        let (mut control, handle, probe) = multi(
            2,
            vec![
                Box::new(keyframe_policy()),
                Box::new(keyframe_policy()),
            ],
        );
        let task = tokio::spawn(async move { control.run().await });

        let mut snapshots = handle.snapshots();
        snapshots.changed().await.unwrap();
        assert!(snapshots.borrow().tick >= 1);

        handle.reset().await.unwrap();
        assert_eq!(probe.resets(), 1);
        assert!(handle.request_motion("nod", Some(1), true).await);

        handle.stop();
        task.await.unwrap().unwrap();
        assert!(!handle.request_motion("nod", None, true).await);
        assert!(matches!(handle.reset().await, Err(LoopError::Stopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_reports_inference_failure() {
        let (mut control, handle, probe) = single(Box::new(FailingPolicy::on_step()));
        let task = tokio::spawn(async move { control.run().await });
        let result = task.await.unwrap();
        assert!(matches!(result, Err(LoopError::Inference { robot: 0, .. })));
        assert!(!handle.is_alive());
        assert_eq!(probe.steps(), 0);
    }

    // -----------------------------------------------------------------------
    // Full pipeline
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn synthesized_scene_resolves_and_runs() {
        let spawns = spawn_row(3);
        let scene = marionette_scene::synthesize(BIPED_MJCF, &spawns).unwrap();
        for robot in 0..3 {
            let anchor = format!("name=\"{}\"", anchor_name(robot));
            assert_eq!(scene.matches(&anchor).count(), 1);
        }

        // Model metadata mirrors what the engine reports for `scene`.
        let model = biped_model(3);
        let index = ModelIndex::build(&model);
        let resolution = resolve(&index, 3, &biped_layout());
        assert_eq!(resolution.pelvis_bodies(), vec![1, 6, 11]);

        let config = LoopConfig {
            robots: spawns,
            ..LoopConfig::default()
        };
        let mut builder = LoopBuilder::new(Box::new(MockPhysics::new(model.clone())))
            .with_config(config)
            .with_mappings(resolution.mappings);
        for robot in 0..3 {
            builder = builder.with_policy(robot, Box::new(HoldPosePolicy::from_layout(&biped_layout())));
        }
        let (mut control, handle) = builder.build().unwrap();

        control.reset().await.unwrap();
        let outcome = control.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Stepped {
                controlled: 3,
                substeps: 5
            }
        );

        let snapshot = handle.latest_snapshot();
        assert_eq!(snapshot.body_position(6), Some([1.5, 0.0, 0.8]));
        assert_eq!(snapshot.body_position(11), Some([3.0, 0.0, 0.8]));
        assert_eq!(snapshot.body_quat(11), Some([1.0, 0.0, 0.0, 0.0]));
        // Hips bend toward the crouched default pose.
        assert!(control.physics().ctrl()[0] < 0.0);
    }
}
