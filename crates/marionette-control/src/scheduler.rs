//! The per-tick control loop.
//!
//! One [`ControlLoop`] owns the physics handle and every robot's policy.
//! Each tick it samples robot state through the [`JointMapping`] tables,
//! awaits every policy, converts valid targets into PD actuator commands,
//! applies any interactive drag, advances physics by `decimation` sub-steps,
//! publishes a [`PoseSnapshot`] and sleeps out the rest of the tick.
//!
//! Build one with [`LoopBuilder`]:
//!
//! ```no_run
//! # async fn demo(physics: Box<dyn marionette_core::physics::Physics>,
//! #               mappings: Vec<marionette_core::types::JointMapping>,
//! #               policy: Box<dyn marionette_core::traits::Policy>)
//! #               -> Result<(), marionette_control::LoopError> {
//! use marionette_control::LoopBuilder;
//!
//! let (mut control, handle) = LoopBuilder::new(physics)
//!     .with_mappings(mappings)
//!     .with_policy(0, policy)
//!     .build()?;
//! tokio::spawn(async move { control.run().await });
//! handle.pause();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use marionette_core::config::{DragConfig, LoopConfig};
use marionette_core::error::ConfigError;
use marionette_core::physics::Physics;
use marionette_core::time::LoopTiming;
use marionette_core::traits::Policy;
use marionette_core::types::{ActionTarget, JointMapping, PdGains, PolicyState, RobotSpawnConfig};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::drag::{self, Drag};
use crate::error::LoopError;
use crate::handle::{Command, LoopHandle};
use crate::pd;
use crate::snapshot::PoseSnapshot;
use crate::stats::SimRate;

const COMMAND_CAPACITY: usize = 16;

const UPRIGHT: [f64; 4] = [1.0, 0.0, 0.0, 0.0];

// ---------------------------------------------------------------------------
// RobotSlot
// ---------------------------------------------------------------------------

/// Per-robot control state.
struct RobotSlot {
    mapping: JointMapping,
    policy: Option<Box<dyn Policy>>,
    /// Fallback gains when the policy ships none.
    gains: Option<PdGains>,
    /// This tick's validated target, `None` when the robot is skipped.
    target: Option<ActionTarget>,
}

impl RobotSlot {
    fn robot(&self) -> usize {
        self.mapping.robot
    }

    /// Policy gains, else the loop's fallback, if they fit the action count.
    fn effective_gains(&self) -> Option<&PdGains> {
        self.policy
            .as_ref()
            .and_then(|p| p.pd_gains())
            .or(self.gains.as_ref())
            .filter(|g| g.len() == self.mapping.num_actions)
    }
}

// ---------------------------------------------------------------------------
// TickOutcome
// ---------------------------------------------------------------------------

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Paused or no policy attached: no inference, no physics.
    Idle,
    /// Policies ran and physics advanced.
    Stepped {
        /// Robots that had a valid target this tick.
        controlled: usize,
        substeps: usize,
    },
}

// ---------------------------------------------------------------------------
// LoopBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for a [`ControlLoop`] and its [`LoopHandle`].
pub struct LoopBuilder {
    physics: Box<dyn Physics>,
    config: LoopConfig,
    mappings: Vec<JointMapping>,
    policies: Vec<(usize, Box<dyn Policy>)>,
    gains: Option<PdGains>,
}

impl LoopBuilder {
    pub fn new(physics: Box<dyn Physics>) -> Self {
        Self {
            physics,
            config: LoopConfig::default(),
            mappings: Vec::new(),
            policies: Vec::new(),
            gains: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Address tables for the robots to control, one per robot.
    #[must_use]
    pub fn with_mappings(mut self, mappings: Vec<JointMapping>) -> Self {
        self.mappings = mappings;
        self
    }

    /// Attach `policy` to `robot`.
    #[must_use]
    pub fn with_policy(mut self, robot: usize, policy: Box<dyn Policy>) -> Self {
        self.policies.push((robot, policy));
        self
    }

    /// Fallback PD gains for robots whose policy ships none. Takes precedence
    /// over the config's uniform `pd` gains.
    #[must_use]
    pub fn with_gains(mut self, gains: PdGains) -> Self {
        self.gains = Some(gains);
        self
    }

    pub fn build(self) -> Result<(ControlLoop, LoopHandle), LoopError> {
        self.config.validate()?;
        let timing = self.config.timing(self.physics.model().timestep);
        if !timing.physics_dt.is_finite() || timing.physics_dt <= 0.0 {
            return Err(ConfigError::InvalidPhysicsDt(timing.physics_dt).into());
        }

        let mut robots: Vec<RobotSlot> = self
            .mappings
            .into_iter()
            .map(|mapping| {
                let gains = match (&self.gains, self.config.pd) {
                    (Some(gains), _) => Some(gains.clone()),
                    (None, Some(pd)) => Some(PdGains::uniform(mapping.num_actions, pd.kp, pd.kd)),
                    (None, None) => None,
                };
                RobotSlot {
                    mapping,
                    policy: None,
                    gains,
                    target: None,
                }
            })
            .collect();
        robots.sort_by_key(RobotSlot::robot);

        for (robot, policy) in self.policies {
            match robots.iter_mut().find(|s| s.robot() == robot) {
                Some(slot) => slot.policy = Some(policy),
                None => warn!(robot, policy = policy.name(), "no mapping for robot, policy dropped"),
            }
        }

        let alive = Arc::new(AtomicBool::new(true));
        let paused = Arc::new(AtomicBool::new(false));
        let (drag_tx, drag_rx) = watch::channel(None);
        let (snapshot_tx, snapshot_rx) = watch::channel(PoseSnapshot::default());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        let handle = LoopHandle {
            alive: Arc::clone(&alive),
            paused: Arc::clone(&paused),
            drag: Arc::new(drag_tx),
            snapshots: snapshot_rx,
            commands: command_tx,
        };
        let control = ControlLoop {
            physics: self.physics,
            robots,
            spawns: self.config.robots,
            timing,
            drag_config: self.config.drag,
            alive,
            paused,
            drag: drag_rx,
            snapshots: snapshot_tx,
            commands: command_rx,
            rate: SimRate::new(Duration::from_millis(self.config.rate_window_ms)),
            ticks: 0,
            sim_time: 0.0,
        };
        Ok((control, handle))
    }
}

// ---------------------------------------------------------------------------
// ControlLoop
// ---------------------------------------------------------------------------

/// Scheduler context: physics, robots, timing and shared flags.
pub struct ControlLoop {
    physics: Box<dyn Physics>,
    robots: Vec<RobotSlot>,
    spawns: Vec<RobotSpawnConfig>,
    timing: LoopTiming,
    drag_config: DragConfig,
    alive: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    drag: watch::Receiver<Option<Drag>>,
    snapshots: watch::Sender<PoseSnapshot>,
    commands: mpsc::Receiver<Command>,
    rate: SimRate,
    ticks: u64,
    sim_time: f64,
}

impl ControlLoop {
    // -- accessors --

    pub fn physics(&self) -> &dyn Physics {
        self.physics.as_ref()
    }

    pub const fn timing(&self) -> &LoopTiming {
        &self.timing
    }

    pub const fn rate(&self) -> &SimRate {
        &self.rate
    }

    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn robot_count(&self) -> usize {
        self.robots.len()
    }

    /// More than one robot mapping is registered.
    pub fn is_multi_robot(&self) -> bool {
        self.robots.len() > 1
    }

    /// At least one robot has a policy. Without one the loop is idle.
    pub fn has_policy(&self) -> bool {
        self.robots.iter().any(|s| s.policy.is_some())
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Validated target `robot` is being driven toward, if any.
    pub fn target(&self, robot: usize) -> Option<&ActionTarget> {
        self.slot(robot).and_then(|s| s.target.as_ref())
    }

    /// Attach or replace the policy of a mapped robot. Returns `false` if
    /// `robot` has no mapping.
    pub fn attach_policy(&mut self, robot: usize, policy: Box<dyn Policy>) -> bool {
        let Some(slot) = self.robots.iter_mut().find(|s| s.robot() == robot) else {
            warn!(robot, "no mapping for robot, policy not attached");
            return false;
        };
        slot.policy = Some(policy);
        slot.target = None;
        true
    }

    fn slot(&self, robot: usize) -> Option<&RobotSlot> {
        self.robots.iter().find(|s| s.robot() == robot)
    }

    // -- running --

    /// Tick until stopped. Returns immediately when no policy is attached.
    ///
    /// However it returns, the loop is marked stopped and its command channel
    /// is closed, so pending and later [`LoopHandle`] requests fail with
    /// [`LoopError::Stopped`] instead of waiting.
    pub async fn run(&mut self) -> Result<(), LoopError> {
        let result = self.run_ticks().await;
        self.shut_down();
        result
    }

    async fn run_ticks(&mut self) -> Result<(), LoopError> {
        if !self.has_policy() {
            info!("no policy attached, control loop idle");
            return Ok(());
        }
        info!(
            robots = self.robots.len(),
            multi_robot = self.is_multi_robot(),
            control_hz = self.timing.control_hz(),
            decimation = self.timing.decimation,
            "control loop running"
        );
        while self.is_alive() {
            self.tick().await?;
        }
        info!(ticks = self.ticks, "control loop stopped");
        Ok(())
    }

    /// Run one tick, including the pacing sleep.
    pub async fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        let started = Instant::now();
        self.process_commands().await;

        let outcome = if self.is_paused() || !self.has_policy() {
            self.rate.reset();
            TickOutcome::Idle
        } else {
            let controlled = self.infer().await?;
            self.substep();
            self.publish();
            TickOutcome::Stepped {
                controlled,
                substeps: self.timing.decimation,
            }
        };

        tokio::time::sleep(self.timing.remaining(started.elapsed())).await;
        Ok(outcome)
    }

    /// Await every attached policy and validate its output.
    ///
    /// Returns the number of robots with a valid target.
    async fn infer(&mut self) -> Result<usize, LoopError> {
        let mut controlled = 0;
        for slot in &mut self.robots {
            slot.target = None;
            let robot = slot.robot();
            let Some(policy) = slot.policy.as_mut() else {
                continue;
            };
            let state = policy_state(self.physics.as_ref(), &slot.mapping);
            let output = match policy.step(&state).await {
                Ok(output) => output,
                Err(source) => {
                    self.alive.store(false, Ordering::SeqCst);
                    error!(robot, %source, "policy inference failed, stopping loop");
                    return Err(LoopError::Inference { robot, source });
                }
            };
            match ActionTarget::from_output(output, slot.mapping.num_actions) {
                Ok(target) => {
                    slot.target = Some(target);
                    if slot.effective_gains().is_none() {
                        warn!(robot, "no PD gains matching the action count, robot skipped");
                        slot.target = None;
                        continue;
                    }
                    controlled += 1;
                }
                Err(err) => warn!(robot, %err, "invalid action, robot skipped this tick"),
            }
        }
        Ok(controlled)
    }

    /// PD, drag and physics for `decimation` sub-steps.
    fn substep(&mut self) {
        for _ in 0..self.timing.decimation {
            for slot in &self.robots {
                let (Some(target), Some(gains)) = (&slot.target, slot.effective_gains()) else {
                    continue;
                };
                pd::write_ctrl(self.physics.as_mut(), &slot.mapping, target, gains);
            }

            self.physics.qfrc_applied_mut().fill(0.0);
            let active = *self.drag.borrow();
            if let Some(drag) = active {
                if drag::apply_drag(self.physics.as_mut(), &drag, &self.drag_config).is_none() {
                    debug!(body = drag.body, "drag body outside model, ignored");
                }
            }

            self.physics.step();
        }
    }

    /// Publish the pose snapshot and update the rate meter.
    #[allow(clippy::cast_precision_loss)]
    fn publish(&mut self) {
        self.ticks += 1;
        self.sim_time += self.timing.physics_dt * self.timing.decimation as f64;
        self.rate
            .record(Instant::now(), self.timing.decimation, self.timing.physics_dt);

        let physics = self.physics.as_ref();
        let (ticks, sim_time) = (self.ticks, self.sim_time);
        let (steps_per_sec, realtime_factor) =
            (self.rate.steps_per_sec(), self.rate.realtime_factor());
        self.snapshots.send_modify(|snapshot| {
            snapshot.capture_from(physics);
            snapshot.tick = ticks;
            snapshot.sim_time = sim_time;
            snapshot.steps_per_sec = steps_per_sec;
            snapshot.realtime_factor = realtime_factor;
        });
    }

    /// Mark the loop stopped and answer every queued request with a failure.
    fn shut_down(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Reset(reply) => {
                    reply.send(Err(LoopError::Stopped)).ok();
                }
                Command::RequestMotion { reply, .. } => {
                    reply.send(false).ok();
                }
            }
        }
    }

    async fn process_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Reset(reply) => {
                    let result = self.reset().await;
                    reply.send(result).ok();
                }
                Command::RequestMotion {
                    name,
                    robot,
                    force,
                    reply,
                } => {
                    let accepted = self.request_motion(&name, robot, force);
                    reply.send(accepted).ok();
                }
            }
        }
    }

    // -- reset --

    /// Restore the initial state and reset every policy.
    ///
    /// The loop is paused for the duration and always ends unpaused. If a
    /// policy fails to reset, the others are still reset and the first
    /// failure is returned.
    pub async fn reset(&mut self) -> Result<(), LoopError> {
        self.paused.store(true, Ordering::SeqCst);

        self.physics.reset_data();
        if self.is_multi_robot() {
            self.place_spawns();
        }
        self.physics.forward();

        let mut result = Ok(());
        for slot in &mut self.robots {
            slot.target = None;
            let robot = slot.robot();
            let Some(policy) = slot.policy.as_mut() else {
                continue;
            };
            let state = policy_state(self.physics.as_ref(), &slot.mapping);
            if let Err(source) = policy.reset(&state).await {
                warn!(robot, %source, "policy reset failed");
                if result.is_ok() {
                    result = Err(LoopError::Reset { robot, source });
                }
            }
        }

        self.rate.reset();
        self.sim_time = 0.0;
        self.paused.store(false, Ordering::SeqCst);
        info!(robots = self.robots.len(), "simulation reset");
        result
    }

    /// Root of every spawned robot at its configured position, upright, at rest.
    fn place_spawns(&mut self) {
        for slot in &self.robots {
            let Some(spawn) = self.spawns.get(slot.robot()) else {
                continue;
            };
            let qpos_adr = slot.mapping.freejoint_qpos_adr;
            let qvel_adr = slot.mapping.freejoint_qvel_adr;
            if let Some(root) = self.physics.qpos_mut().get_mut(qpos_adr..qpos_adr + 7) {
                root[..3].copy_from_slice(&spawn.position());
                root[3..].copy_from_slice(&UPRIGHT);
            }
            if let Some(root) = self.physics.qvel_mut().get_mut(qvel_adr..qvel_adr + 6) {
                root.fill(0.0);
            }
        }
    }

    // -- motion requests --

    /// Route a named-motion request to one robot's policy, or to every
    /// robot with a policy when `robot` is `None`.
    ///
    /// Unknown motions are rejected. Unforced requests are subject to the
    /// policy's own gating; forced ones start from the current state.
    /// Returns `true` only if at least one robot was targeted and all
    /// targeted robots accepted.
    pub fn request_motion(&mut self, name: &str, robot: Option<usize>, force: bool) -> bool {
        let mut targeted = 0;
        let mut accepted = true;
        for slot in &mut self.robots {
            if robot.is_some_and(|r| r != slot.mapping.robot) {
                continue;
            }
            let Some(policy) = slot.policy.as_mut() else {
                continue;
            };
            targeted += 1;
            let state = policy_state(self.physics.as_ref(), &slot.mapping);
            let ok = policy.tracking().is_some_and(|tracker| {
                if !tracker.has_motion(name) {
                    return false;
                }
                if force {
                    tracker.force_motion(name, &state)
                } else {
                    tracker.request_motion(name, &state)
                }
            });
            if !ok {
                debug!(robot = slot.mapping.robot, motion = name, force, "motion request rejected");
                accepted = false;
            }
        }
        targeted > 0 && accepted
    }
}

// ---------------------------------------------------------------------------
// State sampling
// ---------------------------------------------------------------------------

/// Sample one robot's [`PolicyState`] from the physics arrays.
///
/// Addresses outside the arrays read as zero.
#[allow(clippy::cast_possible_truncation)]
pub fn policy_state(physics: &dyn Physics, mapping: &JointMapping) -> PolicyState {
    let qpos = physics.qpos();
    let qvel = physics.qvel();
    let at = |array: &[f64], i: usize| array.get(i).copied().unwrap_or(0.0) as f32;

    let fq = mapping.freejoint_qpos_adr;
    let fv = mapping.freejoint_qvel_adr;
    PolicyState {
        joint_pos: mapping.qpos_adr_policy.iter().map(|&a| at(qpos, a)).collect(),
        joint_vel: mapping.qvel_adr_policy.iter().map(|&a| at(qvel, a)).collect(),
        root_pos: [at(qpos, fq), at(qpos, fq + 1), at(qpos, fq + 2)],
        root_quat: [
            at(qpos, fq + 3),
            at(qpos, fq + 4),
            at(qpos, fq + 5),
            at(qpos, fq + 6),
        ],
        root_ang_vel: [at(qvel, fv + 3), at(qvel, fv + 4), at(qvel, fv + 5)],
    }
}
