//! Navigation loop
//!
//! A [`RunState`] owns everything one episode needs. [`RunState::step`]
//! advances exactly one tick in a fixed order:
//!
//! 1. read the three range sensors
//! 2. compute the target bearing
//! 3. decide the heading correction
//! 4. move, with collision recovery
//! 5. let the deadlock monitor override the heading
//! 6. check the goal on the post-move distance
//! 7. check the tick budget
//!
//! Runs share nothing mutable. Cloning a `RunState` gives an independent
//! snapshot that steps to identical results.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::deadlock::{DeadlockMonitor, Escape, Observation};
use super::motion::{MotionIntegrator, MotionKind};
use super::Pose;
use crate::ai::{CorrectionEngine, DecisionSource, RuleBase};
use crate::core::{ConfigError, EventQueue, NavConfig, NavEvent, RunStats};
use crate::world::{Environment, Obstacle, RangeSensor, SensorReading};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminal {
    /// Reached the goal
    Success,
    /// Tick budget exhausted
    Timeout,
    /// Stopped on request
    Aborted,
}

/// Shared flag for cooperative cancellation.
///
/// Any clone may request the abort; the run notices at its next tick.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop before its next tick
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// A new handle, not linked to this one, starting from its current state
    fn detached(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(self.is_aborted())),
        }
    }
}

/// Everything observable about one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    /// Ticks completed, including this one
    pub tick: u32,
    /// Pose at the end of the tick
    pub pose: Pose,
    /// Readings taken at the start of the tick
    pub reading: SensorReading,
    /// Target bearing at the start of the tick, degrees
    pub bearing_deg: f32,
    /// Heading correction in degrees
    pub correction: f32,
    pub source: DecisionSource,
    /// `None` when no motion was attempted
    pub motion: Option<MotionKind>,
    pub escape: Option<Escape>,
    pub stuck_counter: u32,
    /// Distance to the goal after the move, meters
    pub goal_distance: f32,
    pub terminal: Option<Terminal>,
}

/// Complete state of one navigation episode.
///
/// A clone is an independent snapshot: it gets its own abort flag, so
/// aborting one copy never stops the other.
#[derive(Debug)]
pub struct RunState {
    sensor: RangeSensor,
    engine: CorrectionEngine,
    integrator: MotionIntegrator,
    monitor: DeadlockMonitor,
    config: NavConfig,
    pose: Pose,
    goal: Vec2,
    tick: u32,
    last_correction: Option<f32>,
    last_result: Option<StepResult>,
    terminal: Option<Terminal>,
    events: EventQueue,
    stats: RunStats,
    abort: AbortHandle,
}

impl Clone for RunState {
    fn clone(&self) -> Self {
        Self {
            sensor: self.sensor.clone(),
            engine: self.engine.clone(),
            integrator: self.integrator.clone(),
            monitor: self.monitor.clone(),
            config: self.config.clone(),
            pose: self.pose,
            goal: self.goal,
            tick: self.tick,
            last_correction: self.last_correction,
            last_result: self.last_result,
            terminal: self.terminal,
            events: self.events.clone(),
            stats: self.stats.clone(),
            abort: self.abort.detached(),
        }
    }
}

/// Validate a configuration and set up a run.
///
/// # Errors
///
/// Returns an error if any parameter, obstacle or fuzzy definition is
/// malformed, or if `start` is occupied.
pub fn init_run(
    obstacles: Vec<Obstacle>,
    start: Pose,
    goal: Vec2,
    config: NavConfig,
) -> Result<RunState, ConfigError> {
    config.validate()?;
    let engine = CorrectionEngine::new(&config.controller)?;
    RunState::build(obstacles, start, goal, config, engine)
}

/// Like [`init_run`], reusing a compiled rule base shared between runs.
///
/// The fuzzy definitions in `config` are ignored.
///
/// # Errors
///
/// Returns an error if any parameter or obstacle is malformed, or if
/// `start` is occupied.
pub fn init_run_shared(
    obstacles: Vec<Obstacle>,
    start: Pose,
    goal: Vec2,
    config: NavConfig,
    rules: Arc<RuleBase>,
) -> Result<RunState, ConfigError> {
    config.validate()?;
    let engine = CorrectionEngine::with_rule_base(&config.controller, rules)?;
    RunState::build(obstacles, start, goal, config, engine)
}

impl RunState {
    fn build(
        obstacles: Vec<Obstacle>,
        start: Pose,
        goal: Vec2,
        config: NavConfig,
        engine: CorrectionEngine,
    ) -> Result<Self, ConfigError> {
        let env = Arc::new(Environment::new(&config.arena, obstacles)?);
        if !start.position.is_finite() || !start.heading.is_finite() || env.is_occupied(start.position) {
            return Err(ConfigError::StartOccupied);
        }
        if !goal.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "goal",
                value: f32::NAN,
            });
        }
        if env.is_occupied(goal) {
            log::warn!("Goal ({:.2}, {:.2}) lies inside an obstacle", goal.x, goal.y);
        }

        log::info!(
            "Run from ({:.2}, {:.2}) to ({:.2}, {:.2}), {} obstacles, {} rules",
            start.position.x,
            start.position.y,
            goal.x,
            goal.y,
            env.obstacles().len(),
            engine.rule_base().len()
        );

        Ok(Self {
            sensor: RangeSensor::new(env, config.sensor.clone())?,
            engine,
            integrator: MotionIntegrator::new(config.motion.clone()),
            monitor: DeadlockMonitor::new(config.deadlock.clone(), start.position, goal),
            pose: start,
            goal,
            tick: 0,
            last_correction: None,
            last_result: None,
            terminal: None,
            events: EventQueue::new(),
            stats: RunStats::new(),
            abort: AbortHandle::new(),
            config,
        })
    }

    /// Advance one tick.
    ///
    /// Once the run is terminal, every further call returns the final result
    /// unchanged.
    pub fn step(&mut self) -> StepResult {
        if let (Some(_), Some(result)) = (self.terminal, self.last_result) {
            return result;
        }
        if self.abort.is_aborted() {
            return self.finish_aborted();
        }

        let tick = self.tick + 1;
        let reading = self.sensor.read_all(&self.pose);
        let bearing_deg = self.pose.bearing_degrees_to(self.goal);

        let decision = self.engine.decide(&reading, bearing_deg, self.last_correction);
        match decision.source {
            DecisionSource::Fallback => {
                self.events.push(NavEvent::FuzzyFallback {
                    tick,
                    correction: decision.correction,
                });
            }
            DecisionSource::FuzzyClamped => {
                log::debug!("Safety clamp raised the turn to {:.1}°", decision.correction);
                self.events.push(NavEvent::SafetyClamped {
                    tick,
                    correction: decision.correction,
                });
            }
            _ => {}
        }

        let surrounded = reading.all_below(self.config.deadlock.surround_cm);
        if surrounded {
            self.events.push(NavEvent::Surrounded { tick });
        }

        let previous = self.pose.position;
        let motion = self.integrator.advance(&self.pose, decision.correction, &self.sensor);
        match motion.kind {
            MotionKind::Direct => {}
            MotionKind::Blocked => {
                self.events.push(NavEvent::MotionBlocked {
                    tick,
                    position: previous,
                });
            }
            kind => self.events.push(NavEvent::MotionRecovered { tick, kind }),
        }

        let assessment = self.monitor.observe(
            &Observation {
                pose: motion.pose,
                surrounded,
            },
            &self.sensor,
            self.config.motion.scan_resolution_deg,
        );
        self.pose = assessment.apply(motion.pose);
        if let Some(escape) = assessment.escape {
            self.events.push(NavEvent::EscapeTriggered { tick, escape });
            self.last_correction = None;
        } else {
            self.last_correction = Some(decision.correction);
        }

        let goal_distance = self.pose.distance_to(self.goal);
        let terminal = if goal_distance < self.config.goal_tolerance {
            Some(Terminal::Success)
        } else if tick >= self.config.max_ticks {
            Some(Terminal::Timeout)
        } else {
            None
        };

        self.tick = tick;
        self.stats.record_tick(
            decision.correction,
            decision.source,
            motion.kind,
            self.pose.position.distance(previous),
            assessment.escape.is_some(),
        );

        let result = StepResult {
            tick,
            pose: self.pose,
            reading,
            bearing_deg,
            correction: decision.correction,
            source: decision.source,
            motion: Some(motion.kind),
            escape: assessment.escape,
            stuck_counter: assessment.stuck_counter,
            goal_distance,
            terminal,
        };
        if let Some(terminal) = terminal {
            self.finish(terminal);
        }
        self.events.swap();
        self.last_result = Some(result);
        result
    }

    /// Abort before any mutation of the tick: report the current pose as is
    fn finish_aborted(&mut self) -> StepResult {
        let result = StepResult {
            tick: self.tick,
            pose: self.pose,
            reading: self.sensor.read_all(&self.pose),
            bearing_deg: self.pose.bearing_degrees_to(self.goal),
            correction: 0.0,
            source: DecisionSource::Idle,
            motion: None,
            escape: None,
            stuck_counter: self.monitor.stuck(),
            goal_distance: self.pose.distance_to(self.goal),
            terminal: Some(Terminal::Aborted),
        };
        self.finish(Terminal::Aborted);
        self.events.swap();
        self.last_result = Some(result);
        result
    }

    fn finish(&mut self, terminal: Terminal) {
        match terminal {
            Terminal::Success => log::info!("Goal reached after {} ticks", self.tick),
            Terminal::Timeout => log::info!("Tick budget of {} exhausted", self.config.max_ticks),
            Terminal::Aborted => log::info!("Run aborted after {} ticks", self.tick),
        }
        self.terminal = Some(terminal);
        self.events.push(NavEvent::Finished {
            tick: self.tick,
            terminal,
        });
    }

    /// Handle that can abort this run from anywhere
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Ticks completed so far
    #[must_use]
    pub fn tick(&self) -> u32 {
        self.tick
    }

    #[must_use]
    pub fn pose(&self) -> Pose {
        self.pose
    }

    #[must_use]
    pub fn goal(&self) -> Vec2 {
        self.goal
    }

    /// Terminal state, once reached
    #[must_use]
    pub fn terminal(&self) -> Option<Terminal> {
        self.terminal
    }

    /// Result of the most recent tick
    #[must_use]
    pub fn last_result(&self) -> Option<&StepResult> {
        self.last_result.as_ref()
    }

    /// Events of the most recent tick
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    #[must_use]
    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Read-only arena, for diagnostics and rendering
    #[must_use]
    pub fn environment(&self) -> &Environment {
        self.sensor.environment()
    }

    /// Read-only sensor, for drawing rays
    #[must_use]
    pub fn sensor(&self) -> &RangeSensor {
        &self.sensor
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::ai::{FuzzyConfig, Guard};
    use crate::world::scan_headings;

    fn run_with(obstacles: Vec<Obstacle>, start: Pose, goal: Vec2) -> RunState {
        init_run(obstacles, start, goal, NavConfig::default()).unwrap()
    }

    fn run_to_end(run: &mut RunState) -> Vec<StepResult> {
        let mut results = Vec::new();
        loop {
            let result = run.step();
            results.push(result);
            if result.terminal.is_some() {
                return results;
            }
        }
    }

    #[test]
    fn test_open_arena_reaches_goal() {
        let goal = Vec2::new(5.5, 5.5);
        let mut run = run_with(Vec::new(), Pose::new(0.5, 0.5, 0.0), goal);
        let results = run_to_end(&mut run);

        let last = results.last().unwrap();
        assert_eq!(last.terminal, Some(Terminal::Success));
        assert!(last.goal_distance < 0.1);
        assert!(last.tick < 400, "took {} ticks", last.tick);

        let open = results.iter().filter(|r| r.reading.front >= 100.0).count();
        assert!(
            open * 4 >= results.len() * 3,
            "front open on {open} of {} ticks",
            results.len()
        );
        assert!(results.iter().all(|r| r.escape.is_none()));
    }

    #[test]
    fn test_obstacle_ahead_fires_heuristic() {
        let obstacle = Obstacle::new(1.06, 1.5, 2.5, 3.5);
        let mut run = run_with(vec![obstacle], Pose::new(1.0, 3.0, 0.0), Vec2::new(2.5, 3.0));

        let first = run.step();
        assert!(first.reading.front < 10.0);
        assert_eq!(first.source, DecisionSource::Heuristic(Guard::FrontEmergency));
        assert!(first.correction.abs() >= 45.0);
        // Target dead ahead: turn right
        assert!((first.correction + 45.0).abs() < 1e-4);
        assert!(!run.environment().is_occupied(first.pose.position));
    }

    #[test]
    fn test_boxed_in_escapes_to_clearest_heading() {
        let obstacles = vec![
            Obstacle::new(2.03, 2.5, 2.5, 3.5),
            Obstacle::new(1.0, 2.02, 3.03, 3.5),
            Obstacle::new(1.0, 2.02, 2.5, 2.97),
        ];
        let mut run = run_with(obstacles, Pose::new(2.0, 3.0, 0.0), Vec2::new(5.0, 5.0));

        let result = run.step();
        assert!(result.reading.all_below(5.0), "reading {:?}", result.reading);

        let Some(Escape::ClearestHeading {
            heading,
            clearance_cm,
        }) = result.escape
        else {
            panic!("expected clearest-heading escape, got {:?}", result.escape);
        };

        // No sampled heading from the post-move position sees further
        let position = result.pose.position;
        let best = scan_headings(heading, 22.5)
            .map(|h| run.sensor().cast(position, h))
            .fold(0.0_f32, f32::max);
        assert_eq!(clearance_cm, best);
        assert_eq!(clearance_cm, 100.0);
        assert!((heading - PI).abs() < 1e-4, "heading {heading}");
        assert_eq!(result.pose.heading, heading);
        assert!(run.events().iter().any(|e| matches!(e, NavEvent::Surrounded { .. })));
    }

    #[test]
    fn test_step_is_deterministic() {
        let layout = crate::core::ArenaLayout::demo();
        let mut run = layout.start_run(NavConfig::default()).unwrap();
        for _ in 0..50 {
            run.step();
        }

        let mut a = run.clone();
        let mut b = run.clone();
        for _ in 0..100 {
            assert_eq!(a.step(), b.step());
        }
    }

    #[test]
    fn test_timeout() {
        let config = NavConfig::default().with_max_ticks(3);
        let mut run =
            init_run(Vec::new(), Pose::new(0.5, 0.5, 0.0), Vec2::new(5.5, 5.5), config).unwrap();

        assert!(run.step().terminal.is_none());
        assert!(run.step().terminal.is_none());
        let last = run.step();
        assert_eq!(last.terminal, Some(Terminal::Timeout));

        // Terminal runs do not advance
        assert_eq!(run.step(), last);
        assert_eq!(run.tick(), 3);
        assert_eq!(run.stats().ticks(), 3);
    }

    #[test]
    fn test_abort_between_ticks() {
        let start = Pose::new(0.5, 0.5, 0.0);
        let mut run = run_with(Vec::new(), start, Vec2::new(5.5, 5.5));
        run.step();
        let pose = run.pose();

        run.abort_handle().abort();
        let result = run.step();
        assert_eq!(result.terminal, Some(Terminal::Aborted));
        assert_eq!(result.source, DecisionSource::Idle);
        assert_eq!(result.tick, 1);
        assert_eq!(result.pose, pose);
        assert!(result.motion.is_none());
        assert!(run.events().iter().any(|e| matches!(
            e,
            NavEvent::Finished {
                terminal: Terminal::Aborted,
                ..
            }
        )));
    }

    #[test]
    fn test_clone_has_own_abort_flag() {
        let mut run = run_with(Vec::new(), Pose::new(0.5, 0.5, 0.0), Vec2::new(5.5, 5.5));
        run.step();

        let mut snapshot = run.clone();
        run.abort_handle().abort();
        assert!(!snapshot.abort_handle().is_aborted());

        let result = snapshot.step();
        assert_eq!(result.terminal, None);
        assert_eq!(result.tick, 2);
        assert_eq!(run.step().terminal, Some(Terminal::Aborted));

        // An aborted run clones as aborted, but still unlinked
        let copy = run.clone();
        assert!(copy.abort_handle().is_aborted());
        let fresh = snapshot.clone();
        snapshot.abort_handle().abort();
        assert!(!fresh.abort_handle().is_aborted());
    }

    #[test]
    fn test_stuck_robot_escapes() {
        // Zero speed keeps the robot in place every tick
        let mut config = NavConfig::default();
        config.motion.speed = 1e-6;
        let mut run =
            init_run(Vec::new(), Pose::new(3.0, 3.0, 0.0), Vec2::new(3.0, 5.0), config).unwrap();

        let escape_tick = (1..=20).find_map(|_| {
            let r = run.step();
            r.escape.map(|_| r.tick)
        });
        assert!(matches!(escape_tick, Some(t) if t <= 8), "escape at {escape_tick:?}");
    }

    #[test]
    fn test_rejects_occupied_start() {
        let result = init_run(
            vec![Obstacle::new(1.0, 2.0, 1.0, 2.0)],
            Pose::new(1.5, 1.5, 0.0),
            Vec2::new(5.0, 5.0),
            NavConfig::default(),
        );
        assert!(matches!(result, Err(ConfigError::StartOccupied)));

        let result = init_run(
            Vec::new(),
            Pose::new(0.1, 3.0, 0.0),
            Vec2::new(5.0, 5.0),
            NavConfig::default(),
        );
        assert!(matches!(result, Err(ConfigError::StartOccupied)));
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut config = NavConfig::default();
        config.sensor.ray_step = 0.0;
        let result = init_run(Vec::new(), Pose::new(1.0, 1.0, 0.0), Vec2::new(5.0, 5.0), config);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "sensor.ray_step",
                ..
            })
        ));
    }

    #[test]
    fn test_shared_rule_base() {
        let rules = Arc::new(RuleBase::compile(&FuzzyConfig::reactive()).unwrap());
        let start = Pose::new(0.5, 0.5, 0.0);
        let goal = Vec2::new(5.5, 5.5);

        let mut a =
            init_run_shared(Vec::new(), start, goal, NavConfig::default(), Arc::clone(&rules)).unwrap();
        let mut b = init_run_shared(Vec::new(), start, goal, NavConfig::default(), rules).unwrap();
        let mut c = run_with(Vec::new(), start, goal);

        for _ in 0..20 {
            let r = a.step();
            assert_eq!(r, b.step());
            assert_eq!(r, c.step());
        }
    }
}
