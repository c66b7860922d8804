//! Episode runner
//!
//! Drives a [`RunState`] to a terminal state and reports each tick to an
//! [`Observer`]. Rendering, console reporting and recording all attach here;
//! the run itself never waits on them.

use super::{AbortHandle, Pose, RunState, StepResult, Terminal};
use crate::core::{NavEvent, RunStats};

/// Callbacks invoked while an episode runs
pub trait Observer {
    /// Called once before the first tick
    fn on_start(&mut self, _run: &RunState) {}

    /// Called after every tick with its result and events
    fn on_step(&mut self, result: &StepResult, events: &[NavEvent]);

    /// Called once with the final summary
    fn on_finish(&mut self, _summary: &RunSummary) {}
}

/// Observer that ignores everything
impl Observer for () {
    fn on_step(&mut self, _result: &StepResult, _events: &[NavEvent]) {}
}

/// Outcome of a finished episode
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub terminal: Terminal,
    pub ticks: u32,
    pub final_pose: Pose,
    pub goal_distance: f32,
    pub stats: RunStats,
}

impl RunSummary {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.terminal == Terminal::Success
    }
}

/// A run paired with its observer
pub struct Simulation<O: Observer> {
    run: RunState,
    observer: O,
}

impl<O: Observer> Simulation<O> {
    /// Create a simulation
    #[must_use]
    pub fn new(run: RunState, observer: O) -> Self {
        Self { run, observer }
    }

    /// Handle that stops the episode at the next tick boundary
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.run.abort_handle()
    }

    #[must_use]
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Step until the run is terminal
    pub fn run(&mut self) -> RunSummary {
        self.observer.on_start(&self.run);

        let last = loop {
            let result = self.run.step();
            let events: Vec<NavEvent> = self.run.events().iter().cloned().collect();
            self.observer.on_step(&result, &events);
            if let Some(terminal) = result.terminal {
                break (result, terminal);
            }
        };

        let (result, terminal) = last;
        let summary = RunSummary {
            terminal,
            ticks: result.tick,
            final_pose: result.pose,
            goal_distance: result.goal_distance,
            stats: self.run.stats().clone(),
        };
        self.observer.on_finish(&summary);
        summary
    }

    /// Release the run and observer
    #[must_use]
    pub fn into_parts(self) -> (RunState, O) {
        (self.run, self.observer)
    }
}
