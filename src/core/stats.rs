//! Run statistics

use std::collections::VecDeque;

use crate::ai::DecisionSource;
use crate::nav::MotionKind;

/// Per-run counters plus a rolling window of correction magnitudes
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Recent absolute corrections in degrees
    corrections: VecDeque<f32>,
    /// Maximum samples to keep
    max_samples: usize,
    avg_correction: f32,
    max_correction: f32,
    ticks: u32,
    distance: f32,
    heuristic: u32,
    fuzzy: u32,
    fallback: u32,
    recovered: u32,
    blocked: u32,
    escapes: u32,
}

impl RunStats {
    const DEFAULT_WINDOW: usize = 50;

    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(Self::DEFAULT_WINDOW)
    }

    /// Create an empty tracker averaging over the last `window` ticks
    #[must_use]
    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            corrections: VecDeque::with_capacity(window),
            max_samples: window,
            avg_correction: 0.0,
            max_correction: 0.0,
            ticks: 0,
            distance: 0.0,
            heuristic: 0,
            fuzzy: 0,
            fallback: 0,
            recovered: 0,
            blocked: 0,
            escapes: 0,
        }
    }

    /// Record one completed tick
    pub fn record_tick(
        &mut self,
        correction: f32,
        source: DecisionSource,
        motion: MotionKind,
        travelled: f32,
        escaped: bool,
    ) {
        self.ticks += 1;
        self.distance += travelled;

        match source {
            DecisionSource::Heuristic(_) => self.heuristic += 1,
            DecisionSource::Fuzzy | DecisionSource::FuzzyClamped => self.fuzzy += 1,
            DecisionSource::Fallback => self.fallback += 1,
            DecisionSource::Idle => {}
        }
        match motion {
            MotionKind::Direct => {}
            MotionKind::Blocked => self.blocked += 1,
            MotionKind::Redirected | MotionKind::Slowed | MotionKind::LastResort => {
                self.recovered += 1;
            }
        }
        if escaped {
            self.escapes += 1;
        }

        if self.corrections.len() >= self.max_samples {
            self.corrections.pop_front();
        }
        self.corrections.push_back(correction.abs());
        self.update_window();
    }

    fn update_window(&mut self) {
        if self.corrections.is_empty() {
            return;
        }

        let mut total = 0.0;
        let mut max = 0.0_f32;
        for &c in &self.corrections {
            total += c;
            max = max.max(c);
        }

        self.avg_correction = total / self.corrections.len() as f32;
        self.max_correction = max;
    }

    /// Completed ticks
    #[must_use]
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Path length in meters
    #[must_use]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    #[must_use]
    pub fn heuristic_decisions(&self) -> u32 {
        self.heuristic
    }

    /// Decisions made by inference, clamped or not
    #[must_use]
    pub fn fuzzy_decisions(&self) -> u32 {
        self.fuzzy
    }

    #[must_use]
    pub fn fallback_decisions(&self) -> u32 {
        self.fallback
    }

    /// Ticks that needed a recovery step
    #[must_use]
    pub fn recovered_ticks(&self) -> u32 {
        self.recovered
    }

    /// Ticks spent holding position
    #[must_use]
    pub fn blocked_ticks(&self) -> u32 {
        self.blocked
    }

    #[must_use]
    pub fn escapes(&self) -> u32 {
        self.escapes
    }

    /// Mean absolute correction over the window, degrees
    #[must_use]
    pub fn avg_correction(&self) -> f32 {
        self.avg_correction
    }

    /// Largest absolute correction in the window, degrees
    #[must_use]
    pub fn max_correction(&self) -> f32 {
        self.max_correction
    }

    /// One-line report
    #[must_use]
    pub fn format_stats(&self) -> String {
        format!(
            "Ticks: {} | Path: {:.2}m | Heuristic/Fuzzy/Fallback: {}/{}/{} | Recovered: {} | Blocked: {} | Escapes: {} | Turn: {:.1}° (max {:.1}°)",
            self.ticks,
            self.distance,
            self.heuristic,
            self.fuzzy,
            self.fallback,
            self.recovered,
            self.blocked,
            self.escapes,
            self.avg_correction,
            self.max_correction
        )
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}
