//! Run event queue
//!
//! Notable things that happen during a tick (a fallback decision, a motion
//! recovery, a deadlock escape, the end of the run) are pushed as
//! [`NavEvent`]s while the tick executes and published when it completes.
//!
//! # Design Principles
//!
//! - **Type Safety**: All events are strongly typed via the `NavEvent` enum
//! - **Double Buffering**: Readers only ever see the events of the last
//!   completed tick, never a half-written one
//! - **Simplicity**: No pub/sub - just push and iterate
//!
//! # Example
//!
//! ```ignore
//! run.step();
//! for event in run.events().iter() {
//!     if let NavEvent::EscapeTriggered { escape, .. } = event {
//!         log::info!("escape: {escape:?}");
//!     }
//! }
//! ```

use std::collections::VecDeque;

use glam::Vec2;

use crate::nav::{Escape, MotionKind, Terminal};

// ============================================================================
// Event Types
// ============================================================================

/// Events emitted by a navigation run
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum NavEvent {
    // -------------------------------------------------------------------------
    // Decision Events
    // -------------------------------------------------------------------------
    /// Inference produced no centroid and the fallback rule answered
    FuzzyFallback {
        tick: u32,
        /// Correction chosen by the fallback, degrees
        correction: f32,
    },

    /// The safety clamp strengthened a weak fuzzy turn
    SafetyClamped { tick: u32, correction: f32 },

    // -------------------------------------------------------------------------
    // Motion Events
    // -------------------------------------------------------------------------
    /// The corrected heading was blocked and a recovery step was taken
    MotionRecovered { tick: u32, kind: MotionKind },

    /// No free step existed; the robot held its position
    MotionBlocked { tick: u32, position: Vec2 },

    // -------------------------------------------------------------------------
    // Deadlock Events
    // -------------------------------------------------------------------------
    /// All three readings were below the surround threshold
    Surrounded { tick: u32 },

    /// The deadlock monitor overrode the heading
    EscapeTriggered { tick: u32, escape: Escape },

    // -------------------------------------------------------------------------
    // Run State Events
    // -------------------------------------------------------------------------
    /// The run reached a terminal state
    Finished { tick: u32, terminal: Terminal },
}

impl NavEvent {
    /// Tick on which the event was raised
    #[must_use]
    pub fn tick(&self) -> u32 {
        match self {
            Self::FuzzyFallback { tick, .. }
            | Self::SafetyClamped { tick, .. }
            | Self::MotionRecovered { tick, .. }
            | Self::MotionBlocked { tick, .. }
            | Self::Surrounded { tick }
            | Self::EscapeTriggered { tick, .. }
            | Self::Finished { tick, .. } => *tick,
        }
    }
}

// ============================================================================
// Event Queue
// ============================================================================

/// Double-buffered event queue.
///
/// Events pushed while tick N executes become readable once `swap()` is
/// called at the end of tick N, and stay readable until the next swap.
#[derive(Debug, Clone)]
pub struct EventQueue {
    /// Events being written this tick
    pending: VecDeque<NavEvent>,
    /// Events of the last completed tick
    published: VecDeque<NavEvent>,
}

impl EventQueue {
    const DEFAULT_CAPACITY: usize = 8;

    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
            published: VecDeque::with_capacity(Self::DEFAULT_CAPACITY),
        }
    }

    /// Queue an event for publication at the end of the tick
    #[inline]
    pub fn push(&mut self, event: NavEvent) {
        self.pending.push_back(event);
    }

    /// Publish pending events, discarding the previously published ones
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.published);
        self.pending.clear();
    }

    /// Events of the last completed tick
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &NavEvent> {
        self.published.iter()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.published.is_empty()
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.published.len()
    }

    /// Number of events not yet published
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
