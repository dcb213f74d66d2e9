//! Goal tracking.
//!
//! Owns the ordered goal list and the cursor over it. The cursor always
//! points at an incomplete goal while one exists; when the current goal
//! completes, `advance` moves it (wrapping) to the next incomplete one.
//! The session ends successfully once every goal is complete.

use tracing::info;

use crate::types::AcquisitionGoal;

pub struct GoalTracker {
    goals: Vec<AcquisitionGoal>,
    cursor: usize,
}

impl GoalTracker {
    /// Create a tracker over an ordered goal list. The cursor starts at
    /// the first incomplete goal.
    pub fn new(goals: Vec<AcquisitionGoal>) -> Self {
        let mut tracker = Self { goals, cursor: 0 };
        if !tracker.all_complete() && tracker.goals[tracker.cursor].is_complete() {
            tracker.advance();
        }
        tracker
    }

    /// The goal currently being scanned for, if any remains incomplete.
    pub fn current(&self) -> Option<&AcquisitionGoal> {
        if self.all_complete() {
            None
        } else {
            Some(&self.goals[self.cursor])
        }
    }

    /// Index of the current goal in the configured order.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn goals(&self) -> &[AcquisitionGoal] {
        &self.goals
    }

    /// Whether every goal has reached its target quantity.
    pub fn all_complete(&self) -> bool {
        self.goals.iter().all(|g| g.is_complete())
    }

    /// Record one completed purchase against the current goal.
    /// Returns true if the goal just reached its target quantity.
    pub fn record_fulfilled(&mut self) -> bool {
        if self.all_complete() {
            return false;
        }
        let goal = &mut self.goals[self.cursor];
        // fulfilled <= quantity always holds.
        if goal.fulfilled < goal.quantity {
            goal.fulfilled += 1;
        }
        let complete = goal.is_complete();
        if complete {
            info!(goal = %goal, index = self.cursor, "Goal complete");
        }
        complete
    }

    /// Move the cursor to the next incomplete goal, wrapping past the
    /// end of the list. Returns true if an incomplete goal exists.
    pub fn advance(&mut self) -> bool {
        if self.goals.is_empty() {
            return false;
        }
        let len = self.goals.len();
        for step in 1..=len {
            let idx = (self.cursor + step) % len;
            if !self.goals[idx].is_complete() {
                self.cursor = idx;
                return true;
            }
        }
        false
    }

    /// Total purchases completed across all goals.
    pub fn total_fulfilled(&self) -> u32 {
        self.goals.iter().map(|g| g.fulfilled).sum()
    }
}
