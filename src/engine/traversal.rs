//! Randomized page traversal.
//!
//! Walks the listing pages in a human-looking pattern instead of a
//! fixed sweep: mostly forward, with periodic short backtracks on a
//! jittered timer and an early direction flip after a run of empty
//! pages. The walk never leaves `[1, page_horizon]`.
//!
//! All randomness comes from an injected seedable RNG and the caller
//! supplies the clock, so a fixed seed replays the exact same walk.

use rand::rngs::StdRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::TraversalSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub struct PageTraversal {
    cfg: TraversalSection,
    rng: StdRng,
    page: u32,
    direction: Direction,
    /// Consecutive empty pages seen without an intervening non-empty one.
    empty_streak: u32,
    /// Backward steps taken since the last flip to backward.
    backtracked: u32,
    /// Maximum backward steps before the walk turns forward again.
    backtrack_cap: u32,
    next_flip_at: Instant,
}

impl PageTraversal {
    pub fn new(cfg: TraversalSection, mut rng: StdRng, now: Instant) -> Self {
        let next_flip_at = now + Self::draw_flip_delay(&cfg, &mut rng);
        Self {
            cfg,
            rng,
            page: 1,
            direction: Direction::Forward,
            empty_streak: 0,
            backtracked: 0,
            backtrack_cap: 0,
            next_flip_at,
        }
    }

    /// Page the next fetch should target. Always in `[1, page_horizon]`.
    pub fn current_page(&self) -> u32 {
        self.page
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Restart the walk from page 1 going forward, with a fresh flip
    /// schedule. Used when the engine switches to a new goal.
    pub fn reset(&mut self, now: Instant) {
        self.page = 1;
        self.direction = Direction::Forward;
        self.empty_streak = 0;
        self.backtracked = 0;
        self.next_flip_at = now + Self::draw_flip_delay(&self.cfg, &mut self.rng);
    }

    /// Advance the walk after a page fetch yielded `item_count` items.
    pub fn on_page_result(&mut self, item_count: usize, now: Instant) {
        if item_count == 0 {
            self.empty_streak += 1;
        } else {
            self.empty_streak = 0;
        }

        if self.empty_streak >= self.cfg.empty_page_flip_threshold {
            // A run of empty pages means this direction is exhausted.
            self.empty_streak = 0;
            match self.direction {
                Direction::Forward => self.turn_backward(now),
                Direction::Backward => self.turn_forward(),
            }
        } else if self.direction == Direction::Forward && now >= self.next_flip_at {
            self.turn_backward(now);
        } else if self.direction == Direction::Backward && self.backtracked >= self.backtrack_cap {
            self.turn_forward();
        }

        match self.direction {
            Direction::Forward => {
                self.page += 1;
                if self.page > self.cfg.page_horizon {
                    // Wrapped the horizon: a fresh sweep gets a fresh
                    // flip schedule.
                    self.page = 1;
                    self.backtracked = 0;
                    self.next_flip_at = now + Self::draw_flip_delay(&self.cfg, &mut self.rng);
                }
            }
            Direction::Backward => {
                self.backtracked += 1;
                if self.page > 1 {
                    self.page -= 1;
                } else {
                    // Cannot go below page 1.
                    self.turn_forward();
                    self.next_flip_at = now + Self::draw_flip_delay(&self.cfg, &mut self.rng);
                }
            }
        }
        debug!(page = self.page, direction = ?self.direction, "Traversal step");
    }

    fn turn_backward(&mut self, now: Instant) {
        self.direction = Direction::Backward;
        self.backtracked = 0;
        self.backtrack_cap = self
            .rng
            .gen_range(self.cfg.backtrack_min..=self.cfg.backtrack_max);
        self.next_flip_at = now + Self::draw_flip_delay(&self.cfg, &mut self.rng);
        debug!(cap = self.backtrack_cap, "Turning backward");
    }

    fn turn_forward(&mut self) {
        self.direction = Direction::Forward;
        self.backtracked = 0;
    }

    fn draw_flip_delay(cfg: &TraversalSection, rng: &mut StdRng) -> Duration {
        Duration::from_secs(rng.gen_range(cfg.flip_after_min_secs..=cfg.flip_after_max_secs))
    }
}
