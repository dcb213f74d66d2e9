//! GEARHOUND: autonomous marketplace acquisition agent.
//!
//! Scans a paginated in-game equipment marketplace for listings that
//! satisfy operator-defined acquisition goals and buys them, while
//! pacing requests under the service's rate limit and traversing pages
//! in a randomized, human-looking pattern.

pub mod config;
pub mod engine;
pub mod marketplace;
pub mod types;
