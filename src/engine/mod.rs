//! Scanning engine.
//!
//! The engine is split into small single-purpose parts: goal tracking,
//! listing evaluation, the randomized page walk, request pacing, and
//! purchase execution, all orchestrated by the session loop.

pub mod goals;
pub mod matcher;
pub mod purchaser;
pub mod rate;
pub mod session;
pub mod traversal;

pub use session::SessionEngine;
