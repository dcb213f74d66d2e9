//! Integration test harness.

mod mock_marketplace;
mod simulation;
