//! Tests for the session state machine.
//!
//! - `harness.rs`       - Scriptable mock gateway with holdable calls
//! - `transitions.rs`   - Command outcomes and the status table
//! - `notifications.rs` - Gateway notifications and subscription lifetime
//! - `ordering.rs`      - Interleaving of notifications and command resolutions
//! - `concurrency.rs`   - Per-family in-flight guards

pub(crate) mod harness;
mod notifications;

#[allow(unused_imports)]
pub use harness::{HeldCall, MockGateway, TestHarness};
