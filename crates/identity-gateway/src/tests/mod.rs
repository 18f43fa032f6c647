//! Tests for `SupabaseGateway` against an in-process GoTrue stand-in.
//!
//! - `fake_gotrue.rs` - Minimal HTTP/1.1 server with canned responses
//! - `harness.rs`     - Gateway construction and a recording observer
//! - `sign_in.rs`     - Password sign-in and sign-up
//! - `restore.rs`     - Session restoration and refresh
//! - `sign_out.rs`    - Sign-out and subscriptions

pub(crate) mod harness;

#[allow(unused_imports)]
pub use fake_gotrue::{FakeGoTrue, RecordedRequest};
#[allow(unused_imports)]
pub use harness::{RecordingObserver, TestHarness};
