//! # wsstack Demos
//!
//! Walkthroughs of a complete stack driven by scripted connections. No socket
//! is opened: each client is a [`wsstack::QueuedConnection`] whose outbound
//! frames are printed.
//!
//! ## Running Demos
//!
//! ```bash
//! cargo run --example wamp_chat -- --debug
//! cargo run --example session_inspect -- 'user|s:5:"alice";hits|i:3;'
//! ```

#![warn(rust_2018_idioms)]

// Helper modules that demos can use
pub mod helpers;
