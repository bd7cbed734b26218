//! `kvcli` — client REPL and leader/follower launcher for the distributed
//! key/value store.
//!
//! ## Getting started
//!
//! ```doc
//! ❯ ./kvcli
//!
//! ██  ██  █        █
//! ██ ██   ██      ██
//! ███      ██    ██
//! ██ ██     ██  ██
//! ██  ██     ████  KV Storage CLI
//!
//! Welcome to kvcli.
//! Connecting to leader at 127.0.0.1:7100.
//!
//!
//! kvcli> PUT order_key xxx
//! OK ~
//!
//! kvcli> GET order_key
//! xxx
//!
//! kvcli> DEL order_key
//! OK ~
//!
//! kvcli> GET order_key
//! error: no key
//! ```

pub mod ast;
pub mod command;
pub mod config;
pub mod progressbar;
pub mod rusty;
pub mod session;
pub mod show;
pub mod trace;

use crate::progressbar::ProgressOutput;

/// The global progress bar and user-facing message output.
pub static PBAR: ProgressOutput = ProgressOutput::new();
