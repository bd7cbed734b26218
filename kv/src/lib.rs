#![allow(non_camel_case_types)]

//! `kv` implements a replicated, sharded key-value store coordinated by
//! two-phase commit. A `leader` hashes keys onto a ring of `follower`
//! storage nodes, drives a vote/commit round across each key's replicas, and
//! fans out `GET`s with fail-over. Each follower owns a crash-safe
//! [`storage::kv_store::KVStore`] and a [`storage::tpc_log::TpcLog`]
//! write-ahead log.
//!
//! ## Getting started
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use kv::leader::coordinator::{Leader, LeaderConfig};
//! use kv::leader::server::LeaderServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let leader = Arc::new(Leader::new(LeaderConfig {
//!         capacity: 3,
//!         redundancy: 2,
//!         vote_timeout: Duration::from_secs(2),
//!         retry_backoff: Duration::from_millis(200),
//!     }));
//!     let server = LeaderServer::new(leader);
//!     let _ = server.run("127.0.0.1", 7100).await;
//! }
//! ```

pub mod error;
pub mod hash;
pub mod ring;
pub mod message;
pub mod wire;
pub mod storage;
pub mod follower;
pub mod leader;
