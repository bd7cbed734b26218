//! Follower-local durability: the crash-safe key/value store (§4.2) and the
//! 2PC write-ahead log (§4.3). Each follower owns exactly one of each.

pub mod kv_store;
pub mod tpc_log;
