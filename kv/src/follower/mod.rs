//! The follower's 2PC state machine: consumes messages from the leader,
//! executes transitions against `KVStore` + `TpcLog`, and recovers a
//! consistent state on restart. Grounded on `kvserver.c`'s
//! `kvserver_get`/`kvserver_put_check`/`kvserver_put`/`kvserver_del_check`/
//! `kvserver_del`; `kvserver_handle_tpc`/`kvserver_rebuild_state` are
//! unimplemented TODOs in that source, so spec.md §4.4 is authoritative here.

pub mod server;

use crate::error::{CResult, Error};
use crate::message::{MessageType, Request, Response};
use crate::storage::kv_store::KVStore;
use crate::storage::tpc_log::{LogRecord, TpcLog};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowerState {
    Init,
    /// Unused placeholder, reserved for symmetry with the leader (spec.md §4.4).
    Wait,
    Ready,
}

/// A single storage node. One `Follower` is always accessed through the
/// single-writer discipline enforced by `follower::server` — one message is
/// processed to completion, including fsync, before the next begins.
pub struct Follower {
    state: FollowerState,
    store: KVStore,
    log: TpcLog,
}

impl Follower {
    pub fn new(dir: std::path::PathBuf) -> CResult<Self> {
        let store = KVStore::new(dir.join("store"))?;
        let log = TpcLog::new(dir.join("tpc.log"))?;
        let mut follower = Self { state: FollowerState::Init, store, log };
        follower.recover()?;
        Ok(follower)
    }

    pub fn state(&self) -> FollowerState {
        self.state
    }

    /// Replays `log.latest()` on start, forcing the follower into a state
    /// consistent with the last durable decision (spec.md §4.4 Recovery).
    pub fn recover(&mut self) -> CResult<()> {
        let records = self.log.iterate()?;
        match records.as_slice() {
            [] => {
                self.state = FollowerState::Init;
            }
            [.., LogRecord::PutReq { .. } | LogRecord::DelReq { .. }] => {
                self.state = FollowerState::Ready;
            }
            [.., pending, LogRecord::Commit] => {
                self.apply(pending)?;
                self.log.truncate()?;
                self.state = FollowerState::Init;
            }
            [.., _pending, LogRecord::Abort] => {
                self.log.truncate()?;
                self.state = FollowerState::Init;
            }
            // a bare Commit/Abort with no preceding op: nothing to (re)apply.
            [LogRecord::Commit] | [LogRecord::Abort] => {
                self.log.truncate()?;
                self.state = FollowerState::Init;
            }
            _ => {
                self.state = FollowerState::Init;
            }
        }
        Ok(())
    }

    fn apply(&self, record: &LogRecord) -> CResult<()> {
        match record {
            LogRecord::PutReq { key, val } => self.store.put(key, val),
            LogRecord::DelReq { key } => self.store.del(key),
            LogRecord::Commit | LogRecord::Abort => Ok(()),
        }
    }

    /// Dispatches one inbound request to its transition handler.
    pub fn handle(&mut self, request: &Request) -> Response {
        let result = match request.kind {
            MessageType::GetReq => self.handle_get(&request.key),
            MessageType::PutReq => self.handle_put(&request.key, request.val.as_deref()),
            MessageType::DelReq => self.handle_del(&request.key),
            MessageType::Commit => self.handle_commit(),
            MessageType::Abort => self.handle_abort(),
            _ => Err(Error::InvalidRequest),
        };
        match result {
            Ok(response) => response,
            Err(err) => Response::error(err.wire_message()),
        }
    }

    fn handle_get(&self, key: &str) -> CResult<Response> {
        match self.store.get(key) {
            Ok(val) => Ok(Response::get(val)),
            Err(err) => Ok(Response::error(err.wire_message())),
        }
    }

    fn handle_put(&mut self, key: &str, val: Option<&str>) -> CResult<Response> {
        let val = val.ok_or(Error::ValLen)?;
        match self.store.put_check(key, val) {
            Ok(()) => {
                self.log.append(&LogRecord::PutReq {
                    key: key.to_string(),
                    val: val.to_string(),
                })?;
                self.state = FollowerState::Ready;
                Ok(Response::vote_commit())
            }
            Err(err) => Ok(Response::vote_abort(err.wire_message())),
        }
    }

    fn handle_del(&mut self, key: &str) -> CResult<Response> {
        match self.store.del_check(key) {
            Ok(()) => {
                self.log.append(&LogRecord::DelReq { key: key.to_string() })?;
                self.state = FollowerState::Ready;
                Ok(Response::vote_commit())
            }
            Err(err) => Ok(Response::vote_abort(err.wire_message())),
        }
    }

    fn handle_commit(&mut self) -> CResult<Response> {
        if self.state != FollowerState::Ready {
            // duplicate delivery after truncation: idempotent no-op.
            return Ok(Response::ack());
        }
        let pending = self.pending_op()?;
        self.log.append(&LogRecord::Commit)?;
        if let Some(pending) = &pending {
            self.apply(pending)?;
        }
        self.log.truncate()?;
        self.state = FollowerState::Init;
        Ok(Response::ack())
    }

    fn handle_abort(&mut self) -> CResult<Response> {
        if self.state != FollowerState::Ready {
            return Ok(Response::ack());
        }
        self.log.append(&LogRecord::Abort)?;
        self.log.truncate()?;
        self.state = FollowerState::Init;
        Ok(Response::ack())
    }

    fn pending_op(&mut self) -> CResult<Option<LogRecord>> {
        self.log.latest()
    }

    /// Removes all store entries and resets the log; used by test fixtures
    /// and the `follower --clean` bootstrap flag.
    pub fn clean(&mut self) -> CResult<()> {
        self.store.clean()?;
        self.log.truncate()?;
        self.state = FollowerState::Init;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn follower() -> Follower {
        let dir = tempdir::TempDir::new("follower").unwrap().into_path();
        Follower::new(dir).unwrap()
    }

    #[test]
    fn put_vote_commit_then_commit_apply() {
        let mut f = follower();
        let vote = f.handle(&Request::new(MessageType::PutReq, "x", Some("hello".to_string())));
        assert!(vote.is_vote_commit());
        assert_eq!(f.state(), FollowerState::Ready);

        let ack = f.handle(&Request::new(MessageType::Commit, "", None));
        assert_eq!(ack.kind, MessageType::Ack);
        assert_eq!(f.state(), FollowerState::Init);

        let get = f.handle(&Request::new(MessageType::GetReq, "x", None));
        assert_eq!(get.body, "hello");
    }

    #[test]
    fn oversized_value_aborts_vote() {
        let mut f = follower();
        let long_val = "x".repeat(1025);
        let vote = f.handle(&Request::new(MessageType::PutReq, "x", Some(long_val)));
        assert!(!vote.is_vote_commit());
        assert_eq!(f.state(), FollowerState::Init);
    }

    #[test]
    fn abort_drops_pending_op() {
        let mut f = follower();
        f.handle(&Request::new(MessageType::PutReq, "x", Some("hello".to_string())));
        let ack = f.handle(&Request::new(MessageType::Abort, "", None));
        assert_eq!(ack.kind, MessageType::Ack);

        let get = f.handle(&Request::new(MessageType::GetReq, "x", None));
        assert_eq!(get.kind, MessageType::Error);
    }

    #[test]
    fn duplicate_commit_after_truncate_is_idempotent_ack() {
        let mut f = follower();
        f.handle(&Request::new(MessageType::PutReq, "x", Some("hello".to_string())));
        f.handle(&Request::new(MessageType::Commit, "", None));
        let ack = f.handle(&Request::new(MessageType::Commit, "", None));
        assert_eq!(ack.kind, MessageType::Ack);
    }

    #[test]
    fn recovery_reapplies_commit_preceding_op() {
        let dir = tempdir::TempDir::new("follower_recover").unwrap().into_path();
        {
            let mut f = Follower::new(dir.clone()).unwrap();
            f.handle(&Request::new(MessageType::PutReq, "k", Some("v".to_string())));
            // simulate crash: log has PUTREQ + COMMIT but store was never applied.
            f.log.append(&LogRecord::Commit).unwrap();
        }
        let mut recovered = Follower::new(dir).unwrap();
        assert_eq!(recovered.state(), FollowerState::Init);
        let get = recovered.handle(&Request::new(MessageType::GetReq, "k", None));
        assert_eq!(get.body, "v");
    }
}
