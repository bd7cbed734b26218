//! Leader coordination: follower registration, replica selection via the
//! ring, GET fan-out with failover, and PUT/DEL 2PC orchestration. Grounded
//! on spec.md §4.5 and `tpcleader.h` — per `tpcleader.h`'s own comment "you
//! can assume the TPCLeader will never fail... you don't need to maintain a
//! TPCLog for it", the leader keeps no durable log of its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

use crate::error::{CResult, Error};
use crate::hash::hash64;
use crate::message::{MessageType, Request, Response};
use crate::ring::{FollowerRecord, Ring};
use crate::wire;

/// Number of lock stripes guarding per-key 2PC rounds. Finer than one global
/// lock, coarser than one lock per key (spec.md §9 Open Questions: "the
/// leader's exact per-key locking granularity is not prescribed... any
/// discipline that preserves per-key linearizability").
const STRIPES: usize = 256;

pub struct LeaderConfig {
    pub capacity: usize,
    pub redundancy: usize,
    pub vote_timeout: Duration,
    pub retry_backoff: Duration,
}

pub struct Leader {
    config: LeaderConfig,
    ring: RwLock<Ring>,
    stripes: Vec<Mutex<()>>,
}

impl Leader {
    pub fn new(config: LeaderConfig) -> Self {
        let capacity = config.capacity;
        let stripes = (0..STRIPES).map(|_| Mutex::new(())).collect();
        Self { config, ring: RwLock::new(Ring::new(capacity)), stripes }
    }

    fn stripe_for(&self, key: &str) -> &Mutex<()> {
        &self.stripes[(hash64(key) % STRIPES as u64) as usize]
    }

    /// REGISTER: insert `{id=hash64("host:port"), host, port}`. Rejects
    /// once the ring is at capacity.
    pub async fn register(&self, host: String, port: u16) -> CResult<()> {
        let id = hash64(&crate::hash::identity(&host, port));
        let mut ring = self.ring.write().await;
        ring.insert(FollowerRecord::new(id, host, port))
    }

    async fn replicas(&self, key: &str) -> CResult<Vec<FollowerRecord>> {
        let ring = self.ring.read().await;
        if !ring.is_full() {
            return Err(Error::NotAtCapacity);
        }
        ring.replicas(key, self.config.redundancy)
    }

    /// GET: query replicas in order until one returns a value; any
    /// transport error or `NO_KEY` is equivalent for fail-over purposes.
    pub async fn get(&self, key: &str) -> CResult<String> {
        let replicas = self.replicas(key).await?;
        for replica in &replicas {
            let request = Request::new(MessageType::GetReq, key, None);
            match send(replica, &request).await {
                Ok(response) if response.kind == MessageType::GetResp => return Ok(response.body),
                _ => continue,
            }
        }
        Err(Error::NoKey)
    }

    /// PUT: two-phase commit across the key's R replicas.
    pub async fn put(&self, key: &str, val: &str) -> CResult<()> {
        let request = Request::new(MessageType::PutReq, key, Some(val.to_string()));
        self.two_phase_commit(key, request).await
    }

    /// DEL: two-phase commit across the key's R replicas.
    pub async fn del(&self, key: &str) -> CResult<()> {
        let request = Request::new(MessageType::DelReq, key, None);
        self.two_phase_commit(key, request).await
    }

    async fn two_phase_commit(&self, key: &str, request: Request) -> CResult<()> {
        let replicas = self.replicas(key).await?;
        let stripe = self.stripe_for(key);
        let _guard = stripe.lock().await;

        // Phase 1 — vote, in parallel. Timeout or any non-commit vote counts
        // as an abort vote for that replica.
        let vote_timeout = self.config.vote_timeout;
        let mut votes: Vec<Response> = Vec::with_capacity(replicas.len());
        {
            let mut set = tokio::task::JoinSet::new();
            for (idx, replica) in replicas.iter().cloned().enumerate() {
                let request = request.clone();
                set.spawn(async move {
                    let vote = match timeout(vote_timeout, send(&replica, &request)).await {
                        Ok(Ok(response)) => response,
                        Ok(Err(err)) => Response::vote_abort(err.wire_message()),
                        Err(_) => Response::vote_abort("timed out waiting for vote"),
                    };
                    (idx, vote)
                });
            }
            let mut ordered: Vec<Option<Response>> = (0..replicas.len()).map(|_| None).collect();
            while let Some(joined) = set.join_next().await {
                let (idx, vote) = joined.map_err(|err| Error::Internal(err.to_string()))?;
                ordered[idx] = Some(vote);
            }
            for vote in ordered {
                votes.push(vote.expect("every spawned vote task reports back"));
            }
        }

        let decision_commit = votes.iter().all(|v| v.is_vote_commit());
        // A vote body is `"abort: <wire message>"` (e.g. `"abort: error: value
        // too long"`) — the wire message is already the exact string §7
        // promises the client, so strip the `"abort: "` prefix and carry it
        // through unchanged rather than wrapping it in another error variant.
        let abort_reason = votes
            .iter()
            .find(|v| !v.is_vote_commit())
            .map(|v| v.body.trim_start_matches("abort: ").to_string())
            .unwrap_or_else(|| "error: unable to process request".to_string());

        // Phase 2 — broadcast the decision, retrying until every replica
        // acks. The leader must not reply to the client before all R acks
        // are in.
        let decision_kind = if decision_commit { MessageType::Commit } else { MessageType::Abort };
        let decision_request = Request::new(decision_kind, key, None);
        let retry_backoff = self.config.retry_backoff;
        {
            let mut set = tokio::task::JoinSet::new();
            for replica in replicas.iter().cloned() {
                let decision_request = decision_request.clone();
                set.spawn(async move {
                    broadcast_until_ack(&replica, &decision_request, retry_backoff).await;
                });
            }
            while set.join_next().await.is_some() {}
        }

        if decision_commit {
            Ok(())
        } else {
            Err(Error::Aborted(abort_reason))
        }
    }

    pub async fn is_at_capacity(&self) -> bool {
        self.ring.read().await.is_full()
    }
}

async fn send(replica: &FollowerRecord, request: &Request) -> CResult<Response> {
    let mut stream = TcpStream::connect(replica.addr()).await?;
    wire::write_request(&mut stream, request).await?;
    let mut reader = BufReader::new(stream);
    wire::read_response(&mut reader).await
}

/// Phase 2 has no timeout — the system assumes followers eventually
/// recover, so retry with backoff indefinitely until an ACK arrives.
async fn broadcast_until_ack(replica: &FollowerRecord, request: &Request, backoff: Duration) {
    loop {
        match send(replica, request).await {
            Ok(response) if response.kind == MessageType::Ack => return,
            _ => tokio::time::sleep(backoff).await,
        }
    }
}

pub type SharedLeader = Arc<Leader>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::follower::server::FollowerServer;
    use crate::follower::Follower;

    async fn spawn_follower() -> u16 {
        let dir = tempdir::TempDir::new("leader_it").unwrap().into_path();
        let follower = Follower::new(dir).unwrap();
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let server = FollowerServer::new(follower);
        tokio::spawn(async move {
            let _ = server.run("127.0.0.1", port).await;
        });
        // give the listener a moment to bind before the leader registers it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        port
    }

    fn test_config(capacity: usize, redundancy: usize) -> LeaderConfig {
        LeaderConfig {
            capacity,
            redundancy,
            vote_timeout: Duration::from_millis(500),
            retry_backoff: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn rejects_client_work_before_capacity() {
        let leader = Leader::new(test_config(2, 2));
        let port = spawn_follower().await;
        leader.register("127.0.0.1".to_string(), port).await.unwrap();
        assert_eq!(leader.get("x").await, Err(Error::NotAtCapacity));
    }

    #[tokio::test]
    async fn commit_path_then_get() {
        let leader = Leader::new(test_config(2, 2));
        for _ in 0..2 {
            let port = spawn_follower().await;
            leader.register("127.0.0.1".to_string(), port).await.unwrap();
        }
        leader.put("x", "hello").await.unwrap();
        assert_eq!(leader.get("x").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn registration_rejected_once_full() {
        let leader = Leader::new(test_config(1, 1));
        let a = spawn_follower().await;
        let b = spawn_follower().await;
        leader.register("127.0.0.1".to_string(), a).await.unwrap();
        assert_eq!(
            leader.register("127.0.0.1".to_string(), b).await,
            Err(Error::CapacityFull)
        );
    }
}
