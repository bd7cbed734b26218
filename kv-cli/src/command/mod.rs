use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use kv::error::CResult;
use kv::follower::server::FollowerServer;
use kv::follower::Follower;
use kv::leader::coordinator::{Leader, LeaderConfig};
use kv::leader::server::LeaderServer;
use kv::message::{MessageType, Request};
use kv::wire;

use crate::config::ConfigLoad;

/// The various kinds of commands `kvcli` can run. With no subcommand,
/// `kvcli` starts the interactive/one-shot client REPL against a leader.
/// Every field is an optional override on top of the loaded `ConfigLoad` —
/// `main.rs` layers these the same way it already layers `Args` over
/// `ConfigLoad` for the plain REPL.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Run a leader coordinator: accepts follower registrations and client
    /// GET/PUT/DEL traffic, drives the 2PC rounds.
    Leader {
        #[clap(long)]
        hostname: Option<String>,

        #[clap(short, long)]
        port: Option<u16>,

        /// Number of followers the ring expects before serving client work.
        #[clap(short, long)]
        capacity: Option<usize>,

        /// Replicas per key (1 <= redundancy <= capacity).
        #[clap(short, long)]
        redundancy: Option<usize>,

        /// Per-replica vote timeout in Phase 1, milliseconds.
        #[clap(long, default_value_t = 2000)]
        vote_timeout_ms: u64,

        /// Backoff between Phase 2 retry-until-ack attempts, milliseconds.
        #[clap(long, default_value_t = 200)]
        retry_backoff_ms: u64,
    },

    /// Run a follower storage node: owns a KVStore + TPCLog and executes the
    /// 2PC state machine driven by a leader.
    Follower {
        #[clap(long)]
        hostname: Option<String>,

        #[clap(short, long)]
        port: Option<u16>,

        /// Storage directory for this follower's KVStore + TPCLog.
        #[clap(short, long)]
        dirname: Option<PathBuf>,

        /// Wipe any existing store/log under `dirname` before starting.
        #[clap(long, default_value_t = false)]
        clean: bool,

        /// Register with a leader at `host:port` once listening.
        #[clap(long)]
        leader: Option<String>,
    },
}

/// Starts whichever server the subcommand names, running until the process
/// is killed (spec.md's leader/follower processes are long-lived daemons).
/// CLI flags override whatever `cfg` already carries from disk.
pub async fn run_server(cmd: Command, cfg: ConfigLoad) -> CResult<()> {
    match cmd {
        Command::Leader { hostname, port, capacity, redundancy, vote_timeout_ms, retry_backoff_ms } => {
            let hostname = hostname.unwrap_or(cfg.hostname);
            let port = port.unwrap_or(cfg.port);
            let config = LeaderConfig {
                capacity: capacity.unwrap_or(cfg.capacity),
                redundancy: redundancy.unwrap_or(cfg.redundancy),
                vote_timeout: Duration::from_millis(vote_timeout_ms),
                retry_backoff: Duration::from_millis(retry_backoff_ms),
            };
            let leader = Arc::new(Leader::new(config));
            LeaderServer::new(leader).run(&hostname, port).await
        }
        Command::Follower { hostname, port, dirname, clean, leader } => {
            let hostname = hostname.unwrap_or(cfg.hostname);
            let port = port.unwrap_or(cfg.port);
            let dirname = dirname.unwrap_or(cfg.dirname);
            let mut follower = Follower::new(dirname)?;
            if clean {
                follower.clean()?;
            }
            if let Some(leader_addr) = &leader {
                register_with_leader(leader_addr, &hostname, port).await?;
            }
            FollowerServer::new(follower).run(&hostname, port).await
        }
    }
}

/// Dials a leader and sends `REGISTER host=<hostname> port=<port>`, the
/// bootstrap step a fresh follower takes before it can receive traffic.
async fn register_with_leader(leader_addr: &str, hostname: &str, port: u16) -> CResult<()> {
    let (leader_host, leader_port) = leader_addr
        .rsplit_once(':')
        .ok_or(kv::error::Error::InvalidRequest)?;
    let leader_port: u16 = leader_port.parse().map_err(|_| kv::error::Error::InvalidRequest)?;

    let mut stream = tokio::net::TcpStream::connect((leader_host, leader_port)).await?;
    let request = Request::new(MessageType::Register, hostname.to_string(), Some(port.to_string()));
    wire::write_request(&mut stream, &request).await?;
    let mut reader = tokio::io::BufReader::new(stream);
    let response = wire::read_response(&mut reader).await?;
    if response.kind != MessageType::Success {
        log::warn!("registration with leader {leader_addr} failed: {}", response.body);
    }
    Ok(())
}
