//! Follower TCP accept loop. Grounded on `socket_server.h`'s `server_run`
//! work-queue shape, generalized per Design Notes §9 ("no tag-and-union":
//! the follower is its own server variant, not a C `union` behind a
//! `leader` flag). A single `tokio::sync::Mutex<Follower>` enforces the
//! single-writer discipline spec.md §5 requires: one message is processed to
//! completion, including fsync, before the next begins.

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::error::CResult;
use crate::follower::Follower;
use crate::wire;

pub struct FollowerServer {
    follower: Arc<Mutex<Follower>>,
}

impl FollowerServer {
    pub fn new(follower: Follower) -> Self {
        Self { follower: Arc::new(Mutex::new(follower)) }
    }

    pub async fn run(self, hostname: &str, port: u16) -> CResult<()> {
        let listener = TcpListener::bind((hostname, port)).await?;
        log::info!("follower listening on {hostname}:{port}");
        loop {
            let (stream, peer) = listener.accept().await?;
            log::debug!("accepted connection from {peer}");
            let follower = self.follower.clone();
            tokio::spawn(async move {
                if let Err(err) = Self::serve_connection(follower, stream).await {
                    log::error!("connection from {peer} failed: {err}");
                }
            });
        }
    }

    async fn serve_connection(follower: Arc<Mutex<Follower>>, stream: TcpStream) -> CResult<()> {
        let mut reader = BufReader::new(stream);
        let request = wire::read_request(&mut reader).await?;

        // One message processed to completion — including fsync and store
        // mutation — before the lock is released for the next.
        let response = {
            let mut follower = follower.lock().await;
            follower.handle(&request)
        };

        let mut stream = reader.into_inner();
        wire::write_response(&mut stream, &response).await?;
        Ok(())
    }
}
