//! Leader TCP accept loop for both client traffic and follower
//! registrations. Grounded on `socket_server.h`'s `server_run` shape, same
//! generalization as `follower::server` (a distinct server variant, not a
//! tagged union).

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::error::CResult;
use crate::leader::coordinator::Leader;
use crate::message::{MessageType, Response};
use crate::wire;

const INDEX_BODY: &str = "kv leader: ok";

pub struct LeaderServer {
    leader: Arc<Leader>,
}

impl LeaderServer {
    pub fn new(leader: Arc<Leader>) -> Self {
        Self { leader }
    }

    pub async fn run(self, hostname: &str, port: u16) -> CResult<()> {
        let listener = TcpListener::bind((hostname, port)).await?;
        log::info!("leader listening on {hostname}:{port}");
        loop {
            let (stream, peer) = listener.accept().await?;
            log::debug!("accepted connection from {peer}");
            let leader = self.leader.clone();
            tokio::spawn(async move {
                if let Err(err) = Self::serve_connection(leader, stream).await {
                    log::error!("connection from {peer} failed: {err}");
                }
            });
        }
    }

    async fn serve_connection(leader: Arc<Leader>, stream: TcpStream) -> CResult<()> {
        let mut reader = BufReader::new(stream);
        let request = wire::read_request(&mut reader).await?;

        let response = match request.kind {
            MessageType::Index => Response::new(MessageType::Index, INDEX_BODY),
            MessageType::Register => {
                let port: u16 = request
                    .val
                    .as_deref()
                    .unwrap_or("")
                    .parse()
                    .map_err(|_| crate::error::Error::InvalidRequest)?;
                match leader.register(request.key.clone(), port).await {
                    Ok(()) => Response::success(),
                    Err(err) => Response::error(err.wire_message()),
                }
            }
            MessageType::GetReq => match leader.get(&request.key).await {
                Ok(value) => Response::get(value),
                Err(err) => Response::error(err.wire_message()),
            },
            MessageType::PutReq => {
                let val = request.val.clone().unwrap_or_default();
                match leader.put(&request.key, &val).await {
                    Ok(()) => Response::success(),
                    Err(err) => Response::error(err.wire_message()),
                }
            }
            MessageType::DelReq => match leader.del(&request.key).await {
                Ok(()) => Response::success(),
                Err(err) => Response::error(err.wire_message()),
            },
            _ => Response::error(crate::error::Error::InvalidRequest.wire_message()),
        };

        let mut stream = reader.into_inner();
        wire::write_response(&mut stream, &response).await?;
        Ok(())
    }
}
