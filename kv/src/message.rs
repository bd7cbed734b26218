//! Wire-level request/response shapes and the status-code table, grounded in
//! `kvmessage.c`'s `msgtype_t` and `kvresponse_get_status_code`.

use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Index,
    GetReq,
    GetResp,
    PutReq,
    DelReq,
    Register,
    Vote,
    Commit,
    Abort,
    Ack,
    Success,
    Error,
}

impl MessageType {
    /// The HTTP-flavored status code a response of this type carries on the
    /// wire, per spec.md §6.
    pub fn status_code(self) -> u16 {
        match self {
            MessageType::GetResp => 200,
            MessageType::Success => 201,
            MessageType::Vote => 202,
            MessageType::Ack => 204,
            MessageType::Error => 500,
            MessageType::Index => 200,
            // request-only variants never appear as a response's type
            MessageType::GetReq
            | MessageType::PutReq
            | MessageType::DelReq
            | MessageType::Register
            | MessageType::Commit
            | MessageType::Abort => 500,
        }
    }
}

/// A decoded request at the leader↔follower or client↔leader boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub key: String,
    pub val: Option<String>,
}

impl Request {
    pub fn new(kind: MessageType, key: impl Into<String>, val: Option<String>) -> Self {
        Self { kind, key: key.into(), val }
    }
}

/// A decoded response: a status-bearing type plus its body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub body: String,
}

impl Response {
    pub fn new(kind: MessageType, body: impl Into<String>) -> Self {
        Self { kind, body: body.into() }
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn get(value: impl Into<String>) -> Self {
        Self::new(MessageType::GetResp, value)
    }

    pub fn success() -> Self {
        Self::new(MessageType::Success, "")
    }

    pub fn vote_commit() -> Self {
        Self::new(MessageType::Vote, "commit")
    }

    pub fn vote_abort(reason: impl std::fmt::Display) -> Self {
        Self::new(MessageType::Vote, format!("abort: {reason}"))
    }

    pub fn ack() -> Self {
        Self::new(MessageType::Ack, "")
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::new(MessageType::Error, message.to_string())
    }

    /// True for a `VOTE("commit")` response; any other vote body is abort.
    pub fn is_vote_commit(&self) -> bool {
        self.kind == MessageType::Vote && self.body == "commit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_table() {
        assert_eq!(MessageType::GetResp.status_code(), 200);
        assert_eq!(MessageType::Success.status_code(), 201);
        assert_eq!(MessageType::Vote.status_code(), 202);
        assert_eq!(MessageType::Ack.status_code(), 204);
        assert_eq!(MessageType::Error.status_code(), 500);
    }

    #[test]
    fn vote_commit_detection() {
        assert!(Response::vote_commit().is_vote_commit());
        assert!(!Response::vote_abort("error: no key").is_vote_commit());
    }
}
