use std::fmt::Display;

/// Closed error set. Every variant carries exactly the information needed to
/// render the wire message table in `kv::message`.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// key absent, empty, or >1024 bytes
    KeyLen,
    /// value >1024 bytes
    ValLen,
    /// GET/DEL on a key the store does not have
    NoKey,
    /// malformed request or unknown verb
    InvalidRequest,
    /// client op attempted before the ring reached capacity
    NotAtCapacity,
    /// REGISTER received after the ring reached capacity
    FollowerCapacity,
    /// ring insert attempted while already at capacity (internal counterpart
    /// of `FollowerCapacity`, raised by `Ring::insert` itself)
    CapacityFull,
    Io(String),
    Internal(String),
    Parse(String),
    Value(String),
    /// A 2PC round aborted; carries the replica's already-rendered wire
    /// message (e.g. `"error: value too long"`) verbatim, not re-wrapped.
    Aborted(String),
}

pub type CResult<T> = std::result::Result<T, Error>;

impl Error {
    /// The exact user-visible string from the wire error table.
    pub fn wire_message(&self) -> String {
        match self {
            Error::KeyLen => "error: improper key length".to_string(),
            Error::ValLen => "error: value too long".to_string(),
            Error::NoKey => "error: no key".to_string(),
            Error::InvalidRequest => "error: invalid request".to_string(),
            Error::NotAtCapacity => "error: follower_capacity not yet full".to_string(),
            Error::FollowerCapacity => "error: follower capacity already full".to_string(),
            Error::CapacityFull => "error: follower capacity already full".to_string(),
            Error::Io(msg) => format!("error: unable to process request: {msg}"),
            Error::Internal(msg) => format!("error: unable to process request: {msg}"),
            Error::Parse(msg) => format!("error: invalid request: {msg}"),
            Error::Value(msg) => format!("error: {msg}"),
            Error::Aborted(msg) => msg.clone(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_message())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::Parse(err.to_string())
    }
}
