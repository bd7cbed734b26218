//! Write-ahead log for a follower's in-flight 2PC message. Record encoding
//! mirrors `storage::log::Log`'s entry format (tag byte in place of a
//! separate key/value-length distinction, big-endian length prefixes, raw
//! bytes) so the same torn-tail-write handling — catch `UnexpectedEof` during
//! `read_exact` and truncate — carries over unchanged.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::error::{CResult, Error};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogRecord {
    PutReq { key: String, val: String },
    DelReq { key: String },
    Commit,
    Abort,
}

impl LogRecord {
    fn tag(&self) -> u8 {
        match self {
            LogRecord::PutReq { .. } => 1,
            LogRecord::DelReq { .. } => 2,
            LogRecord::Commit => 3,
            LogRecord::Abort => 4,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            LogRecord::PutReq { key, .. } | LogRecord::DelReq { key } => Some(key),
            LogRecord::Commit | LogRecord::Abort => None,
        }
    }

    pub fn val(&self) -> Option<&str> {
        match self {
            LogRecord::PutReq { val, .. } => Some(val),
            _ => None,
        }
    }
}

/// Append-only sequence of records. `append` fsyncs before returning; only
/// the latest record is load-bearing for recovery (spec.md §4.3).
pub struct TpcLog {
    path: PathBuf,
    file: std::fs::File,
}

impl TpcLog {
    pub fn new(path: PathBuf) -> CResult<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(Self { path, file })
    }

    /// Appends a record and fsyncs before returning, so a caller's
    /// subsequent VOTE/ACK reply is backed by durable state.
    pub fn append(&mut self, record: &LogRecord) -> CResult<()> {
        let key = record.key().unwrap_or("").as_bytes().to_vec();
        let val = record.val().map(|v| v.as_bytes().to_vec());

        let mut buf = Vec::new();
        buf.push(record.tag());
        buf.extend_from_slice(&(key.len() as u32).to_be_bytes());
        let val_len_or_tombstone: i32 = val.as_ref().map_or(-1, |v| v.len() as i32);
        buf.extend_from_slice(&val_len_or_tombstone.to_be_bytes());
        buf.extend_from_slice(&key);
        if let Some(val) = &val {
            buf.extend_from_slice(val);
        }

        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&buf)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Replays the log, returning the last successfully decoded record (or
    /// `None` for an empty log). A torn tail write is detected via
    /// `UnexpectedEof` and the file is truncated to the last complete record.
    pub fn latest(&mut self) -> CResult<Option<LogRecord>> {
        let mut latest = None;
        for entry in self.iterate()? {
            latest = Some(entry);
        }
        Ok(latest)
    }

    /// All records, oldest to newest, truncating a torn tail write as a
    /// side effect (mirrors `storage::log::Log::build_keydir`).
    pub fn iterate(&mut self) -> CResult<Vec<LogRecord>> {
        let file_len = self.file.metadata()?.len();
        let mut records = Vec::new();
        let mut pos = self.file.seek(SeekFrom::Start(0))?;

        while pos < file_len {
            let mut read_one = || -> std::io::Result<(LogRecord, u64)> {
                let mut tag_buf = [0u8; 1];
                self.file.read_exact(&mut tag_buf)?;
                let mut len_buf = [0u8; 4];
                self.file.read_exact(&mut len_buf)?;
                let key_len = u32::from_be_bytes(len_buf);
                self.file.read_exact(&mut len_buf)?;
                let val_len_or_tombstone = i32::from_be_bytes(len_buf);

                let mut key = vec![0u8; key_len as usize];
                self.file.read_exact(&mut key)?;
                let key = String::from_utf8(key)
                    .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

                let val = if val_len_or_tombstone >= 0 {
                    let mut val = vec![0u8; val_len_or_tombstone as usize];
                    self.file.read_exact(&mut val)?;
                    Some(
                        String::from_utf8(val).map_err(|err| {
                            std::io::Error::new(std::io::ErrorKind::InvalidData, err)
                        })?,
                    )
                } else {
                    None
                };

                let record = match (tag_buf[0], val) {
                    (1, Some(val)) => LogRecord::PutReq { key, val },
                    (2, _) => LogRecord::DelReq { key },
                    (3, _) => LogRecord::Commit,
                    (4, _) => LogRecord::Abort,
                    _ => {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            "unknown log record tag",
                        ))
                    }
                };
                let new_pos = self.file.stream_position()?;
                Ok((record, new_pos))
            };

            match read_one() {
                Ok((record, new_pos)) => {
                    records.push(record);
                    pos = new_pos;
                }
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    log::error!("found incomplete tpc log entry at offset {pos}, truncating");
                    self.file.set_len(pos)?;
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(records)
    }

    /// Discards all records and durably marks the log empty.
    pub fn truncate(&mut self) -> CResult<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> TpcLog {
        let path = tempdir::TempDir::new("tpc_log").unwrap().into_path().join("log");
        TpcLog::new(path).unwrap()
    }

    #[test]
    fn empty_log_has_no_latest() {
        let mut l = log();
        assert_eq!(l.latest().unwrap(), None);
    }

    #[test]
    fn appends_and_replays_in_order() {
        let mut l = log();
        l.append(&LogRecord::PutReq { key: "x".to_string(), val: "1".to_string() }).unwrap();
        l.append(&LogRecord::Commit).unwrap();
        let records = l.iterate().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], LogRecord::Commit);
    }

    #[test]
    fn truncate_empties_the_log() {
        let mut l = log();
        l.append(&LogRecord::DelReq { key: "x".to_string() }).unwrap();
        l.truncate().unwrap();
        assert_eq!(l.latest().unwrap(), None);
    }

    #[test]
    fn detects_torn_tail_write() {
        let mut l = log();
        l.append(&LogRecord::PutReq { key: "x".to_string(), val: "1".to_string() }).unwrap();
        // Simulate a crash mid-write: append a truncated record.
        use std::io::Write;
        l.file.write_all(&[1u8, 0, 0, 0, 5]).unwrap();
        l.file.sync_all().unwrap();

        let latest = l.latest().unwrap();
        assert_eq!(
            latest,
            Some(LogRecord::PutReq { key: "x".to_string(), val: "1".to_string() })
        );
    }
}
