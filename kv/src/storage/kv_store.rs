//! Follower-local durable key/value store. One file per live key, named by
//! the hex of `hash64(key)`; atomic temp-write-then-rename durability,
//! grounded on `storage::log_cask::LogCask::compact`'s temp-file-then-rename
//! pattern and `storage::log::Log::new`'s directory-creation handling.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CResult, Error};
use crate::hash::hash64;

const MAX_KEY_LEN: usize = 1024;
const MAX_VAL_LEN: usize = 1024;

/// A single file's body: key length, key bytes, value bytes. The key is
/// embedded because `hash64` is not invertible to recover it from the
/// filename alone (spec.md §4.2).
fn encode_entry(key: &str, value: &str) -> Vec<u8> {
    let key_bytes = key.as_bytes();
    let mut buf = Vec::with_capacity(4 + key_bytes.len() + value.len());
    buf.extend_from_slice(&(key_bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(key_bytes);
    buf.extend_from_slice(value.as_bytes());
    buf
}

fn decode_entry(bytes: &[u8]) -> CResult<(String, String)> {
    if bytes.len() < 4 {
        return Err(Error::Internal("truncated store entry".to_string()));
    }
    let key_len = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
    if bytes.len() < 4 + key_len {
        return Err(Error::Internal("truncated store entry".to_string()));
    }
    let key = String::from_utf8(bytes[4..4 + key_len].to_vec())?;
    let value = String::from_utf8(bytes[4 + key_len..].to_vec())?;
    Ok((key, value))
}

pub fn check_key(key: &str) -> CResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(Error::KeyLen);
    }
    Ok(())
}

pub fn check_val(val: &str) -> CResult<()> {
    if val.len() > MAX_VAL_LEN {
        return Err(Error::ValLen);
    }
    Ok(())
}

pub struct KVStore {
    dir: PathBuf,
}

impl KVStore {
    /// Opens (creating if absent) the store directory.
    pub fn new(dir: PathBuf) -> CResult<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{:016x}", hash64(key)))
    }

    fn tmp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{:016x}.tmp", hash64(key)))
    }

    pub fn put_check(&self, key: &str, val: &str) -> CResult<()> {
        check_key(key)?;
        check_val(val)?;
        Ok(())
    }

    pub fn del_check(&self, key: &str) -> CResult<()> {
        check_key(key)?;
        if !self.path_for(key).exists() {
            return Err(Error::NoKey);
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> CResult<String> {
        check_key(key)?;
        let path = self.path_for(key);
        let bytes = fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NoKey
            } else {
                Error::from(err)
            }
        })?;
        let (stored_key, value) = decode_entry(&bytes)?;
        debug_assert_eq!(stored_key, key);
        Ok(value)
    }

    /// Writes to a temp file in the same directory, fsyncs it, then renames
    /// over the canonical path — rename is atomic on the same filesystem.
    pub fn put(&self, key: &str, val: &str) -> CResult<()> {
        self.put_check(key, val)?;
        let tmp = self.tmp_path_for(key);
        let canonical = self.path_for(key);
        {
            let file = fs::File::create(&tmp)?;
            use std::io::Write;
            let mut writer = std::io::BufWriter::new(&file);
            writer.write_all(&encode_entry(key, val))?;
            writer.flush()?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &canonical)?;
        Ok(())
    }

    pub fn del(&self, key: &str) -> CResult<()> {
        check_key(key)?;
        let path = self.path_for(key);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Number of live keys currently on disk (directory scan, no index).
    pub fn len(&self) -> CResult<usize> {
        Ok(self.iter_entries()?.len())
    }

    pub fn is_empty(&self) -> CResult<bool> {
        Ok(self.len()? == 0)
    }

    fn iter_entries(&self) -> CResult<Vec<(String, String)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|ext| ext == "tmp").unwrap_or(false) {
                continue;
            }
            if !path.is_file() {
                continue;
            }
            let bytes = fs::read(&path)?;
            if let Ok(pair) = decode_entry(&bytes) {
                out.push(pair);
            }
        }
        Ok(out)
    }

    /// Removes every entry and the store directory itself. Used by test
    /// fixtures and the `follower --clean` bootstrap flag.
    pub fn clean(&self) -> CResult<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> KVStore {
        let path = tempdir::TempDir::new("kv_store").unwrap().into_path();
        KVStore::new(path).unwrap()
    }

    #[test]
    fn put_then_get() {
        let s = store();
        s.put("a", "1").unwrap();
        assert_eq!(s.get("a").unwrap(), "1");
    }

    #[test]
    fn get_missing_is_no_key() {
        let s = store();
        assert_eq!(s.get("missing"), Err(Error::NoKey));
    }

    #[test]
    fn del_then_get_is_no_key() {
        let s = store();
        s.put("a", "1").unwrap();
        s.del("a").unwrap();
        assert_eq!(s.get("a"), Err(Error::NoKey));
    }

    #[test]
    fn del_is_idempotent() {
        let s = store();
        s.del("never-there").unwrap();
        s.del("never-there").unwrap();
    }

    #[test]
    fn put_overwrites() {
        let s = store();
        s.put("a", "1").unwrap();
        s.put("a", "2").unwrap();
        assert_eq!(s.get("a").unwrap(), "2");
    }

    #[test]
    fn rejects_oversized_key_and_value() {
        let s = store();
        let long_key = "x".repeat(1025);
        assert_eq!(s.put_check(&long_key, "v"), Err(Error::KeyLen));
        let long_val = "x".repeat(1025);
        assert_eq!(s.put_check("k", &long_val), Err(Error::ValLen));
    }

    #[test]
    fn del_check_requires_existing_key() {
        let s = store();
        assert_eq!(s.del_check("missing"), Err(Error::NoKey));
        s.put("present", "v").unwrap();
        assert!(s.del_check("present").is_ok());
    }
}
