//! Consistent-hashing ring of followers. An ordered map keyed by 64-bit ID
//! replaces the reference implementation's doubly-linked list with a head
//! pointer (Design Notes §9): successor queries become a `BTreeMap`
//! lower-bound with wrap-around.

use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};

use crate::error::{CResult, Error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowerRecord {
    pub id: u64,
    pub host: String,
    pub port: u16,
}

impl FollowerRecord {
    pub fn new(id: u64, host: impl Into<String>, port: u16) -> Self {
        Self { id, host: host.into(), port }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Sorted set of follower records, keyed by ring position. Grows
/// monotonically up to `capacity` and never shrinks.
#[derive(Clone, Debug)]
pub struct Ring {
    capacity: usize,
    followers: BTreeMap<u64, FollowerRecord>,
}

impl Ring {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, followers: BTreeMap::new() }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.followers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.followers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.followers.len() >= self.capacity
    }

    /// Inserts a follower record in sorted position. Fails with
    /// `CapacityFull` once the ring is at capacity, and with
    /// `FollowerCapacity` on an id collision with an existing record.
    pub fn insert(&mut self, record: FollowerRecord) -> CResult<()> {
        if self.is_full() {
            return Err(Error::CapacityFull);
        }
        if self.followers.contains_key(&record.id) {
            return Err(Error::FollowerCapacity);
        }
        self.followers.insert(record.id, record);
        Ok(())
    }

    /// First follower with `id >= hash`, wrapping to the smallest id if none.
    pub fn primary(&self, hash: u64) -> Option<&FollowerRecord> {
        self.followers
            .range(hash..)
            .next()
            .or_else(|| self.followers.iter().next())
            .map(|(_, record)| record)
    }

    /// Next follower clockwise from `prev_id`, wrapping around.
    pub fn successor(&self, prev_id: u64) -> Option<&FollowerRecord> {
        if self.followers.len() < 2 {
            return None;
        }
        self.followers
            .range((std::ops::Bound::Excluded(prev_id), std::ops::Bound::Unbounded))
            .next()
            .or_else(|| self.followers.iter().next())
            .map(|(_, record)| record)
    }

    /// `[primary, successor, successor^2, ...]`, `r` distinct entries.
    /// `r` must not exceed the ring size.
    pub fn replicas(&self, key: &str, r: usize) -> CResult<Vec<FollowerRecord>> {
        if r == 0 || r > self.followers.len() {
            return Err(Error::Internal(format!(
                "redundancy {r} exceeds ring size {}",
                self.followers.len()
            )));
        }
        let hash = crate::hash::hash64(key);
        let mut out = Vec::with_capacity(r);
        let first = self.primary(hash).ok_or(Error::NotAtCapacity)?.clone();
        let mut prev_id = first.id;
        out.push(first);
        while out.len() < r {
            let next = self.successor(prev_id).ok_or_else(|| {
                Error::Internal("ring exhausted before reaching redundancy".to_string())
            })?;
            prev_id = next.id;
            out.push(next.clone());
        }
        Ok(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FollowerRecord> {
        self.followers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: u64, port: u16) -> FollowerRecord {
        FollowerRecord::new(id, "127.0.0.1", port)
    }

    #[test]
    fn fills_to_capacity_then_rejects() {
        let mut ring = Ring::new(2);
        ring.insert(rec(10, 9000)).unwrap();
        ring.insert(rec(20, 9001)).unwrap();
        assert!(ring.is_full());
        assert_eq!(ring.insert(rec(30, 9002)), Err(Error::CapacityFull));
    }

    #[test]
    fn rejects_duplicate_id() {
        let mut ring = Ring::new(3);
        ring.insert(rec(10, 9000)).unwrap();
        assert_eq!(ring.insert(rec(10, 9001)), Err(Error::FollowerCapacity));
    }

    #[test]
    fn primary_wraps_around() {
        let mut ring = Ring::new(3);
        ring.insert(rec(10, 9000)).unwrap();
        ring.insert(rec(20, 9001)).unwrap();
        ring.insert(rec(30, 9002)).unwrap();

        assert_eq!(ring.primary(15).unwrap().id, 20);
        assert_eq!(ring.primary(30).unwrap().id, 30);
        assert_eq!(ring.primary(31).unwrap().id, 10); // wraps to smallest
    }

    #[test]
    fn replicas_are_distinct_and_ordered() {
        let mut ring = Ring::new(3);
        ring.insert(rec(10, 9000)).unwrap();
        ring.insert(rec(20, 9001)).unwrap();
        ring.insert(rec(30, 9002)).unwrap();

        let hash = crate::hash::hash64("x");
        let replicas = ring.replicas("x", 2).unwrap();
        assert_eq!(replicas.len(), 2);
        assert_ne!(replicas[0].id, replicas[1].id);
        assert!(replicas[0].id >= hash || ring.primary(hash).unwrap().id == replicas[0].id);
    }
}
