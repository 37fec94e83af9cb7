//! Cluster topology views and owner ranking
//!
//! Owners of a key are ranked by rendezvous (highest random weight) hashing:
//! every member gets a score `xxh3(member || key)`, and the owner list is the
//! members sorted by descending score. The ranking only depends on the member
//! set, so a member leaving shifts only the keys it owned.

use beanstore_core::MemberId;
use std::cmp::Ordering;
use xxhash_rust::xxh3::xxh3_64;

/// An immutable view of cluster membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    view_id: u64,
    members: Vec<MemberId>,
    num_owners: usize,
}

impl Topology {
    /// Create a view. Duplicate members are dropped, first occurrence wins.
    pub fn new(view_id: u64, members: Vec<MemberId>, num_owners: usize) -> Self {
        let mut unique: Vec<MemberId> = Vec::with_capacity(members.len());
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }
        Topology {
            view_id,
            members: unique,
            num_owners: num_owners.max(1),
        }
    }

    /// Single-member view, as seen by a non-clustered deployment
    pub fn local(member: impl Into<MemberId>) -> Self {
        Self::new(0, vec![member.into()], 1)
    }

    /// Monotonic view identifier
    pub fn view_id(&self) -> u64 {
        self.view_id
    }

    /// Members in join order
    pub fn members(&self) -> &[MemberId] {
        &self.members
    }

    /// Configured number of data owners per key
    pub fn num_owners(&self) -> usize {
        self.num_owners
    }

    /// Whether `member` belongs to this view
    pub fn contains(&self, member: &MemberId) -> bool {
        self.members.contains(member)
    }

    /// Next view with a different member set
    pub fn next(&self, members: Vec<MemberId>) -> Self {
        Self::new(self.view_id + 1, members, self.num_owners)
    }

    /// Full member ranking for `key`: primary first
    pub fn ranking(&self, key: &[u8]) -> Vec<MemberId> {
        let mut scored: Vec<(u64, &MemberId)> = self
            .members
            .iter()
            .map(|m| (score(m, key), m))
            .collect();
        scored.sort_by(|a, b| rank_order((a.0, a.1), (b.0, b.1)));
        scored.into_iter().map(|(_, m)| m.clone()).collect()
    }

    /// Data owners for `key`: primary then backups, at most `num_owners`
    pub fn owners(&self, key: &[u8]) -> Vec<MemberId> {
        let mut ranking = self.ranking(key);
        ranking.truncate(self.num_owners);
        ranking
    }

    /// Primary owner for `key`, `None` for an empty view
    pub fn primary_owner(&self, key: &[u8]) -> Option<MemberId> {
        self.members
            .iter()
            .map(|m| (score(m, key), m))
            .min_by(|a, b| rank_order((a.0, a.1), (b.0, b.1)))
            .map(|(_, m)| m.clone())
    }
}

/// Ranking order: higher score first.
///
/// Distinct members only score equal on an xxh3 collision; the member name
/// then decides so every node still derives the same order.
fn rank_order(a: (u64, &MemberId), b: (u64, &MemberId)) -> Ordering {
    b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

fn score(member: &MemberId, key: &[u8]) -> u64 {
    let name = member.as_str().as_bytes();
    let mut buf = Vec::with_capacity(name.len() + 1 + key.len());
    buf.extend_from_slice(name);
    buf.push(0);
    buf.extend_from_slice(key);
    xxh3_64(&buf)
}
