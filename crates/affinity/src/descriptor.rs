//! Affinity descriptors

use std::fmt;

use beanstore_core::MemberId;

/// Where requests for a bean (or its group) should be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffinityDescriptor {
    /// Route to one member only
    SingleOwner(MemberId),
    /// Route by preference: the first member is the primary, later members
    /// take over in order when earlier ones fail. Never contains duplicates.
    RankedList(Vec<MemberId>),
    /// Opaque token for an external load balancer
    Cookie {
        /// Cookie name
        name: String,
        /// Dot-separated route tokens
        value: String,
    },
}

impl AffinityDescriptor {
    /// Ranked list with duplicates removed (first occurrence kept)
    pub fn ranked(members: impl IntoIterator<Item = MemberId>) -> Self {
        let mut ranked: Vec<MemberId> = Vec::new();
        for member in members {
            if !ranked.contains(&member) {
                ranked.push(member);
            }
        }
        AffinityDescriptor::RankedList(ranked)
    }

    /// Preferred member, when the descriptor names members directly
    pub fn primary(&self) -> Option<&MemberId> {
        match self {
            AffinityDescriptor::SingleOwner(member) => Some(member),
            AffinityDescriptor::RankedList(members) => members.first(),
            AffinityDescriptor::Cookie { .. } => None,
        }
    }

    /// Members in preference order; empty for cookies
    pub fn members(&self) -> &[MemberId] {
        match self {
            AffinityDescriptor::SingleOwner(member) => std::slice::from_ref(member),
            AffinityDescriptor::RankedList(members) => members,
            AffinityDescriptor::Cookie { .. } => &[],
        }
    }
}

impl fmt::Display for AffinityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffinityDescriptor::SingleOwner(member) => write!(f, "single({})", member),
            AffinityDescriptor::RankedList(members) => {
                f.write_str("ranked(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", member)?;
                }
                f.write_str(")")
            }
            AffinityDescriptor::Cookie { name, value } => write!(f, "cookie({}={})", name, value),
        }
    }
}
