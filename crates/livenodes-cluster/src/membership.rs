//! Cluster membership: the current node list and its round-robin cursor

use livenodes_core::{Endpoint, LbError, Result};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;

/// List and cursor, always read and written together
struct Members {
    /// Swapped wholesale, never edited in place
    endpoints: Arc<[Endpoint]>,

    /// Always in `0..endpoints.len()`
    cursor: usize,
}

/// Shared, lock-protected list of live cluster members.
///
/// The list is never empty: construction and [`replace`](Self::replace)
/// both refuse an empty input, so [`next`](Self::next) always has something
/// to return.
pub struct MembershipStore {
    members: Mutex<Members>,

    /// First seed, contacted by the seed discovery strategy
    seed: Endpoint,
}

impl MembershipStore {
    pub fn new(seeds: Vec<Endpoint>) -> Result<Self> {
        let seed = seeds.first().cloned().ok_or(LbError::EmptyMembership)?;
        Ok(Self {
            members: Mutex::new(Members {
                endpoints: seeds.into(),
                cursor: 0,
            }),
            seed,
        })
    }

    /// Install a new member list and restart the rotation at its first entry.
    ///
    /// An empty list is rejected and leaves the current list in place.
    pub fn replace(&self, endpoints: Vec<Endpoint>) -> Result<()> {
        if endpoints.is_empty() {
            return Err(LbError::EmptyMembership);
        }

        let count = endpoints.len();
        {
            let mut members = self.members.lock();
            members.endpoints = endpoints.into();
            members.cursor = 0;
        }

        tracing::debug!(nodes = count, "Replaced membership list");
        Ok(())
    }

    /// Next member in round-robin order
    pub fn next(&self) -> Endpoint {
        let mut members = self.members.lock();
        let endpoint = members.endpoints[members.cursor].clone();
        members.cursor = (members.cursor + 1) % members.endpoints.len();
        endpoint
    }

    /// Pseudo-random current member, used to pick a discovery contact
    pub fn pick_random(&self) -> Endpoint {
        let endpoints = self.snapshot();
        let idx = rand::thread_rng().gen_range(0..endpoints.len());
        endpoints[idx].clone()
    }

    /// The designated contact for the seed discovery strategy
    pub fn seed_contact(&self) -> Endpoint {
        self.seed.clone()
    }

    /// Current list; later replacements do not affect the returned value
    pub fn snapshot(&self) -> Arc<[Endpoint]> {
        self.members.lock().endpoints.clone()
    }

    pub fn len(&self) -> usize {
        self.members.lock().endpoints.len()
    }

    /// Never true once constructed
    pub fn is_empty(&self) -> bool {
        false
    }
}
