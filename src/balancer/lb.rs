//! Member selection algorithms
//!
//! | Algorithm | Description |
//! |-----------|-------------|
//! | `RoundRobin` | Cycle through members sequentially (DEFAULT) |
//! | `Random` | Uniform random selection |
//! | `Weighted` | Distribute based on member weights |
//! | `ConsistentHash` | Rendezvous hash of the destination for affinity |

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Load balancing algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LbAlgorithm {
    /// Round-robin: Cycle through members sequentially (DEFAULT)
    #[default]
    RoundRobin,
    /// Random: Random selection
    Random,
    /// Weighted: Distribute based on member weights
    Weighted,
    /// Consistent hash: the same destination keeps landing on the same member
    ConsistentHash,
}

impl std::fmt::Display for LbAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round_robin"),
            Self::Random => write!(f, "random"),
            Self::Weighted => write!(f, "weighted"),
            Self::ConsistentHash => write!(f, "consistent_hash"),
        }
    }
}

impl std::str::FromStr for LbAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "round_robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            "weighted" => Ok(Self::Weighted),
            "consistent_hash" => Ok(Self::ConsistentHash),
            other => Err(format!("unknown algorithm '{other}'")),
        }
    }
}

/// Error types for load balancer operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LbError {
    /// No members to select from
    #[error("No members available")]
    NoMembers,

    /// Invalid weights
    #[error("Invalid weights: total weight is zero")]
    ZeroWeight,
}

/// Member information for load balancing
#[derive(Debug, Clone)]
pub struct LbMember {
    /// Member index in the caller's candidate list
    pub index: usize,
    /// Stable identity used for hashing (usually the hashed tag)
    pub key: u64,
    /// Member weight (for weighted algorithms)
    pub weight: u32,
    /// Whether the member is healthy
    pub healthy: bool,
}

impl LbMember {
    /// Create a new member with default values
    #[must_use]
    pub const fn new(index: usize, key: u64) -> Self {
        Self {
            index,
            key,
            weight: 1,
            healthy: true,
        }
    }

    /// Set the weight
    #[must_use]
    pub const fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Set the health status
    #[must_use]
    pub const fn with_healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }
}

/// Hash any value with the process-local default hasher
#[must_use]
pub fn hash_key<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Load balancer implementation
pub struct LoadBalancer {
    /// Selected algorithm
    algorithm: LbAlgorithm,
    /// Round-robin counter
    rr_counter: AtomicUsize,
}

impl LoadBalancer {
    /// Create a new load balancer
    #[must_use]
    pub fn new(algorithm: LbAlgorithm) -> Self {
        Self {
            algorithm,
            rr_counter: AtomicUsize::new(0),
        }
    }

    /// Get the algorithm
    #[must_use]
    pub const fn algorithm(&self) -> LbAlgorithm {
        self.algorithm
    }

    /// Select a healthy member.
    ///
    /// `affinity` is the hashed destination; without it `ConsistentHash`
    /// falls back to round-robin.
    ///
    /// # Errors
    ///
    /// Returns `LbError::NoMembers` if no member is healthy and
    /// `LbError::ZeroWeight` if all healthy weights are zero.
    pub fn select(&self, members: &[LbMember], affinity: Option<u64>) -> Result<usize, LbError> {
        let healthy: Vec<&LbMember> = members.iter().filter(|m| m.healthy).collect();

        if healthy.is_empty() {
            return Err(LbError::NoMembers);
        }

        match (self.algorithm, affinity) {
            (LbAlgorithm::Random, _) => {
                let index = rand::thread_rng().gen_range(0..healthy.len());
                Ok(healthy[index].index)
            }
            (LbAlgorithm::Weighted, _) => self.select_weighted(&healthy),
            (LbAlgorithm::ConsistentHash, Some(key)) => Ok(Self::select_rendezvous(&healthy, key)),
            (LbAlgorithm::RoundRobin | LbAlgorithm::ConsistentHash, _) => {
                let index = self.rr_counter.fetch_add(1, Ordering::Relaxed) % healthy.len();
                Ok(healthy[index].index)
            }
        }
    }

    /// Weighted selection
    fn select_weighted(&self, members: &[&LbMember]) -> Result<usize, LbError> {
        let total_weight: u64 = members.iter().map(|m| u64::from(m.weight)).sum();

        if total_weight == 0 {
            return Err(LbError::ZeroWeight);
        }

        let counter = self.rr_counter.fetch_add(1, Ordering::Relaxed) as u64;
        let target = counter % total_weight;

        let mut cumulative: u64 = 0;
        for member in members {
            cumulative += u64::from(member.weight);
            if target < cumulative {
                return Ok(member.index);
            }
        }

        Ok(members[0].index)
    }

    /// Highest-random-weight selection; removing a member only remaps
    /// the destinations that were on it
    fn select_rendezvous(members: &[&LbMember], key: u64) -> usize {
        members
            .iter()
            .max_by_key(|m| hash_key(&(m.key, key)))
            .map_or(members[0].index, |m| m.index)
    }

    /// Reset the round-robin counter
    pub fn reset(&self) {
        self.rr_counter.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
