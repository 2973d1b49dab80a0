//! Child selection for load-balance endpoints.
//!
//! # Data Flow
//! ```text
//! Load-balance endpoint selects a child
//!     → algorithm picks a starting index:
//!         - round_robin.rs (rotate through children)
//!         - random.rs (uniform start)
//!     → registry scans forward from that index, skipping children that
//!       are not ready or already exhausted for this send
//! ```
//!
//! # Design Decisions
//! - Algorithms only choose where the scan starts; readiness stays in the registry
//! - Algorithm state is lock-free

pub mod random;
pub mod round_robin;

use crate::config::LoadBalanceAlgorithm;

/// Trait for load balancing algorithms.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Index of the first child to try, in `0..len`. `len` is never zero.
    fn start_index(&self, len: usize) -> usize;
}

/// Build the algorithm configured for an endpoint.
pub fn build(algorithm: LoadBalanceAlgorithm) -> Box<dyn LoadBalancer> {
    match algorithm {
        LoadBalanceAlgorithm::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        LoadBalanceAlgorithm::Random => Box::new(random::Random),
    }
}
