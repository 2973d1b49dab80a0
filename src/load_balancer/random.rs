//! Random load balancing strategy.

use rand::Rng;

use crate::load_balancer::LoadBalancer;

/// Picks a uniformly random starting child.
#[derive(Debug, Default)]
pub struct Random;

impl LoadBalancer for Random {
    fn start_index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}
