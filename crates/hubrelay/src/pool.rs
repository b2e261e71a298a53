//! Endpoint selection over a fixed client set.
//!
//! A failed call does not blacklist its endpoint; the next pick plus the caller's
//! retry policy provide failover.

use crate::error::{RelayError, Result};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Picks one client per call.
pub trait Pick<C>: Send + Sync {
    fn pick(&self) -> &C;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Uniformly random selection.
#[derive(Debug, Clone)]
pub struct RandomPool<C> {
    clients: Vec<C>,
}

impl<C> RandomPool<C> {
    pub fn new(clients: Vec<C>) -> Result<Self> {
        if clients.is_empty() {
            return Err(RelayError::Config("endpoint pool is empty".into()));
        }
        Ok(Self { clients })
    }
}

impl<C: Send + Sync> Pick<C> for RandomPool<C> {
    fn pick(&self) -> &C {
        let i = rand::thread_rng().gen_range(0..self.clients.len());
        &self.clients[i]
    }

    fn len(&self) -> usize {
        self.clients.len()
    }
}

/// Round-robin selection; each call advances to the next client.
#[derive(Debug)]
pub struct RoundRobinPool<C> {
    clients: Vec<C>,
    next: AtomicUsize,
}

impl<C> RoundRobinPool<C> {
    pub fn new(clients: Vec<C>) -> Result<Self> {
        if clients.is_empty() {
            return Err(RelayError::Config("endpoint pool is empty".into()));
        }
        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
        })
    }
}

impl<C: Send + Sync> Pick<C> for RoundRobinPool<C> {
    fn pick(&self) -> &C {
        let len = self.clients.len();
        let i = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some((n + 1) % len))
            .unwrap_or(0);
        &self.clients[i]
    }

    fn len(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_is_rejected() {
        assert!(RandomPool::<String>::new(vec![]).is_err());
        assert!(RoundRobinPool::<String>::new(vec![]).is_err());
    }

    #[test]
    fn round_robin_cycles() {
        let pool = RoundRobinPool::new(vec!["a", "b", "c"]).unwrap();
        let picked: Vec<_> = (0..5).map(|_| *pool.pick()).collect();
        assert_eq!(picked, vec!["a", "b", "c", "a", "b"]);
    }

    #[test]
    fn random_stays_in_range() {
        let pool = RandomPool::new(vec![1, 2]).unwrap();
        for _ in 0..50 {
            assert!(matches!(*pool.pick(), 1 | 2));
        }
        assert_eq!(pool.len(), 2);
        assert!(!pool.is_empty());
    }
}
