//! When a height may be processed, and when a transfer observed at a height may be proven.

use std::ops::RangeInclusive;

/// Defines when a record observed at some height is provable given a reference height.
pub trait Strategy: Send + Sync {
    /// True if a storage proof for a record at `record_height` may be fetched.
    fn is_provable(&self, record_height: u64, reference: u64) -> bool;

    /// Height the storage proof is taken at.
    fn proof_height(&self, reference: u64) -> u64;

    /// Heights the tracker may process this cycle: `cursor+1 ..= tip-lag`, possibly empty.
    fn safe_range(&self, cursor: u64, tip: u64) -> RangeInclusive<u64>;
}

/// Lag of `L` blocks: provable when `reference > height + L`, proven at `reference - L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationDepth(pub u64);

impl Strategy for ConfirmationDepth {
    fn is_provable(&self, record_height: u64, reference: u64) -> bool {
        reference > record_height.saturating_add(self.0)
    }

    fn proof_height(&self, reference: u64) -> u64 {
        reference.saturating_sub(self.0)
    }

    #[allow(clippy::reversed_empty_ranges)]
    fn safe_range(&self, cursor: u64, tip: u64) -> RangeInclusive<u64> {
        match tip.checked_sub(self.0) {
            Some(last) if last > cursor => cursor + 1..=last,
            _ => 1..=0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_safe_when_tip_within_lag() {
        let s = ConfirmationDepth(10);
        assert!(s.safe_range(990, 1000).is_empty());
        assert!(s.safe_range(990, 995).is_empty());
        assert!(s.safe_range(0, 5).is_empty());
    }

    #[test]
    fn safe_range_stops_lag_behind_tip() {
        let s = ConfirmationDepth(10);
        assert_eq!(s.safe_range(990, 1005), 991..=995);
        assert_eq!(ConfirmationDepth(0).safe_range(5, 6), 6..=6);
    }

    #[test]
    fn provable_only_strictly_past_lag() {
        let s = ConfirmationDepth(10);
        assert!(!s.is_provable(990, 1000));
        assert!(s.is_provable(990, 1001));
        assert!(!s.is_provable(u64::MAX - 1, u64::MAX));
        assert_eq!(s.proof_height(1001), 991);
    }
}
