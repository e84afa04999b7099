use std::time::{Duration, Instant};

use ahash::{HashMap, HashMapExt};
use codec::Address;
use parking_lot::RwLock;

/// The root's record of when each admitted peer last proved it was
/// alive.
///
/// A peer enters the table on its first REGISTER and is touched by every
/// reunion hello naming it as the originator. The reunion daemon prunes
/// whatever has gone quiet for longer than the acceptance threshold.
#[derive(Default)]
pub struct LivenessRegistry {
    seen: RwLock<HashMap<Address, Instant>>,
}

impl LivenessRegistry {
    /// First registration of an address. Returns false when the address
    /// is already known, and leaves its timestamp alone in that case.
    pub fn register(&self, address: Address, now: Instant) -> bool {
        let mut seen = self.seen.write();
        if seen.contains_key(&address) {
            return false;
        }

        seen.insert(address, now);
        true
    }

    /// Records a reunion arrival, registered or not.
    pub fn touch(&self, address: Address, now: Instant) {
        self.seen.write().insert(address, now);
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.seen.read().contains_key(address)
    }

    pub fn remove(&self, address: &Address) {
        self.seen.write().remove(address);
    }

    pub fn len(&self) -> usize {
        self.seen.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.read().is_empty()
    }

    /// Every address whose last arrival is older than `threshold`.
    pub fn expired(&self, now: Instant, threshold: Duration) -> Vec<Address> {
        self.seen
            .read()
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) > threshold)
            .map(|(address, _)| *address)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(last: u8) -> Address {
        Address::new([10, 0, 0, last].into(), 10_000)
    }

    #[test]
    fn registration_is_first_wins() {
        let registry = LivenessRegistry::default();
        let now = Instant::now();

        assert!(registry.register(address(1), now));
        assert!(!registry.register(address(1), now));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn touch_defers_expiry() {
        let registry = LivenessRegistry::default();
        let threshold = Duration::from_secs(20);
        let start = Instant::now();

        registry.register(address(1), start);
        registry.register(address(2), start);

        let later = start + Duration::from_secs(15);
        registry.touch(address(2), later);

        let deadline = start + Duration::from_secs(21);
        assert_eq!(registry.expired(deadline, threshold), vec![address(1)]);

        registry.remove(&address(1));
        assert!(registry.expired(deadline, threshold).is_empty());
        assert!(!registry.contains(&address(1)));
    }
}
