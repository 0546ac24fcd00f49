use alloc::collections::BTreeMap;

use crate::{clock::Timestamp, name::Name, packet::Nonce};

/// Default time a (name, nonce) pair is remembered after its entry was finalized.
pub const DEFAULT_DEAD_NONCE_LIFETIME_MS: u64 = 6000; // 6 sec

// How many insertions we accept before sweeping out the expired elements
const PRUNE_INTERVAL_INSERTS: usize = 256;

/// Remembers recently resolved Interests so that a copy looping back after its
/// PIT entry is gone is still recognised.
///
/// Only a 64-bit hash of the name and the nonce is stored, so a false
/// positive is possible (and harmless: the Interest is treated as looped).
pub struct DeadNonceList {
    elements: BTreeMap<u64, Timestamp>,
    lifetime_ms: u64,
    inserts_since_prune: usize,
}

impl DeadNonceList {
    pub fn new(lifetime_ms: u64) -> Self {
        Self {
            elements: Default::default(),
            lifetime_ms,
            inserts_since_prune: 0,
        }
    }

    pub fn lifetime(&self) -> u64 {
        self.lifetime_ms
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn has(&self, name: &Name, nonce: Nonce, now: Timestamp) -> bool {
        let hash = Self::hash_name_and_nonce(name, nonce);
        matches!(self.elements.get(&hash), Some(expiry) if *expiry > now)
    }

    pub fn add(&mut self, name: &Name, nonce: Nonce, now: Timestamp) {
        let hash = Self::hash_name_and_nonce(name, nonce);
        self.elements.insert(hash, now.adding(self.lifetime_ms));

        self.inserts_since_prune += 1;
        if self.inserts_since_prune >= PRUNE_INTERVAL_INSERTS {
            self.prune(now);
        }
    }

    pub fn prune(&mut self, now: Timestamp) {
        self.elements.retain(|_, expiry| *expiry > now);
        self.inserts_since_prune = 0;
    }

    fn hash_name_and_nonce(name: &Name, nonce: Nonce) -> u64 {
        let mut hash = 0u64;

        for cc in name.components() {
            Self::add_to_hash(&mut hash, cc.typ.get() as u64);
            Self::add_to_hash(&mut hash, cc.bytes.len() as u64);
            for chunk in cc.bytes.chunks(8) {
                let mut arr = [0u8; 8];
                arr[..chunk.len()].copy_from_slice(chunk);
                Self::add_to_hash(&mut hash, u64::from_be_bytes(arr));
            }
        }
        Self::add_to_hash(&mut hash, u32::from_be_bytes(nonce.0) as u64);
        hash
    }

    #[inline]
    fn add_to_hash(hash: &mut u64, i: u64) {
        use core::ops::BitXor;
        *hash = hash
            .rotate_left(5)
            .bitxor(i)
            .wrapping_mul(0x517cc1b727220a95);
    }
}

impl Default for DeadNonceList {
    fn default() -> Self {
        Self::new(DEFAULT_DEAD_NONCE_LIFETIME_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Timestamp {
        Timestamp { ms_since_1970: ms }
    }

    #[test]
    fn test_has_until_lifetime_elapses() {
        let mut dnl = DeadNonceList::new(100);
        let name: Name = "/a/b".parse().unwrap();

        assert!(!dnl.has(&name, Nonce::from(1), at(0)));
        dnl.add(&name, Nonce::from(1), at(10));
        assert!(dnl.has(&name, Nonce::from(1), at(10)));
        assert!(dnl.has(&name, Nonce::from(1), at(109)));
        assert!(!dnl.has(&name, Nonce::from(1), at(110)));

        assert!(!dnl.has(&name, Nonce::from(2), at(10)));
        assert!(!dnl.has(&"/a/c".parse().unwrap(), Nonce::from(1), at(10)));
    }

    #[test]
    fn test_short_and_long_components() {
        let mut dnl = DeadNonceList::new(100);
        let short: Name = "/x".parse().unwrap();
        let long: Name = "/a-component-that-spans-several-words".parse().unwrap();
        dnl.add(&short, Nonce::from(9), at(0));
        dnl.add(&long, Nonce::from(9), at(0));
        assert!(dnl.has(&short, Nonce::from(9), at(1)));
        assert!(dnl.has(&long, Nonce::from(9), at(1)));
    }

    #[test]
    fn test_prune_drops_only_expired() {
        let mut dnl = DeadNonceList::new(100);
        let name: Name = "/a".parse().unwrap();
        dnl.add(&name, Nonce::from(1), at(0));
        dnl.add(&name, Nonce::from(2), at(50));
        dnl.prune(at(120));
        assert_eq!(dnl.len(), 1);
        assert!(dnl.has(&name, Nonce::from(2), at(120)));
    }
}
