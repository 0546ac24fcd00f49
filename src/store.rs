use alloc::{collections::BTreeMap, vec, vec::Vec};

use crate::{
    clock::Timestamp,
    name::{Name, NameComponent},
    packet::{Data, Interest},
};

/// The cache the forwarder consults before forwarding an Interest and feeds
/// with every Data it sees.
///
/// Retention is entirely up to the store: `insert` may keep or drop the
/// packet, and `find` may return any cached Data satisfying the Interest.
pub trait ContentStore {
    fn find(&mut self, interest: &Interest, now: Timestamp) -> Option<Data>;

    // The digest is the implicit SHA-256 digest of the Data, i.e. the last
    //  component of its full name.
    fn insert(&mut self, data: &Data, digest: [u8; 32], is_unsolicited: bool, now: Timestamp);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A content store that never stores anything.
pub struct NoContentStore;

impl ContentStore for NoContentStore {
    fn find(&mut self, _: &Interest, _: Timestamp) -> Option<Data> {
        None
    }

    fn insert(&mut self, _: &Data, _: [u8; 32], _: bool, _: Timestamp) {}

    fn len(&self) -> usize {
        0
    }
}

pub const DEFAULT_CONTENT_STORE_CAPACITY: usize = 65536;
pub const DEFAULT_CONTENT_STORE_RETENTION_MS: u64 = 60_000; // 1 min

// Evict unsolicited first, then the oldest of the rest.

struct StoredData {
    data: Data,
    digest: [u8; 32],
    // The last instant when the Data satisfies "must be fresh" Interests
    freshness_deadline: Timestamp,
    removal_deadline: Timestamp,
    is_unsolicited: bool,
    sequence: u64,
}

impl StoredData {
    fn satisfies(&self, must_be_fresh: bool, now: Timestamp) -> bool {
        !must_be_fresh || now < self.freshness_deadline
    }

    fn full_name(&self) -> Name {
        self.data
            .name
            .adding_component(NameComponent::implicit_digest(self.digest))
    }
}

struct CacheEntry {
    // Only ever set on the implicit digest node of a Data name
    data: Option<StoredData>,
    // Ordered by component
    children: Vec<(NameComponent, CacheEntry)>,
}

impl CacheEntry {
    fn new() -> Self {
        Self {
            data: None,
            children: Vec::new(),
        }
    }

    fn descend(&self, components: &[NameComponent]) -> Option<&CacheEntry> {
        let mut node = self;
        for component in components {
            let idx = node
                .children
                .binary_search_by(|x| x.0.cmp(component))
                .ok()?;
            node = &node.children[idx].1;
        }
        Some(node)
    }

    fn descend_mut(&mut self, components: &[NameComponent]) -> Option<&mut CacheEntry> {
        let mut node = self;
        for component in components {
            let idx = node
                .children
                .binary_search_by(|x| x.0.cmp(component))
                .ok()?;
            node = &mut node.children[idx].1;
        }
        Some(node)
    }

    fn find_or_insert(&mut self, components: &[NameComponent]) -> &mut CacheEntry {
        let mut node = self;
        for component in components {
            let idx = match node.children.binary_search_by(|x| x.0.cmp(component)) {
                Ok(idx) => idx,
                Err(idx) => {
                    node.children
                        .insert(idx, (component.clone(), CacheEntry::new()));
                    idx
                }
            };
            node = &mut node.children[idx].1;
        }
        node
    }

    fn take_data(&mut self, remaining: &[NameComponent]) -> Option<StoredData> {
        let Some((first, rest)) = remaining.split_first() else {
            return self.data.take();
        };
        let idx = self
            .children
            .binary_search_by(|x| x.0.cmp(first))
            .ok()?;
        let taken = self.children[idx].1.take_data(rest);
        if self.children[idx].1.is_empty() {
            self.children.remove(idx);
        }
        taken
    }

    fn is_empty(&self) -> bool {
        self.data.is_none() && self.children.is_empty()
    }
}

pub struct ReferenceContentStore {
    root: CacheEntry,
    capacity: usize,
    retention_ms: u64,
    // Insertion order, by eviction class
    unsolicited: BTreeMap<u64, Name>,
    solicited: BTreeMap<u64, Name>,
    next_sequence: u64,
}

impl ReferenceContentStore {
    pub fn new(capacity: usize, retention_ms: u64) -> Self {
        Self {
            root: CacheEntry::new(),
            capacity,
            retention_ms,
            unsolicited: BTreeMap::new(),
            solicited: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Drops everything that was not used within the retention time
    pub fn prune(&mut self, now: Timestamp) {
        let mut expired = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if let Some(stored) = &node.data {
                if stored.removal_deadline < now {
                    expired.push(stored.full_name());
                }
            }
            stack.extend(node.children.iter().map(|c| &c.1));
        }
        for full_name in expired {
            self.remove(&full_name);
        }
    }

    fn remove(&mut self, full_name: &Name) -> bool {
        match self.root.take_data(full_name.as_components()) {
            Some(stored) => {
                self.unsolicited.remove(&stored.sequence);
                self.solicited.remove(&stored.sequence);
                true
            }
            None => false,
        }
    }

    fn evict_one(&mut self) -> bool {
        let victim = match self.unsolicited.first_key_value() {
            Some((_, name)) => name.clone(),
            None => match self.solicited.first_key_value() {
                Some((_, name)) => name.clone(),
                None => return false,
            },
        };
        self.remove(&victim)
    }

    fn find_match(&self, interest: &Interest, now: Timestamp) -> Option<Name> {
        let node = self.root.descend(interest.name.as_components())?;

        // The Interest may already name a full name
        if let Some(stored) = &node.data {
            if stored.satisfies(interest.must_be_fresh, now) {
                return Some(stored.full_name());
            }
        }

        if interest.can_be_prefix {
            let mut stack: Vec<&CacheEntry> = node.children.iter().rev().map(|c| &c.1).collect();
            while let Some(node) = stack.pop() {
                if let Some(stored) = &node.data {
                    if stored.satisfies(interest.must_be_fresh, now) {
                        return Some(stored.full_name());
                    }
                }
                stack.extend(node.children.iter().rev().map(|c| &c.1));
            }
        } else {
            // Only the digest children can hold Data of exactly this name
            for (_, child) in node.children.iter() {
                if let Some(stored) = &child.data {
                    if stored.satisfies(interest.must_be_fresh, now) {
                        return Some(stored.full_name());
                    }
                }
            }
        }
        None
    }
}

impl Default for ReferenceContentStore {
    fn default() -> Self {
        Self::new(
            DEFAULT_CONTENT_STORE_CAPACITY,
            DEFAULT_CONTENT_STORE_RETENTION_MS,
        )
    }
}

impl ContentStore for ReferenceContentStore {
    fn find(&mut self, interest: &Interest, now: Timestamp) -> Option<Data> {
        let full_name = self.find_match(interest, now)?;
        let retention_ms = self.retention_ms;
        let stored = self
            .root
            .descend_mut(full_name.as_components())?
            .data
            .as_mut()?;
        stored.removal_deadline = now.adding(retention_ms);

        let mut data = stored.data.clone();
        data.incoming_face = None;
        Some(data)
    }

    fn insert(&mut self, data: &Data, digest: [u8; 32], is_unsolicited: bool, now: Timestamp) {
        if self.capacity == 0 {
            return;
        }

        let full_name = data
            .name
            .adding_component(NameComponent::implicit_digest(digest));
        let node = self.root.find_or_insert(full_name.as_components());
        let freshness_deadline = now.adding(data.freshness_period);
        let removal_deadline = now.adding(self.retention_ms);

        if let Some(stored) = node.data.as_mut() {
            // Same packet again: refresh it, and a solicited copy upgrades an unsolicited one
            stored.freshness_deadline = stored.freshness_deadline.max(freshness_deadline);
            stored.removal_deadline = removal_deadline;
            if stored.is_unsolicited && !is_unsolicited {
                stored.is_unsolicited = false;
                let sequence = stored.sequence;
                if let Some(name) = self.unsolicited.remove(&sequence) {
                    self.solicited.insert(sequence, name);
                }
            }
            return;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let mut stored_data = data.clone();
        stored_data.incoming_face = None;
        node.data = Some(StoredData {
            data: stored_data,
            digest,
            freshness_deadline,
            removal_deadline,
            is_unsolicited,
            sequence,
        });
        if is_unsolicited {
            self.unsolicited.insert(sequence, full_name);
        } else {
            self.solicited.insert(sequence, full_name);
        }

        while self.len() > self.capacity {
            if !self.evict_one() {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.unsolicited.len() + self.solicited.len()
    }
}
