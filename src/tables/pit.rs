use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use crate::{
    clock::Timestamp,
    face::{EndpointId, FaceToken},
    name::Name,
    packet::{Interest, NackHeader, Nonce},
    scheduler::TimerId,
};

/// Stable handle to a PIT entry.
///
/// The generation makes a handle to a removed entry fail to resolve, even
/// after its slot was reused for another entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PitToken {
    index: u32,
    generation: u32,
}

impl PitToken {
    #[cfg(test)]
    pub(crate) fn for_tests(index: u32) -> Self {
        Self {
            index,
            generation: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct InRecord {
    pub face: FaceToken,
    pub endpoint: EndpointId,
    pub last_nonce: Nonce,
    pub last_renewed: Timestamp,
    pub expiry: Timestamp,
    // The latest Interest received from this face, Nacks are built from it
    pub interest: Interest,
}

#[derive(Clone, Debug)]
pub struct OutRecord {
    pub face: FaceToken,
    pub endpoint: EndpointId,
    pub last_nonce: Nonce,
    pub last_renewed: Timestamp,
    pub expiry: Timestamp,
    pub incoming_nack: Option<NackHeader>,
}

impl OutRecord {
    // Still waiting for Data: not expired and not Nacked
    pub fn is_pending(&self, now: Timestamp) -> bool {
        self.expiry >= now && self.incoming_nack.is_none()
    }
}

/// Which records already carry a given nonce.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DuplicateNonce {
    pub in_same: bool,
    pub in_other: bool,
    pub out_same: bool,
    pub out_other: bool,
}

impl DuplicateNonce {
    pub fn is_none(&self) -> bool {
        *self == DuplicateNonce::default()
    }
}

/// Bookkeeping for strategies that throttle retransmitted Interests.
#[derive(Copy, Clone, Debug, Default)]
pub struct RetransmissionState {
    pub last_forwarded: Option<Timestamp>,
    pub count: u8,
}

#[derive(Debug)]
pub struct PitEntry {
    interest: Interest,
    in_records: Vec<InRecord>,
    out_records: Vec<OutRecord>,
    pub is_satisfied: bool,
    // Freshness period of the Data that satisfied the entry
    pub data_freshness_period: u64,
    pub retransmission: RetransmissionState,
    pub(crate) expiry_timer: Option<TimerId>,
}

impl PitEntry {
    pub fn new(interest: Interest) -> Self {
        Self {
            interest,
            in_records: Vec::new(),
            out_records: Vec::new(),
            is_satisfied: false,
            data_freshness_period: 0,
            retransmission: RetransmissionState::default(),
            expiry_timer: None,
        }
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn name(&self) -> &Name {
        &self.interest.name
    }

    pub fn in_records(&self) -> &[InRecord] {
        &self.in_records
    }

    pub fn out_records(&self) -> &[OutRecord] {
        &self.out_records
    }

    pub fn has_in_records(&self) -> bool {
        !self.in_records.is_empty()
    }

    pub fn has_records(&self) -> bool {
        !self.in_records.is_empty() || !self.out_records.is_empty()
    }

    pub fn in_record(&self, face: FaceToken) -> Option<&InRecord> {
        self.in_records.iter().find(|r| r.face == face)
    }

    pub fn out_record(&self, face: FaceToken) -> Option<&OutRecord> {
        self.out_records.iter().find(|r| r.face == face)
    }

    pub fn out_record_mut(&mut self, face: FaceToken) -> Option<&mut OutRecord> {
        self.out_records.iter_mut().find(|r| r.face == face)
    }

    pub fn has_pending_out_records(&self, now: Timestamp) -> bool {
        self.out_records.iter().any(|r| r.is_pending(now))
    }

    pub fn max_in_record_expiry(&self) -> Option<Timestamp> {
        self.in_records.iter().map(|r| r.expiry).max()
    }

    pub fn insert_or_update_in_record(
        &mut self,
        face: FaceToken,
        endpoint: EndpointId,
        interest: &Interest,
        now: Timestamp,
    ) -> &mut InRecord {
        let expiry = now.adding(interest.lifetime());
        let idx = match self.in_records.iter().position(|r| r.face == face) {
            Some(idx) => {
                let record = &mut self.in_records[idx];
                record.endpoint = endpoint;
                record.last_nonce = interest.nonce;
                record.last_renewed = now;
                record.expiry = expiry;
                record.interest = interest.clone();
                idx
            }
            None => {
                self.in_records.push(InRecord {
                    face,
                    endpoint,
                    last_nonce: interest.nonce,
                    last_renewed: now,
                    expiry,
                    interest: interest.clone(),
                });
                self.in_records.len() - 1
            }
        };
        &mut self.in_records[idx]
    }

    pub fn insert_or_update_out_record(
        &mut self,
        face: FaceToken,
        endpoint: EndpointId,
        interest: &Interest,
        now: Timestamp,
    ) -> &mut OutRecord {
        let expiry = now.adding(interest.lifetime());
        let idx = match self.out_records.iter().position(|r| r.face == face) {
            Some(idx) => {
                let record = &mut self.out_records[idx];
                record.endpoint = endpoint;
                record.last_nonce = interest.nonce;
                record.last_renewed = now;
                record.expiry = expiry;
                record.incoming_nack = None;
                idx
            }
            None => {
                self.out_records.push(OutRecord {
                    face,
                    endpoint,
                    last_nonce: interest.nonce,
                    last_renewed: now,
                    expiry,
                    incoming_nack: None,
                });
                self.out_records.len() - 1
            }
        };
        &mut self.out_records[idx]
    }

    pub fn delete_in_record(&mut self, face: FaceToken) -> Option<InRecord> {
        let idx = self.in_records.iter().position(|r| r.face == face)?;
        Some(self.in_records.remove(idx))
    }

    pub fn delete_out_record(&mut self, face: FaceToken) -> Option<OutRecord> {
        let idx = self.out_records.iter().position(|r| r.face == face)?;
        Some(self.out_records.remove(idx))
    }

    pub fn clear_in_records(&mut self) {
        self.in_records.clear();
    }

    // Returns true if anything referred to the face
    pub fn remove_face(&mut self, face: FaceToken) -> bool {
        let before = self.in_records.len() + self.out_records.len();
        self.in_records.retain(|r| r.face != face);
        self.out_records.retain(|r| r.face != face);
        before != self.in_records.len() + self.out_records.len()
    }

    pub fn find_nonce(&self, nonce: Nonce, face: FaceToken) -> DuplicateNonce {
        let mut found = DuplicateNonce::default();
        for record in self.in_records.iter().filter(|r| r.last_nonce == nonce) {
            if record.face == face {
                found.in_same = true;
            } else {
                found.in_other = true;
            }
        }
        for record in self.out_records.iter().filter(|r| r.last_nonce == nonce) {
            if record.face == face {
                found.out_same = true;
            } else {
                found.out_other = true;
            }
        }
        found
    }
}

enum Slot {
    Occupied { generation: u32, entry: PitEntry },
    Vacant { generation: u32 },
}

/// Arena holding every PIT entry, addressed by [`PitToken`].
#[derive(Default)]
pub struct Pit {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl Pit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn insert(&mut self, entry: PitEntry) -> PitToken {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let generation = match slot {
                Slot::Vacant { generation } => generation.wrapping_add(1),
                Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            };
            *slot = Slot::Occupied { generation, entry };
            return PitToken { index, generation };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied {
            generation: 0,
            entry,
        });
        PitToken {
            index,
            generation: 0,
        }
    }

    pub(crate) fn remove(&mut self, token: PitToken) -> Option<PitEntry> {
        if !self.contains(token) {
            return None;
        }
        let vacant = Slot::Vacant {
            generation: token.generation,
        };
        match core::mem::replace(&mut self.slots[token.index as usize], vacant) {
            Slot::Occupied { entry, .. } => {
                self.free.push(token.index);
                self.len -= 1;
                Some(entry)
            }
            Slot::Vacant { .. } => None,
        }
    }

    pub fn contains(&self, token: PitToken) -> bool {
        self.get(token).is_some()
    }

    pub fn get(&self, token: PitToken) -> Option<&PitEntry> {
        match self.slots.get(token.index as usize)? {
            Slot::Occupied { generation, entry } if *generation == token.generation => Some(entry),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, token: PitToken) -> Option<&mut PitEntry> {
        match self.slots.get_mut(token.index as usize)? {
            Slot::Occupied { generation, entry } if *generation == token.generation => Some(entry),
            _ => None,
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = PitToken> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, .. } => Some(PitToken {
                    index: index as u32,
                    generation: *generation,
                }),
                Slot::Vacant { .. } => None,
            })
    }
}

// A pipeline holding a token to an entry that is gone is a bug, not a runtime condition
impl Index<PitToken> for Pit {
    type Output = PitEntry;

    fn index(&self, token: PitToken) -> &PitEntry {
        match self.get(token) {
            Some(entry) => entry,
            None => panic!("stale PIT token {token:?}"),
        }
    }
}

impl IndexMut<PitToken> for Pit {
    fn index_mut(&mut self, token: PitToken) -> &mut PitEntry {
        match self.get_mut(token) {
            Some(entry) => entry,
            None => panic!("stale PIT token {token:?}"),
        }
    }
}
