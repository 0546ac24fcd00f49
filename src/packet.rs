use alloc::{boxed::Box, vec::Vec};
use core::fmt;

use crate::{
    face::FaceToken,
    hash::{Hasher, Sha256Digest},
    name::{Name, NameComponent},
};

/// Lifetime assumed for Interests that do not carry one.
pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4000; // 4 sec

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nonce(pub [u8; 4]);

impl From<u32> for Nonce {
    fn from(value: u32) -> Self {
        Nonce(value.to_be_bytes())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", u32::from_be_bytes(self.0))
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({self})")
    }
}

#[derive(Clone, Debug)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    // Delegation names, the Interest is heading towards the region of any of them
    pub forwarding_hint: Vec<Name>,
    pub nonce: Nonce,
    pub interest_lifetime: Option<u64>,

    // Local tags, they are never part of the packet on the wire
    pub incoming_face: Option<FaceToken>,
    pub next_hop_face: Option<FaceToken>,
}

impl Interest {
    pub fn new(name: Name, can_be_prefix: bool, nonce: Nonce) -> Self {
        Self {
            name,
            can_be_prefix,
            must_be_fresh: false,
            forwarding_hint: Vec::new(),
            nonce,
            interest_lifetime: None,
            incoming_face: None,
            next_hop_face: None,
        }
    }

    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    pub fn with_lifetime(mut self, ms: u64) -> Self {
        self.interest_lifetime = Some(ms);
        self
    }

    pub fn with_forwarding_hint(mut self, delegations: Vec<Name>) -> Self {
        self.forwarding_hint = delegations;
        self
    }

    pub fn with_next_hop_face(mut self, face: FaceToken) -> Self {
        self.next_hop_face = Some(face);
        self
    }

    pub fn lifetime(&self) -> u64 {
        self.interest_lifetime.unwrap_or(DEFAULT_INTEREST_LIFETIME_MS)
    }

    // Same name and selectors, i.e. the Interests would share a PIT entry
    pub fn has_same_selectors(&self, other: &Interest) -> bool {
        self.name == other.name
            && self.can_be_prefix == other.can_be_prefix
            && self.must_be_fresh == other.must_be_fresh
    }

    // The digest is only computed when the Interest names a full name
    pub fn matches_data<F>(&self, data: &Data, digest: &mut F) -> bool
    where
        F: FnMut() -> [u8; 32],
    {
        let interest_len = self.name.component_count();
        let data_len = data.name.component_count();

        if interest_len == data_len + 1 {
            return match self.name.last() {
                Some(last) if self.name.ends_with_implicit_digest() => {
                    self.name.prefix(data_len) == data.name && last.bytes.as_ref() == digest()
                }
                _ => false,
            };
        }

        if self.can_be_prefix {
            self.name.is_prefix_of(&data.name)
        } else {
            self.name == data.name
        }
    }
}

#[derive(Clone, Debug)]
pub struct Data {
    pub name: Name,
    // No freshness period means the freshness period of 0, i.e. immediately non-fresh
    pub freshness_period: u64,
    pub content: Box<[u8]>,

    pub incoming_face: Option<FaceToken>,
}

impl Data {
    pub fn new(name: Name, content: &[u8]) -> Self {
        Self {
            name,
            freshness_period: 0,
            content: Box::from(content),
            incoming_face: None,
        }
    }

    pub fn with_freshness_period(mut self, ms: u64) -> Self {
        self.freshness_period = ms;
        self
    }

    /// Digest over the canonical form of the packet: every name component as
    /// type, length and value, then the freshness period, then the content.
    pub fn implicit_digest<H>(&self, hasher: &mut H) -> [u8; 32]
    where
        H: Hasher<Digest = Sha256Digest>,
    {
        hasher.reset();
        for component in self.name.components() {
            hasher.update(&component.typ.get().to_be_bytes());
            hasher.update(&(component.bytes.len() as u32).to_be_bytes());
            hasher.update(&component.bytes);
        }
        hasher.update(&self.freshness_period.to_be_bytes());
        hasher.update(&self.content);
        hasher.finalize_reset().into_inner()
    }

    pub fn full_name<H>(&self, hasher: &mut H) -> Name
    where
        H: Hasher<Digest = Sha256Digest>,
    {
        let digest = self.implicit_digest(hasher);
        self.name
            .adding_component(NameComponent::implicit_digest(digest))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum NackReason {
    #[default]
    None,
    Congestion,
    Duplicate,
    NoRoute,
}

impl NackReason {
    fn severity(self) -> u8 {
        match self {
            NackReason::Congestion => 1,
            NackReason::Duplicate => 2,
            NackReason::NoRoute => 3,
            NackReason::None => u8::MAX,
        }
    }

    pub fn is_less_severe(self, other: NackReason) -> bool {
        self.severity() < other.severity()
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NackReason::None => "None",
            NackReason::Congestion => "Congestion",
            NackReason::Duplicate => "Duplicate",
            NackReason::NoRoute => "NoRoute",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct NackHeader {
    pub reason: NackReason,
}

impl NackHeader {
    pub fn new(reason: NackReason) -> Self {
        Self { reason }
    }
}

#[derive(Clone, Debug)]
pub struct Nack {
    pub interest: Interest,
    pub header: NackHeader,
    pub incoming_face: Option<FaceToken>,
}

impl Nack {
    pub fn new(interest: Interest, reason: NackReason) -> Self {
        Self {
            interest,
            header: NackHeader::new(reason),
            incoming_face: None,
        }
    }

    pub fn reason(&self) -> NackReason {
        self.header.reason
    }
}

#[derive(Clone, Debug)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
}

#[cfg(all(test, feature = "sha2"))]
mod tests {
    use super::*;
    use crate::platform::sha::Sha256Hasher;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn test_matches_data() {
        let data = Data::new(name("/a/b/c"), b"hello");
        let mut hasher = Sha256Hasher::new();
        let digest = data.implicit_digest(&mut hasher);
        let mut never = || -> [u8; 32] { panic!("digest should not be needed") };

        let exact = Interest::new(name("/a/b/c"), false, Nonce::from(1));
        assert!(exact.matches_data(&data, &mut never));

        let prefix = Interest::new(name("/a/b"), false, Nonce::from(1));
        assert!(!prefix.matches_data(&data, &mut never));
        let prefix = Interest::new(name("/a/b"), true, Nonce::from(1));
        assert!(prefix.matches_data(&data, &mut never));

        let full = Interest::new(data.full_name(&mut hasher), false, Nonce::from(1));
        assert!(full.matches_data(&data, &mut || digest));
        assert!(!full.matches_data(&data, &mut || [0; 32]));

        let same_length = Interest::new(name("/a/b/c/d"), true, Nonce::from(1));
        assert!(!same_length.matches_data(&data, &mut never));
    }

    #[test]
    fn test_digest_depends_on_content() {
        let mut hasher = Sha256Hasher::new();
        let a = Data::new(name("/a"), b"1").implicit_digest(&mut hasher);
        let b = Data::new(name("/a"), b"2").implicit_digest(&mut hasher);
        assert_ne!(a, b);
        assert_eq!(a, Data::new(name("/a"), b"1").implicit_digest(&mut hasher));
    }

    #[test]
    fn test_nack_severity() {
        assert!(NackReason::Congestion.is_less_severe(NackReason::NoRoute));
        assert!(NackReason::Duplicate.is_less_severe(NackReason::None));
        assert!(!NackReason::None.is_less_severe(NackReason::NoRoute));
    }
}
