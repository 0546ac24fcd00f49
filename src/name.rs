use alloc::{boxed::Box, string::String, vec::Vec};
use core::{fmt, num::NonZeroU16, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn from_components<I>(components: I) -> Self
    where
        I: IntoIterator<Item = NameComponent>,
    {
        Self {
            components: components.into_iter().collect(),
        }
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl DoubleEndedIterator<Item = &NameComponent> + '_ {
        self.components.iter()
    }

    pub fn as_components(&self) -> &[NameComponent] {
        &self.components
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    pub fn last(&self) -> Option<&NameComponent> {
        self.components.last()
    }

    pub fn push(&mut self, component: NameComponent) {
        self.components.push(component)
    }

    pub fn adding_component(&self, component: NameComponent) -> Self {
        let mut components = Vec::with_capacity(self.components.len() + 1);
        components.extend_from_slice(&self.components);
        components.push(component);
        Self { components }
    }

    pub fn dropping_last_component(&self) -> Option<Self> {
        let (_, rest) = self.components.split_last()?;
        Some(Self {
            components: rest.to_vec(),
        })
    }

    // The first `count` components (or the whole name if it is shorter)
    pub fn prefix(&self, count: usize) -> Self {
        Self {
            components: self.components[..count.min(self.components.len())].to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self.components[..] == other.components[..self.components.len()]
    }

    pub fn ends_with_implicit_digest(&self) -> bool {
        matches!(
            self.last().map(|c| c.component_type()),
            Some(NameComponentType::ImplicitSha256Digest)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("invalid percent-encoding in component {0:?}")]
    InvalidPercentEncoding(String),
    #[error("invalid sha256 digest component {0:?}")]
    InvalidDigest(String),
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let uri = uri.strip_prefix("ndn:").unwrap_or(uri);
        let mut name = Name::new();
        for part in uri.split('/').filter(|p| !p.is_empty()) {
            let component = if let Some(hex) = part.strip_prefix("sha256digest=") {
                let digest = decode_hex_digest(hex)
                    .ok_or_else(|| NameError::InvalidDigest(String::from(part)))?;
                NameComponent::implicit_digest(digest)
            } else if let Some(hex) = part.strip_prefix("params-sha256=") {
                let digest = decode_hex_digest(hex)
                    .ok_or_else(|| NameError::InvalidDigest(String::from(part)))?;
                NameComponent::with_type(NameComponentType::ParameterSha256Digest, &digest)
            } else {
                let bytes = percent_decode(part)
                    .ok_or_else(|| NameError::InvalidPercentEncoding(String::from(part)))?;
                NameComponent::generic(&bytes)
            };
            name.push(component);
        }
        Ok(name)
    }
}

impl TryFrom<String> for Name {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Name> for String {
    fn from(value: Name) -> Self {
        alloc::format!("{value}")
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameComponent {
    pub typ: NonZeroU16,
    pub bytes: Box<[u8]>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NameComponentType {
    Generic,
    ImplicitSha256Digest,
    ParameterSha256Digest,
    Other(NonZeroU16),
}

impl From<NonZeroU16> for NameComponentType {
    fn from(value: NonZeroU16) -> Self {
        match value.get() {
            NameComponent::TYPE_GENERIC => NameComponentType::Generic,
            NameComponent::TYPE_IMPLICIT_SHA256 => NameComponentType::ImplicitSha256Digest,
            NameComponent::TYPE_PARAMETER_SHA256 => NameComponentType::ParameterSha256Digest,
            _ => NameComponentType::Other(value),
        }
    }
}

impl From<NameComponentType> for NonZeroU16 {
    fn from(value: NameComponentType) -> Self {
        let raw = match value {
            NameComponentType::Generic => NameComponent::TYPE_GENERIC,
            NameComponentType::ImplicitSha256Digest => NameComponent::TYPE_IMPLICIT_SHA256,
            NameComponentType::ParameterSha256Digest => NameComponent::TYPE_PARAMETER_SHA256,
            NameComponentType::Other(v) => return v,
        };
        match NonZeroU16::new(raw) {
            Some(typ) => typ,
            None => unreachable!(),
        }
    }
}

impl NameComponent {
    pub const TYPE_GENERIC: u16 = 8;
    pub const TYPE_IMPLICIT_SHA256: u16 = 1;
    pub const TYPE_PARAMETER_SHA256: u16 = 2;

    // None if the type is 0
    pub fn new(typ: u16, bytes: &[u8]) -> Option<Self> {
        Some(Self {
            typ: NonZeroU16::new(typ)?,
            bytes: Box::from(bytes),
        })
    }

    pub fn with_type(typ: NameComponentType, bytes: &[u8]) -> Self {
        Self {
            typ: typ.into(),
            bytes: Box::from(bytes),
        }
    }

    pub fn generic(bytes: &[u8]) -> Self {
        Self::with_type(NameComponentType::Generic, bytes)
    }

    pub fn implicit_digest(digest: [u8; 32]) -> Self {
        Self::with_type(NameComponentType::ImplicitSha256Digest, &digest)
    }

    pub fn component_type(&self) -> NameComponentType {
        self.typ.into()
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.component_type() {
            NameComponentType::ImplicitSha256Digest => {
                f.write_str("sha256digest=")?;
                return write_hex(f, &self.bytes);
            }
            NameComponentType::ParameterSha256Digest => {
                f.write_str("params-sha256=")?;
                return write_hex(f, &self.bytes);
            }
            NameComponentType::Other(typ) => write!(f, "{}=", typ.get())?,
            NameComponentType::Generic => {}
        }
        for &b in self.bytes.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{b:02X}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameComponent({self})")
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn decode_hex_digest(hex: &str) -> Option<[u8; 32]> {
    let hex = hex.as_bytes();
    if hex.len() != 64 {
        return None;
    }
    let mut digest = [0u8; 32];
    for (i, pair) in hex.chunks_exact(2).enumerate() {
        digest[i] = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
    }
    Some(digest)
}

fn percent_decode(part: &str) -> Option<Vec<u8>> {
    let bytes = part.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            decoded.push((hi << 4) | lo);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_parse_and_display() {
        let name: Name = "/a/b%20c/d".parse().unwrap();
        assert_eq!(name.component_count(), 3);
        assert_eq!(name.get(1).unwrap().bytes.as_ref(), b"b c");
        assert_eq!(name.to_string(), "/a/b%20c/d");

        assert!("/".parse::<Name>().unwrap().is_empty());
        assert!("".parse::<Name>().unwrap().is_empty());
        assert_eq!("ndn:/x".parse::<Name>().unwrap().to_string(), "/x");
        assert!("/a/%G1".parse::<Name>().is_err());
    }

    #[test]
    fn test_digest_component() {
        let digest = [0xab; 32];
        let name = Name::new().adding_component(NameComponent::implicit_digest(digest));
        assert!(name.ends_with_implicit_digest());
        let uri = name.to_string();
        assert!(uri.starts_with("/sha256digest=abab"));
        assert_eq!(uri.parse::<Name>().unwrap(), name);
        assert!("/sha256digest=00".parse::<Name>().is_err());
    }

    #[test]
    fn test_prefixes() {
        let ab: Name = "/a/b".parse().unwrap();
        let abc: Name = "/a/b/c".parse().unwrap();
        assert!(ab.is_prefix_of(&abc));
        assert!(ab.is_prefix_of(&ab));
        assert!(!abc.is_prefix_of(&ab));
        assert!(Name::new().is_prefix_of(&ab));
        assert_eq!(abc.prefix(2), ab);
        assert_eq!(abc.prefix(7), abc);
        assert_eq!(abc.dropping_last_component(), Some(ab));
        assert_eq!(Name::new().dropping_last_component(), None);
    }

    #[test]
    fn test_component_types() {
        let c = NameComponent::new(NameComponent::TYPE_IMPLICIT_SHA256, &[1, 2]).unwrap();
        assert_eq!(c.component_type(), NameComponentType::ImplicitSha256Digest);
        assert!(NameComponent::new(0, &[]).is_none());
        let other = NameComponent::new(42, b"x").unwrap();
        assert_eq!(other.to_string(), "42=x");
    }
}
