use alloc::vec::Vec;

use crate::name::Name;

/// The producer regions this forwarder belongs to.
///
/// An Interest whose forwarding hint points into one of these regions has
/// arrived, so the hint can be dropped and the Interest forwarded by its own name.
#[derive(Clone, Debug, Default)]
pub struct NetworkRegionTable {
    regions: Vec<Name>,
}

impl NetworkRegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, region: Name) {
        if !self.regions.contains(&region) {
            self.regions.push(region);
        }
    }

    pub fn remove(&mut self, region: &Name) -> bool {
        let before = self.regions.len();
        self.regions.retain(|r| r != region);
        before != self.regions.len()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    // A delegation reaches us if it is a prefix of one of our region names
    pub fn is_in_producer_region(&self, forwarding_hint: &[Name]) -> bool {
        forwarding_hint
            .iter()
            .any(|delegation| self.regions.iter().any(|r| delegation.is_prefix_of(r)))
    }
}

impl FromIterator<Name> for NetworkRegionTable {
    fn from_iter<I: IntoIterator<Item = Name>>(iter: I) -> Self {
        let mut table = Self::new();
        for region in iter {
            table.insert(region);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn test_producer_region() {
        let table: NetworkRegionTable = [name("/campus/lab"), name("/isp")].into_iter().collect();
        assert!(table.is_in_producer_region(&[name("/campus")]));
        assert!(table.is_in_producer_region(&[name("/other"), name("/campus/lab")]));
        assert!(!table.is_in_producer_region(&[name("/campus/lab/room")]));
        assert!(!table.is_in_producer_region(&[]));
        assert!(!NetworkRegionTable::new().is_in_producer_region(&[name("/isp")]));
    }
}
