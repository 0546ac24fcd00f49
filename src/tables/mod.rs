pub mod pit;

use alloc::{vec, vec::Vec};

use crate::{
    face::FaceToken,
    name::{Name, NameComponent, NameComponentType},
    packet::{Data, Interest},
    strategy::StrategyId,
};

use pit::{Pit, PitEntry, PitToken};

// The name tree indexes everything that is keyed by name: the FIB next hops,
//  the PIT entries (which themselves live in the arena) and the strategy choice.

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NextHop {
    pub cost: u32,
    pub face: FaceToken,
}

/// What a predicate passed to [`Tables::partial_enumerate`] sees of a node.
#[derive(Copy, Clone, Debug)]
pub struct NameTreeNode {
    pub depth: usize,
    pub has_fib_entry: bool,
    pub has_pit_entries: bool,
    // Effective strategy at this node
    pub strategy: StrategyId,
}

struct TableEntry {
    // Ordered by cost
    fib: Vec<NextHop>,
    pit: Vec<PitToken>,
    strategy: Option<StrategyId>,
    // Ordered by component
    children: Vec<(NameComponent, TableEntry)>,
}

impl TableEntry {
    fn new() -> Self {
        Self {
            fib: Vec::new(),
            pit: Vec::new(),
            strategy: None,
            children: Vec::new(),
        }
    }

    fn get_child(&self, component: &NameComponent) -> Option<&TableEntry> {
        self.children
            .binary_search_by(|x| x.0.cmp(component))
            .ok()
            .map(|idx| &self.children[idx].1)
    }

    fn get_or_insert_child(&mut self, component: &NameComponent) -> &mut TableEntry {
        let idx = match self.children.binary_search_by(|x| x.0.cmp(component)) {
            Ok(idx) => idx,
            Err(idx) => {
                self.children
                    .insert(idx, (component.clone(), TableEntry::new()));
                idx
            }
        };
        &mut self.children[idx].1
    }

    fn descend(&self, components: &[NameComponent]) -> Option<&TableEntry> {
        let mut node = self;
        for component in components {
            node = node.get_child(component)?;
        }
        Some(node)
    }

    fn descend_mut(&mut self, components: &[NameComponent]) -> Option<&mut TableEntry> {
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

    fn find_or_insert(&mut self, components: &[NameComponent]) -> &mut TableEntry {
        let mut node = self;
        for component in components {
            node = node.get_or_insert_child(component);
        }
        node
    }

    // Drops the empty nodes along the path, deepest first
    fn prune_path(&mut self, remaining: &[NameComponent]) {
        if let Some((first, rest)) = remaining.split_first() {
            if let Ok(idx) = self.children.binary_search_by(|x| x.0.cmp(first)) {
                self.children[idx].1.prune_path(rest);
                if self.children[idx].1.is_empty() {
                    self.children.remove(idx);
                }
            }
        }
    }

    fn remove_face_from_fib(&mut self, face: FaceToken) {
        self.fib.retain(|hop| hop.face != face);
        for (_, child) in self.children.iter_mut() {
            child.remove_face_from_fib(face);
        }
        self.children.retain(|c| !c.1.is_empty());
    }

    fn is_empty(&self) -> bool {
        self.fib.is_empty()
            && self.pit.is_empty()
            && self.strategy.is_none()
            && self.children.is_empty()
    }
}

pub struct Tables {
    root: TableEntry,
    pit: Pit,
}

impl Tables {
    pub fn new(default_strategy: StrategyId) -> Self {
        let mut root = TableEntry::new();
        root.strategy = Some(default_strategy);
        Self {
            root,
            pit: Pit::new(),
        }
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn pit_mut(&mut self) -> &mut Pit {
        &mut self.pit
    }

    // PIT methods
    // Finds the entry an Interest aggregates into, creating it if there is none.
    //  The flag is true when the entry was just created.
    pub fn pit_find_or_insert(&mut self, interest: &Interest) -> (PitToken, bool) {
        let node = self.root.find_or_insert(interest.name.as_components());
        for token in node.pit.iter() {
            if self.pit[*token].interest().has_same_selectors(interest) {
                return (*token, false);
            }
        }

        let mut canonical = interest.clone();
        canonical.incoming_face = None;
        canonical.next_hop_face = None;
        let token = self.pit.insert(PitEntry::new(canonical));
        node.pit.push(token);
        (token, true)
    }

    pub fn pit_find(&self, interest: &Interest) -> Option<PitToken> {
        let node = self.root.descend(interest.name.as_components())?;
        node.pit
            .iter()
            .copied()
            .find(|token| self.pit[*token].interest().has_same_selectors(interest))
    }

    // All entries whose Interest the Data satisfies. The digest closure is only
    //  called if some entry names the Data by its full name.
    pub fn pit_find_all_data_matches<F>(&self, data: &Data, digest: &mut F) -> Vec<PitToken>
    where
        F: FnMut() -> [u8; 32],
    {
        let mut matches = Vec::new();
        let mut node = &self.root;
        let mut depth = 0;
        loop {
            for token in node.pit.iter() {
                if self.pit[*token].interest().matches_data(data, digest) {
                    matches.push(*token);
                }
            }

            match data.name.get(depth) {
                Some(component) => match node.get_child(component) {
                    Some(child) => {
                        node = child;
                        depth += 1;
                    }
                    None => return matches,
                },
                None => break,
            }
        }

        // We are at the node of the Data name, its digest children hold full-name Interests
        for (component, child) in node.children.iter() {
            if component.component_type() != NameComponentType::ImplicitSha256Digest {
                continue;
            }
            for token in child.pit.iter() {
                if self.pit[*token].interest().matches_data(data, digest) {
                    matches.push(*token);
                }
            }
        }
        matches
    }

    pub fn pit_erase(&mut self, token: PitToken) -> Option<PitEntry> {
        let entry = self.pit.remove(token)?;
        let components = entry.name().as_components();
        if let Some(node) = self.root.descend_mut(components) {
            node.pit.retain(|t| *t != token);
        }
        self.root.prune_path(components);
        Some(entry)
    }

    // FIB methods
    // Returns true if the face was not a next hop of this prefix before.
    //  Calling this again for the same face updates the cost.
    pub fn fib_add_next_hop(&mut self, prefix: &Name, face: FaceToken, cost: u32) -> bool {
        let node = self.root.find_or_insert(prefix.as_components());
        let is_new = match node.fib.iter_mut().find(|hop| hop.face == face) {
            Some(hop) => {
                hop.cost = cost;
                false
            }
            None => {
                node.fib.push(NextHop { cost, face });
                true
            }
        };
        node.fib.sort();
        is_new
    }

    pub fn fib_remove_next_hop(&mut self, prefix: &Name, face: FaceToken) -> bool {
        let components = prefix.as_components();
        let Some(node) = self.root.descend_mut(components) else {
            return false;
        };
        let before = node.fib.len();
        node.fib.retain(|hop| hop.face != face);
        let removed = node.fib.len() != before;
        self.root.prune_path(components);
        removed
    }

    // Next hops of the longest prefix of the name that has any
    pub fn fib_lookup(&self, name: &Name) -> &[NextHop] {
        let mut node = &self.root;
        let mut best: &[NextHop] = &node.fib;
        for component in name.components() {
            match node.get_child(component) {
                Some(child) => {
                    node = child;
                    if !node.fib.is_empty() {
                        best = &node.fib;
                    }
                }
                None => break,
            }
        }
        best
    }

    pub fn fib_remove_face(&mut self, face: FaceToken) {
        self.root.remove_face_from_fib(face);
    }

    // Strategy choice methods
    pub fn set_strategy(&mut self, prefix: &Name, strategy: StrategyId) {
        self.root.find_or_insert(prefix.as_components()).strategy = Some(strategy);
    }

    // The root always keeps its strategy
    pub fn unset_strategy(&mut self, prefix: &Name) -> bool {
        if prefix.is_empty() {
            return false;
        }
        let components = prefix.as_components();
        let removed = match self.root.descend_mut(components) {
            Some(node) => node.strategy.take().is_some(),
            None => false,
        };
        self.root.prune_path(components);
        removed
    }

    // Deepest strategy assignment on the path of the name
    pub fn effective_strategy(&self, name: &Name) -> StrategyId {
        let mut node = &self.root;
        let mut strategy = node.strategy.unwrap_or_default();
        for component in name.components() {
            match node.get_child(component) {
                Some(child) => {
                    node = child;
                    if let Some(s) = node.strategy {
                        strategy = s;
                    }
                }
                None => break,
            }
        }
        strategy
    }

    /// Visits the subtree rooted at `prefix` and collects the PIT entries of the
    /// nodes the predicate includes.
    ///
    /// The predicate returns (include this node, descend into its children).
    /// The walk uses an explicit stack, so deep names do not grow the call stack.
    pub fn partial_enumerate<F>(&self, prefix: &Name, mut predicate: F) -> Vec<PitToken>
    where
        F: FnMut(&NameTreeNode) -> (bool, bool),
    {
        let mut found = Vec::new();
        let Some(start) = self.root.descend(prefix.as_components()) else {
            return found;
        };

        let mut stack = vec![(start, prefix.component_count(), self.effective_strategy(prefix))];
        while let Some((node, depth, inherited)) = stack.pop() {
            let strategy = node.strategy.unwrap_or(inherited);
            let view = NameTreeNode {
                depth,
                has_fib_entry: !node.fib.is_empty(),
                has_pit_entries: !node.pit.is_empty(),
                strategy,
            };
            let (include, descend) = predicate(&view);
            if include {
                found.extend_from_slice(&node.pit);
            }
            if descend {
                // Reversed so that children are visited in name order
                for (_, child) in node.children.iter().rev() {
                    stack.push((child, depth + 1, strategy));
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Nonce;
    use pretty_assertions::assert_eq;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    fn interest(uri: &str, can_be_prefix: bool) -> Interest {
        Interest::new(name(uri), can_be_prefix, Nonce::from(1))
    }

    #[test]
    fn test_pit_aggregation() {
        let mut tables = Tables::new(StrategyId::default());
        let (a, is_new) = tables.pit_find_or_insert(&interest("/a/b", false));
        assert!(is_new);
        let (b, is_new) = tables.pit_find_or_insert(&interest("/a/b", false));
        assert!(!is_new);
        assert_eq!(a, b);

        // Different selectors do not aggregate
        let (c, is_new) = tables.pit_find_or_insert(&interest("/a/b", true));
        assert!(is_new);
        assert_ne!(a, c);
        let fresh = interest("/a/b", false).with_must_be_fresh(true);
        assert!(tables.pit_find(&fresh).is_none());

        assert!(tables.pit_erase(a).is_some());
        assert!(tables.pit_find(&interest("/a/b", false)).is_none());
        assert_eq!(tables.pit_find(&interest("/a/b", true)), Some(c));
        assert!(tables.pit_erase(c).is_some());
        assert!(tables.root.children.is_empty());
        assert!(tables.pit().is_empty());
    }

    #[test]
    fn test_pit_data_matches() {
        let mut tables = Tables::new(StrategyId::default());
        let (exact, _) = tables.pit_find_or_insert(&interest("/a/b", false));
        let (prefix, _) = tables.pit_find_or_insert(&interest("/a", true));
        let (not_prefix, _) = tables.pit_find_or_insert(&interest("/a", false));
        let (other, _) = tables.pit_find_or_insert(&interest("/x", true));

        let data = Data::new(name("/a/b"), b"");
        let mut never = || -> [u8; 32] { panic!("no full-name entry") };
        let mut matches = tables.pit_find_all_data_matches(&data, &mut never);
        matches.sort();
        let mut expected = vec![exact, prefix];
        expected.sort();
        assert_eq!(matches, expected);
        assert!(!matches.contains(&not_prefix));
        assert!(!matches.contains(&other));

        let full = name("/a/b").adding_component(NameComponent::implicit_digest([7; 32]));
        let (by_digest, _) = tables.pit_find_or_insert(&Interest::new(full, false, Nonce::from(1)));
        let matches = tables.pit_find_all_data_matches(&data, &mut || [7; 32]);
        assert!(matches.contains(&by_digest));
        let matches = tables.pit_find_all_data_matches(&data, &mut || [8; 32]);
        assert!(!matches.contains(&by_digest));
    }

    #[test]
    fn test_fib_longest_prefix() {
        let mut tables = Tables::new(StrategyId::default());
        let f1 = FaceToken(256);
        let f2 = FaceToken(257);
        assert!(tables.fib_add_next_hop(&name("/a"), f1, 10));
        assert!(tables.fib_add_next_hop(&name("/a/b"), f2, 10));
        assert!(tables.fib_add_next_hop(&name("/a/b"), f1, 5));
        assert!(!tables.fib_add_next_hop(&name("/a/b"), f1, 20));

        assert_eq!(
            tables.fib_lookup(&name("/a/b/c")),
            &[NextHop { cost: 10, face: f2 }, NextHop { cost: 20, face: f1 }]
        );
        assert_eq!(tables.fib_lookup(&name("/a/x")), &[NextHop { cost: 10, face: f1 }]);
        assert!(tables.fib_lookup(&name("/z")).is_empty());

        tables.fib_remove_face(f2);
        assert_eq!(tables.fib_lookup(&name("/a/b")), &[NextHop { cost: 20, face: f1 }]);
        assert!(tables.fib_remove_next_hop(&name("/a/b"), f1));
        assert!(!tables.fib_remove_next_hop(&name("/a/b"), f1));
        assert_eq!(tables.fib_lookup(&name("/a/b")), &[NextHop { cost: 10, face: f1 }]);
    }

    #[test]
    fn test_effective_strategy() {
        let mut tables = Tables::new(StrategyId(0));
        tables.set_strategy(&name("/a"), StrategyId(1));
        tables.set_strategy(&name("/a/b/c"), StrategyId(2));
        assert_eq!(tables.effective_strategy(&name("/")), StrategyId(0));
        assert_eq!(tables.effective_strategy(&name("/a/b")), StrategyId(1));
        assert_eq!(tables.effective_strategy(&name("/a/b/c/d")), StrategyId(2));

        assert!(!tables.unset_strategy(&Name::new()));
        assert!(tables.unset_strategy(&name("/a")));
        assert_eq!(tables.effective_strategy(&name("/a/b")), StrategyId(0));
    }

    #[test]
    fn test_partial_enumerate_prunes() {
        let mut tables = Tables::new(StrategyId(0));
        let (ab, _) = tables.pit_find_or_insert(&interest("/a/b", false));
        let (acd, _) = tables.pit_find_or_insert(&interest("/a/c/d", false));
        let (ax, _) = tables.pit_find_or_insert(&interest("/a/x/y", false));
        tables.fib_add_next_hop(&name("/a/x"), FaceToken(256), 0);

        let found = tables.partial_enumerate(&name("/a"), |node| {
            if node.has_fib_entry && node.depth > 1 {
                (false, false)
            } else {
                (node.has_pit_entries, true)
            }
        });
        assert_eq!(found, vec![ab, acd]);
        assert!(!found.contains(&ax));

        assert!(tables
            .partial_enumerate(&name("/missing"), |_| (true, true))
            .is_empty());
    }
}
