//! Cached upstream closures.

use std::collections::{BTreeMap, BTreeSet};

use cw_core::CatchmentId;

use crate::error::NetworkResult;
use crate::tree::DrainageTree;

/// Upstream membership for the run's outlet selection, computed once and
/// reused by every routing stage. The tree is immutable for the run, so
/// the cache never invalidates.
#[derive(Debug, Clone)]
pub struct UpstreamSets {
    sets: BTreeMap<CatchmentId, BTreeSet<CatchmentId>>,
}

impl UpstreamSets {
    pub fn precompute(tree: &DrainageTree, outlets: &[CatchmentId]) -> NetworkResult<Self> {
        let mut sets = BTreeMap::new();
        for &outlet in outlets {
            sets.insert(outlet, tree.upstream_of(outlet)?);
        }
        Ok(Self { sets })
    }

    pub fn get(&self, outlet: CatchmentId) -> Option<&BTreeSet<CatchmentId>> {
        self.sets.get(&outlet)
    }

    pub fn outlets(&self) -> impl Iterator<Item = CatchmentId> + '_ {
        self.sets.keys().copied()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (CatchmentId, &BTreeSet<CatchmentId>)> + '_ {
        self.sets.iter().map(|(&outlet, members)| (outlet, members))
    }

    /// Union of all members, ascending; the transfer barrier checks
    /// coverage against this.
    pub fn all_members(&self) -> BTreeSet<CatchmentId> {
        self.sets.values().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> CatchmentId {
        CatchmentId::new(raw)
    }

    #[test]
    fn precompute_caches_each_outlet() {
        // 1 -> 3, 2 -> 3 (outlet); 4 -> 5 (outlet)
        let tree = DrainageTree::build(&[
            (id(1), Some(id(3))),
            (id(2), Some(id(3))),
            (id(4), Some(id(5))),
        ])
        .unwrap();

        let sets = UpstreamSets::precompute(&tree, &[id(3), id(5)]).unwrap();
        assert_eq!(
            sets.get(id(3)).unwrap(),
            &BTreeSet::from([id(1), id(2), id(3)])
        );
        assert_eq!(sets.get(id(5)).unwrap(), &BTreeSet::from([id(4), id(5)]));
        assert_eq!(sets.all_members().len(), 5);
        assert!(sets.get(id(1)).is_none());
    }

    #[test]
    fn unknown_outlet_fails_precompute() {
        let tree = DrainageTree::build(&[(id(1), None)]).unwrap();
        assert!(UpstreamSets::precompute(&tree, &[id(2)]).is_err());
    }
}
