//! Drainage forest construction and queries.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cw_core::CatchmentId;

use crate::error::{NetworkError, NetworkResult};

/// The drainage network: a validated, immutable forest in which every
/// catchment points to at most one downstream parent.
///
/// Stored index-based (dense parent array plus compact child adjacency)
/// rather than as linked nodes; catchment ids map to dense indices in
/// ascending-id order, which keeps every traversal reproducible.
#[derive(Debug, Clone)]
pub struct DrainageTree {
    /// Dense index -> catchment id, ascending.
    ids: Vec<CatchmentId>,
    /// Catchment id -> dense index.
    idx: HashMap<CatchmentId, u32>,
    /// Dense index -> downstream parent (None at a basin outlet).
    parent: Vec<Option<u32>>,
    /// Child adjacency: node i's direct inflows are
    /// `children[child_offsets[i]..child_offsets[i + 1]]`.
    child_offsets: Vec<usize>,
    children: Vec<u32>,
}

impl DrainageTree {
    /// Build and validate the forest from `(child, downstream parent)`
    /// pairs. `None` marks a basin outlet; parents that never appear as a
    /// child are materialized as outlet nodes.
    ///
    /// Fails with `DuplicateParent` when a child is listed with two
    /// different parents (an exact duplicate pair is tolerated) and with
    /// `Cycle` naming a catchment on the offending loop. Construction is
    /// linear in the catchment count.
    pub fn build(edges: &[(CatchmentId, Option<CatchmentId>)]) -> NetworkResult<Self> {
        let mut parent_by_child: HashMap<CatchmentId, Option<CatchmentId>> = HashMap::new();
        for &(child, parent) in edges {
            match parent_by_child.get(&child) {
                None => {
                    parent_by_child.insert(child, parent);
                }
                Some(&existing) if existing == parent => {}
                Some(_) => return Err(NetworkError::DuplicateParent { id: child }),
            }
        }

        let mut id_set: BTreeSet<CatchmentId> = parent_by_child.keys().copied().collect();
        for parent in parent_by_child.values().flatten() {
            id_set.insert(*parent);
        }

        let ids: Vec<CatchmentId> = id_set.into_iter().collect();
        let idx: HashMap<CatchmentId, u32> = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i as u32))
            .collect();

        let parent: Vec<Option<u32>> = ids
            .iter()
            .map(|id| {
                parent_by_child
                    .get(id)
                    .copied()
                    .flatten()
                    .map(|p| idx[&p])
            })
            .collect();

        Self::check_acyclic(&ids, &parent)?;

        let (child_offsets, children) = Self::build_adjacency(&parent);

        Ok(Self {
            ids,
            idx,
            parent,
            child_offsets,
            children,
        })
    }

    /// Walk parent chains with three-color marking; any node reached twice
    /// while its chain is still open sits on a cycle.
    fn check_acyclic(ids: &[CatchmentId], parent: &[Option<u32>]) -> NetworkResult<()> {
        const UNSEEN: u8 = 0;
        const OPEN: u8 = 1;
        const DONE: u8 = 2;

        let mut state = vec![UNSEEN; ids.len()];
        let mut path = Vec::new();
        for start in 0..ids.len() {
            if state[start] != UNSEEN {
                continue;
            }
            path.clear();
            let mut current = start;
            loop {
                if state[current] == OPEN {
                    return Err(NetworkError::Cycle { id: ids[current] });
                }
                if state[current] == DONE {
                    break;
                }
                state[current] = OPEN;
                path.push(current);
                match parent[current] {
                    Some(next) => current = next as usize,
                    None => break,
                }
            }
            for &visited in &path {
                state[visited] = DONE;
            }
        }
        Ok(())
    }

    /// Compact child adjacency: counting pass, prefix-sum offsets, fill.
    /// Children fill in ascending dense order, so each node's inflow list
    /// is ascending by id.
    fn build_adjacency(parent: &[Option<u32>]) -> (Vec<usize>, Vec<u32>) {
        let n = parent.len();
        let mut counts = vec![0usize; n];
        for p in parent.iter().flatten() {
            counts[*p as usize] += 1;
        }

        let mut offsets = Vec::with_capacity(n + 1);
        let mut total = 0;
        offsets.push(0);
        for &c in &counts {
            total += c;
            offsets.push(total);
        }

        let mut cursor = offsets[..n].to_vec();
        let mut children = vec![0u32; total];
        for (child, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[cursor[*p as usize]] = child as u32;
                cursor[*p as usize] += 1;
            }
        }

        (offsets, children)
    }

    fn index(&self, id: CatchmentId) -> NetworkResult<usize> {
        self.idx
            .get(&id)
            .map(|&i| i as usize)
            .ok_or(NetworkError::UnknownId { id })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All catchment ids, ascending.
    pub fn ids(&self) -> &[CatchmentId] {
        &self.ids
    }

    pub fn contains(&self, id: CatchmentId) -> bool {
        self.idx.contains_key(&id)
    }

    /// The immediate downstream parent, or `None` at a basin outlet.
    pub fn parent_of(&self, id: CatchmentId) -> NetworkResult<Option<CatchmentId>> {
        let i = self.index(id)?;
        Ok(self.parent[i].map(|p| self.ids[p as usize]))
    }

    /// Direct inflows of a catchment, ascending by id.
    pub fn children_of(
        &self,
        id: CatchmentId,
    ) -> NetworkResult<impl Iterator<Item = CatchmentId> + '_> {
        let i = self.index(id)?;
        let range = self.child_offsets[i]..self.child_offsets[i + 1];
        Ok(self.children[range].iter().map(|&c| self.ids[c as usize]))
    }

    /// Roots of the forest (no downstream parent), ascending.
    pub fn outlets(&self) -> Vec<CatchmentId> {
        self.parent
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_none())
            .map(|(i, _)| self.ids[i])
            .collect()
    }

    /// Transitive upstream closure of `outlet`, including the outlet
    /// itself.
    pub fn upstream_of(&self, outlet: CatchmentId) -> NetworkResult<BTreeSet<CatchmentId>> {
        let start = self.index(outlet)?;
        let mut members = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if !members.insert(self.ids[node]) {
                continue;
            }
            let range = self.child_offsets[node]..self.child_offsets[node + 1];
            stack.extend(self.children[range].iter().map(|&c| c as usize));
        }
        Ok(members)
    }

    /// Histogram of direct-inflow counts, a quick shape diagnostic for a
    /// freshly built network.
    pub fn connection_counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for i in 0..self.ids.len() {
            let n = self.child_offsets[i + 1] - self.child_offsets[i];
            *counts.entry(n).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> CatchmentId {
        CatchmentId::new(raw)
    }

    #[test]
    fn single_node_is_its_own_closure() {
        let tree = DrainageTree::build(&[(id(1), None)]).unwrap();
        let upstream = tree.upstream_of(id(1)).unwrap();
        assert_eq!(upstream, BTreeSet::from([id(1)]));
        assert_eq!(tree.outlets(), vec![id(1)]);
    }

    #[test]
    fn chain_closure_includes_all_upstream() {
        // S1 -> S2 -> S3 (outlet)
        let tree =
            DrainageTree::build(&[(id(1), Some(id(2))), (id(2), Some(id(3)))]).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(
            tree.upstream_of(id(3)).unwrap(),
            BTreeSet::from([id(1), id(2), id(3)])
        );
        assert_eq!(
            tree.upstream_of(id(2)).unwrap(),
            BTreeSet::from([id(1), id(2)])
        );
        assert_eq!(tree.parent_of(id(3)).unwrap(), None);
        assert_eq!(tree.parent_of(id(1)).unwrap(), Some(id(2)));
    }

    #[test]
    fn confluence_children_ascend() {
        let tree = DrainageTree::build(&[
            (id(30), Some(id(1))),
            (id(10), Some(id(1))),
            (id(20), Some(id(1))),
        ])
        .unwrap();
        let children: Vec<_> = tree.children_of(id(1)).unwrap().collect();
        assert_eq!(children, vec![id(10), id(20), id(30)]);
        assert_eq!(tree.connection_counts(), BTreeMap::from([(0, 3), (3, 1)]));
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        // S1 -> S2 -> S1
        let err =
            DrainageTree::build(&[(id(1), Some(id(2))), (id(2), Some(id(1)))]).unwrap_err();
        assert!(matches!(err, NetworkError::Cycle { .. }));
    }

    #[test]
    fn self_loop_is_rejected() {
        let err = DrainageTree::build(&[(id(5), Some(id(5)))]).unwrap_err();
        assert_eq!(err, NetworkError::Cycle { id: id(5) });
    }

    #[test]
    fn conflicting_parents_are_rejected() {
        let err = DrainageTree::build(&[
            (id(1), Some(id(2))),
            (id(1), Some(id(3))),
        ])
        .unwrap_err();
        assert_eq!(err, NetworkError::DuplicateParent { id: id(1) });
    }

    #[test]
    fn exact_duplicate_edge_is_tolerated() {
        let tree = DrainageTree::build(&[
            (id(1), Some(id(2))),
            (id(1), Some(id(2))),
        ])
        .unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn parent_only_ids_become_outlets() {
        // 2 never appears as a child but is referenced as a parent.
        let tree = DrainageTree::build(&[(id(1), Some(id(2)))]).unwrap();
        assert!(tree.contains(id(2)));
        assert_eq!(tree.outlets(), vec![id(2)]);
    }

    #[test]
    fn unknown_outlet_is_an_error() {
        let tree = DrainageTree::build(&[(id(1), None)]).unwrap();
        assert_eq!(
            tree.upstream_of(id(99)).unwrap_err(),
            NetworkError::UnknownId { id: id(99) }
        );
    }
}
