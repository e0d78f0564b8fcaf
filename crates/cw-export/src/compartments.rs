//! Compartment/link derivation from the drainage subtree.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cw_core::{CatchmentId, TimeAxis};
use cw_network::DrainageTree;
use cw_store::{dataset, CatchmentStore, StoreError};
use tracing::info;

use crate::{ExportError, ExportResult};

/// A river reach: a maximal unbranched chain of catchments, ordered from
/// its most upstream member (head) to its most downstream member (exit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compartment {
    pub name: String,
    pub members: Vec<CatchmentId>,
}

impl Compartment {
    pub fn head(&self) -> CatchmentId {
        self.members[0]
    }

    pub fn exit(&self) -> CatchmentId {
        *self.members.last().expect("compartments are never empty")
    }
}

/// Advective connection between two compartments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub from: String,
    pub to: String,
}

/// Input series of one compartment on the run axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CompartmentSeries {
    /// Water entering at the head from upstream compartments (m^3/s).
    pub discharge_upstream: Vec<f64>,
    /// Load entering at the head from upstream compartments (g/h).
    pub load_upstream: Vec<f64>,
    /// Water contributed along the reach by its own catchments (m^3/s).
    pub discharge_lateral: Vec<f64>,
    /// Load contributed along the reach by its own catchments (g/h).
    pub load_lateral: Vec<f64>,
}

/// The solver-facing view of one river system: compartments, links, and
/// per-compartment input series for one substance.
#[derive(Debug, Clone, PartialEq)]
pub struct RiverSystem {
    pub substance: String,
    pub axis: TimeAxis,
    /// Ascending by exit id; compartment names derive from exit ids, so
    /// this order is stable across runs.
    pub compartments: Vec<Compartment>,
    /// Sorted by (from, to).
    pub links: Vec<Link>,
    pub series: BTreeMap<String, CompartmentSeries>,
    /// Catchments without data, zero-filled (only under `allow_missing`).
    pub missing: Vec<CatchmentId>,
}

impl RiverSystem {
    /// Derive the compartment graph for the subtree feeding the outlet
    /// selection and attach transfer loads for `substance`.
    ///
    /// The selection must resolve to a single river system: one selected
    /// outlet must contain every other selected outlet in its upstream
    /// set. Junctions joining more than two upstream reaches cannot be
    /// expressed as pairwise advective links and are rejected; both checks
    /// run before any series is read.
    pub fn assemble(
        tree: &DrainageTree,
        outlets: &[CatchmentId],
        store: &CatchmentStore,
        substance: &str,
        allow_missing: bool,
    ) -> ExportResult<Self> {
        let root = Self::resolve_root(tree, outlets)?;
        let subtree = tree.upstream_of(root)?;

        // Direct-inflow counts decide where chains break.
        let mut inflows: HashMap<CatchmentId, Vec<CatchmentId>> = HashMap::new();
        for &id in &subtree {
            let children: Vec<CatchmentId> = tree.children_of(id)?.collect();
            if children.len() > 2 {
                return Err(ExportError::UnsupportedTopology {
                    what: format!(
                        "catchment {id} joins {} upstream reaches; the solver's advective \
                         links connect reaches pairwise",
                        children.len()
                    ),
                });
            }
            inflows.insert(id, children);
        }

        // A compartment starts at every head (no inflow) and every
        // junction (two inflows), and runs downstream through pure
        // pass-through catchments.
        let mut compartments = Vec::new();
        let mut compartment_of_start: HashMap<CatchmentId, usize> = HashMap::new();
        for &start in &subtree {
            if inflows[&start].len() == 1 {
                continue;
            }
            let mut members = vec![start];
            let mut current = start;
            while current != root {
                let next = match tree.parent_of(current)? {
                    Some(next) => next,
                    None => break,
                };
                if inflows[&next].len() != 1 {
                    break;
                }
                members.push(next);
                current = next;
            }
            compartments.push(Compartment {
                name: String::new(),
                members,
            });
        }
        compartments.sort_by_key(|c| c.exit());
        for (index, compartment) in compartments.iter_mut().enumerate() {
            compartment.name = format!("C{}", compartment.exit());
            compartment_of_start.insert(compartment.head(), index);
        }

        let mut links = Vec::new();
        for compartment in &compartments {
            let exit = compartment.exit();
            if exit == root {
                continue;
            }
            let downstream = tree.parent_of(exit)?.ok_or_else(|| {
                ExportError::UnsupportedTopology {
                    what: format!("reach exit {exit} leaves the selected river system"),
                }
            })?;
            let to_index =
                compartment_of_start
                    .get(&downstream)
                    .ok_or_else(|| ExportError::UnsupportedTopology {
                        what: format!("no compartment starts at junction {downstream}"),
                    })?;
            let to = compartments[*to_index].name.clone();
            links.push(Link {
                name: format!("L{}_{}", exit, compartments[*to_index].exit()),
                from: compartment.name.clone(),
                to,
            });
        }
        links.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        let series = Self::attach_series(
            tree,
            store,
            substance,
            allow_missing,
            &subtree,
            &compartments,
        )?;

        info!(
            outlet = %root,
            compartments = compartments.len(),
            links = links.len(),
            "assembled river system"
        );
        Ok(Self {
            substance: substance.to_string(),
            axis: *store.axis(),
            compartments,
            links,
            series: series.per_compartment,
            missing: series.missing,
        })
    }

    /// One selected outlet must subsume all others; its subtree is the
    /// exported system.
    fn resolve_root(
        tree: &DrainageTree,
        outlets: &[CatchmentId],
    ) -> ExportResult<CatchmentId> {
        for &candidate in outlets {
            let upstream = tree.upstream_of(candidate)?;
            if outlets.iter().all(|o| upstream.contains(o)) {
                return Ok(candidate);
            }
        }
        Err(ExportError::UnsupportedTopology {
            what: "outlet selection does not form a single river system".to_string(),
        })
    }

    fn attach_series(
        tree: &DrainageTree,
        store: &CatchmentStore,
        substance: &str,
        allow_missing: bool,
        subtree: &BTreeSet<CatchmentId>,
        compartments: &[Compartment],
    ) -> ExportResult<AttachedSeries> {
        let steps = store.axis().steps();
        let load_dataset = dataset::load(substance);
        let mut missing = Vec::new();

        let mut fetch = |id: CatchmentId, name: &str| -> ExportResult<Vec<f64>> {
            match store.get_series(id, name) {
                Ok(series) => Ok(series.values().to_vec()),
                Err(StoreError::NotFound { .. }) if allow_missing => {
                    missing.push(id);
                    Ok(vec![0.0; steps])
                }
                Err(StoreError::NotFound { id, dataset }) => {
                    Err(ExportError::MissingData { id, dataset })
                }
                Err(other) => Err(ExportError::Store(other)),
            }
        };

        // Local contributions, ascending by id.
        let mut local_load: BTreeMap<CatchmentId, Vec<f64>> = BTreeMap::new();
        let mut local_discharge: BTreeMap<CatchmentId, Vec<f64>> = BTreeMap::new();
        for &id in subtree {
            local_load.insert(id, fetch(id, &load_dataset)?);
            local_discharge.insert(id, fetch(id, dataset::DISCHARGE)?);
        }

        // Accumulated (local + everything upstream) series per catchment,
        // children before parents.
        let mut accumulated_load: HashMap<CatchmentId, Vec<f64>> = HashMap::new();
        let mut accumulated_discharge: HashMap<CatchmentId, Vec<f64>> = HashMap::new();
        for &id in Self::post_order(tree, subtree)?.iter() {
            let mut load = local_load[&id].clone();
            let mut discharge = local_discharge[&id].clone();
            for child in tree.children_of(id)? {
                for (acc, v) in load.iter_mut().zip(&accumulated_load[&child]) {
                    *acc += v;
                }
                for (acc, v) in discharge.iter_mut().zip(&accumulated_discharge[&child]) {
                    *acc += v;
                }
            }
            accumulated_load.insert(id, load);
            accumulated_discharge.insert(id, discharge);
        }

        let mut per_compartment = BTreeMap::new();
        for compartment in compartments {
            let mut discharge_lateral = vec![0.0; steps];
            let mut load_lateral = vec![0.0; steps];
            for &member in &compartment.members {
                for (acc, v) in discharge_lateral.iter_mut().zip(&local_discharge[&member]) {
                    *acc += v;
                }
                for (acc, v) in load_lateral.iter_mut().zip(&local_load[&member]) {
                    *acc += v;
                }
            }

            let mut discharge_upstream = vec![0.0; steps];
            let mut load_upstream = vec![0.0; steps];
            for child in tree.children_of(compartment.head())? {
                for (acc, v) in discharge_upstream.iter_mut().zip(&accumulated_discharge[&child])
                {
                    *acc += v;
                }
                for (acc, v) in load_upstream.iter_mut().zip(&accumulated_load[&child]) {
                    *acc += v;
                }
            }

            per_compartment.insert(
                compartment.name.clone(),
                CompartmentSeries {
                    discharge_upstream,
                    load_upstream,
                    discharge_lateral,
                    load_lateral,
                },
            );
        }

        missing.sort();
        missing.dedup();
        Ok(AttachedSeries {
            per_compartment,
            missing,
        })
    }

    /// Children-before-parent order over the subtree.
    fn post_order(
        tree: &DrainageTree,
        subtree: &BTreeSet<CatchmentId>,
    ) -> ExportResult<Vec<CatchmentId>> {
        let mut order = Vec::with_capacity(subtree.len());
        let mut remaining: BTreeMap<CatchmentId, usize> = BTreeMap::new();
        for &id in subtree {
            remaining.insert(id, tree.children_of(id)?.count());
        }
        let mut ready: Vec<CatchmentId> = remaining
            .iter()
            .filter(|&(_, &n)| n == 0)
            .map(|(&id, _)| id)
            .collect();
        while let Some(id) = ready.pop() {
            order.push(id);
            if let Some(parent) = tree.parent_of(id)? {
                if let Some(count) = remaining.get_mut(&parent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(parent);
                    }
                }
            }
        }
        Ok(order)
    }
}

struct AttachedSeries {
    per_compartment: BTreeMap<String, CompartmentSeries>,
    missing: Vec<CatchmentId>,
}
