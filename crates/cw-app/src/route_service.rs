//! Routing stage: upstream aggregation or solver-file export.

use std::fs;
use std::path::PathBuf;

use cw_core::CatchmentId;
use cw_export::{write_aqu, RiverSystem};
use cw_network::{DrainageTree, UpstreamSets};
use cw_project::{Project, RoutingMode};
use cw_routing::{write_series_csv, Aggregator, MissingPolicy};
use cw_store::{dataset, CatchmentStore};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::import_service;

#[derive(Debug)]
pub struct RouteReport {
    pub mode: RoutingMode,
    /// Files written under the project's output directory.
    pub outputs: Vec<PathBuf>,
    /// Catchments that contributed nothing (only under `allow_missing`).
    pub missing: Vec<CatchmentId>,
}

/// Rebuild the drainage network from the attribute table; the topology
/// source stays with the collaborator data, not the store.
pub fn build_network(project: &Project) -> AppResult<DrainageTree> {
    let import = project.import.as_ref().ok_or_else(|| AppError::Import {
        what: "routing needs the import section to read the drainage topology".to_string(),
    })?;
    let records = import_service::read_attributes(&import.catchment_attributes)?;
    let tree = DrainageTree::build(&import_service::edges(&records))?;
    info!(
        catchments = tree.len(),
        outlets = tree.outlets().len(),
        "built drainage network"
    );
    Ok(tree)
}

pub fn upstream_sets(project: &Project, tree: &DrainageTree) -> AppResult<UpstreamSets> {
    Ok(UpstreamSets::precompute(tree, &project.routing.outlets)?)
}

/// Run the configured routing mode over the outlet selection.
pub fn run(
    project: &Project,
    store: &CatchmentStore,
    tree: &DrainageTree,
    upstream: &UpstreamSets,
) -> AppResult<RouteReport> {
    fs::create_dir_all(&project.routing.output_dir)?;
    match project.routing.mode {
        RoutingMode::Aggregate => aggregate(project, store, upstream),
        RoutingMode::ExportModel => export_model(project, store, tree),
    }
}

fn aggregate(
    project: &Project,
    store: &CatchmentStore,
    upstream: &UpstreamSets,
) -> AppResult<RouteReport> {
    let policy = if project.routing.allow_missing {
        MissingPolicy::TreatAsZero
    } else {
        MissingPolicy::Fail
    };
    let aggregator = Aggregator::new(store, upstream, policy);

    let mut outputs = Vec::new();
    let mut missing = Vec::new();
    for substance in &project.substances {
        let results = aggregator.aggregate_all(&substance.name)?;
        for result in results {
            // Write-back: aggregated series live next to the local results
            // under their own dataset name.
            store.put_series(
                result.outlet,
                &dataset::load_aggregated(&substance.name),
                &result.load,
            )?;

            let file = project.routing.output_dir.join(format!(
                "load_{}_outlet_{}.csv",
                substance.name, result.outlet
            ));
            let writer = fs::File::create(&file)?;
            write_series_csv(writer, "load_g_per_h", &result.load)?;
            outputs.push(file);
            missing.extend(result.missing);
        }
    }
    missing.sort();
    missing.dedup();
    info!(files = outputs.len(), "wrote aggregated outlet series");
    Ok(RouteReport {
        mode: RoutingMode::Aggregate,
        outputs,
        missing,
    })
}

fn export_model(
    project: &Project,
    store: &CatchmentStore,
    tree: &DrainageTree,
) -> AppResult<RouteReport> {
    let mut outputs = Vec::new();
    let mut missing = Vec::new();
    for substance in &project.substances {
        let system = RiverSystem::assemble(
            tree,
            &project.routing.outlets,
            store,
            &substance.name,
            project.routing.allow_missing,
        )?;
        missing.extend(system.missing.iter().copied());

        let file = project
            .routing
            .output_dir
            .join(format!("{}_{}.aqu", project.name, substance.name));
        let mut writer = fs::File::create(&file)?;
        write_aqu(&mut writer, &system, project.routing.biodegradation_rate)?;
        outputs.push(file);
    }
    missing.sort();
    missing.dedup();
    info!(files = outputs.len(), "wrote solver system files");
    Ok(RouteReport {
        mode: RoutingMode::ExportModel,
        outputs,
        missing,
    })
}
