//! End-to-end pipeline tests over a toy basin.

use std::fs;
use std::path::{Path, PathBuf};

use cw_app::{AppError, PipelineDriver, PipelineState, StageSelection};
use cw_core::CatchmentId;
use cw_export::read_aqu;
use cw_project::{
    ImportDef, PeriodDef, Project, RoutingDef, RoutingMode, SubstanceDef, TransferDef,
    TransferModelDef,
};
use cw_store::{dataset, CatchmentStore};

/// Toy basin: 1 -> 2 -> 3 (outlet), four hourly steps.
fn write_toy_inputs(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("catchments.csv"),
        "id;next_down_id;area_m2;appl_area_m2;strahler\n\
         1;2;1000000;500000;1\n\
         2;3;2000000;600000;2\n\
         3;;3000000;700000;3\n",
    )
    .unwrap();
    // Temperature arrives coarser and is carried forward.
    fs::write(
        dir.join("temperature.csv"),
        "timestamp;1;2;3\n2010-04-01 00:00:00;10.0;11.0;12.0\n",
    )
    .unwrap();
    fs::write(
        dir.join("precipitation.csv"),
        "timestamp;1;2;3\n\
         2010-04-01 00:00:00;0.0;0.0;0.0\n\
         2010-04-01 01:00:00;2.0;2.0;2.0\n\
         2010-04-01 02:00:00;1.0;1.0;1.0\n\
         2010-04-01 03:00:00;0.0;0.0;0.0\n",
    )
    .unwrap();
    fs::write(
        dir.join("discharge.csv"),
        "timestamp;1;2;3\n\
         2010-04-01 00:00:00;1.0;2.0;3.0\n\
         2010-04-01 01:00:00;1.0;2.0;3.0\n\
         2010-04-01 02:00:00;1.0;2.0;3.0\n\
         2010-04-01 03:00:00;1.0;2.0;3.0\n",
    )
    .unwrap();
}

fn toy_project(dir: &Path, mode: RoutingMode) -> Project {
    let mut parameters = std::collections::BTreeMap::new();
    parameters.insert("application_rate".to_string(), 0.01);
    parameters.insert("washoff_coefficient".to_string(), 0.02);
    Project {
        version: 1,
        name: "toy".to_string(),
        period: PeriodDef {
            start: "2010-04-01 00:00:00".to_string(),
            step_hours: 1,
            steps: 4,
        },
        store_dir: dir.join("store"),
        import: Some(ImportDef {
            catchment_attributes: dir.join("catchments.csv"),
            temperature: dir.join("temperature.csv"),
            precipitation: dir.join("precipitation.csv"),
            discharge: dir.join("discharge.csv"),
            max_strahler: Some(3),
        }),
        substances: vec![SubstanceDef {
            name: "terbuthylazine".to_string(),
            parameters,
        }],
        transfer: TransferDef {
            workers: Some(2),
            model: TransferModelDef::ExportCoefficient,
            continue_on_convergence_failure: false,
        },
        routing: RoutingDef {
            outlets: vec![CatchmentId::new(3)],
            mode,
            allow_missing: false,
            output_dir: dir.join("out"),
            biodegradation_rate: 0.005,
        },
    }
}

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cw_pipeline_test_{tag}"));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn full_pipeline_aggregates_the_toy_basin() {
    let dir = temp_dir("aggregate");
    write_toy_inputs(&dir);
    let project = toy_project(&dir, RoutingMode::Aggregate);

    let mut driver = PipelineDriver::new(project);
    let report = driver.run(StageSelection::Full, None).unwrap();
    assert_eq!(driver.state(), PipelineState::Done);

    let import = report.import.unwrap();
    assert_eq!(import.imported, 3);
    assert_eq!(import.skipped, 0);

    let transfer = report.transfer.unwrap();
    assert_eq!(transfer.substances.len(), 1);
    assert_eq!(transfer.substances[0].completed, 3);
    assert!(transfer.substances[0].failed_computation.is_empty());

    let route = report.route.unwrap();
    assert_eq!(route.outputs.len(), 1);
    assert!(route.outputs[0].ends_with("load_terbuthylazine_outlet_3.csv"));
    let csv = fs::read_to_string(&route.outputs[0]).unwrap();
    assert_eq!(csv.lines().count(), 5); // header + four steps

    // Write-back: the aggregated series equals the sum of the three local
    // loads.
    let store = CatchmentStore::open(&dir.join("store")).unwrap();
    let aggregated = store
        .get_series(
            CatchmentId::new(3),
            &dataset::load_aggregated("terbuthylazine"),
        )
        .unwrap();
    let mut expected = vec![0.0; 4];
    for raw in 1..=3u64 {
        let local = store
            .get_series(CatchmentId::new(raw), &dataset::load("terbuthylazine"))
            .unwrap();
        for (acc, v) in expected.iter_mut().zip(local.values()) {
            *acc += v;
        }
    }
    assert_eq!(aggregated.values(), expected.as_slice());
    // Rain fell, so something washed off.
    assert!(aggregated.values().iter().any(|&v| v > 0.0));
}

#[test]
fn staged_invocations_resume_from_the_store() {
    let dir = temp_dir("staged");
    write_toy_inputs(&dir);

    // import, transfer, route as three separate invocations, the way the
    // stages run operationally.
    let mut driver = PipelineDriver::new(toy_project(&dir, RoutingMode::Aggregate));
    driver.run(StageSelection::ImportOnly, None).unwrap();
    assert_eq!(driver.state(), PipelineState::Done);

    let mut driver = PipelineDriver::new(toy_project(&dir, RoutingMode::Aggregate));
    driver.run(StageSelection::TransferOnly, None).unwrap();
    assert_eq!(driver.state(), PipelineState::Done);

    let mut driver = PipelineDriver::new(toy_project(&dir, RoutingMode::Aggregate));
    let report = driver.run(StageSelection::RouteOnly, None).unwrap();
    assert_eq!(driver.state(), PipelineState::Done);
    assert!(report.import.is_none());
    assert!(report.transfer.is_none());
    assert_eq!(report.route.unwrap().outputs.len(), 1);
}

#[test]
fn routing_without_transfer_results_fails_the_barrier() {
    let dir = temp_dir("barrier");
    write_toy_inputs(&dir);

    let mut driver = PipelineDriver::new(toy_project(&dir, RoutingMode::Aggregate));
    driver.run(StageSelection::ImportOnly, None).unwrap();

    // Transfer never ran; the routing barrier must hold.
    let mut driver = PipelineDriver::new(toy_project(&dir, RoutingMode::Aggregate));
    let err = driver.run(StageSelection::RouteOnly, None).unwrap_err();
    assert!(matches!(err, AppError::StageFailed { stage: "transfer", .. }));
    assert_eq!(driver.state(), PipelineState::Failed);
}

#[test]
fn route_only_without_a_store_fails() {
    let dir = temp_dir("nostore");
    write_toy_inputs(&dir);

    let mut driver = PipelineDriver::new(toy_project(&dir, RoutingMode::Aggregate));
    let err = driver.run(StageSelection::RouteOnly, None).unwrap_err();
    assert!(matches!(err, AppError::Store(_)));
    assert_eq!(driver.state(), PipelineState::Failed);
}

#[test]
fn full_pipeline_exports_a_solver_file() {
    let dir = temp_dir("export");
    write_toy_inputs(&dir);
    let project = toy_project(&dir, RoutingMode::ExportModel);

    let mut driver = PipelineDriver::new(project);
    let report = driver.run(StageSelection::Full, None).unwrap();
    assert_eq!(driver.state(), PipelineState::Done);

    let route = report.route.unwrap();
    assert_eq!(route.outputs.len(), 1);
    assert!(route.outputs[0].ends_with("toy_terbuthylazine.aqu"));

    // The chain 1 -> 2 -> 3 collapses into a single compartment named
    // after its exit.
    let content = fs::read_to_string(&route.outputs[0]).unwrap();
    let parsed = read_aqu(&content).unwrap();
    assert_eq!(parsed.compartments, vec!["C3".to_string()]);
    assert!(parsed.links.is_empty());
    assert!(parsed.series.contains_key("Mlat_C3"));
}

#[test]
fn driver_rejects_running_twice() {
    let dir = temp_dir("twice");
    write_toy_inputs(&dir);

    let mut driver = PipelineDriver::new(toy_project(&dir, RoutingMode::Aggregate));
    driver.run(StageSelection::ImportOnly, None).unwrap();
    let err = driver.run(StageSelection::ImportOnly, None).unwrap_err();
    assert!(matches!(err, AppError::IllegalTransition { .. }));
}
