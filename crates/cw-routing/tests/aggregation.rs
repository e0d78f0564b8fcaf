//! Integration tests: aggregation properties over a small basin.

use chrono::NaiveDateTime;
use cw_core::series::TIMESTAMP_FORMAT;
use cw_core::{CatchmentId, TimeAxis, TimeSeries};
use cw_network::{DrainageTree, UpstreamSets};
use cw_routing::{Aggregator, MissingPolicy};
use cw_store::{dataset, CatchmentStore};

fn axis() -> TimeAxis {
    let start = NaiveDateTime::parse_from_str("2010-01-01 00:00:00", TIMESTAMP_FORMAT).unwrap();
    TimeAxis::hourly(start, 24).unwrap()
}

fn id(raw: u64) -> CatchmentId {
    CatchmentId::new(raw)
}

/// Two sub-basins joining at 50, which drains to the basin outlet 60:
///
///   10 -> 30 ---\
///   20 -> 30     50 -> 60
///   40 ---------/
fn basin() -> DrainageTree {
    DrainageTree::build(&[
        (id(10), Some(id(30))),
        (id(20), Some(id(30))),
        (id(30), Some(id(50))),
        (id(40), Some(id(50))),
        (id(50), Some(id(60))),
        (id(60), None),
    ])
    .unwrap()
}

fn store_with_varied_loads(tag: &str) -> CatchmentStore {
    let dir = std::env::temp_dir().join(format!("cw_routing_test_{tag}"));
    let _ = std::fs::remove_dir_all(&dir);
    let store = CatchmentStore::create(&dir, tag, axis()).unwrap();
    for (raw, scale) in [(10, 0.3), (20, 0.7), (30, 1.1), (40, 0.2), (50, 0.9), (60, 0.05)] {
        let values: Vec<f64> = (0..24).map(|i| scale * (1.0 + (i % 5) as f64)).collect();
        store
            .put_series(
                id(raw),
                &dataset::load("s"),
                &TimeSeries::new(axis(), values).unwrap(),
            )
            .unwrap();
    }
    store
}

#[test]
fn partition_additivity() {
    // The closures of 30 and 40 partition the upstream of 50 minus 50
    // itself; together with 50's and 60's own loads they must reproduce
    // the basin-wide aggregate at 60, timestep by timestep.
    let store = store_with_varied_loads("additivity");
    let tree = basin();
    let sets = UpstreamSets::precompute(&tree, &[id(30), id(40), id(50), id(60)]).unwrap();
    let aggregator = Aggregator::new(&store, &sets, MissingPolicy::Fail);

    let at_30 = aggregator.aggregate(id(30), "s").unwrap();
    let at_40 = aggregator.aggregate(id(40), "s").unwrap();
    let at_60 = aggregator.aggregate(id(60), "s").unwrap();

    let own_50 = store.get_series(id(50), &dataset::load("s")).unwrap();
    let own_60 = store.get_series(id(60), &dataset::load("s")).unwrap();

    for step in 0..axis().steps() {
        let partitioned = at_30.load.values()[step]
            + at_40.load.values()[step]
            + own_50.values()[step]
            + own_60.values()[step];
        let whole = at_60.load.values()[step];
        assert!(
            (partitioned - whole).abs() <= 1e-9 * whole.abs().max(1.0),
            "step {step}: {partitioned} != {whole}"
        );
    }
}

#[test]
fn summation_order_tolerance() {
    // Summing in an arbitrary different order stays within floating-point
    // summation tolerance of the aggregator's fixed ascending order.
    let store = store_with_varied_loads("order");
    let tree = basin();
    let sets = UpstreamSets::precompute(&tree, &[id(60)]).unwrap();
    let aggregator = Aggregator::new(&store, &sets, MissingPolicy::Fail);

    let result = aggregator.aggregate(id(60), "s").unwrap();

    let mut members: Vec<CatchmentId> = sets.get(id(60)).unwrap().iter().copied().collect();
    members.reverse();
    let mut manual = vec![0.0f64; axis().steps()];
    for member in members {
        let series = store.get_series(member, &dataset::load("s")).unwrap();
        for (acc, v) in manual.iter_mut().zip(series.values()) {
            *acc += v;
        }
    }

    for (a, b) in result.load.values().iter().zip(&manual) {
        assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
    }
}

#[test]
fn repeated_aggregation_is_bit_identical() {
    let store = store_with_varied_loads("repeat");
    let tree = basin();
    let sets = UpstreamSets::precompute(&tree, &[id(60)]).unwrap();
    let aggregator = Aggregator::new(&store, &sets, MissingPolicy::Fail);

    let a = aggregator.aggregate(id(60), "s").unwrap();
    let b = aggregator.aggregate(id(60), "s").unwrap();
    assert_eq!(a.load, b.load);
}

#[test]
fn aggregate_all_covers_every_outlet() {
    let store = store_with_varied_loads("all");
    let tree = basin();
    let sets = UpstreamSets::precompute(&tree, &[id(30), id(60)]).unwrap();
    let aggregator = Aggregator::new(&store, &sets, MissingPolicy::Fail);

    let results = aggregator.aggregate_all("s").unwrap();
    assert_eq!(results.len(), 2);
    let outlets: Vec<u64> = results.iter().map(|r| r.outlet.get()).collect();
    assert_eq!(outlets, vec![30, 60]);
}
