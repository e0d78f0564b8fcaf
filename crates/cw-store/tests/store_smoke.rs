use chrono::NaiveDateTime;
use cw_core::series::TIMESTAMP_FORMAT;
use cw_core::{CatchmentId, TimeAxis, TimeSeries};
use cw_store::{dataset, CatchmentStore, ParameterSet, StoreError};

fn axis() -> TimeAxis {
    let start = NaiveDateTime::parse_from_str("2010-01-01 00:00:00", TIMESTAMP_FORMAT).unwrap();
    TimeAxis::hourly(start, 24).unwrap()
}

#[test]
fn create_write_reopen_read() {
    let dir = std::env::temp_dir().join("cw_store_test_roundtrip");
    let _ = std::fs::remove_dir_all(&dir);

    let store = CatchmentStore::create(&dir, "toy", axis()).unwrap();
    let id = CatchmentId::new(9_112_113);

    let discharge = TimeSeries::constant(axis(), 3.2).unwrap();
    store.put_series(id, dataset::DISCHARGE, &discharge).unwrap();

    let mut params = ParameterSet::new();
    params.insert("A_tot", 1.5e7, "m**2");
    params.insert("A_appl", 2.0e6, "m**2");
    store.put_parameters(id, &params).unwrap();

    // A separate stage re-opens the same directory.
    let reopened = CatchmentStore::open(&dir).unwrap();
    assert_eq!(reopened.store_id(), store.store_id());
    assert_eq!(reopened.axis(), &axis());

    let read = reopened.get_series(id, dataset::DISCHARGE).unwrap();
    assert_eq!(read.values(), discharge.values());
    assert_eq!(read.axis(), &axis());

    let read_params = reopened.get_parameters(id).unwrap();
    assert_eq!(read_params.value("A_tot"), Some(1.5e7));

    assert_eq!(reopened.list_catchments().unwrap(), vec![id]);
}

#[test]
fn missing_dataset_is_not_found() {
    let dir = std::env::temp_dir().join("cw_store_test_notfound");
    let _ = std::fs::remove_dir_all(&dir);

    let store = CatchmentStore::create(&dir, "toy", axis()).unwrap();
    let id = CatchmentId::new(42);
    store
        .put_series(id, dataset::DISCHARGE, &TimeSeries::zeros(axis()))
        .unwrap();

    let err = store.get_series(id, &dataset::load("terbuthylazine")).unwrap_err();
    match err {
        StoreError::NotFound { id: got, dataset } => {
            assert_eq!(got, id);
            assert_eq!(dataset, "load_terbuthylazine");
        }
        other => panic!("expected NotFound, got {other}"),
    }

    let err = store.get_series(CatchmentId::new(7), dataset::DISCHARGE).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn create_refuses_existing_store() {
    let dir = std::env::temp_dir().join("cw_store_test_exists");
    let _ = std::fs::remove_dir_all(&dir);

    let _store = CatchmentStore::create(&dir, "toy", axis()).unwrap();
    let err = CatchmentStore::create(&dir, "toy", axis()).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }));

    // open_or_create resumes instead.
    let resumed = CatchmentStore::open_or_create(&dir, "toy", axis()).unwrap();
    assert_eq!(resumed.axis(), &axis());
}

#[test]
fn open_without_manifest_fails() {
    let dir = std::env::temp_dir().join("cw_store_test_nomanifest");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let err = CatchmentStore::open(&dir).unwrap_err();
    assert!(matches!(err, StoreError::MissingManifest { .. }));
}

#[test]
fn list_catchments_is_sorted() {
    let dir = std::env::temp_dir().join("cw_store_test_sorted");
    let _ = std::fs::remove_dir_all(&dir);

    let store = CatchmentStore::create(&dir, "toy", axis()).unwrap();
    for raw in [30_u64, 10, 20] {
        store
            .put_series(
                CatchmentId::new(raw),
                dataset::DISCHARGE,
                &TimeSeries::zeros(axis()),
            )
            .unwrap();
    }

    let ids: Vec<u64> = store
        .list_catchments()
        .unwrap()
        .into_iter()
        .map(|id| id.get())
        .collect();
    assert_eq!(ids, vec![10, 20, 30]);
}
