//! Store population from the collaborator-owned input tables.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDateTime;
use cw_core::series::TIMESTAMP_FORMAT;
use cw_core::{CatchmentId, TimeAxis, TimeSeries};
use cw_project::{ImportDef, Project};
use cw_store::{dataset, CatchmentStore, ParameterSet};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// One row of the catchment attribute table.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentRecord {
    pub id: CatchmentId,
    pub next_down: Option<CatchmentId>,
    pub area_m2: f64,
    pub appl_area_m2: f64,
    pub strahler: u32,
}

#[derive(Debug, Deserialize)]
struct RawAttributeRow {
    id: u64,
    next_down_id: Option<u64>,
    area_m2: f64,
    appl_area_m2: f64,
    strahler: u32,
}

/// Read the attribute table (semicolon-separated; empty `next_down_id`
/// marks a basin outlet).
pub fn read_attributes(path: &Path) -> AppResult<Vec<CatchmentRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .map_err(|e| AppError::Import {
            what: format!("cannot open attribute table {}: {e}", path.display()),
        })?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let raw: RawAttributeRow = row?;
        records.push(CatchmentRecord {
            id: CatchmentId::new(raw.id),
            next_down: raw.next_down_id.map(CatchmentId::new),
            area_m2: raw.area_m2,
            appl_area_m2: raw.appl_area_m2,
            strahler: raw.strahler,
        });
    }
    records.sort_by_key(|r| r.id);
    Ok(records)
}

/// The drainage edges implied by the attribute table.
pub fn edges(records: &[CatchmentRecord]) -> Vec<(CatchmentId, Option<CatchmentId>)> {
    records.iter().map(|r| (r.id, r.next_down)).collect()
}

/// One driver table: timestamped rows, one value column per catchment.
struct DriverTable {
    timestamps: Vec<NaiveDateTime>,
    columns: BTreeMap<CatchmentId, Vec<f64>>,
}

fn read_driver_table(path: &Path) -> AppResult<DriverTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .map_err(|e| AppError::Import {
            what: format!("cannot open driver table {}: {e}", path.display()),
        })?;

    let headers = reader.headers()?.clone();
    let mut ids = Vec::with_capacity(headers.len().saturating_sub(1));
    for field in headers.iter().skip(1) {
        let id = field
            .trim()
            .trim_matches('"')
            .parse::<CatchmentId>()
            .map_err(|_| AppError::Import {
                what: format!("bad catchment id '{field}' in {}", path.display()),
            })?;
        ids.push(id);
    }

    let mut timestamps = Vec::new();
    let mut columns: BTreeMap<CatchmentId, Vec<f64>> =
        ids.iter().map(|&id| (id, Vec::new())).collect();
    for row in reader.records() {
        let row = row?;
        let stamp_field = row.get(0).unwrap_or_default().trim().trim_matches('"');
        let stamp = NaiveDateTime::parse_from_str(stamp_field, TIMESTAMP_FORMAT).map_err(
            |e| AppError::Import {
                what: format!("bad timestamp '{stamp_field}' in {}: {e}", path.display()),
            },
        )?;
        if let Some(&last) = timestamps.last() {
            if stamp <= last {
                return Err(AppError::Import {
                    what: format!(
                        "timestamps not strictly increasing at '{stamp_field}' in {}",
                        path.display()
                    ),
                });
            }
        }
        timestamps.push(stamp);
        for (position, &id) in ids.iter().enumerate() {
            let field = row.get(position + 1).unwrap_or_default().trim();
            let value = field.parse::<f64>().map_err(|_| AppError::Import {
                what: format!("bad value '{field}' in {}", path.display()),
            })?;
            columns.get_mut(&id).expect("column exists for header id").push(value);
        }
    }
    Ok(DriverTable {
        timestamps,
        columns,
    })
}

/// Put a driver column onto the run axis.
///
/// With `forward_fill`, coarser tables are carried forward onto the axis
/// (the temperature table arrives daily); otherwise the table must supply
/// exactly the axis timestamps. This is the only place any resampling
/// happens; the store itself never resamples.
fn resample(
    table: &DriverTable,
    id: CatchmentId,
    axis: &TimeAxis,
    forward_fill: bool,
    table_name: &str,
) -> AppResult<Vec<f64>> {
    let column = table.columns.get(&id).ok_or_else(|| AppError::Import {
        what: format!("{table_name} table has no column for catchment {id}"),
    })?;

    if !forward_fill {
        if table.timestamps.len() != axis.steps() {
            return Err(AppError::Import {
                what: format!(
                    "{table_name} table has {} rows, the run period has {} steps",
                    table.timestamps.len(),
                    axis.steps()
                ),
            });
        }
        for (step, &stamp) in table.timestamps.iter().enumerate() {
            if axis.timestamp(step) != Some(stamp) {
                return Err(AppError::Import {
                    what: format!(
                        "{table_name} table is off the run period at row {step} ({stamp})"
                    ),
                });
            }
        }
        return Ok(column.clone());
    }

    let first = *table.timestamps.first().ok_or_else(|| AppError::Import {
        what: format!("{table_name} table is empty"),
    })?;
    if first > axis.start() {
        return Err(AppError::Import {
            what: format!("{table_name} table starts after the run period ({first})"),
        });
    }

    let mut values = Vec::with_capacity(axis.steps());
    let mut row = 0usize;
    for stamp in axis.timestamps() {
        while row + 1 < table.timestamps.len() && table.timestamps[row + 1] <= stamp {
            row += 1;
        }
        values.push(column[row]);
    }
    Ok(values)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Catchments with parameters and drivers in the store.
    pub imported: usize,
    /// Catchments excluded by the Strahler filter (they stay in the
    /// topology, the routing stages still see them).
    pub skipped: usize,
    pub steps: usize,
}

/// Populate the store: parameters plus the three normalized driver series
/// per retained catchment.
pub fn run(
    project: &Project,
    cancel: &AtomicBool,
) -> AppResult<(CatchmentStore, ImportReport)> {
    let import: &ImportDef = project.import.as_ref().ok_or_else(|| AppError::Import {
        what: "project has no import section".to_string(),
    })?;
    let axis = project.period.axis()?;
    let store = CatchmentStore::open_or_create(&project.store_dir, &project.name, axis)?;
    if store.axis() != &axis {
        return Err(AppError::Import {
            what: "existing store was created for a different run period".to_string(),
        });
    }

    let records = read_attributes(&import.catchment_attributes)?;
    info!(catchments = records.len(), "read attribute table");

    let temperature = read_driver_table(&import.temperature)?;
    let precipitation = read_driver_table(&import.precipitation)?;
    let discharge = read_driver_table(&import.discharge)?;

    let mut imported = 0usize;
    let mut skipped = 0usize;
    for record in &records {
        if cancel.load(Ordering::Relaxed) {
            info!(imported, "import cancelled");
            break;
        }
        if let Some(max) = import.max_strahler {
            if record.strahler > max {
                skipped += 1;
                continue;
            }
        }

        let mut params = ParameterSet::new();
        params.insert("A_tot", record.area_m2, "m**2");
        params.insert("A_appl", record.appl_area_m2, "m**2");
        params.insert("strahler", record.strahler as f64, "");
        store.put_parameters(record.id, &params)?;

        let t = resample(&temperature, record.id, &axis, true, "temperature")?;
        let p = resample(&precipitation, record.id, &axis, false, "precipitation")?;
        let q = resample(&discharge, record.id, &axis, false, "discharge")?;
        store.put_series(
            record.id,
            dataset::TEMPERATURE,
            &series(&axis, t, "temperature")?,
        )?;
        store.put_series(
            record.id,
            dataset::PRECIPITATION,
            &series(&axis, p, "precipitation")?,
        )?;
        store.put_series(record.id, dataset::DISCHARGE, &series(&axis, q, "discharge")?)?;

        imported += 1;
        debug!(catchment = %record.id, "imported");
    }

    let report = ImportReport {
        imported,
        skipped,
        steps: axis.steps(),
    };
    info!(?report, "import finished");
    Ok((store, report))
}

fn series(axis: &TimeAxis, values: Vec<f64>, what: &str) -> AppResult<TimeSeries> {
    TimeSeries::new(*axis, values).map_err(|e| AppError::Import {
        what: format!("{what} series rejected: {e}"),
    })
}

/// Re-open the store a prior invocation populated and check it matches
/// the project's run period.
pub fn verify_store(project: &Project) -> AppResult<CatchmentStore> {
    let axis = project.period.axis()?;
    let store = CatchmentStore::open(&project.store_dir)?;
    if store.axis() != &axis {
        return Err(AppError::Import {
            what: "store on disk was created for a different run period".to_string(),
        });
    }
    Ok(store)
}
