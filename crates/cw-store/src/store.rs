//! Store access API.

use std::fs;
use std::path::{Path, PathBuf};

use cw_core::{CatchmentId, TimeAxis, TimeSeries};
use tracing::debug;

use crate::dataset;
use crate::types::{ParameterSet, StoreManifest, FORMAT_VERSION};
use crate::{compute_store_id, StoreError, StoreResult};

const MANIFEST_FILE: &str = "store.json";
const PARAMETERS_FILE: &str = "parameters";
const CATCH_PREFIX: &str = "catch_";

/// Handle on a catchment store directory.
///
/// Writes are durable as soon as the call returns: every record goes to a
/// temporary file in the destination directory and is renamed into place,
/// so a key is either absent or completely written, never half-written.
/// Concurrent readers are safe alongside one writer stage; concurrent
/// writers to disjoint `(id, dataset)` keys touch disjoint files and are
/// safe. Overlapping keys are last-write-wins.
#[derive(Debug, Clone)]
pub struct CatchmentStore {
    root: PathBuf,
    manifest: StoreManifest,
}

impl CatchmentStore {
    /// Create a fresh store for the given run period.
    pub fn create(root: &Path, name: &str, axis: TimeAxis) -> StoreResult<Self> {
        let manifest_path = root.join(MANIFEST_FILE);
        if manifest_path.exists() {
            return Err(StoreError::AlreadyExists {
                path: root.to_path_buf(),
            });
        }
        fs::create_dir_all(root)?;

        let manifest = StoreManifest {
            format_version: FORMAT_VERSION,
            store_id: compute_store_id(name, &axis),
            created: chrono::Utc::now().to_rfc3339(),
            axis,
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        write_atomic(&manifest_path, json.as_bytes())?;
        debug!(root = %root.display(), store_id = %manifest.store_id, "created store");

        Ok(Self {
            root: root.to_path_buf(),
            manifest,
        })
    }

    /// Open an existing store, resuming from a prior run.
    pub fn open(root: &Path) -> StoreResult<Self> {
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(StoreError::MissingManifest {
                path: manifest_path,
            });
        }
        let content = fs::read_to_string(&manifest_path)?;
        let manifest: StoreManifest = serde_json::from_str(&content)?;
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
        })
    }

    /// Open the store if it exists, otherwise create it.
    pub fn open_or_create(root: &Path, name: &str, axis: TimeAxis) -> StoreResult<Self> {
        if root.join(MANIFEST_FILE).exists() {
            Self::open(root)
        } else {
            Self::create(root, name, axis)
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn axis(&self) -> &TimeAxis {
        &self.manifest.axis
    }

    pub fn store_id(&self) -> &str {
        &self.manifest.store_id
    }

    fn catch_dir(&self, id: CatchmentId) -> PathBuf {
        self.root.join(format!("{CATCH_PREFIX}{id}"))
    }

    fn dataset_path(&self, id: CatchmentId, name: &str) -> PathBuf {
        self.catch_dir(id).join(format!("{name}.json"))
    }

    /// Store a series under `(id, dataset)`.
    ///
    /// The series' axis must equal the store's run period; a mismatch is a
    /// `Schema` error, never coerced. Re-putting an existing key replaces
    /// it (last-write-wins).
    pub fn put_series(
        &self,
        id: CatchmentId,
        name: &str,
        series: &TimeSeries,
    ) -> StoreResult<()> {
        if !dataset::is_valid_name(name) || name == PARAMETERS_FILE {
            return Err(StoreError::InvalidDataset {
                name: name.to_string(),
            });
        }
        if series.axis() != self.axis() {
            return Err(StoreError::Schema {
                id,
                dataset: name.to_string(),
                what: format!(
                    "series axis ({} steps of {}s from {}) differs from the store run period \
                     ({} steps of {}s from {})",
                    series.axis().steps(),
                    series.axis().step_seconds(),
                    series.axis().start(),
                    self.axis().steps(),
                    self.axis().step_seconds(),
                    self.axis().start(),
                ),
            });
        }

        fs::create_dir_all(self.catch_dir(id))?;
        let json = serde_json::to_string(series)?;
        write_atomic(&self.dataset_path(id, name), json.as_bytes())
    }

    pub fn get_series(&self, id: CatchmentId, name: &str) -> StoreResult<TimeSeries> {
        let path = self.dataset_path(id, name);
        if !path.exists() {
            return Err(StoreError::NotFound {
                id,
                dataset: name.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn contains(&self, id: CatchmentId, name: &str) -> bool {
        self.dataset_path(id, name).exists()
    }

    pub fn put_parameters(&self, id: CatchmentId, params: &ParameterSet) -> StoreResult<()> {
        fs::create_dir_all(self.catch_dir(id))?;
        let json = serde_json::to_string_pretty(params)?;
        write_atomic(&self.dataset_path(id, PARAMETERS_FILE), json.as_bytes())
    }

    pub fn get_parameters(&self, id: CatchmentId) -> StoreResult<ParameterSet> {
        let path = self.dataset_path(id, PARAMETERS_FILE);
        if !path.exists() {
            return Err(StoreError::ParametersNotFound { id });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// All catchment ids present in the store, ascending.
    pub fn list_catchments(&self) -> StoreResult<Vec<CatchmentId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(raw) = name.strip_prefix(CATCH_PREFIX) {
                if let Ok(id) = raw.parse::<CatchmentId>() {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Write via a sibling temp file plus rename so readers never observe a
/// partial record.
fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
