//! Schema migration framework.

use crate::schema::Project;
use crate::ProjectError;

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut project: Project) -> Result<Project, ProjectError> {
    while project.version < LATEST_VERSION {
        project = migrate_one_version(project)?;
    }
    Ok(project)
}

fn migrate_one_version(project: Project) -> Result<Project, ProjectError> {
    match project.version {
        0 => migrate_v0_to_v1(project),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// Version 0 files predate the versioned schema; the layout is otherwise
/// identical.
fn migrate_v0_to_v1(mut project: Project) -> Result<Project, ProjectError> {
    project.version = 1;
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use std::path::PathBuf;

    #[test]
    fn v0_migrates_to_latest() {
        let project = Project {
            version: 0,
            name: "toy".to_string(),
            period: PeriodDef {
                start: "2010-01-01 00:00:00".to_string(),
                step_hours: 1,
                steps: 1,
            },
            store_dir: PathBuf::from("store"),
            import: None,
            substances: vec![],
            transfer: TransferDef::default(),
            routing: RoutingDef {
                outlets: vec![],
                mode: RoutingMode::Aggregate,
                allow_missing: false,
                output_dir: PathBuf::from("out"),
                biodegradation_rate: 0.0,
            },
        };
        let migrated = migrate_to_latest(project).unwrap();
        assert_eq!(migrated.version, LATEST_VERSION);
    }
}
