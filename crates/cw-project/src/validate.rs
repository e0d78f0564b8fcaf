//! Project validation logic.

use std::collections::HashSet;

use crate::schema::Project;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Empty list: {what}")]
    Empty { what: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    if project.period.steps == 0 {
        return Err(ValidationError::InvalidValue {
            field: "period.steps".to_string(),
            value: "0".to_string(),
            reason: "the run period must have at least one step".to_string(),
        });
    }
    if project.period.step_hours == 0 {
        return Err(ValidationError::InvalidValue {
            field: "period.step_hours".to_string(),
            value: "0".to_string(),
            reason: "the time step must be positive".to_string(),
        });
    }

    if project.substances.is_empty() {
        return Err(ValidationError::Empty {
            what: "substances".to_string(),
        });
    }
    let mut substance_names = HashSet::new();
    for substance in &project.substances {
        if !substance_names.insert(&substance.name) {
            return Err(ValidationError::DuplicateId {
                id: substance.name.clone(),
                context: "substances".to_string(),
            });
        }
    }

    if project.routing.outlets.is_empty() {
        return Err(ValidationError::Empty {
            what: "routing.outlets".to_string(),
        });
    }
    let mut outlet_ids = HashSet::new();
    for outlet in &project.routing.outlets {
        if !outlet_ids.insert(outlet) {
            return Err(ValidationError::DuplicateId {
                id: outlet.to_string(),
                context: "routing.outlets".to_string(),
            });
        }
    }
    if project.routing.biodegradation_rate < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "routing.biodegradation_rate".to_string(),
            value: project.routing.biodegradation_rate.to_string(),
            reason: "a decay rate cannot be negative".to_string(),
        });
    }

    if project.transfer.workers == Some(0) {
        return Err(ValidationError::InvalidValue {
            field: "transfer.workers".to_string(),
            value: "0".to_string(),
            reason: "the worker pool needs at least one worker".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use std::path::PathBuf;

    fn minimal_project() -> Project {
        Project {
            version: 1,
            name: "rhine".to_string(),
            period: PeriodDef {
                start: "2010-01-01 00:00:00".to_string(),
                step_hours: 1,
                steps: 24,
            },
            store_dir: PathBuf::from("store"),
            import: None,
            substances: vec![SubstanceDef {
                name: "terbuthylazine".to_string(),
                parameters: Default::default(),
            }],
            transfer: TransferDef::default(),
            routing: RoutingDef {
                outlets: vec![cw_core::CatchmentId::new(1)],
                mode: RoutingMode::Aggregate,
                allow_missing: false,
                output_dir: PathBuf::from("out"),
                biodegradation_rate: 0.005,
            },
        }
    }

    #[test]
    fn minimal_project_is_valid() {
        validate_project(&minimal_project()).unwrap();
    }

    #[test]
    fn rejects_future_version() {
        let mut project = minimal_project();
        project.version = crate::migrate::LATEST_VERSION + 1;
        assert!(matches!(
            validate_project(&project),
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_substance() {
        let mut project = minimal_project();
        project.substances.push(project.substances[0].clone());
        assert!(matches!(
            validate_project(&project),
            Err(ValidationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn rejects_empty_outlets() {
        let mut project = minimal_project();
        project.routing.outlets.clear();
        assert!(matches!(
            validate_project(&project),
            Err(ValidationError::Empty { .. })
        ));
    }

    #[test]
    fn rejects_zero_workers() {
        let mut project = minimal_project();
        project.transfer.workers = Some(0);
        assert!(validate_project(&project).is_err());
    }

    #[test]
    fn period_axis_parses() {
        let project = minimal_project();
        let axis = project.period.axis().unwrap();
        assert_eq!(axis.steps(), 24);
        assert_eq!(axis.step_seconds(), 3600);
    }
}
