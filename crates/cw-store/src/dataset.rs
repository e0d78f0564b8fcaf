//! Stable dataset names.
//!
//! Dataset names are part of the on-disk format contract; every consumer
//! goes through these constructors so a store written by one stage is
//! readable by the next, and by later runs.

/// Air temperature driver (deg C).
pub const TEMPERATURE: &str = "temperature";
/// Precipitation driver (mm/h).
pub const PRECIPITATION: &str = "precipitation";
/// Local discharge driver (m^3/s).
pub const DISCHARGE: &str = "discharge";

/// Transfer-model load output for a substance (g/h).
pub fn load(substance: &str) -> String {
    format!("load_{substance}")
}

/// Transfer-model concentration output for a substance (ug/m^3).
pub fn concentration(substance: &str) -> String {
    format!("concentration_{substance}")
}

/// Router write-back at an outlet: summed upstream load (g/h).
pub fn load_aggregated(substance: &str) -> String {
    format!("load_aggregated_{substance}")
}

/// Dataset names must stay safe as file stems.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
