//! Content-based store identity.

use cw_core::TimeAxis;
use sha2::{Digest, Sha256};

/// Identity of a store: run name plus the run period. Two stores with the
/// same id are interchangeable for resume purposes.
pub fn compute_store_id(name: &str, axis: &TimeAxis) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let axis_json = serde_json::to_string(axis).unwrap_or_default();
    hasher.update(axis_json.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use cw_core::series::TIMESTAMP_FORMAT;

    fn axis(steps: usize) -> TimeAxis {
        let start =
            NaiveDateTime::parse_from_str("2010-01-01 00:00:00", TIMESTAMP_FORMAT).unwrap();
        TimeAxis::hourly(start, steps).unwrap()
    }

    #[test]
    fn hash_stability() {
        assert_eq!(
            compute_store_id("rhine", &axis(24)),
            compute_store_id("rhine", &axis(24))
        );
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        assert_ne!(
            compute_store_id("rhine", &axis(24)),
            compute_store_id("rhine", &axis(25))
        );
        assert_ne!(
            compute_store_id("rhine", &axis(24)),
            compute_store_id("mosel", &axis(24))
        );
    }
}
