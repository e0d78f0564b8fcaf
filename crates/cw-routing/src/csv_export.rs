//! Tabular export of aggregated series.

use std::io::Write;

use cw_core::series::TIMESTAMP_FORMAT;
use cw_core::TimeSeries;

use crate::RoutingResult;

/// Write one series as `timestamp;value` rows, semicolon-separated like
/// the driver tables the basin data arrives in.
pub fn write_series_csv<W: Write>(
    writer: W,
    value_column: &str,
    series: &TimeSeries,
) -> RoutingResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(writer);
    csv_writer.write_record(["timestamp", value_column])?;
    for (timestamp, value) in series.iter() {
        csv_writer.write_record([
            timestamp.format(TIMESTAMP_FORMAT).to_string(),
            value.to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}
