//! Brace-format system file writer.
//!
//! The record layout follows the solver's file format: nested
//! brace-delimited fields, section tags repeated per record. Output is
//! assembled into one string and written in a single call, and every field
//! derives from the input system, so identical inputs give byte-identical
//! files.

use std::io::Write;

use crate::compartments::{CompartmentSeries, RiverSystem};
use crate::ExportResult;

/// Nominal reach length per member catchment (m). The store carries no
/// river geometry; the solver needs a spatial coordinate per compartment,
/// so reaches get a fixed nominal length.
const REACH_LENGTH_M: f64 = 1000.0;

fn fmt_num(value: f64) -> String {
    format!("{}", value)
}

/// `{f1}{f2}{f3}`
fn record(fields: &[String]) -> String {
    let mut out = String::new();
    for field in fields {
        out.push('{');
        out.push_str(field);
        out.push('}');
    }
    out
}

/// `{TAG}{rec1}{TAG}{rec2}...`
fn tagged(tag: &str, records: &[String]) -> String {
    let mut out = String::new();
    for rec in records {
        out.push('{');
        out.push_str(tag);
        out.push_str("}{");
        out.push_str(rec);
        out.push('}');
    }
    out
}

fn s(text: &str) -> String {
    text.to_string()
}

/// `(t, value)` pairs flattened into one brace list.
fn series_values(axis_step_hours: f64, values: &[f64]) -> String {
    let mut fields = Vec::with_capacity(values.len() * 2);
    for (i, v) in values.iter().enumerate() {
        fields.push(fmt_num(i as f64 * axis_step_hours));
        fields.push(fmt_num(*v));
    }
    record(&fields)
}

fn progvar() -> String {
    let defs: [(&str, &str, &str, &str); 8] = [
        ("A", "Cross sectional area", "m^2", "A"),
        ("P", "Perimeter length", "m", "P"),
        ("Q", "Discharge", "m^3/h", "Q"),
        ("Sf", "Friction slope", "", "SF"),
        ("t", "Time", "h", "T"),
        ("w", "Surface width", "m", "W"),
        ("x", "Space coordinate along the river", "m", "X"),
        ("z0", "Water level elevation", "m", "Z0"),
    ];
    let records: Vec<String> = defs
        .iter()
        .map(|(name, description, unit, kind)| {
            record(&[s("1"), s(name), s(description), s(unit), s(kind)])
        })
        .collect();
    tagged("PROGVAR", &records)
}

fn constvar(system: &RiverSystem, k_bio: f64) -> String {
    let mut records = vec![
        record(&[
            s("1"),
            s("alpha"),
            s("Angle river bed"),
            s("rad"),
            fmt_num(0.0),
            s("1"),
            s("0"),
            fmt_num(std::f64::consts::FRAC_PI_2),
            s("TRUE"),
            s("FALSE"),
        ]),
        const_record("sph", "convert time from 1/s to 1/h", "s/h", 3600.0),
        const_record("hpd", "convert time from d to h", "h/d", 24.0),
        const_record("ugpg", "convert weight from ug to g", "ug/g", 1_000_000.0),
        record(&[
            s("1"),
            s("k_bio"),
            s("rate of biodegradation"),
            s("1/h"),
            fmt_num(k_bio),
            s("0.001"),
            s("0"),
            s("10"),
            s("FALSE"),
            s("FALSE"),
        ]),
    ];
    for compartment in &system.compartments {
        let series = &system.series[&compartment.name];
        let qinit = series.discharge_upstream[0] + series.discharge_lateral[0];
        records.push(record(&[
            s("1"),
            format!("Qinit_{}", compartment.name),
            s("Initial discharge"),
            s("m^3/s"),
            fmt_num(qinit),
            s("1"),
            s("0"),
            s("2500"),
            s("FALSE"),
            s("FALSE"),
        ]));
        records.push(record(&[
            s("1"),
            format!("Lc_{}", compartment.name),
            s("Compartment length"),
            s("m"),
            fmt_num(compartment.members.len() as f64 * REACH_LENGTH_M),
            s("1"),
            s("0"),
            s("10000000"),
            s("FALSE"),
            s("FALSE"),
        ]));
    }
    tagged("CONSTVAR", &records)
}

fn const_record(name: &str, description: &str, unit: &str, value: f64) -> String {
    record(&[
        s("1"),
        s(name),
        s(description),
        s(unit),
        fmt_num(value),
        s("0.001"),
        s("0"),
        s("10000000000"),
        s("FALSE"),
        s("FALSE"),
    ])
}

fn list_record(name: String, description: &str, unit: &str, max: &str, values: String) -> String {
    record(&[
        s("1"),
        name,
        s(description),
        s(unit),
        s("t"),
        s("TRUE"),
        s("0"),
        s("1"),
        s("0"),
        s(max),
        s("LINEAR"),
        s("1"),
        s("FALSE"),
        s("FALSE"),
        values,
    ])
}

fn reallistvar(system: &RiverSystem) -> String {
    let step_hours = system.axis.step_seconds() as f64 / 3600.0;
    let mut records = Vec::new();
    for compartment in &system.compartments {
        let series: &CompartmentSeries = &system.series[&compartment.name];
        records.push(list_record(
            format!("Qin_{}", compartment.name),
            "Upstream input discharge",
            "m^3/s",
            "10000",
            series_values(step_hours, &series.discharge_upstream),
        ));
        records.push(list_record(
            format!("Qlat_{}", compartment.name),
            "Lateral input discharge",
            "m^3/s",
            "10000",
            series_values(step_hours, &series.discharge_lateral),
        ));
        records.push(list_record(
            format!("Min_{}", compartment.name),
            "Upstream input load",
            "g/h",
            "10000",
            series_values(step_hours, &series.load_upstream),
        ));
        records.push(list_record(
            format!("Mlat_{}", compartment.name),
            "Lateral input load",
            "g/h",
            "10000",
            series_values(step_hours, &series.load_lateral),
        ));
    }
    tagged("REALLISTVAR", &records)
}

fn formvar() -> String {
    let records = vec![
        record(&[s("1"), s("d"), s("Mean river depth"), s("m"), s("A/w")]),
        record(&[s("1"), s("v"), s("Velocity"), s("m/h"), s("Q/A")]),
        record(&[
            s("1"),
            s("Qplot"),
            s("Discharge for plotting"),
            s("m^3/s"),
            s("Q/sph"),
        ]),
    ];
    tagged("FORMVAR", &records)
}

fn procsys() -> String {
    let biodegradation = record(&[
        s("1"),
        s("biodegradation"),
        s("degradation process in water"),
        s("k_bio*C"),
        record(&[s("C"), s("-1")]),
    ]);
    tagged("DYNPROC", &[biodegradation])
}

fn compsys(system: &RiverSystem) -> String {
    let has_outgoing: std::collections::HashSet<&str> =
        system.links.iter().map(|l| l.from.as_str()).collect();

    let mut records = Vec::new();
    let mut start_coord = 0.0;
    for compartment in &system.compartments {
        let name = &compartment.name;
        let length = compartment.members.len() as f64 * REACH_LENGTH_M;
        let is_terminal = !has_outgoing.contains(name.as_str());
        let (end_level_given, end_level, method) = if is_terminal {
            (s("4"), s("GIVEN"), s("DIFF"))
        } else {
            (s(""), s("NORMAL"), s("KIN"))
        };
        records.push(record(&[
            s("6"),
            s(name),
            format!("River reach {name}"),
            s("0"),
            record(&[s("C")]),
            record(&[s("biodegradation")]),
            s("TRUE"),
            format!("Qin_{name}*sph"),
            record(&[s("C"), format!("Min_{name}*ugpg")]),
            record(&[s("0"), s("Q"), format!("Qinit_{name}*sph")]),
            format!("Qlat_{name}/Lc_{name}*sph"),
            record(&[s("C"), format!("(Mlat_{name}*ugpg)/(Qlat_{name}*sph)")]),
            s("8"),
            s("FALSE"),
            s("0.001"),
            s("0.001"),
            s("0.001"),
            s("0.001"),
            s("0"),
            s("1e-6"),
            s("1e-6"),
            s("1e-6"),
            fmt_num(start_coord),
            fmt_num(start_coord + length),
            s("127000000"),
            s("FALSE"),
            s(""),
            s("FALSE"),
            s(""),
            end_level_given,
            end_level,
            method,
        ]));
        start_coord += length;
    }
    tagged("RIVCOMP", &records)
}

fn linksys(system: &RiverSystem) -> String {
    let records: Vec<String> = system
        .links
        .iter()
        .map(|link| {
            record(&[
                s("2"),
                s(&link.name),
                s(""),
                s("0"),
                s(&link.from),
                s("0"),
                s(&link.to),
                s("0"),
                s(""),
            ])
        })
        .collect();
    tagged("ADVLINK", &records)
}

fn calcsys(system: &RiverSystem) -> String {
    // A short inactive shakedown calculation plus the full-length active
    // one.
    let configs = [(10usize, "FALSE"), (system.axis.steps(), "TRUE")];
    let records: Vec<String> = configs
        .iter()
        .map(|(steps, active)| {
            record(&[
                s("2"),
                format!("calc{steps}"),
                s(""),
                s("0"),
                s("0"),
                s("FALSE"),
                record(&[s("1"), steps.to_string()]),
                s(active),
                s("FALSE"),
            ])
        })
        .collect();
    tagged("CALC", &records)
}

/// Write the complete system file.
pub fn write_aqu<W: Write>(writer: &mut W, system: &RiverSystem, k_bio: f64) -> ExportResult<()> {
    let mut out = String::new();
    out.push_str("\nAQUASIM\nVersion 2.0 (win/mfc)\n\n{AQUASYS}{");
    out.push_str("{OPTIONS}{{3}{SECANT}{100}{FALSE}}");

    out.push_str("{VARSYS}{");
    out.push_str(&progvar());
    out.push_str(&constvar(system, k_bio));
    out.push_str(&reallistvar(system));
    out.push_str(&formvar());
    out.push('}');

    out.push_str("{PROCSYS}{");
    out.push_str(&procsys());
    out.push('}');

    out.push_str("{COMPSYS}{");
    out.push_str(&compsys(system));
    out.push('}');

    out.push_str("{LINKSYS}{");
    out.push_str(&linksys(system));
    out.push('}');

    out.push_str("{CALCSYS}{");
    out.push_str(&calcsys(system));
    out.push('}');

    out.push_str(
        "{FITSYS}{}{NUMPAR}{{2}{1}{1000}{0}{TRUE}{5}{1000}{0.005}}\
         {PLOTSYS}{{PLOTLISOPT}{{1}{4}{TAB}}\
         {PLOTFILOPT}{{2}{A4}{TRUE}{1}{1}{1}{1}{2.5}{2}{4}{10}{8}{8}{8}{TRUE}{TRUE}{FALSE}}\
         {PLOTSCROPT}{{1}{600}{400}{25}{25}{25}{25}{50}{20}{14}{10}{12}}}\
         {STATESYS}{}}",
    );

    writer.write_all(out.as_bytes())?;
    Ok(())
}
