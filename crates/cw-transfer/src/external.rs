//! External transfer-model executable.
//!
//! Speaks the model program's file protocol: a per-invocation scratch
//! directory with a rendered layout file and a tab-separated driver table,
//! one child-process run per catchment, and a tab-separated output table
//! read back in. The program is treated as a black box; only the file
//! contract is owned here.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use cw_core::CatchmentId;
use tracing::debug;

use crate::model::{CatchmentContext, TransferModel, TransferOutput};
use crate::{TransferError, TransferResult};

#[derive(Debug, Clone)]
pub struct ExternalProcessModel {
    program: PathBuf,
    layout_template: String,
    scratch_root: PathBuf,
}

impl ExternalProcessModel {
    pub fn new(
        program: PathBuf,
        layout_template_path: &Path,
        scratch_root: PathBuf,
    ) -> TransferResult<Self> {
        let layout_template = fs::read_to_string(layout_template_path)?;
        Ok(Self {
            program,
            layout_template,
            scratch_root,
        })
    }

    fn scratch_dir(&self, id: CatchmentId) -> PathBuf {
        // One directory per catchment; the fan-out never runs the same
        // catchment on two workers.
        self.scratch_root.join(format!("catch_{id}"))
    }

    /// Driver table in the model's input format.
    fn render_input(ctx: &CatchmentContext<'_>) -> String {
        let steps = ctx.temperature.len();
        let mut out = String::with_capacity(steps * 32);
        out.push_str("step\tT\tP\tQ\tEmptymeas\n");
        for step in 0..steps {
            let _ = writeln!(
                out,
                "{step}\t{}\t{}\t{}\tN/A",
                ctx.temperature.values()[step],
                ctx.precipitation.values()[step],
                ctx.discharge.values()[step],
            );
        }
        out
    }

    /// Substitute `{token}` placeholders in the layout template from the
    /// catchment parameters, substance parameters, and the built-ins `id`
    /// and `input_file_name`.
    fn render_layout(
        &self,
        ctx: &CatchmentContext<'_>,
        input_file_name: &str,
    ) -> TransferResult<String> {
        let mut out = String::with_capacity(self.layout_template.len());
        let mut rest = self.layout_template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| TransferError::Computation {
                what: "unterminated placeholder in layout template".to_string(),
            })?;
            let token = &after[..close];
            let value = match token {
                "id" => ctx.id.to_string(),
                "input_file_name" => input_file_name.to_string(),
                _ => ctx
                    .parameters
                    .value(token)
                    .or_else(|| ctx.substance.get(token))
                    .map(|v| v.to_string())
                    .ok_or_else(|| TransferError::Computation {
                        what: format!("layout template references unknown parameter '{token}'"),
                    })?,
            };
            out.push_str(&value);
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Output table: optional header, then `step load [concentration]`
    /// rows.
    fn parse_output(content: &str, steps: usize) -> TransferResult<TransferOutput> {
        let mut load = Vec::with_capacity(steps);
        let mut concentration = Vec::with_capacity(steps);
        let mut has_concentration = false;
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let first = fields.next().unwrap_or_default();
            if lineno == 0 && first.parse::<usize>().is_err() {
                continue; // header row
            }
            let bad_row = |what: String| TransferError::Computation { what };
            first
                .parse::<usize>()
                .map_err(|_| bad_row(format!("bad step field '{first}' on line {lineno}")))?;
            let load_field = fields
                .next()
                .ok_or_else(|| bad_row(format!("missing load field on line {lineno}")))?;
            load.push(
                load_field
                    .parse::<f64>()
                    .map_err(|_| bad_row(format!("bad load '{load_field}' on line {lineno}")))?,
            );
            if let Some(conc_field) = fields.next() {
                has_concentration = true;
                concentration.push(conc_field.parse::<f64>().map_err(|_| {
                    bad_row(format!("bad concentration '{conc_field}' on line {lineno}"))
                })?);
            }
        }
        if load.len() != steps {
            return Err(TransferError::Computation {
                what: format!("model produced {} steps, expected {steps}", load.len()),
            });
        }
        if has_concentration && concentration.len() != steps {
            return Err(TransferError::Computation {
                what: "concentration column is incomplete".to_string(),
            });
        }
        Ok(TransferOutput {
            load,
            concentration: has_concentration.then_some(concentration),
        })
    }
}

impl TransferModel for ExternalProcessModel {
    fn run(&self, ctx: &CatchmentContext<'_>) -> TransferResult<TransferOutput> {
        let dir = self.scratch_dir(ctx.id);
        fs::create_dir_all(&dir)?;

        let input_path = dir.join("input.txt");
        fs::write(&input_path, Self::render_input(ctx))?;

        let layout = self.render_layout(ctx, &input_path.to_string_lossy())?;
        let layout_path = dir.join(format!("layout_{}.xml", ctx.id));
        fs::write(&layout_path, layout)?;

        let output_path = dir.join(format!("out_{}.txt", ctx.id));
        debug!(id = %ctx.id, program = %self.program.display(), "running transfer model");
        let output = Command::new(&self.program)
            .arg(&layout_path)
            .arg("RUN")
            .arg(&output_path)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransferError::Convergence {
                what: format!(
                    "model exited with {} for catchment {}: {}",
                    output.status,
                    ctx.id,
                    stderr.trim(),
                ),
            });
        }

        let content = fs::read_to_string(&output_path)?;
        let result = Self::parse_output(&content, ctx.temperature.len());
        let _ = fs::remove_dir_all(&dir);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubstanceParams;
    use chrono::NaiveDateTime;
    use cw_core::series::TIMESTAMP_FORMAT;
    use cw_core::{TimeAxis, TimeSeries};
    use cw_store::ParameterSet;

    fn ctx_fixture() -> (ParameterSet, TimeSeries, SubstanceParams) {
        let start =
            NaiveDateTime::parse_from_str("2010-01-01 00:00:00", TIMESTAMP_FORMAT).unwrap();
        let axis = TimeAxis::hourly(start, 3).unwrap();
        let mut params = ParameterSet::new();
        params.insert("A_tot", 2.0e6, "m**2");
        params.insert("A_appl", 1.0e6, "m**2");
        (
            params,
            TimeSeries::constant(axis, 1.0).unwrap(),
            SubstanceParams::new("s").with("k", 0.5),
        )
    }

    fn model_with_template(template: &str) -> ExternalProcessModel {
        ExternalProcessModel {
            program: PathBuf::from("model"),
            layout_template: template.to_string(),
            scratch_root: std::env::temp_dir(),
        }
    }

    #[test]
    fn layout_rendering_substitutes_all_tokens() {
        let (params, series, substance) = ctx_fixture();
        let ctx = CatchmentContext {
            id: CatchmentId::new(7),
            parameters: &params,
            temperature: &series,
            precipitation: &series,
            discharge: &series,
            substance: &substance,
        };
        let model = model_with_template("<m id=\"{id}\" in=\"{input_file_name}\" a=\"{A_appl}\" k=\"{k}\"/>");
        let rendered = model.render_layout(&ctx, "input.txt").unwrap();
        assert_eq!(rendered, "<m id=\"7\" in=\"input.txt\" a=\"1000000\" k=\"0.5\"/>");
    }

    #[test]
    fn unknown_token_is_computation_error() {
        let (params, series, substance) = ctx_fixture();
        let ctx = CatchmentContext {
            id: CatchmentId::new(7),
            parameters: &params,
            temperature: &series,
            precipitation: &series,
            discharge: &series,
            substance: &substance,
        };
        let model = model_with_template("{nope}");
        assert!(matches!(
            model.render_layout(&ctx, "input.txt"),
            Err(TransferError::Computation { .. })
        ));
    }

    #[test]
    fn input_table_has_header_and_rows() {
        let (params, series, substance) = ctx_fixture();
        let ctx = CatchmentContext {
            id: CatchmentId::new(7),
            parameters: &params,
            temperature: &series,
            precipitation: &series,
            discharge: &series,
            substance: &substance,
        };
        let input = ExternalProcessModel::render_input(&ctx);
        let lines: Vec<_> = input.lines().collect();
        assert_eq!(lines[0], "step\tT\tP\tQ\tEmptymeas");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "0\t1\t1\t1\tN/A");
    }

    #[test]
    fn output_parse_round_trip() {
        let parsed = ExternalProcessModel::parse_output(
            "step\tload\tconcentration\n0\t1.5\t0.1\n1\t2.5\t0.2\n2\t0.0\t0.0\n",
            3,
        )
        .unwrap();
        assert_eq!(parsed.load, vec![1.5, 2.5, 0.0]);
        assert_eq!(parsed.concentration, Some(vec![0.1, 0.2, 0.0]));
    }

    #[test]
    fn output_without_concentration_column() {
        let parsed = ExternalProcessModel::parse_output("0 1.0\n1 2.0\n", 2).unwrap();
        assert_eq!(parsed.load, vec![1.0, 2.0]);
        assert_eq!(parsed.concentration, None);
    }

    #[test]
    fn short_output_is_computation_error() {
        let err = ExternalProcessModel::parse_output("0\t1.0\n", 3).unwrap_err();
        assert!(matches!(err, TransferError::Computation { .. }));
    }
}
