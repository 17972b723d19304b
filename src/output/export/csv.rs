//! CSV export of run histories and trajectories
//!
//! Two tables can be written from a [`SimulationResult`]:
//!
//! - **History**: one row per time step with iteration count and residuals
//! - **Trajectory**: one row per recorded time point with the state entries
//!   as columns, optionally downsampled
//!
//! # Example
//!
//! ```rust,ignore
//! use pfasst_rs::output::export::{CsvConfig, CsvExporter, CsvMetadata, Exporter};
//!
//! let config = CsvConfig::default().with_metadata(CsvMetadata::from_result(&result));
//! let exporter = CsvExporter::new(config);
//!
//! exporter.export_history(&result, "history.csv")?;
//! exporter.export_trajectory(&result, Some(100), "trajectory.csv")?;
//! ```
//!
//! **Output** (`history.csv`):
//! ```csv
//! # PFASST Run Data
//! # Generated: 2026-02-11T15:30:00Z
//! # Integrator: MLSDC
//! # dt: 0.1
//! #
//! step,time,iterations,abs_res,rel_res,converged
//! 0,0.100000,3,8.881784e-16,1.110223e-15,true
//! ...
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::controller::SimulationResult;
use crate::encap::StateContainer;
use crate::error::{PfasstError, Result};
use crate::output::export::{Exporter, downsample_indices};

// =============================================================================
// Configuration Structures
// =============================================================================

/// Formatting options for CSV export
///
/// ```rust,ignore
/// let config = CsvConfig {
///     delimiter: ';',
///     precision: 10,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct CsvConfig {
    /// Column delimiter (default: ',')
    pub delimiter: char,

    /// Decimal separator (default: '.')
    pub decimal_separator: char,

    /// Digits after the decimal point, residuals are always written in scientific notation
    pub precision: usize,

    /// Include metadata header comments (default: false)
    pub include_metadata: bool,

    pub metadata: Option<CsvMetadata>,

    /// Header prefix of the state columns (default: "u", giving "u0", "u1", ...)
    pub state_prefix: String,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal_separator: '.',
            precision: 6,
            include_metadata: false,
            metadata: None,
            state_prefix: "u".to_string(),
        }
    }
}

impl CsvConfig {
    /// Semicolon delimiter and comma as decimal separator
    pub fn european() -> Self {
        Self {
            delimiter: ';',
            decimal_separator: ',',
            ..Default::default()
        }
    }

    /// Twelve digits after the decimal point
    pub fn high_precision() -> Self {
        Self {
            precision: 12,
            ..Default::default()
        }
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn state_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.state_prefix = prefix.into();
        self
    }

    pub fn with_metadata(mut self, metadata: CsvMetadata) -> Self {
        self.include_metadata = true;
        self.metadata = Some(metadata);
        self
    }
}

/// Header comments of an exported file
///
/// Only fields that are set are written.
#[derive(Clone, Debug, Default)]
pub struct CsvMetadata {
    pub integrator: Option<String>,
    pub problem: Option<String>,
    pub dt: Option<f64>,
    pub t_end: Option<f64>,
    pub time_steps: Option<usize>,
    pub total_iterations: Option<usize>,
    pub custom: Vec<(String, String)>,
}

impl CsvMetadata {
    /// Collect what the integrator recorded in the result
    pub fn from_result<E: StateContainer>(result: &SimulationResult<E>) -> Self {
        let mut metadata = Self {
            integrator: result.metadata.get("integrator").cloned(),
            dt: result.metadata.get("dt").and_then(|v| v.parse().ok()),
            t_end: Some(result.final_time()),
            time_steps: Some(result.num_steps()),
            total_iterations: Some(result.total_iterations()),
            ..Default::default()
        };
        if let Some(rank) = result.metadata.get("rank") {
            metadata.add_custom("Rank", rank);
        }
        metadata
    }

    pub fn with_problem(mut self, problem: impl Into<String>) -> Self {
        self.problem = Some(problem.into());
        self
    }

    pub fn add_custom(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom.push((key.into(), value.into()));
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn write_metadata_header(out: &mut impl Write, metadata: &CsvMetadata) -> std::io::Result<()> {
    writeln!(out, "# PFASST Run Data")?;
    writeln!(out, "# Generated: {}", chrono::Utc::now().to_rfc3339())?;

    if let Some(integrator) = &metadata.integrator {
        writeln!(out, "# Integrator: {}", integrator)?;
    }
    if let Some(problem) = &metadata.problem {
        writeln!(out, "# Problem: {}", problem)?;
    }
    if let Some(dt) = metadata.dt {
        writeln!(out, "# dt: {}", dt)?;
    }
    if let Some(t_end) = metadata.t_end {
        writeln!(out, "# End Time: {}", t_end)?;
    }
    if let Some(steps) = metadata.time_steps {
        writeln!(out, "# Time Steps: {}", steps)?;
    }
    if let Some(iterations) = metadata.total_iterations {
        writeln!(out, "# Total Iterations: {}", iterations)?;
    }
    for (key, value) in &metadata.custom {
        writeln!(out, "# {}: {}", key, value)?;
    }

    writeln!(out, "#")
}

fn format_number(value: f64, config: &CsvConfig) -> String {
    localize(format!("{:.prec$}", value, prec = config.precision), config)
}

fn format_residual(value: f64, config: &CsvConfig) -> String {
    localize(format!("{:.prec$e}", value, prec = config.precision), config)
}

fn localize(formatted: String, config: &CsvConfig) -> String {
    if config.decimal_separator != '.' {
        formatted.replace('.', &config.decimal_separator.to_string())
    } else {
        formatted
    }
}

fn create(path: &Path, config: &CsvConfig) -> Result<BufWriter<File>> {
    let mut out = BufWriter::new(File::create(path)?);
    if config.include_metadata {
        if let Some(metadata) = &config.metadata {
            write_metadata_header(&mut out, metadata)?;
        }
    }
    Ok(out)
}

// =============================================================================
// Exporter
// =============================================================================

/// Writes results as delimiter-separated text
#[derive(Clone, Debug, Default)]
pub struct CsvExporter {
    config: CsvConfig,
}

impl CsvExporter {
    pub fn new(config: CsvConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CsvConfig {
        &self.config
    }
}

impl Exporter for CsvExporter {
    fn export_history<E: StateContainer>(&self, result: &SimulationResult<E>, path: impl AsRef<Path>) -> Result<()> {
        if result.steps.is_empty() {
            return Err(PfasstError::Export("no time steps recorded".to_string()));
        }

        let config = &self.config;
        let d = config.delimiter;
        let mut out = create(path.as_ref(), config)?;

        writeln!(out, "step{d}time{d}iterations{d}abs_res{d}rel_res{d}converged")?;
        for record in &result.steps {
            writeln!(
                out,
                "{}{d}{}{d}{}{d}{}{d}{}{d}{}",
                record.step,
                format_number(record.time, config),
                record.iterations,
                format_residual(record.abs_res_norm, config),
                format_residual(record.rel_res_norm, config),
                record.converged
            )?;
        }

        out.flush()?;
        Ok(())
    }

    fn export_trajectory<E>(
        &self,
        result: &SimulationResult<E>,
        n_points: Option<usize>,
        path: impl AsRef<Path>,
    ) -> Result<()>
    where
        E: StateContainer + AsRef<[f64]>,
    {
        // ============================= Validation =============================

        if result.time_points.is_empty() || result.state_trajectory.is_empty() {
            return Err(PfasstError::Export("empty trajectory".to_string()));
        }
        if result.time_points.len() != result.state_trajectory.len() {
            return Err(PfasstError::Export(format!(
                "{} time points versus {} states",
                result.time_points.len(),
                result.state_trajectory.len()
            )));
        }
        let width = result.state_trajectory[0].len();
        for (time, state) in result.time_points.iter().zip(&result.state_trajectory) {
            if state.len() != width {
                return Err(PfasstError::Export(format!(
                    "state at t={} has {} entries, expected {}",
                    time,
                    state.len(),
                    width
                )));
            }
            if !time.is_finite() || !state.is_finite() {
                return Err(PfasstError::Export(format!("NaN or Inf in trajectory at t={}", time)));
            }
        }

        // ============================= Write ==================================

        let config = &self.config;
        let mut out = create(path.as_ref(), config)?;

        write!(out, "time")?;
        for i in 0..width {
            write!(out, "{}{}{}", config.delimiter, config.state_prefix, i)?;
        }
        writeln!(out)?;

        for index in downsample_indices(result.time_points.len(), n_points) {
            write!(out, "{}", format_number(result.time_points[index], config))?;
            for value in result.state_trajectory[index].as_ref() {
                write!(out, "{}{}", config.delimiter, format_number(*value, config))?;
            }
            writeln!(out)?;
        }

        out.flush()?;
        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::StepRecord;
    use crate::encap::VectorEncapsulation;
    use std::fs;
    use tempfile::tempdir;

    fn sample_result() -> SimulationResult<VectorEncapsulation> {
        let mut result = SimulationResult::new(0.0, VectorEncapsulation::from_slice(&[1.0, 2.0]));
        for step in 0..4 {
            let record = StepRecord {
                step,
                time: 0.25 * (step + 1) as f64,
                iterations: 3,
                abs_res_norm: 1e-11,
                rel_res_norm: 1e-12,
                converged: true,
            };
            let scale = 0.5_f64.powi(step as i32 + 1);
            result.push_step(record, VectorEncapsulation::from_slice(&[scale, 2.0 * scale]));
        }
        result.add_metadata("integrator", "SDC");
        result.add_metadata("dt", "0.25");
        result
    }

    #[test]
    fn test_history_has_one_row_per_step() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.csv");

        CsvExporter::default().export_history(&sample_result(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "step,time,iterations,abs_res,rel_res,converged");
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("0,0.250000,3,"));
        assert!(lines[4].ends_with(",true"));
    }

    #[test]
    fn test_trajectory_columns_and_downsampling() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trajectory.csv");

        let exporter = CsvExporter::new(CsvConfig::default().precision(4));
        exporter.export_trajectory(&sample_result(), Some(3), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "time,u0,u1");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "0.0000,1.0000,2.0000");
        assert_eq!(lines[3], "1.0000,0.0625,0.1250");
    }

    #[test]
    fn test_metadata_header_and_european_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("european.csv");

        let result = sample_result();
        let config = CsvConfig::european().with_metadata(CsvMetadata::from_result(&result).with_problem("decay"));
        CsvExporter::new(config).export_trajectory(&result, None, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert!(content.starts_with("# PFASST Run Data\n# Generated: "));
        assert!(content.contains("# Integrator: SDC"));
        assert!(content.contains("# Problem: decay"));
        assert!(content.contains("# Time Steps: 4"));
        assert!(content.contains("time;u0;u1"));
        assert!(content.contains("0,250000;0,500000;1,000000"));
    }

    #[test]
    fn test_rejects_non_finite_states() {
        let dir = tempdir().unwrap();
        let mut result = sample_result();
        result.state_trajectory[2] = VectorEncapsulation::from_slice(&[f64::NAN, 0.0]);

        let err = CsvExporter::default()
            .export_trajectory(&result, None, dir.path().join("bad.csv"))
            .unwrap_err();
        assert!(matches!(err, PfasstError::Export(_)));
    }

    #[test]
    fn test_history_requires_steps() {
        let dir = tempdir().unwrap();
        let result = SimulationResult::new(0.0, VectorEncapsulation::zeros(1));

        let err = CsvExporter::default().export_history(&result, dir.path().join("empty.csv")).unwrap_err();
        assert!(matches!(err, PfasstError::Export(_)));
    }
}
