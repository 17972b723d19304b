//! Writing run results to disk
//!
//! ```text
//! output/
//! ├── mod.rs
//! └── export/         ← file formats
//!     ├── mod.rs      ← Exporter trait
//!     └── csv.rs
//! ```
//!
//! Exporters take a [`SimulationResult`](crate::controller::SimulationResult)
//! as returned by any integrator. With PFASST every rank returns its own
//! result holding the steps it owned.

pub mod export;

pub use export::{CsvConfig, CsvExporter, CsvMetadata, Exporter};
