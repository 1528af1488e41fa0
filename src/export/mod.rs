//! Report and trace export
//!
//! This module turns aggregated profiling data into consumable
//! artifacts: the plain-text report written at shutdown, and an
//! optional Chrome Trace Event Format JSON of the retained frame trees
//! for visualization in Perfetto or chrome://tracing.

pub mod chrome_trace;
pub mod report;

pub use chrome_trace::export_chrome_trace;
pub use report::{render_report, write_report, ReportMeta, ReportSink};
