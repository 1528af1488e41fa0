//! Post-processing of collected profiling data
//!
//! Reduces the two collection paths — per-frame phase trees and the
//! statistical sample buffer — into sorted percentage breakdowns for
//! the report generator and external visualizers.

pub mod aggregator;

pub use aggregator::{
    aggregate_phases, aggregate_samples, PhaseRecord, SampleAggregate, SampleRecord,
};
