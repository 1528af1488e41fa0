//! Aggregation of phase trees and sample stacks
//!
//! Two independent reductions feed the report:
//!
//! - **Phase aggregation** walks the retained frame trees and sums
//!   inclusive time and call counts per phase name. Node durations are
//!   inclusive by construction (probes nest), so self time is derived
//!   as inclusive minus children.
//! - **Sample aggregation** counts, for every stored sample, the leaf
//!   frame (self) and every distinct frame anywhere in the stack
//!   (cumulative). Percentages are against stored plus empty samples,
//!   so engine-core time keeps its share of the denominator.
//!
//! Both reductions are pure functions of their snapshot: ordering is
//! descending by time/count with ties broken by first-encounter order,
//! so aggregating the same input twice is byte-identical.

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;

use crate::domain::{DurationUs, ScriptFrame};
use crate::interner;
use crate::profiling::node::PhaseNode;
use crate::profiling::sampler::SampleSnapshot;

/// Aggregate timing for one phase name across all retained frames.
#[derive(Debug, Clone)]
pub struct PhaseRecord {
    pub name: &'static str,
    /// Total time with children included.
    pub inclusive: DurationUs,
    /// Total time with measured children excluded.
    pub self_time: DurationUs,
    pub calls: u64,
}

/// Sum durations and counts per phase name over `frames`.
///
/// Sorted descending by inclusive time; ties keep first-encounter
/// order (pre-order walk, frames oldest first).
pub fn aggregate_phases<'a>(frames: impl IntoIterator<Item = &'a PhaseNode>) -> Vec<PhaseRecord> {
    let mut records: Vec<PhaseRecord> = Vec::new();
    let mut index: HashMap<&'static str, usize> = HashMap::new();

    for frame in frames {
        frame.visit(&mut |node| {
            let slot = *index.entry(node.name).or_insert_with(|| {
                records.push(PhaseRecord {
                    name: node.name,
                    inclusive: DurationUs(0),
                    self_time: DurationUs(0),
                    calls: 0,
                });
                records.len() - 1
            });
            let record = &mut records[slot];
            record.inclusive.0 += node.duration_us().0;
            record.self_time.0 += node.self_time_us().0;
            record.calls += 1;
        });
    }

    // Stable sort: equal inclusive times keep first-encounter order.
    records.sort_by_key(|r| std::cmp::Reverse(r.inclusive));
    records
}

/// Occurrence count for one script frame identity.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    pub frame: ScriptFrame,
    /// Resolved symbol name, for display.
    pub name: String,
    pub count: u64,
    /// Share of `stored + empty` samples, 0.0 - 100.0.
    pub percentage: f64,
}

/// The sample buffer reduced to self and cumulative breakdowns.
#[derive(Debug, Clone)]
pub struct SampleAggregate {
    /// Counted where the frame was the innermost (executing) one.
    pub self_counts: Vec<SampleRecord>,
    /// Counted wherever the frame appeared in a sampled stack, at most
    /// once per sample.
    pub cumulative_counts: Vec<SampleRecord>,
    /// Denominator for percentages: stored plus empty samples.
    pub total_samples: u64,
    pub stored: u64,
    pub empty: u64,
    pub overflow: u64,
    pub deep: u64,
    pub ticks: u64,
    pub wrong_thread: u64,
}

/// Insertion-ordered counter; keeps ordering deterministic without
/// depending on hash iteration order.
struct CountTable {
    order: Vec<ScriptFrame>,
    counts: HashMap<ScriptFrame, u64>,
}

impl CountTable {
    fn new() -> Self {
        Self { order: Vec::new(), counts: HashMap::new() }
    }

    fn bump(&mut self, frame: ScriptFrame) {
        if let Some(count) = self.counts.get_mut(&frame) {
            *count += 1;
        } else {
            self.order.push(frame);
            self.counts.insert(frame, 1);
        }
    }

    fn into_records(self, total: u64) -> Vec<SampleRecord> {
        let mut records: Vec<SampleRecord> = self
            .order
            .into_iter()
            .map(|frame| {
                let count = self.counts[&frame];
                let percentage =
                    if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
                SampleRecord {
                    frame,
                    name: interner::resolve_or_unknown(frame.symbol),
                    count,
                    percentage,
                }
            })
            .collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.count));
        records
    }
}

/// Reduce a sample snapshot to self and cumulative counts.
#[must_use]
pub fn aggregate_samples(snapshot: &SampleSnapshot) -> SampleAggregate {
    let total = snapshot.total_samples();
    let mut self_counts = CountTable::new();
    let mut cumulative = CountTable::new();

    for stack in &snapshot.stacks {
        if let Some(&leaf) = stack.first() {
            self_counts.bump(leaf);
        }
        // Each identity counts once per sample, even under recursion.
        let mut seen: Vec<ScriptFrame> = Vec::with_capacity(stack.len());
        for &frame in stack {
            if !seen.contains(&frame) {
                seen.push(frame);
                cumulative.bump(frame);
            }
        }
    }

    SampleAggregate {
        self_counts: self_counts.into_records(total),
        cumulative_counts: cumulative.into_records(total),
        total_samples: total,
        stored: snapshot.stored,
        empty: snapshot.empty,
        overflow: snapshot.overflow,
        deep: snapshot.deep,
        ticks: snapshot.ticks,
        wrong_thread: snapshot.wrong_thread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FrameKind, SymbolId, TimestampUs};

    fn closed(name: &'static str, begin: u64, end: u64) -> PhaseNode {
        let mut node = PhaseNode::open(name, TimestampUs(begin));
        node.close_at(TimestampUs(end));
        node
    }

    fn sample_frame(name: &str) -> ScriptFrame {
        ScriptFrame::new(crate::interner::intern(name), FrameKind::Expression)
    }

    fn snapshot_of(stacks: Vec<Vec<ScriptFrame>>, empty: u64) -> SampleSnapshot {
        let stored = stacks.len() as u64;
        SampleSnapshot {
            stacks,
            stored,
            empty,
            overflow: 0,
            deep: 0,
            ticks: stored + empty,
            wrong_thread: 0,
        }
    }

    #[test]
    fn test_phase_aggregation_sums_across_frames() {
        let mut frame_a = closed("frame", 0, 100);
        frame_a.children.push(closed("draw", 10, 40));
        let mut frame_b = closed("frame", 100, 200);
        frame_b.children.push(closed("draw", 110, 150));

        let records = aggregate_phases([&frame_a, &frame_b]);
        let draw = records.iter().find(|r| r.name == "draw").expect("draw record");
        assert_eq!(draw.inclusive, DurationUs(70));
        assert_eq!(draw.calls, 2);
    }

    #[test]
    fn test_phase_self_time_excludes_children() {
        let mut frame = closed("frame", 0, 100);
        let mut process = closed("process", 0, 60);
        process.children.push(closed("physics", 10, 50));
        frame.children.push(process);

        let records = aggregate_phases([&frame]);
        let process = records.iter().find(|r| r.name == "process").expect("process record");
        assert_eq!(process.inclusive, DurationUs(60));
        assert_eq!(process.self_time, DurationUs(20));
    }

    #[test]
    fn test_phase_ordering_is_descending_then_first_seen() {
        let mut frame = closed("frame", 0, 100);
        frame.children.push(closed("alpha", 0, 10));
        frame.children.push(closed("beta", 10, 20));
        frame.children.push(closed("gamma", 20, 80));

        let records = aggregate_phases([&frame]);
        let names: Vec<&str> = records.iter().map(|r| r.name).collect();
        // frame (100) first, gamma (60) next; alpha and beta tie at 10
        // and stay in encounter order.
        assert_eq!(names, vec!["frame", "gamma", "alpha", "beta"]);
    }

    #[test]
    fn test_sample_aggregation_counts_and_percentages() {
        let eval = sample_frame("aggregator_test::eval_expr");
        let stacks = vec![vec![eval]; 600];
        let aggregate = aggregate_samples(&snapshot_of(stacks, 400));

        assert_eq!(aggregate.total_samples, 1000);
        assert_eq!(aggregate.empty, 400);
        let top = &aggregate.self_counts[0];
        assert_eq!(top.count, 600);
        assert!((top.percentage - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cumulative_counts_whole_stack_once() {
        let outer = sample_frame("aggregator_test::update");
        let inner = sample_frame("aggregator_test::helper");
        // Recursive appearance of `outer` must count once per sample.
        let stacks = vec![vec![inner, outer, outer], vec![outer]];
        let aggregate = aggregate_samples(&snapshot_of(stacks, 0));

        let self_inner =
            aggregate.self_counts.iter().find(|r| r.frame == inner).expect("inner self");
        assert_eq!(self_inner.count, 1);

        let cum_outer =
            aggregate.cumulative_counts.iter().find(|r| r.frame == outer).expect("outer cum");
        assert_eq!(cum_outer.count, 2);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let a = sample_frame("aggregator_test::a");
        let b = sample_frame("aggregator_test::b");
        let snapshot = snapshot_of(vec![vec![a, b], vec![b, a], vec![a]], 3);

        let first = aggregate_samples(&snapshot);
        let second = aggregate_samples(&snapshot);
        let render = |agg: &SampleAggregate| {
            format!("{:?}{:?}", agg.self_counts, agg.cumulative_counts)
        };
        assert_eq!(render(&first), render(&second));
    }

    #[test]
    fn test_empty_snapshot_yields_no_records() {
        let aggregate = aggregate_samples(&snapshot_of(Vec::new(), 0));
        assert!(aggregate.self_counts.is_empty());
        assert!(aggregate.cumulative_counts.is_empty());
        assert_eq!(aggregate.total_samples, 0);
    }
}
