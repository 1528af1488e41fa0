//! Instrumentation-tree behavior: nesting, timing, invariants, misuse.

use tick_scope::analysis::aggregate_phases;
use tick_scope::domain::{DurationUs, TimestampUs};
use tick_scope::profiling::{FrameRecorder, PhaseNode, Probe, ProfilerConfig, ProfilerContext};

/// Three nested probes A ⊃ B ⊃ C held open for 30/20/10 units, C
/// closing first, then B, then A.
fn record_nested_scenario() -> FrameRecorder {
    let mut rec = FrameRecorder::new(4, 0);
    rec.begin_frame_at(false, TimestampUs(0));
    let a = rec.push_phase_at("A", None, TimestampUs(10)).expect("push A");
    let b = rec.push_phase_at("B", None, TimestampUs(15)).expect("push B");
    let c = rec.push_phase_at("C", None, TimestampUs(20)).expect("push C");
    rec.pop_phase_at("C", c, TimestampUs(30)).expect("pop C");
    rec.pop_phase_at("B", b, TimestampUs(35)).expect("pop B");
    rec.pop_phase_at("A", a, TimestampUs(40)).expect("pop A");
    // Next frame boundary retires the frame into the history ring.
    rec.begin_frame_at(false, TimestampUs(50));
    rec
}

#[test]
fn test_nested_probes_build_a_chain() {
    let rec = record_nested_scenario();
    let frame = rec.last_frame().expect("retained frame");

    assert_eq!(frame.children.len(), 1);
    let a = &frame.children[0];
    assert_eq!(a.name, "A");
    assert_eq!(a.children.len(), 1);
    let b = &a.children[0];
    assert_eq!(b.name, "B");
    assert_eq!(b.children.len(), 1);
    let c = &b.children[0];
    assert_eq!(c.name, "C");
    assert!(c.children.is_empty());
}

#[test]
fn test_nested_probes_inclusive_and_self_times() {
    let rec = record_nested_scenario();
    let frame = rec.last_frame().expect("retained frame");
    let a = &frame.children[0];
    let b = &a.children[0];
    let c = &b.children[0];

    assert_eq!(a.duration_us(), DurationUs(30));
    assert_eq!(b.duration_us(), DurationUs(20));
    assert_eq!(c.duration_us(), DurationUs(10));
    assert_eq!(a.self_time_us(), DurationUs(10));
    assert_eq!(b.self_time_us(), DurationUs(10));
    assert_eq!(c.self_time_us(), DurationUs(10));

    let records = aggregate_phases(rec.history());
    let lookup = |name: &str| {
        records.iter().find(|r| r.name == name).unwrap_or_else(|| panic!("record for {name}"))
    };
    assert_eq!(lookup("A").inclusive, DurationUs(30));
    assert_eq!(lookup("A").self_time, DurationUs(10));
    assert_eq!(lookup("B").self_time, DurationUs(10));
    assert_eq!(lookup("C").self_time, DurationUs(10));
}

fn assert_tree_valid(node: &PhaseNode) {
    let end = node.end_us.expect("closed node");
    assert!(end >= node.begin_us, "end precedes begin in {}", node.name);
    for child in &node.children {
        assert!(child.begin_us >= node.begin_us, "{} begins before parent", child.name);
        assert!(child.end_us.expect("closed child") <= end, "{} ends after parent", child.name);
        assert_tree_valid(child);
    }
}

#[test]
fn test_tree_validity_with_real_probes() {
    let ctx = ProfilerContext::init(ProfilerConfig::instrumentation_only());
    for _ in 0..5 {
        ctx.begin_frame(false);
        let _frame_work = Probe::new(&ctx, "process");
        {
            let _inner = Probe::new(&ctx, "physics");
            let _innermost = Probe::new(&ctx, "collisions");
        }
        let _draw = Probe::new(&ctx, "draw");
    }
    ctx.begin_frame(false);

    ctx.with_recorder(|rec| {
        assert!(rec.frames_recorded() >= 5);
        for frame in rec.history() {
            assert_tree_valid(frame);
        }
    });
}

#[test]
fn test_disabled_profiler_creates_no_nodes() {
    let ctx = ProfilerContext::init(ProfilerConfig::disabled());
    for _ in 0..1_000 {
        ctx.begin_frame(false);
        let outer = Probe::new(&ctx, "process");
        assert!(!outer.is_armed());
        let inner = Probe::new(&ctx, "draw");
        assert!(!inner.is_armed());
    }
    ctx.with_recorder(|rec| {
        assert!(rec.current_frame().is_none());
        assert_eq!(rec.frames_recorded(), 0);
        assert!(rec.totals().is_empty());
    });
}

#[test]
fn test_mismatched_nesting_poisons_without_crashing() {
    let mut rec = FrameRecorder::new(4, 0);
    rec.begin_frame_at(false, TimestampUs(0));
    let outer = rec.push_phase_at("outer", None, TimestampUs(1)).expect("push outer");
    rec.push_phase_at("inner", None, TimestampUs(2)).expect("push inner");

    // Popping out of order is the fatal programmer error.
    assert!(rec.pop_phase_at("outer", outer, TimestampUs(3)).is_err());

    // The context layer turns that error into a permanent no-op state.
    let ctx = ProfilerContext::init(ProfilerConfig::instrumentation_only());
    ctx.begin_frame(false);
    let outer = Probe::new(&ctx, "outer");
    let inner = Probe::new(&ctx, "inner");
    drop(outer);
    assert!(!ctx.is_active(), "out-of-order drop must poison the context");
    drop(inner);

    // Poisoned contexts ignore all further collection.
    ctx.begin_frame(false);
    let late = Probe::new(&ctx, "late");
    assert!(!late.is_armed());
}

#[test]
fn test_probe_totals_accumulate_per_name() {
    let ctx = ProfilerContext::init(ProfilerConfig::instrumentation_only());
    ctx.begin_frame(false);
    for _ in 0..4 {
        let _p = Probe::new(&ctx, "script");
    }
    ctx.with_recorder(|rec| {
        assert_eq!(rec.totals()["script"].calls, 4);
    });
}

#[test]
fn test_paused_ticks_retain_nothing() {
    let ctx = ProfilerContext::init(ProfilerConfig::instrumentation_only());
    ctx.begin_frame(false);
    {
        let _p = Probe::new(&ctx, "process");
    }
    // Host reports paused: the in-flight frame is discarded.
    ctx.begin_frame(true);
    ctx.with_recorder(|rec| {
        assert_eq!(rec.frames_recorded(), 0);
        assert!(rec.last_frame().is_none());
        let fresh = rec.current_frame().expect("fresh root");
        assert!(fresh.children.is_empty());
    });
}
