//! Per-frame instrumentation tree node
//!
//! Every probe opens one `PhaseNode` under the node currently on top of
//! the frame recorder's stack, so the nodes of a frame reconstruct the
//! execution timeline: child order is creation order, and a (closed)
//! child's interval nests inside its parent's.
//!
//! Durations are inclusive — a parent's duration contains its children's,
//! because probes nest rather than exclude. Self time is derived on
//! demand as inclusive minus the sum of children.

use crate::domain::{DurationUs, TimestampUs};

/// One timed interval in the per-frame hierarchy.
///
/// Phase names are `&'static str` by contract: callers instrument with
/// literals, so aggregation can key on the name without owning it.
#[derive(Debug, Clone)]
pub struct PhaseNode {
    /// Phase identity; compared by content, expected to be a literal.
    pub name: &'static str,
    pub begin_us: TimestampUs,
    /// `None` while the probe that opened this node is still alive.
    pub end_us: Option<TimestampUs>,
    /// Optional opaque debug payload attached by the probe.
    pub payload: Option<String>,
    /// Nested phases, in creation (temporal) order.
    pub children: Vec<PhaseNode>,
}

impl PhaseNode {
    #[must_use]
    pub fn open(name: &'static str, begin_us: TimestampUs) -> Self {
        Self { name, begin_us, end_us: None, payload: None, children: Vec::new() }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.end_us.is_some()
    }

    /// Close this node and any still-open descendants at `ts`.
    ///
    /// Idempotent: already-closed nodes keep their end timestamp. Used by
    /// the frame recorder to force-close a frame at the tick boundary
    /// even when a probe is still nominally open.
    pub fn close_at(&mut self, ts: TimestampUs) {
        if self.end_us.is_none() {
            self.end_us = Some(ts.max(self.begin_us));
        }
        for child in &mut self.children {
            if !child.is_closed() {
                child.close_at(ts);
            }
        }
    }

    /// Inclusive duration. Zero while the node is still open.
    #[must_use]
    pub fn duration_us(&self) -> DurationUs {
        match self.end_us {
            Some(end) => end.since(self.begin_us),
            None => DurationUs(0),
        }
    }

    /// Sum of the children's inclusive durations.
    #[must_use]
    pub fn children_duration_us(&self) -> DurationUs {
        DurationUs(self.children.iter().map(|c| c.duration_us().0).sum())
    }

    /// Time spent in this phase excluding its measured children
    /// (saturating; clock jitter can make children sum past the parent).
    #[must_use]
    pub fn self_time_us(&self) -> DurationUs {
        DurationUs(self.duration_us().0.saturating_sub(self.children_duration_us().0))
    }

    /// Depth-first pre-order walk over this node and its descendants.
    pub fn visit(&self, f: &mut impl FnMut(&PhaseNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}
