//! Frame lifecycle and retention
//!
//! The recorder owns the in-flight frame tree, the stack of currently
//! open nodes within it, a bounded ring of recently completed frames,
//! and the running per-phase totals that probes accumulate into.
//!
//! ## Frame boundaries
//!
//! The host calls `begin_frame` exactly once per tick, before any probes
//! for that tick exist. The previous frame is force-closed at the
//! boundary — a probe still nominally open at that point gets the
//! boundary timestamp as its end — and appended to the history ring,
//! evicting the oldest retained frame when the ring is full. While the
//! host reports itself paused, in-flight data is discarded wholesale and
//! nothing is retained.
//!
//! Everything in this module runs on the instrumented main thread; the
//! sampling interrupt never reads or writes recorder state.

use std::collections::{HashMap, VecDeque};

use log::{info, warn};

use crate::domain::{DurationUs, ProfilerError, TimestampUs};
use crate::profiling::node::PhaseNode;

/// Name given to the synthetic root node of every frame.
pub const FRAME_ROOT: &str = "frame";

/// Cumulative timing for one phase name, accumulated on probe drop.
///
/// The synchronous analogue of sampling: every probe adds its inclusive
/// duration here in O(1), independent of the tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTotals {
    pub total: DurationUs,
    pub calls: u64,
}

#[derive(Debug)]
pub struct FrameRecorder {
    /// Root of the in-flight frame; `None` until the first `begin_frame`.
    current: Option<PhaseNode>,
    /// Child-index path from the root to the innermost open node.
    open_path: Vec<usize>,
    /// Bumped at every frame boundary. A probe opened in an earlier
    /// generation was already force-closed there, so its eventual pop
    /// is stale rather than mismatched.
    generation: u64,
    /// Pops that arrived after their node's frame had already ended.
    stale_pops: u64,
    /// Completed frames, oldest first.
    history: VecDeque<PhaseNode>,
    history_capacity: usize,
    frames_recorded: u64,
    frames_evicted: u64,
    /// Per-phase totals since the last instrumentation dump.
    totals: HashMap<&'static str, PhaseTotals>,
    /// Dump the totals to the log every this many frames; 0 disables.
    dump_every: u64,
    last_dump_ts: Option<TimestampUs>,
}

impl FrameRecorder {
    #[must_use]
    pub fn new(history_capacity: usize, dump_every: u64) -> Self {
        Self {
            current: None,
            open_path: Vec::new(),
            generation: 0,
            stale_pops: 0,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
            frames_recorded: 0,
            frames_evicted: 0,
            totals: HashMap::new(),
            dump_every,
            last_dump_ts: None,
        }
    }

    /// Close the previous frame and open the next one at `now`.
    ///
    /// When `paused`, the in-flight frame is discarded instead of
    /// retained and the frame counter does not advance.
    pub fn begin_frame_at(&mut self, paused: bool, now: TimestampUs) {
        self.generation += 1;
        if paused {
            self.current = Some(PhaseNode::open(FRAME_ROOT, now));
            self.open_path.clear();
            return;
        }

        if let Some(mut root) = self.current.take() {
            if !self.open_path.is_empty() {
                warn!(
                    "frame ended with {} probe(s) still open; force-closing",
                    self.open_path.len()
                );
            }
            root.close_at(now);
            if self.history.len() == self.history_capacity {
                self.history.pop_front();
                self.frames_evicted += 1;
            }
            self.history.push_back(root);
            self.frames_recorded += 1;
            self.maybe_dump_instrumentation(now);
        }

        self.current = Some(PhaseNode::open(FRAME_ROOT, now));
        self.open_path.clear();
    }

    /// Open a phase under the innermost open node (or the frame root).
    ///
    /// Returns the frame generation the node belongs to; the matching
    /// `pop_phase_at` must pass it back. `None` without side effects
    /// when no frame is open, so a probe created before the first
    /// `begin_frame` is silently inert.
    pub fn push_phase_at(
        &mut self,
        name: &'static str,
        payload: Option<String>,
        ts: TimestampUs,
    ) -> Option<u64> {
        let top = self.open_node_mut()?;
        let mut node = PhaseNode::open(name, ts);
        node.payload = payload;
        top.children.push(node);
        let idx = top.children.len() - 1;
        self.open_path.push(idx);
        Some(self.generation)
    }

    /// Close the innermost open phase, which must be `name` opened in
    /// `generation`.
    ///
    /// A pop from an earlier generation is stale: the node was already
    /// force-closed at a frame boundary, so this is a counted no-op. A
    /// same-generation name mismatch means probe drops ran out of
    /// nesting order — the tree topology is corrupt and the caller must
    /// stop collecting.
    pub fn pop_phase_at(
        &mut self,
        name: &'static str,
        generation: u64,
        ts: TimestampUs,
    ) -> Result<DurationUs, ProfilerError> {
        if generation != self.generation {
            self.stale_pops += 1;
            return Ok(DurationUs(0));
        }
        if self.open_path.is_empty() {
            return Err(ProfilerError::MismatchedProbe {
                expected: name.to_string(),
                found: FRAME_ROOT.to_string(),
            });
        }
        let top = self.open_node_mut().ok_or_else(|| ProfilerError::MismatchedProbe {
            expected: name.to_string(),
            found: FRAME_ROOT.to_string(),
        })?;
        if top.name != name {
            return Err(ProfilerError::MismatchedProbe {
                expected: name.to_string(),
                found: top.name.to_string(),
            });
        }
        top.close_at(ts);
        let duration = top.duration_us();
        self.open_path.pop();

        let entry = self.totals.entry(name).or_default();
        entry.total.0 += duration.0;
        entry.calls += 1;

        Ok(duration)
    }

    /// The innermost open node of the in-flight frame.
    fn open_node_mut(&mut self) -> Option<&mut PhaseNode> {
        let mut node = self.current.as_mut()?;
        for &idx in &self.open_path {
            node = node.children.get_mut(idx)?;
        }
        Some(node)
    }

    /// Most recently completed frame, if any is retained.
    #[must_use]
    pub fn last_frame(&self) -> Option<&PhaseNode> {
        self.history.back()
    }

    /// The in-flight frame, for live inspection.
    #[must_use]
    pub fn current_frame(&self) -> Option<&PhaseNode> {
        self.current.as_ref()
    }

    /// Retained completed frames, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &PhaseNode> {
        self.history.iter()
    }

    #[must_use]
    pub fn frames_recorded(&self) -> u64 {
        self.frames_recorded
    }

    #[must_use]
    pub fn frames_evicted(&self) -> u64 {
        self.frames_evicted
    }

    #[must_use]
    pub fn open_depth(&self) -> usize {
        self.open_path.len()
    }

    /// Current frame generation; bumped at every `begin_frame`.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pops that arrived after a frame boundary had closed their node.
    #[must_use]
    pub fn stale_pops(&self) -> u64 {
        self.stale_pops
    }

    /// Per-phase totals accumulated since the last dump.
    #[must_use]
    pub fn totals(&self) -> &HashMap<&'static str, PhaseTotals> {
        &self.totals
    }

    /// Log and reset the per-phase totals every `dump_every` frames.
    fn maybe_dump_instrumentation(&mut self, now: TimestampUs) {
        if self.dump_every == 0 || self.frames_recorded % self.dump_every != 0 {
            return;
        }
        let elapsed = match self.last_dump_ts.replace(now) {
            Some(prev) => now.since(prev),
            None => return,
        };
        if elapsed.0 == 0 || self.totals.is_empty() {
            self.totals.clear();
            return;
        }

        let mut lines: Vec<String> = self
            .totals
            .iter()
            .map(|(name, t)| {
                let percent = t.total.0 * 100 / elapsed.0;
                format!("{name}: {} ({percent}%) in {} calls", t.total, t.calls)
            })
            .collect();
        lines.sort_unstable();
        info!("instrumentation over {elapsed}: {}", lines.join("; "));
        self.totals.clear();
    }
}
