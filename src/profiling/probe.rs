//! Scoped timing probes
//!
//! A `Probe` marks entry and exit of one named phase: construction opens
//! a node under the innermost open node of the current frame, drop
//! closes it. Normal scope exit keeps the nesting balanced; dropping
//! probes out of nesting order is a programmer error that poisons the
//! whole context (see [`ProfilerContext`]). A probe that outlives its
//! frame is closed at the boundary instead, and its eventual drop is a
//! counted no-op.
//!
//! While the profiler is disabled or poisoned, probes are inert: no
//! clock read beyond the enabled check, no allocation, no node.

use crate::profiling::context::ProfilerContext;

/// RAII guard timing one named phase.
///
/// Construct with a string literal; the name is the phase identity used
/// for aggregation.
#[must_use = "a probe measures the scope it lives in; binding it to _ drops it immediately"]
pub struct Probe<'ctx> {
    ctx: &'ctx ProfilerContext,
    name: &'static str,
    /// Frame generation of the opened node; `None` for an inert probe.
    opened: Option<u64>,
}

impl<'ctx> Probe<'ctx> {
    pub fn new(ctx: &'ctx ProfilerContext, name: &'static str) -> Self {
        let opened = ctx.push_phase(name, None);
        Self { ctx, name, opened }
    }

    /// Like [`new`](Self::new), attaching an opaque debug payload to the
    /// node (visible in the exported frame tree).
    pub fn with_payload(
        ctx: &'ctx ProfilerContext,
        name: &'static str,
        payload: impl Into<String>,
    ) -> Self {
        let opened = ctx.push_phase(name, Some(payload.into()));
        Self { ctx, name, opened }
    }

    /// Whether this probe actually opened a node.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.opened.is_some()
    }
}

impl Drop for Probe<'_> {
    fn drop(&mut self) {
        if let Some(generation) = self.opened {
            // A generation older than the recorder's current one means a
            // frame boundary already force-closed the node; the recorder
            // treats that pop as a counted no-op.
            self.ctx.pop_phase(self.name, generation);
        }
    }
}
