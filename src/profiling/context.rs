//! The profiler context: ownership, lifecycle, configuration
//!
//! All process-wide instrumentation state — the enabled flag, the frame
//! recorder, the poison state and the installed sampling source — lives
//! in one owned [`ProfilerContext`] value with an explicit
//! init/shutdown bracket, passed by reference to probes and the host
//! loop. The only deliberately global pieces are the sampler and script
//! stack, because a signal handler cannot capture context.
//!
//! ## Lifecycle
//!
//! `init` with no output sink is the zero-overhead baseline: probes and
//! frame boundaries are no-ops behind a single branch. With a sink, the
//! sample buffer is armed, the periodic source installed, and `shutdown`
//! (also run on drop) disarms everything, aggregates, and writes the
//! report. A failed timer install degrades the profiler to
//! instrumentation-only and never aborts the host.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use log::{error, info, warn};

use crate::analysis::aggregator::{aggregate_phases, aggregate_samples};
use crate::domain::{ProfilerError, SymbolId};
use crate::export::report::{render_report, write_report, ReportMeta, ReportSink};
use crate::interner;
use crate::profiling::clock;
use crate::profiling::frame_recorder::FrameRecorder;
use crate::profiling::sampler::{sampler, DEFAULT_SAMPLE_CAPACITY};
use crate::profiling::script_stack::script_stack;
use crate::profiling::timer_source::{
    make_source, SamplingSource, SourceKind, DEFAULT_FREQUENCY_HZ,
};

/// Frames retained in the history ring by default.
pub const DEFAULT_FRAME_HISTORY: usize = 16;

/// Frames between instrumentation-totals dumps by default.
pub const DEFAULT_DUMP_EVERY: u64 = 50;

#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Where the final report goes. `None` disables the profiler
    /// entirely (the zero-overhead baseline).
    pub output: Option<ReportSink>,
    /// Sampling tick frequency.
    pub frequency_hz: u32,
    /// Sample-buffer capacity; reached capacity drops further samples.
    pub sample_capacity: usize,
    /// Completed frames retained for aggregation and export.
    pub frame_history: usize,
    /// Log the per-phase totals every this many frames; 0 disables.
    pub dump_every: u64,
    /// Tick delivery mechanism.
    pub source: SourceKind,
    /// Arm and install the process-wide sampler. Disable to run
    /// instrumentation without touching global sampling state.
    pub sampling: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            output: None,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            sample_capacity: DEFAULT_SAMPLE_CAPACITY,
            frame_history: DEFAULT_FRAME_HISTORY,
            dump_every: DEFAULT_DUMP_EVERY,
            source: SourceKind::default(),
            sampling: true,
        }
    }
}

impl ProfilerConfig {
    /// The zero-overhead baseline: no collection at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Full profiling with the report going to `sink`.
    #[must_use]
    pub fn with_output(sink: ReportSink) -> Self {
        Self { output: Some(sink), ..Self::default() }
    }

    /// Probes and frame recording only; the process-wide sampler is
    /// left alone. The report goes to the log.
    #[must_use]
    pub fn instrumentation_only() -> Self {
        Self { output: Some(ReportSink::Log), sampling: false, dump_every: 0, ..Self::default() }
    }
}

pub struct ProfilerContext {
    enabled: bool,
    config: ProfilerConfig,
    recorder: RefCell<FrameRecorder>,
    poisoned: RefCell<Option<ProfilerError>>,
    source: Option<Box<dyn SamplingSource>>,
    install_error: Option<ProfilerError>,
    shut_down: bool,
    /// (stored, empty) counters at the last `frame_summary` call.
    summary_cursor: Cell<(u64, u64)>,
}

impl ProfilerContext {
    /// Bring the profiler up. Never fails from the host's point of
    /// view: a sampler or timer problem is recorded in
    /// [`install_error`](Self::install_error), logged, and the context
    /// degrades to instrumentation-only.
    #[must_use]
    pub fn init(config: ProfilerConfig) -> Self {
        let enabled = config.output.is_some();
        let recorder = FrameRecorder::new(config.frame_history.max(1), config.dump_every);

        let mut ctx = Self {
            enabled,
            recorder: RefCell::new(recorder),
            poisoned: RefCell::new(None),
            source: None,
            install_error: None,
            shut_down: false,
            summary_cursor: Cell::new((0, 0)),
            config,
        };

        if !enabled {
            return ctx;
        }

        if ctx.config.sampling {
            match ctx.arm_sampling() {
                Ok(source) => {
                    ctx.source = Some(source);
                    info!(
                        "profiling armed: {} Hz, {} sample slots, {} retained frames",
                        ctx.config.frequency_hz, ctx.config.sample_capacity, ctx.config.frame_history
                    );
                }
                Err(e) => {
                    warn!("sampling unavailable, continuing with instrumentation only: {e}");
                    ctx.install_error = Some(e);
                }
            }
        }

        ctx
    }

    fn arm_sampling(&self) -> Result<Box<dyn SamplingSource>, ProfilerError> {
        let require_main_thread = self.config.source == SourceKind::Interrupt;
        sampler().arm(self.config.sample_capacity, require_main_thread)?;
        sampler().register_main_thread();

        let mut source = make_source(self.config.source);
        source.install(self.config.frequency_hz)?;
        sampler().resume();
        Ok(source)
    }

    /// Whether collection is currently happening.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.shut_down && self.poisoned.borrow().is_none()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The sampler/timer failure that degraded this context, if any.
    #[must_use]
    pub fn install_error(&self) -> Option<&ProfilerError> {
        self.install_error.as_ref()
    }

    /// The fatal nesting error that poisoned this context, if any.
    #[must_use]
    pub fn poison_error(&self) -> Option<String> {
        self.poisoned.borrow().as_ref().map(ToString::to_string)
    }

    /// Frame boundary: close and retain the previous frame, open the
    /// next. Call exactly once per host tick, before any probes.
    pub fn begin_frame(&self, paused: bool) {
        if !self.is_active() {
            return;
        }
        self.recorder.borrow_mut().begin_frame_at(paused, clock::now_us());
    }

    /// Read-only access to the recorder (last frame, history, totals).
    pub fn with_recorder<R>(&self, f: impl FnOnce(&FrameRecorder) -> R) -> R {
        f(&self.recorder.borrow())
    }

    /// Open a phase, returning the frame generation the probe must pass
    /// back on drop.
    pub(crate) fn push_phase(&self, name: &'static str, payload: Option<String>) -> Option<u64> {
        if !self.is_active() {
            return None;
        }
        let ts = clock::now_us();
        self.recorder.borrow_mut().push_phase_at(name, payload, ts)
    }

    pub(crate) fn pop_phase(&self, name: &'static str, generation: u64) {
        if !self.is_active() {
            // Poisoned or shut down after this probe armed; the tree is
            // frozen, so the close is dropped too.
            return;
        }
        let ts = clock::now_us();
        let result = self.recorder.borrow_mut().pop_phase_at(name, generation, ts);
        if let Err(e) = result {
            self.poison(e);
        }
    }

    /// Kill collection after a fatal programmer error. Everything after
    /// this is a no-op; the diagnostic stays retrievable.
    fn poison(&self, err: ProfilerError) {
        error!("instrumentation disabled: {err}");
        sampler().pause();
        *self.poisoned.borrow_mut() = Some(err);
    }

    /// One-line sampling summary since the previous call, in the vein
    /// of a per-second on-screen profile line. Pauses the handler
    /// around the read. `None` while not actively sampling.
    #[must_use]
    pub fn frame_summary(&self) -> Option<String> {
        if !self.is_active() || self.source.is_none() {
            return None;
        }
        let snapshot = sampler().snapshot();
        let (last_stored, last_empty) = self.summary_cursor.get();
        self.summary_cursor.set((snapshot.stored, snapshot.empty));

        let start =
            usize::try_from(last_stored).unwrap_or(snapshot.stacks.len()).min(snapshot.stacks.len());
        let window = &snapshot.stacks[start..];
        let empty = snapshot.empty.saturating_sub(last_empty);

        let mut counts: HashMap<SymbolId, u64> = HashMap::new();
        for stack in window {
            if let Some(leaf) = stack.first() {
                *counts.entry(leaf.symbol).or_insert(0) += 1;
            }
        }
        let mut sorted: Vec<(u64, SymbolId)> = counts.into_iter().map(|(s, c)| (c, s)).collect();
        sorted.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut line = format!(
            "profile: {} ticks, {} engine-core, {} in script",
            window.len() as u64 + empty,
            empty,
            window.len()
        );
        for (count, symbol) in sorted {
            line.push_str(&format!(" {} x{count}", interner::resolve_or_unknown(symbol)));
        }
        Some(line)
    }

    /// Disarm sampling, aggregate everything, and write the report to
    /// the configured sink. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if !self.enabled || self.shut_down {
            return;
        }
        self.shut_down = true;

        let armed = self.source.is_some();
        if let Some(mut source) = self.source.take() {
            source.uninstall();
        }
        sampler().pause();

        let snapshot = sampler().snapshot();
        if armed {
            // Release the sample buffer so a later `init` can arm again.
            sampler().disarm();
        }
        let samples = aggregate_samples(&snapshot);
        let recorder = self.recorder.borrow();
        let phases = aggregate_phases(recorder.history());
        let meta = ReportMeta {
            frames_recorded: recorder.frames_recorded(),
            frames_retained: recorder.history().count() as u64,
            frames_evicted: recorder.frames_evicted(),
            script_stack_dropped: script_stack().dropped(),
            poisoned: self.poisoned.borrow().as_ref().map(ToString::to_string),
        };
        drop(recorder);

        let text = render_report(&phases, &samples, &meta);
        let sink = self.config.output.clone().unwrap_or(ReportSink::Log);
        match write_report(&sink, &text) {
            Ok(()) => info!("profile report written to {sink}"),
            Err(e) => error!("failed to write profile report: {e}"),
        }
    }
}

impl Drop for ProfilerContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
