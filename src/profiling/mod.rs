//! Profiling core modules
//!
//! This module contains the two collection paths and the state they
//! share:
//! - Synchronous instrumentation: clock, phase nodes, RAII probes and
//!   the frame recorder building one tree per host tick
//! - Asynchronous sampling: the script stack published by the scripting
//!   engine, the interrupt-driven sampler, and the timer sources that
//!   deliver its ticks
//! - The profiler context owning lifecycle and configuration

pub mod clock;
pub mod context;
pub mod frame_recorder;
pub mod node;
pub mod probe;
pub mod sampler;
pub mod script_stack;
pub mod timer_source;

// Re-export common types
pub use clock::now_us;
pub use context::{ProfilerConfig, ProfilerContext, DEFAULT_DUMP_EVERY, DEFAULT_FRAME_HISTORY};
pub use frame_recorder::{FrameRecorder, PhaseTotals, FRAME_ROOT};
pub use node::PhaseNode;
pub use probe::Probe;
pub use sampler::{
    sampler, SampleSnapshot, Sampler, DEFAULT_SAMPLE_CAPACITY, MAX_SAMPLE_DEPTH,
};
pub use script_stack::{script_stack, ScriptScope, ScriptStack, SCRIPT_STACK_CAPACITY};
pub use timer_source::{
    make_source, SamplingSource, SourceKind, ThreadTimerSource, DEFAULT_FREQUENCY_HZ,
};

#[cfg(unix)]
pub use timer_source::ItimerSource;
