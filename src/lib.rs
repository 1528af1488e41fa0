//! # tick-scope - Frame Profiler for Game Loops
//!
//! tick-scope is a low-overhead, in-process profiling engine for
//! frame-based applications. It answers two questions cheaply and
//! continuously: how much wall-clock time did each named phase of a
//! frame consume (and how did phases nest), and which embedded-script
//! call frames are eating CPU across many frames.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Host Game Loop (main thread)                │
//! │  begin_frame() once per tick · Probe guards in nested scopes    │
//! └───────────────┬─────────────────────────────┬───────────────────┘
//!                 ▼                             ▼
//! ┌───────────────────────────┐   ┌─────────────────────────────────┐
//! │     Frame Recorder        │   │     Script Stack (lock-free)    │
//! │  per-frame phase tree     │   │  published by the scripting     │
//! │  bounded history ring     │   │  engine, read by the sampler    │
//! └───────────────┬───────────┘   └───────────────┬─────────────────┘
//!                 │                               │ SIGPROF / timer tick
//!                 │               ┌───────────────▼─────────────────┐
//!                 │               │     Sampler (interrupt ctx)     │
//!                 │               │  preallocated slots, counters,  │
//!                 │               │  no locks, no allocation        │
//!                 │               └───────────────┬─────────────────┘
//!                 ▼                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Aggregator                                │
//! │  inclusive/self phase times · leaf + cumulative sample counts   │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │         Export: text report · Chrome Trace JSON                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`profiling`]: the two collection paths and their shared state
//!   - `clock`, `node`, `probe`, `frame_recorder`: synchronous RAII
//!     instrumentation building one tree per frame
//!   - `script_stack`, `sampler`, `timer_source`: the asynchronous
//!     statistical sampler and its tick delivery
//!   - `context`: lifecycle (`init`/`shutdown`), configuration,
//!     poison-on-misuse
//! - [`analysis`]: reduction of trees and samples into sorted
//!   percentage breakdowns
//! - [`export`]: plain-text report and Chrome Trace JSON
//! - [`interner`]: string → `SymbolId` table backing sample identities
//! - [`domain`]: core types (`ScriptFrame`, `SymbolId`, durations) and
//!   errors
//! - [`cli`]: argument parsing for the demo binary
//!
//! ## Concurrency Model
//!
//! One logical main thread owns all instrumentation state. The only
//! true concurrency is the sampling tick, which may preempt the main
//! thread at any instant; it reads the script stack and writes its own
//! preallocated buffer through atomics, and the main thread pauses it
//! around any read of that buffer. Nothing on the interrupt path
//! allocates, locks, logs or blocks.
//!
//! ## Typical Usage
//!
//! ```no_run
//! use tick_scope::profiling::{Probe, ProfilerConfig, ProfilerContext};
//! use tick_scope::export::ReportSink;
//!
//! let mut ctx = ProfilerContext::init(ProfilerConfig::with_output(
//!     ReportSink::File("profile.txt".into()),
//! ));
//! loop {
//!     ctx.begin_frame(false);
//!     {
//!         let _process = Probe::new(&ctx, "process");
//!         // game logic, scripting...
//!     }
//!     {
//!         let _draw = Probe::new(&ctx, "draw");
//!         // rendering...
//!     }
//!     # break;
//! }
//! ctx.shutdown(); // aggregates and writes the report
//! ```

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod interner;
pub mod profiling;
