//! # tick-scope - Demo Entry Point
//!
//! Runs a synthetic game loop under the profiler: nested probes for the
//! usual frame phases, a scripted section that publishes call frames on
//! the script stack, and a report (plus optional Chrome trace) written
//! at shutdown. Useful as a smoke test and as reference usage of the
//! library.

use std::fs::File;
use std::io::BufWriter;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use tick_scope::cli::Args;
use tick_scope::domain::{FrameKind, ScriptFrame};
use tick_scope::export::{export_chrome_trace, ReportSink};
use tick_scope::interner;
use tick_scope::profiling::{
    script_stack, Probe, ProfilerConfig, ProfilerContext, ScriptScope, SourceKind,
};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_ERROR
        }
    });
}

fn run() -> Result<()> {
    let args = Args::parse();

    let sink = match args.output {
        Some(ref path) => ReportSink::File(path.clone()),
        None => ReportSink::Log,
    };
    let mut config = ProfilerConfig::with_output(sink);
    config.frequency_hz = args.frequency;
    if args.thread_timer {
        config.source = SourceKind::ThreadTimer;
    }

    let mut ctx = ProfilerContext::init(config);
    if let Some(err) = ctx.install_error() {
        info!("running without sampling: {err}");
    }

    run_synthetic_loop(&ctx, args.frames, args.summary_every);

    if let Some(ref path) = args.chrome_trace {
        let file = File::create(path)
            .with_context(|| format!("Failed to create trace file {}", path.display()))?;
        ctx.with_recorder(|rec| export_chrome_trace(rec.history(), BufWriter::new(file)))
            .with_context(|| format!("Failed to export Chrome trace to {}", path.display()))?;
        info!("chrome trace written to {}", path.display());
    }

    ctx.shutdown();
    Ok(())
}

/// A caricature of a game loop, busy enough for the sampler to see.
fn run_synthetic_loop(ctx: &ProfilerContext, frames: u32, summary_every: u32) {
    let stack = script_stack();
    let on_update = ScriptFrame::new(interner::intern("demo_object:on_update"), FrameKind::Commands);
    let eval_expr = ScriptFrame::new(interner::intern("demo_object:eval_expr"), FrameKind::Expression);

    for n in 0..frames {
        ctx.begin_frame(false);

        {
            let _process = Probe::new(ctx, "process");
            {
                let _physics = Probe::new(ctx, "physics");
                spin_for(Duration::from_micros(300));
            }
            {
                let _script = Probe::with_payload(ctx, "script", format!("frame {n}"));
                let _update = ScriptScope::enter(stack, on_update);
                spin_for(Duration::from_micros(200));
                {
                    let _eval = ScriptScope::enter(stack, eval_expr);
                    spin_for(Duration::from_micros(700));
                }
            }
        }
        {
            let _draw = Probe::new(ctx, "draw");
            spin_for(Duration::from_micros(500));
        }

        if summary_every > 0 && n > 0 && n % summary_every == 0 {
            if let Some(line) = ctx.frame_summary() {
                info!("{line}");
            }
        }
    }
}

/// Burn CPU so ITIMER_PROF (which counts CPU time, not wall time)
/// actually advances.
fn spin_for(duration: Duration) {
    let start = std::time::Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
