//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tick-scope",
    about = "Run a synthetic game loop under the frame profiler",
    after_help = "\
EXAMPLES:
    tick-scope --frames 600                     Profile 600 synthetic frames to the log
    tick-scope --output profile.txt             Write the text report to a file
    tick-scope --chrome-trace trace.json        Also export retained frames for Perfetto"
)]
pub struct Args {
    /// Number of synthetic frames to run
    #[arg(long, default_value = "300")]
    pub frames: u32,

    /// Sampling frequency in Hz
    #[arg(long, default_value = "100")]
    pub frequency: u32,

    /// Write the text report to this file (defaults to the log)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Export retained frame trees as Chrome Trace JSON
    #[arg(long, value_name = "FILE")]
    pub chrome_trace: Option<PathBuf>,

    /// Use a timer thread instead of the SIGPROF interrupt
    #[arg(long)]
    pub thread_timer: bool,

    /// Print a one-line sampling summary every N frames (0 = never)
    #[arg(long, default_value = "0")]
    pub summary_every: u32,
}
