//! Periodic sampling sources
//!
//! The sampler itself is platform-independent; what differs is how the
//! periodic tick is delivered. [`SamplingSource`] abstracts that:
//!
//! - [`ItimerSource`] (unix): `setitimer(ITIMER_PROF)` delivers SIGPROF
//!   on CPU time, and the signal handler runs the tick on whatever
//!   thread the kernel picked — hence the sampler's main-thread check.
//! - [`ThreadTimerSource`] (portable): a dedicated thread ticks on wall
//!   time and reads the script stack from outside, which the lock-free
//!   stack layout makes just as safe.
//!
//! Both drive the process-wide sampler and script stack because a signal
//! handler cannot capture context.

#![allow(unsafe_code)] // sigaction/setitimer require unsafe

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::warn;

use crate::domain::ProfilerError;
use crate::profiling::sampler::sampler;
use crate::profiling::script_stack::script_stack;

/// Default sampling frequency, matching the classic profiler tick of
/// one sample every 10 ms.
pub const DEFAULT_FREQUENCY_HZ: u32 = 100;

/// A capability that delivers periodic sampling ticks.
///
/// `uninstall` must guarantee that no further ticks run after it
/// returns (synchronous disarm).
pub trait SamplingSource: Send {
    fn install(&mut self, frequency_hz: u32) -> Result<(), ProfilerError>;
    fn uninstall(&mut self);
}

fn tick_period(frequency_hz: u32) -> Duration {
    let hz = frequency_hz.max(1);
    Duration::from_micros(u64::from(1_000_000 / hz.min(1_000_000)))
}

// ---------------------------------------------------------------------------
// SIGPROF / setitimer
// ---------------------------------------------------------------------------

#[cfg(unix)]
extern "C" fn sigprof_handler(_sig: libc::c_int) {
    // Signal-handler context: the tick body is allocation- and lock-free
    // by construction, and SIGPROF is masked during its own handler.
    sampler().tick(script_stack());
}

/// SIGPROF-based source using the POSIX interval timer.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct ItimerSource {
    installed: bool,
}

#[cfg(unix)]
impl ItimerSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(unix)]
impl SamplingSource for ItimerSource {
    fn install(&mut self, frequency_hz: u32) -> Result<(), ProfilerError> {
        if self.installed {
            return Err(ProfilerError::AlreadyInstalled);
        }

        unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = sigprof_handler as *const () as libc::sighandler_t;
            sa.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&mut sa.sa_mask);
            if libc::sigaction(libc::SIGPROF, &sa, std::ptr::null_mut()) < 0 {
                return Err(ProfilerError::TimerInstall(format!(
                    "sigaction(SIGPROF) failed: {}",
                    std::io::Error::last_os_error()
                )));
            }

            let period = tick_period(frequency_hz);
            #[allow(clippy::cast_possible_wrap)]
            let interval = libc::timeval {
                tv_sec: period.as_secs() as libc::time_t,
                tv_usec: libc::suseconds_t::from(period.subsec_micros() as i32),
            };
            let timer = libc::itimerval { it_interval: interval, it_value: interval };
            if libc::setitimer(libc::ITIMER_PROF, &timer, std::ptr::null_mut()) < 0 {
                return Err(ProfilerError::TimerInstall(format!(
                    "setitimer(ITIMER_PROF) failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
        }

        self.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        if !self.installed {
            return;
        }
        unsafe {
            let timer: libc::itimerval = std::mem::zeroed();
            libc::setitimer(libc::ITIMER_PROF, &timer, std::ptr::null_mut());
        }
        // The handler stays installed, gated by the sampler's pause
        // flag: restoring SIG_DFL with one tick in flight would
        // terminate the process (SIGPROF's default disposition). Pause
        // here so a signal already pending when the timer died is inert.
        sampler().pause();
        self.installed = false;
    }
}

#[cfg(unix)]
impl Drop for ItimerSource {
    fn drop(&mut self) {
        self.uninstall();
    }
}

// ---------------------------------------------------------------------------
// Portable thread timer
// ---------------------------------------------------------------------------

/// Wall-clock timer thread, for platforms without `setitimer` or when
/// signal delivery is undesirable.
#[derive(Debug, Default)]
pub struct ThreadTimerSource {
    worker: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl ThreadTimerSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SamplingSource for ThreadTimerSource {
    fn install(&mut self, frequency_hz: u32) -> Result<(), ProfilerError> {
        if self.worker.is_some() {
            return Err(ProfilerError::AlreadyInstalled);
        }
        let period = tick_period(frequency_hz);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("tick-scope-sampler".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    std::thread::sleep(period);
                    sampler().tick(script_stack());
                }
            })
            .map_err(|e| ProfilerError::TimerInstall(format!("failed to spawn timer thread: {e}")))?;
        self.worker = Some((stop, handle));
        Ok(())
    }

    fn uninstall(&mut self) {
        if let Some((stop, handle)) = self.worker.take() {
            stop.store(true, Ordering::Release);
            if handle.join().is_err() {
                warn!("sampling timer thread panicked during shutdown");
            }
        }
    }
}

impl Drop for ThreadTimerSource {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Which tick-delivery mechanism to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// SIGPROF interrupt on unix; falls back to the thread timer
    /// elsewhere.
    #[default]
    Interrupt,
    /// Dedicated timer thread on every platform.
    ThreadTimer,
}

/// Construct the source for `kind` on this platform.
#[must_use]
pub fn make_source(kind: SourceKind) -> Box<dyn SamplingSource> {
    match kind {
        #[cfg(unix)]
        SourceKind::Interrupt => Box::new(ItimerSource::new()),
        #[cfg(not(unix))]
        SourceKind::Interrupt => Box::new(ThreadTimerSource::new()),
        SourceKind::ThreadTimer => Box::new(ThreadTimerSource::new()),
    }
}
