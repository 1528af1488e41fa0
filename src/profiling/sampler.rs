//! Statistical sample collection
//!
//! The sampler is a pure state machine over preallocated storage and
//! atomic counters. [`Sampler::tick`] is the body of the periodic
//! interrupt: it runs in signal-handler context and therefore must not
//! allocate, lock, log, or block. All of its storage is armed up front
//! on an ordinary thread; the interrupt only advances indices.
//!
//! ## Who writes what
//!
//! - the interrupt is the only writer of the sample slots and of `len`,
//!   `ticks`, `empty`, `overflow` and `wrong_thread`;
//! - the main thread toggles `paused` around any read of the buffer, so
//!   it never observes a slot mid-write;
//! - neither side ever waits for the other.

#![allow(unsafe_code)] // slot writes/reads go through a raw pointer shared with signal context

use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};

use crate::domain::{ProfilerError, ScriptFrame};
use crate::profiling::script_stack::ScriptStack;

/// Frames retained per sample; deeper stacks are truncated at the
/// innermost end.
pub const MAX_SAMPLE_DEPTH: usize = 32;

/// Default sample-buffer capacity (at 100 Hz, roughly 100 s of profile).
pub const DEFAULT_SAMPLE_CAPACITY: usize = 10_000;

/// One stored sample: a raw-value copy of the script stack, innermost
/// frame first, packed as in [`ScriptFrame::pack`].
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SampleSlot {
    pub depth: u32,
    pub frames: [u64; MAX_SAMPLE_DEPTH],
}

impl SampleSlot {
    const VACANT: SampleSlot = SampleSlot { depth: 0, frames: [0; MAX_SAMPLE_DEPTH] };
}

pub struct Sampler {
    /// Slot storage, armed once; null while unarmed.
    buffer: AtomicPtr<SampleSlot>,
    capacity: AtomicUsize,
    /// Published sample count; slots below this index are immutable.
    len: AtomicUsize,
    /// Ticks that ran the state machine (past the pause/thread gates).
    ticks: AtomicU64,
    /// Ticks that found the script stack empty (engine-core time).
    empty: AtomicU64,
    /// Ticks dropped because the buffer was full.
    overflow: AtomicU64,
    /// Ticks skipped because the script stack overflowed its slots, so
    /// the innermost frames were unobservable.
    deep: AtomicU64,
    /// Deliveries on a thread other than the registered main thread.
    wrong_thread: AtomicU64,
    /// Handler gate; starts paused, toggled around main-thread reads.
    paused: AtomicBool,
    /// Whether `tick` should enforce the main-thread check (signal
    /// delivery can land on any thread; a dedicated timer thread is
    /// exempt).
    require_main_thread: AtomicBool,
    /// Identity of the instrumented thread, as `pthread_self()`.
    #[cfg(unix)]
    main_thread: AtomicU64,
}

impl Sampler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: AtomicPtr::new(std::ptr::null_mut()),
            capacity: AtomicUsize::new(0),
            len: AtomicUsize::new(0),
            ticks: AtomicU64::new(0),
            empty: AtomicU64::new(0),
            overflow: AtomicU64::new(0),
            deep: AtomicU64::new(0),
            wrong_thread: AtomicU64::new(0),
            paused: AtomicBool::new(true),
            require_main_thread: AtomicBool::new(false),
            #[cfg(unix)]
            main_thread: AtomicU64::new(0),
        }
    }

    /// Allocate the slot storage and reset all counters.
    ///
    /// Must happen before the sampling source is installed; the sampler
    /// stays paused until [`resume`](Self::resume).
    pub fn arm(&self, capacity: usize, require_main_thread: bool) -> Result<(), ProfilerError> {
        if !self.buffer.load(Ordering::Acquire).is_null() {
            return Err(ProfilerError::AlreadyInstalled);
        }
        let slots = vec![SampleSlot::VACANT; capacity].into_boxed_slice();
        let ptr = Box::into_raw(slots).cast::<SampleSlot>();
        self.capacity.store(capacity, Ordering::Relaxed);
        self.len.store(0, Ordering::Relaxed);
        self.ticks.store(0, Ordering::Relaxed);
        self.empty.store(0, Ordering::Relaxed);
        self.overflow.store(0, Ordering::Relaxed);
        self.deep.store(0, Ordering::Relaxed);
        self.wrong_thread.store(0, Ordering::Relaxed);
        self.require_main_thread.store(require_main_thread, Ordering::Relaxed);
        self.buffer.store(ptr, Ordering::Release);
        Ok(())
    }

    /// Release the slot storage so a later [`arm`](Self::arm) succeeds.
    ///
    /// The caller must guarantee no tick can still reach the buffer:
    /// the sampling source is uninstalled first (timer thread joined,
    /// or the interval timer zeroed with handler ticks confined to the
    /// calling thread). Pauses the sampler so any later stray tick is
    /// inert. No-op while unarmed.
    pub fn disarm(&self) {
        self.paused.store(true, Ordering::Release);
        let ptr = self.buffer.swap(std::ptr::null_mut(), Ordering::AcqRel);
        if ptr.is_null() {
            return;
        }
        let capacity = self.capacity.load(Ordering::Relaxed);
        self.len.store(0, Ordering::Release);
        self.capacity.store(0, Ordering::Relaxed);
        // Safety: the pointer came from `Box::into_raw` of a boxed
        // slice of exactly `capacity` slots in `arm`, published once;
        // the null swap above means no reader can obtain it again, and
        // the caller guarantees no tick is mid-flight through it.
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, capacity)));
        }
    }

    /// Record the calling thread as the instrumented main thread.
    pub fn register_main_thread(&self) {
        #[cfg(unix)]
        {
            #[allow(clippy::cast_possible_truncation)]
            self.main_thread.store(unsafe { libc::pthread_self() } as u64, Ordering::Relaxed);
        }
    }

    #[cfg(unix)]
    fn on_main_thread(&self) -> bool {
        let caller = unsafe { libc::pthread_self() } as u64;
        caller == self.main_thread.load(Ordering::Relaxed)
    }

    /// Gate the handler off. Safe to call from any ordinary thread.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Let ticks collect samples again.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// One sampling tick. Interrupt-context safe: no allocation, no
    /// locks, no I/O.
    pub fn tick(&self, stack: &ScriptStack) {
        if self.paused.load(Ordering::Acquire) {
            return;
        }
        #[cfg(unix)]
        if self.require_main_thread.load(Ordering::Relaxed) && !self.on_main_thread() {
            self.wrong_thread.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let buffer = self.buffer.load(Ordering::Acquire);
        if buffer.is_null() {
            return;
        }

        self.ticks.fetch_add(1, Ordering::Relaxed);

        let len = self.len.load(Ordering::Relaxed);
        if len == self.capacity.load(Ordering::Relaxed) {
            // Capacity exhaustion is reported, not an error; slot 0 is
            // never overwritten.
            self.overflow.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if stack.is_overdeep() {
            // The stack's slots lost the innermost frames; a snapshot
            // now would present an outer frame as the executing leaf.
            self.deep.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut raw = [0u64; MAX_SAMPLE_DEPTH];
        let depth = stack.snapshot_into(&mut raw);
        if depth == 0 {
            self.empty.fetch_add(1, Ordering::Relaxed);
            return;
        }

        // Safety: `len < capacity` was checked above, the slot at `len`
        // is unpublished (readers only touch slots below `len`), and the
        // interrupt is the only writer of slots and of `len`.
        unsafe {
            let slot = &mut *buffer.add(len);
            #[allow(clippy::cast_possible_truncation)]
            {
                slot.depth = depth as u32;
            }
            slot.frames = raw;
        }
        self.len.store(len + 1, Ordering::Release);
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn stored(&self) -> u64 {
        self.len.load(Ordering::Acquire) as u64
    }

    #[must_use]
    pub fn empty_samples(&self) -> u64 {
        self.empty.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn overflow_samples(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn deep_samples(&self) -> u64 {
        self.deep.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn wrong_thread_ticks(&self) -> u64 {
        self.wrong_thread.load(Ordering::Relaxed)
    }

    /// Copy the stored samples and counters out for aggregation.
    ///
    /// Pauses the handler for the duration of the read and restores the
    /// previous pause state afterwards, so the buffer is never observed
    /// mid-update.
    #[must_use]
    pub fn snapshot(&self) -> SampleSnapshot {
        let was_paused = self.paused.swap(true, Ordering::AcqRel);

        let buffer = self.buffer.load(Ordering::Acquire);
        let len = self.len.load(Ordering::Acquire);
        let mut stacks = Vec::with_capacity(len);
        if !buffer.is_null() {
            for i in 0..len {
                // Safety: slots below `len` are published and immutable,
                // and the handler is paused.
                let slot = unsafe { &*buffer.add(i) };
                let depth = (slot.depth as usize).min(MAX_SAMPLE_DEPTH);
                let frames: Vec<ScriptFrame> =
                    slot.frames[..depth].iter().filter_map(|&raw| ScriptFrame::unpack(raw)).collect();
                stacks.push(frames);
            }
        }

        let snapshot = SampleSnapshot {
            stacks,
            stored: len as u64,
            empty: self.empty.load(Ordering::Relaxed),
            overflow: self.overflow.load(Ordering::Relaxed),
            deep: self.deep.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            wrong_thread: self.wrong_thread.load(Ordering::Relaxed),
        };

        if !was_paused {
            self.paused.store(false, Ordering::Release);
        }
        snapshot
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        // Exclusive ownership: no tick can be in flight through this
        // instance.
        self.disarm();
    }
}

static SAMPLER: Sampler = Sampler::new();

/// The process-wide sampler driven by the installed sampling source.
#[must_use]
pub fn sampler() -> &'static Sampler {
    &SAMPLER
}

/// Everything the aggregator needs: stored stacks (innermost frame
/// first) plus the accounting counters, read under pause.
#[derive(Debug, Clone)]
pub struct SampleSnapshot {
    pub stacks: Vec<Vec<ScriptFrame>>,
    pub stored: u64,
    pub empty: u64,
    pub overflow: u64,
    pub deep: u64,
    pub ticks: u64,
    pub wrong_thread: u64,
}

impl SampleSnapshot {
    /// Denominator for percentage reporting: stored plus empty samples.
    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.stored + self.empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FrameKind, SymbolId};

    fn armed(capacity: usize) -> Sampler {
        let sampler = Sampler::new();
        sampler.arm(capacity, false).expect("arm");
        sampler.resume();
        sampler
    }

    fn frame(id: u32) -> ScriptFrame {
        ScriptFrame::new(SymbolId(id), FrameKind::Commands)
    }

    #[test]
    fn test_paused_sampler_ignores_ticks() {
        let sampler = armed(8);
        sampler.pause();
        let stack = ScriptStack::new();
        stack.push(frame(1));
        sampler.tick(&stack);
        assert_eq!(sampler.ticks(), 0);
        assert_eq!(sampler.stored(), 0);
    }

    #[test]
    fn test_empty_stack_counts_as_empty_sample() {
        let sampler = armed(8);
        let stack = ScriptStack::new();
        for _ in 0..5 {
            sampler.tick(&stack);
        }
        assert_eq!(sampler.empty_samples(), 5);
        assert_eq!(sampler.stored(), 0);
        assert_eq!(sampler.ticks(), 5);
    }

    #[test]
    fn test_sample_stores_stack_innermost_first() {
        let sampler = armed(8);
        let stack = ScriptStack::new();
        stack.push(frame(10));
        stack.push(frame(20));
        sampler.tick(&stack);

        let snapshot = sampler.snapshot();
        assert_eq!(snapshot.stored, 1);
        let ids: Vec<u32> = snapshot.stacks[0].iter().map(|f| f.symbol.0).collect();
        assert_eq!(ids, vec![20, 10]);
    }

    #[test]
    fn test_capacity_boundary_increments_overflow_only() {
        let sampler = armed(3);
        let stack = ScriptStack::new();
        stack.push(frame(7));
        for _ in 0..3 {
            sampler.tick(&stack);
        }
        assert_eq!(sampler.stored(), 3);
        assert_eq!(sampler.overflow_samples(), 0);

        sampler.tick(&stack);
        assert_eq!(sampler.overflow_samples(), 1);
        assert_eq!(sampler.stored(), 3);

        // Slot 0 was not overwritten by the overflowing tick.
        let snapshot = sampler.snapshot();
        assert_eq!(snapshot.stacks[0][0].symbol.0, 7);
    }

    #[test]
    fn test_accounting_invariant_holds() {
        let sampler = armed(4);
        let stack = ScriptStack::new();
        for i in 0..10 {
            if i % 2 == 0 {
                stack.push(frame(i));
                sampler.tick(&stack);
                stack.clear();
            } else {
                sampler.tick(&stack);
            }
        }
        let snapshot = sampler.snapshot();
        assert_eq!(
            snapshot.stored + snapshot.empty + snapshot.overflow + snapshot.deep,
            snapshot.ticks
        );
    }

    #[test]
    fn test_snapshot_restores_running_state() {
        let sampler = armed(4);
        assert!(!sampler.is_paused());
        let _ = sampler.snapshot();
        assert!(!sampler.is_paused());

        sampler.pause();
        let _ = sampler.snapshot();
        assert!(sampler.is_paused());
    }

    #[test]
    fn test_arm_twice_is_rejected() {
        let sampler = armed(4);
        assert!(matches!(sampler.arm(4, false), Err(ProfilerError::AlreadyInstalled)));
    }

    #[test]
    fn test_disarm_allows_rearming() {
        let sampler = armed(4);
        let stack = ScriptStack::new();
        stack.push(frame(1));
        sampler.tick(&stack);
        assert_eq!(sampler.stored(), 1);

        sampler.disarm();
        assert!(sampler.is_paused());
        assert_eq!(sampler.stored(), 0);

        // A fresh arm starts a clean collection.
        sampler.arm(8, false).expect("re-arm after disarm");
        sampler.resume();
        sampler.tick(&stack);
        assert_eq!(sampler.stored(), 1);
        assert_eq!(sampler.ticks(), 1);
    }

    #[test]
    fn test_overdeep_stack_is_skipped_and_counted() {
        use crate::profiling::script_stack::SCRIPT_STACK_CAPACITY;

        let sampler = armed(8);
        let stack = ScriptStack::new();
        for id in 0..SCRIPT_STACK_CAPACITY as u32 + 1 {
            stack.push(frame(id));
        }
        sampler.tick(&stack);

        // The innermost frame was unobservable; nothing may be stored,
        // and in particular no outer frame may pose as the leaf.
        assert_eq!(sampler.stored(), 0);
        assert_eq!(sampler.deep_samples(), 1);
        assert_eq!(sampler.empty_samples(), 0);

        // Unwinding below capacity makes the stack sampleable again.
        stack.pop();
        sampler.tick(&stack);
        assert_eq!(sampler.stored(), 1);

        let snapshot = sampler.snapshot();
        assert_eq!(
            snapshot.stored + snapshot.empty + snapshot.overflow + snapshot.deep,
            snapshot.ticks
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_off_thread_ticks_are_gated() {
        let sampler = Sampler::new();
        sampler.arm(8, true).expect("arm");
        sampler.register_main_thread();
        sampler.resume();

        let stack = ScriptStack::new();
        stack.push(frame(1));
        sampler.tick(&stack);
        assert_eq!(sampler.stored(), 1);

        std::thread::scope(|s| {
            s.spawn(|| {
                sampler.tick(&stack);
            });
        });
        assert_eq!(sampler.wrong_thread_ticks(), 1);
        assert_eq!(sampler.stored(), 1);
    }

    #[test]
    fn test_deep_stack_keeps_innermost_frames() {
        let sampler = armed(2);
        let stack = ScriptStack::new();
        for id in 0..MAX_SAMPLE_DEPTH as u32 + 4 {
            stack.push(frame(id));
        }
        sampler.tick(&stack);
        let snapshot = sampler.snapshot();
        let frames = &snapshot.stacks[0];
        assert_eq!(frames.len(), MAX_SAMPLE_DEPTH);
        // Innermost frame survives truncation.
        assert_eq!(frames[0].symbol.0, MAX_SAMPLE_DEPTH as u32 + 3);
    }
}
