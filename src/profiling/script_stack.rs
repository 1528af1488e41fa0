//! The externally supplied "current call stack"
//!
//! The scripting engine publishes what it is currently executing here,
//! and the sampling interrupt reads it. There is no lock on either side:
//!
//! - the producer appends by writing the frame slot *before* bumping the
//!   depth, and truncates by dropping the depth, so at every instant the
//!   first `depth` slots form a valid prefix of some recent stack;
//! - the sampler copies by raw value and tolerates reading a stale or
//!   partially updated prefix — a rare torn read washes out over many
//!   samples.
//!
//! Only one thread may mutate a given `ScriptStack`; the process-wide
//! instance is meant for the instrumented main thread.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::domain::ScriptFrame;

/// Fixed slot count; pushes past this are counted and dropped.
pub const SCRIPT_STACK_CAPACITY: usize = 64;

pub struct ScriptStack {
    /// Logical depth. May exceed `SCRIPT_STACK_CAPACITY`; only the first
    /// `SCRIPT_STACK_CAPACITY` frames are observable.
    depth: AtomicUsize,
    /// Pushes that arrived with the slots already full.
    dropped: AtomicU64,
    frames: [AtomicU64; SCRIPT_STACK_CAPACITY],
}

impl ScriptStack {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
            frames: [const { AtomicU64::new(0) }; SCRIPT_STACK_CAPACITY],
        }
    }

    /// Append a frame (producer side).
    ///
    /// Returns `false` when the slots are full; the logical depth still
    /// grows so the matching `pop` stays balanced.
    pub fn push(&self, frame: ScriptFrame) -> bool {
        let depth = self.depth.load(Ordering::Relaxed);
        let stored = if depth < SCRIPT_STACK_CAPACITY {
            self.frames[depth].store(frame.pack(), Ordering::Relaxed);
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        };
        self.depth.store(depth + 1, Ordering::Release);
        stored
    }

    /// Remove the innermost frame (producer side). No-op when empty.
    pub fn pop(&self) {
        let depth = self.depth.load(Ordering::Relaxed);
        if depth > 0 {
            self.depth.store(depth - 1, Ordering::Release);
        }
    }

    /// Drop frames down to `depth` (producer side), e.g. when the
    /// scripting engine unwinds several frames at once. No-op when the
    /// stack is already at most that deep.
    pub fn truncate(&self, depth: usize) {
        if self.depth.load(Ordering::Relaxed) > depth {
            self.depth.store(depth, Ordering::Release);
        }
    }

    /// Drop every frame (producer side).
    pub fn clear(&self) {
        self.depth.store(0, Ordering::Release);
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Pushes dropped because the slots were full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the logical depth exceeds the observable slots, i.e. the
    /// innermost frames were dropped and a snapshot would misattribute
    /// them.
    #[must_use]
    pub fn is_overdeep(&self) -> bool {
        self.depth.load(Ordering::Acquire) > SCRIPT_STACK_CAPACITY
    }

    /// Copy up to `out.len()` packed frames, innermost first.
    ///
    /// Interrupt-safe: plain atomic loads, no allocation. Returns the
    /// number of frames written; vacant slots observed mid-update are
    /// skipped. When the logical depth exceeds the slot capacity the
    /// stored frames no longer include the innermost ones, so nothing
    /// is copied at all rather than presenting an outer frame as the
    /// executing leaf.
    pub fn snapshot_into(&self, out: &mut [u64]) -> usize {
        let depth = self.depth.load(Ordering::Acquire);
        if depth > SCRIPT_STACK_CAPACITY {
            return 0;
        }
        let mut written = 0;
        for i in (0..depth).rev() {
            if written == out.len() {
                break;
            }
            let raw = self.frames[i].load(Ordering::Relaxed);
            if raw != 0 {
                out[written] = raw;
                written += 1;
            }
        }
        written
    }
}

impl Default for ScriptStack {
    fn default() -> Self {
        Self::new()
    }
}

static SCRIPT_STACK: ScriptStack = ScriptStack::new();

/// The process-wide script stack the signal handler samples.
#[must_use]
pub fn script_stack() -> &'static ScriptStack {
    &SCRIPT_STACK
}

/// RAII guard that pushes a frame on creation and pops it on drop.
///
/// The ergonomic way for a scripting engine to keep the stack balanced
/// across early returns.
pub struct ScriptScope<'a> {
    stack: &'a ScriptStack,
}

impl<'a> ScriptScope<'a> {
    pub fn enter(stack: &'a ScriptStack, frame: ScriptFrame) -> Self {
        stack.push(frame);
        Self { stack }
    }
}

impl Drop for ScriptScope<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}
