//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a raw counter
//! where a symbol ID is expected, and make function signatures more
//! expressive. `ScriptFrame` additionally defines the packed wire-like
//! representation the sampling interrupt copies by raw value.

use std::fmt;

/// Interned symbol ID
///
/// Identifies a script call-frame (a function, event handler or
/// expression) registered with the [interner](crate::interner). IDs are
/// stable for the lifetime of the process, so a `SymbolId` captured by
/// the sampling interrupt can always be resolved at report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym#{}", self.0)
    }
}

/// Classification of what a script frame was doing when sampled.
///
/// Mirrors the two execution modes of the scripting engine: running
/// pre-compiled command lists versus interpreting expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Executing compiled commands
    Commands,
    /// Evaluating interpreted expressions
    Expression,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Commands => write!(f, "CMD"),
            FrameKind::Expression => write!(f, "EXPR"),
        }
    }
}

/// One script call-frame descriptor, as published on the
/// [`ScriptStack`](crate::profiling::ScriptStack).
///
/// The packed form is a single nonzero `u64` so the sampling interrupt
/// can copy frames with plain atomic loads — no pointers, no reference
/// counts, no allocation:
///
/// ```text
/// bit 63      occupancy marker (raw 0 = vacant slot)
/// bit 32      frame kind (0 = Commands, 1 = Expression)
/// bits 0-31   symbol ID
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptFrame {
    pub symbol: SymbolId,
    pub kind: FrameKind,
}

/// Occupancy marker; guarantees a packed frame is never the vacant value.
const OCCUPIED_BIT: u64 = 1 << 63;
/// Frame-kind bit within the packed representation.
const KIND_BIT: u64 = 1 << 32;

impl ScriptFrame {
    pub fn new(symbol: SymbolId, kind: FrameKind) -> Self {
        Self { symbol, kind }
    }

    /// Pack into the nonzero `u64` representation stored in atomic slots.
    #[must_use]
    pub fn pack(self) -> u64 {
        let kind = match self.kind {
            FrameKind::Commands => 0,
            FrameKind::Expression => KIND_BIT,
        };
        OCCUPIED_BIT | kind | u64::from(self.symbol.0)
    }

    /// Unpack a raw slot value. Returns `None` for the vacant value (0)
    /// or anything else that was never produced by [`pack`](Self::pack).
    #[must_use]
    pub fn unpack(raw: u64) -> Option<Self> {
        if raw & OCCUPIED_BIT == 0 {
            return None;
        }
        let kind = if raw & KIND_BIT == 0 { FrameKind::Commands } else { FrameKind::Expression };
        #[allow(clippy::cast_possible_truncation)]
        let symbol = SymbolId(raw as u32);
        Some(Self { symbol, kind })
    }
}

impl fmt::Display for ScriptFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.kind)
    }
}

/// Timestamp in microseconds since the process clock epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimestampUs(pub u64);

impl TimestampUs {
    /// Elapsed duration since an earlier timestamp (saturating).
    #[must_use]
    pub fn since(self, earlier: TimestampUs) -> DurationUs {
        DurationUs(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for TimestampUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Duration in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DurationUs(pub u64);

impl DurationUs {
    #[must_use]
    pub fn as_micros(self) -> u64 {
        self.0
    }

    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_millis(self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl fmt::Display for DurationUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        if ms >= 1000.0 {
            write!(f, "{:.2}s", self.as_seconds())
        } else if ms >= 1.0 {
            write!(f, "{ms:.2}ms")
        } else {
            write!(f, "{}us", self.0)
        }
    }
}
