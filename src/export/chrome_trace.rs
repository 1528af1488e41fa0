//! Chrome Trace Event Format export
//!
//! Serializes the retained frame trees as "X" (complete) events for
//! timeline visualization in Perfetto, Speedscope or chrome://tracing.
//! Spec: <https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview>

use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::ReportError;
use crate::profiling::node::PhaseNode;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChromeTraceEvent {
    /// Event name (the phase name)
    name: String,
    /// Category for filtering/coloring
    cat: String,
    /// Phase: "X" = complete event with a duration
    ph: String,
    /// Timestamp in microseconds
    ts: u64,
    /// Duration in microseconds
    dur: u64,
    /// Process ID
    pid: u32,
    /// Thread ID
    tid: u32,
    /// Optional arguments (metadata)
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<HashMap<String, JsonValue>>,
}

#[derive(Debug, Serialize)]
struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<ChromeTraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: String,
}

fn push_node_events(node: &PhaseNode, events: &mut Vec<ChromeTraceEvent>) {
    let args = node.payload.as_ref().map(|payload| {
        let mut map = HashMap::new();
        map.insert("payload".to_string(), JsonValue::String(payload.clone()));
        map
    });
    events.push(ChromeTraceEvent {
        name: node.name.to_string(),
        cat: "phase".to_string(),
        ph: "X".to_string(),
        ts: node.begin_us.0,
        dur: node.duration_us().0,
        pid: 1,
        tid: 1,
        args,
    });
    for child in &node.children {
        push_node_events(child, events);
    }
}

/// Write the retained frames as a Chrome Trace JSON document.
///
/// Only closed intervals are meaningful; an open node (end of an
/// in-flight frame) exports with zero duration.
pub fn export_chrome_trace<'a>(
    frames: impl IntoIterator<Item = &'a PhaseNode>,
    writer: impl Write,
) -> Result<(), ReportError> {
    let mut events = Vec::new();
    for frame in frames {
        push_node_events(frame, &mut events);
    }
    let trace = ChromeTrace { trace_events: events, display_time_unit: "ms".to_string() };
    serde_json::to_writer(writer, &trace)?;
    Ok(())
}
