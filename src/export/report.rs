//! Plain-text profile report
//!
//! [`render_report`] is a pure function from aggregates to text;
//! writing the text to a file or the log is a separate, fallible step.
//! The report always carries the dropped/overflow counters so a reader
//! can judge how much statistical confidence the numbers deserve.

use std::fmt;
use std::path::PathBuf;

use log::info;

use crate::analysis::aggregator::{PhaseRecord, SampleAggregate, SampleRecord};
use crate::domain::ReportError;

/// Where the shutdown report goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSink {
    /// Write to this path, replacing any existing file.
    File(PathBuf),
    /// Emit through `log::info!`.
    Log,
}

impl fmt::Display for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportSink::File(path) => write!(f, "{}", path.display()),
            ReportSink::Log => write!(f, "log"),
        }
    }
}

/// Collection counters that frame the report's numbers.
#[derive(Debug, Clone, Default)]
pub struct ReportMeta {
    pub frames_recorded: u64,
    pub frames_retained: u64,
    pub frames_evicted: u64,
    pub script_stack_dropped: u64,
    /// Diagnostic of the fatal nesting error, when collection died early.
    pub poisoned: Option<String>,
}

fn percentage(count: u64, total: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

fn push_sample_section(out: &mut String, title: &str, records: &[SampleRecord]) {
    out.push_str(title);
    out.push('\n');
    if records.is_empty() {
        out.push_str("  (no samples)\n");
        return;
    }
    for record in records {
        out.push_str(&format!(
            "  {:5.1}% ({}) {} [{}]\n",
            record.percentage, record.count, record.name, record.frame.kind
        ));
    }
}

/// Format the aggregates into the human-readable report. Pure; the
/// same inputs always render the same text.
#[must_use]
pub fn render_report(
    phases: &[PhaseRecord],
    samples: &SampleAggregate,
    meta: &ReportMeta,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("TOTAL SAMPLES: {}\n", samples.total_samples));
    out.push_str(&format!(
        "{:5.1}% ({}) engine core (no script executing)\n",
        percentage(samples.empty, samples.total_samples),
        samples.empty
    ));
    out.push('\n');

    push_sample_section(&mut out, "SCRIPT SELF TIME:", &samples.self_counts);
    out.push('\n');
    push_sample_section(&mut out, "SCRIPT CUMULATIVE TIME:", &samples.cumulative_counts);
    out.push('\n');

    out.push_str(&format!(
        "PHASES over {} frames ({} retained):\n",
        meta.frames_recorded, meta.frames_retained
    ));
    if phases.is_empty() {
        out.push_str("  (no instrumented frames)\n");
    } else {
        for phase in phases {
            out.push_str(&format!(
                "  {:<20} {:>12} inclusive {:>12} self in {} calls\n",
                phase.name,
                phase.inclusive.to_string(),
                phase.self_time.to_string(),
                phase.calls
            ));
        }
    }
    out.push('\n');

    out.push_str(&format!(
        "DROPPED: sample overflow={}, over-deep stacks={}, script-stack pushes={}, evicted frames={}, off-thread ticks={}\n",
        samples.overflow,
        samples.deep,
        meta.script_stack_dropped,
        meta.frames_evicted,
        samples.wrong_thread
    ));
    if let Some(ref poison) = meta.poisoned {
        out.push_str(&format!("COLLECTION STOPPED EARLY: {poison}\n"));
    }

    out
}

/// Deliver the rendered report to `sink`.
pub fn write_report(sink: &ReportSink, text: &str) -> Result<(), ReportError> {
    match sink {
        ReportSink::File(path) => {
            std::fs::write(path, text).map_err(|source| ReportError::WriteFailed {
                path: path.display().to_string(),
                source,
            })?;
        }
        ReportSink::Log => {
            info!("=== PROFILE REPORT ===\n{text}=== END PROFILE REPORT ===");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DurationUs, FrameKind, ScriptFrame, SymbolId};

    fn sample_aggregate() -> SampleAggregate {
        let frame = ScriptFrame::new(SymbolId(1), FrameKind::Expression);
        let record = SampleRecord {
            frame,
            name: "eval_expr".to_string(),
            count: 600,
            percentage: 60.0,
        };
        SampleAggregate {
            self_counts: vec![record.clone()],
            cumulative_counts: vec![record],
            total_samples: 1000,
            stored: 600,
            empty: 400,
            overflow: 2,
            deep: 1,
            ticks: 1003,
            wrong_thread: 0,
        }
    }

    fn phase_records() -> Vec<PhaseRecord> {
        vec![PhaseRecord {
            name: "draw",
            inclusive: DurationUs(5_000),
            self_time: DurationUs(3_000),
            calls: 60,
        }]
    }

    #[test]
    fn test_report_includes_totals_and_drops() {
        let text = render_report(&phase_records(), &sample_aggregate(), &ReportMeta::default());
        assert!(text.contains("TOTAL SAMPLES: 1000"));
        assert!(text.contains("60.0% (600) eval_expr [EXPR]"));
        assert!(text.contains("40.0% (400) engine core"));
        assert!(text.contains("sample overflow=2"));
        assert!(text.contains("over-deep stacks=1"));
        assert!(text.contains("draw"));
    }

    #[test]
    fn test_report_is_deterministic() {
        let phases = phase_records();
        let samples = sample_aggregate();
        let meta = ReportMeta::default();
        assert_eq!(
            render_report(&phases, &samples, &meta),
            render_report(&phases, &samples, &meta)
        );
    }

    #[test]
    fn test_report_mentions_poisoning() {
        let meta = ReportMeta {
            poisoned: Some("mismatched probe nesting".to_string()),
            ..ReportMeta::default()
        };
        let text = render_report(&[], &sample_aggregate(), &meta);
        assert!(text.contains("COLLECTION STOPPED EARLY"));
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("profile.txt");
        let sink = ReportSink::File(path.clone());
        write_report(&sink, "report body\n").expect("write report");
        assert_eq!(std::fs::read_to_string(path).expect("read back"), "report body\n");
    }

    #[test]
    fn test_write_report_to_unwritable_path_fails() {
        let sink = ReportSink::File(PathBuf::from("/nonexistent/dir/profile.txt"));
        let err = write_report(&sink, "body").unwrap_err();
        assert!(matches!(err, ReportError::WriteFailed { .. }));
    }
}
