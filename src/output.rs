//! Rendering of analysis results for the CLI
//!
//! Text output is a short per-tick report; JSON output is one pretty-printed
//! [`AnalysisResult`] per tick.

use crate::analysis::AnalysisResult;
use std::fmt::Write as _;

/// Human-readable report of one tick
pub fn render_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let info = &result.memory_info;
    let state = &result.quad_tree_state;

    let _ = writeln!(out, "=== memlens scan #{} ===", result.tick);
    let _ = writeln!(
        out,
        "memory: total={} used={} free={} processes={} regions={}",
        format_bytes(info.total),
        format_bytes(info.used),
        format_bytes(info.free),
        info.processes.len(),
        info.regions.len()
    );
    let _ = writeln!(
        out,
        "quad-tree: nodes={} stored={} dropped={}",
        state.nodes.len(),
        state.stored,
        state.dropped
    );

    let _ = writeln!(out, "\nPatterns ({}):", result.patterns.len());
    if result.patterns.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for pattern in &result.patterns {
        let _ = writeln!(
            out,
            "  {:<10} confidence={:.3} regions={:<6} period={:<4} entropy={:.3} correlation={:.3} [{:?}]",
            pattern.pattern_type.as_str(),
            pattern.confidence,
            pattern.regions.len(),
            pattern.metadata.period,
            pattern.metadata.entropy,
            pattern.metadata.correlation,
            pattern.source
        );
    }

    let _ = writeln!(out, "\nAnomalies ({}):", result.anomalies.len());
    if result.anomalies.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for anomaly in &result.anomalies {
        let _ = writeln!(
            out,
            "  [{}] {} confidence={:.3} regions={}: {}",
            anomaly.severity.as_str(),
            anomaly.anomaly_type.as_str(),
            anomaly.confidence,
            anomaly.affected_regions.len(),
            anomaly.description
        );
    }

    if !result.file_changes.is_empty() {
        let _ = writeln!(out, "\nFile changes ({}):", result.file_changes.len());
        for change in &result.file_changes {
            let _ = writeln!(out, "  {:?} {}", change.kind, change.path.display());
        }
    }

    out
}

/// Pretty-printed JSON of one tick
pub fn render_json(result: &AnalysisResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}
