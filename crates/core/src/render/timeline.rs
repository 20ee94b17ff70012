//! Timeline rendering: every process on its own line, oldest first

use super::text::process_line;
use super::{RenderOptions, Styler};
use crate::models::{ProcessRecord, KERNEL_PID};
use std::collections::HashSet;

/// Records sorted by start time. Ties keep collection order.
///
/// A PID that appears more than once is listed once, using its first record,
/// matching the record the tree builders keep.
pub fn timeline_order(records: &[ProcessRecord]) -> Vec<&ProcessRecord> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<_> = records
        .iter()
        .filter(|r| r.pid != KERNEL_PID)
        .filter(|r| seen.insert(r.pid))
        .collect();
    ordered.sort_by_key(|r| r.start_time);
    ordered
}

/// Render the timeline as newline-terminated text.
///
/// No tree is involved, so no evidence label is shown.
pub fn render_timeline(
    records: &[ProcessRecord],
    options: &RenderOptions,
    styler: &dyn Styler,
) -> String {
    let styler = options.styler(styler);
    let mut out = String::new();
    for record in timeline_order(records) {
        out.push_str(&process_line(
            &record.path,
            record.pid,
            record.start_time,
            None,
            options,
            styler,
        ));
        out.push('\n');
    }
    out
}
