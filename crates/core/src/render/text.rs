//! Text rendering of a process forest

use super::{RenderOptions, StyleClass, Styler};
use crate::forest::Forest;
use crate::models::{file_name, Evidence, Identity, Node, NodeId, SyntheticKind};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const BRANCH: &str = "┣╸";
const BRANCH_CONTINUATION: &str = "┃ ";
const CORNER: &str = "┗╸";
const CORNER_CONTINUATION: &str = "  ";
const FIELD_SEPARATOR: &str = "    ";

/// Render the forest as newline-terminated text
pub fn render_forest(forest: &Forest, options: &RenderOptions, styler: &dyn Styler) -> String {
    let mut out = String::new();
    for line in render_lines(forest, options, styler) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Render the forest as one string per display line.
///
/// Pre-order, children in discovery order. In tree mode every child but the
/// last gets a branch connector and a vertical continuation for its subtree;
/// the last gets a corner and blank continuation.
pub fn render_lines(forest: &Forest, options: &RenderOptions, styler: &dyn Styler) -> Vec<String> {
    let styler = options.styler(styler);
    let mut lines = Vec::new();

    // (node, connector for this line, indent inherited by its children)
    let mut stack: Vec<(NodeId, String, String)> =
        vec![(forest.root(), String::new(), String::new())];

    while let Some((id, connector, indent)) = stack.pop() {
        let text = node_text(forest.node(id), options, styler);
        if options.tree && !connector.is_empty() {
            lines.push(format!("{}{}", styler.paint(StyleClass::Connector, &connector), text));
        } else {
            lines.push(text);
        }

        let children = forest.children(id);
        for (index, child) in children.iter().enumerate().rev() {
            let last = index + 1 == children.len();
            let (branch, continuation) = if last {
                (CORNER, CORNER_CONTINUATION)
            } else {
                (BRANCH, BRANCH_CONTINUATION)
            };
            stack.push((
                *child,
                format!("{}{}", indent, branch),
                format!("{}{}", indent, continuation),
            ));
        }
    }

    lines
}

/// Timestamp as shown next to a process: `YYYY-MM-DD HH:MM:SS +0000`
pub fn format_timestamp(timestamp: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] +0000");
    timestamp
        .to_offset(UtcOffset::UTC)
        .format(&format)
        .unwrap_or_else(|_| timestamp.unix_timestamp().to_string())
}

fn node_text(node: &Node, options: &RenderOptions, styler: &dyn Styler) -> String {
    match node.identity {
        Identity::Real(pid) => process_line(
            &node.path,
            pid,
            node.timestamp,
            Some(node.evidence),
            options,
            styler,
        ),
        Identity::Synthetic(SyntheticKind::LaunchOrigin) => {
            styler.paint(StyleClass::LaunchOrigin, &node.path)
        }
        Identity::Synthetic(SyntheticKind::Network) => styler.paint(StyleClass::Network, &node.path),
        Identity::Synthetic(SyntheticKind::ExecMarker) => {
            styler.paint(StyleClass::ExecMarker, shown_path(&node.path, options))
        }
    }
}

/// One process line: path, then the enabled fields
pub(crate) fn process_line(
    path: &str,
    pid: u32,
    timestamp: OffsetDateTime,
    evidence: Option<Evidence>,
    options: &RenderOptions,
    styler: &dyn Styler,
) -> String {
    let path_class = if evidence == Some(Evidence::SubmittedByTerminated) {
        StyleClass::Terminated
    } else {
        StyleClass::ProcessPath
    };
    let mut line = styler.paint(path_class, shown_path(path, options));

    if options.show_pid {
        line.push_str(FIELD_SEPARATOR);
        line.push_str(&styler.paint(StyleClass::Pid, &pid.to_string()));
    }
    if options.show_timestamps {
        line.push_str(FIELD_SEPARATOR);
        line.push_str(&styler.paint(StyleClass::Timestamp, &format_timestamp(timestamp)));
    }
    if let Some(evidence) = evidence.filter(|_| options.show_evidence) {
        line.push_str(FIELD_SEPARATOR);
        line.push_str(&styler.paint(
            StyleClass::Evidence,
            &format!("Acquired parent from -> {}", evidence),
        ));
    }

    line
}

fn shown_path<'a>(path: &'a str, options: &RenderOptions) -> &'a str {
    if options.full_path {
        path
    } else {
        file_name(path)
    }
}
