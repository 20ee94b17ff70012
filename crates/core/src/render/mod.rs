//! Output rendering for process forests

pub mod json;
pub mod text;
pub mod timeline;

pub use json::render_json_string;
pub use text::{format_timestamp, render_forest, render_lines};
pub use timeline::{render_timeline, timeline_order};

/// Visual class of a piece of rendered text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleClass {
    /// Tree connectors
    Connector,
    /// Executable path of a live process
    ProcessPath,
    /// Path of a process whose submitter has exited
    Terminated,
    Pid,
    Timestamp,
    Evidence,
    LaunchOrigin,
    Network,
    ExecMarker,
}

/// Applies visual styling to rendered text
pub trait Styler {
    fn paint(&self, class: StyleClass, text: &str) -> String;
}

/// Styler that leaves text untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStyler;

impl Styler for PlainStyler {
    fn paint(&self, _class: StyleClass, text: &str) -> String {
        text.to_string()
    }
}

/// What to show for each line. Built once and passed in explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Use the supplied styler; plain text otherwise
    pub color: bool,
    /// Full executable paths instead of file names
    pub full_path: bool,
    pub show_pid: bool,
    /// Append the evidence label that chose each parent
    pub show_evidence: bool,
    pub show_timestamps: bool,
    /// Box-drawing tree; a flat pre-order listing otherwise
    pub tree: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: false,
            full_path: true,
            show_pid: true,
            show_evidence: false,
            show_timestamps: false,
            tree: true,
        }
    }
}

impl RenderOptions {
    /// The styler to use given the color setting
    pub(crate) fn styler<'a>(&self, styler: &'a dyn Styler) -> &'a dyn Styler {
        if self.color {
            styler
        } else {
            &PlainStyler
        }
    }
}
