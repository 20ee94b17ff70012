//! lineage-core: true-parent process tree reconstruction
//!
//! This crate contains the OS-agnostic part of lineage: the records a
//! collector produces, the true-parent resolution rules, forest assembly and
//! rendering (tree, flat, timeline, JSON).
//!
//! # Modules
//!
//! - [`models`] - Process records, nodes, identities and evidence labels
//! - [`registry`] - Node arena and lookup indexes used while building
//! - [`resolver`] - The true-parent decision rules
//! - [`exec`] - Image-replacement detection
//! - [`builder`] - True and standard forest assembly
//! - [`forest`] - The assembled, read-only forest
//! - [`render`] - Output formatters
//! - [`submitted_by`] - launchd descriptor parsing
//! - [`source`], [`snapshot`] - Record sources and JSON snapshots
//!
//! # Example
//!
//! ```
//! use lineage_core::{build_true_tree, render, BuildOptions, ProcessRecord, RenderOptions};
//! use time::OffsetDateTime;
//!
//! let records = vec![
//!     ProcessRecord::new(1, 0, 1, "/sbin/launchd", OffsetDateTime::UNIX_EPOCH),
//!     ProcessRecord::new(80, 1, 80, "/usr/sbin/sshd", OffsetDateTime::UNIX_EPOCH),
//! ];
//! let built = build_true_tree(&records, &BuildOptions::default()).unwrap();
//! let text = render::render_forest(&built.forest, &RenderOptions::default(), &render::PlainStyler);
//! assert_eq!(text, "/sbin/launchd    1\n┗╸/usr/sbin/sshd    80\n");
//! ```

pub mod builder;
pub mod error;
pub mod exec;
pub mod forest;
pub mod models;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod snapshot;
pub mod source;
pub mod submitted_by;

// Re-export commonly used types at crate root
pub use builder::{
    build_standard_tree, build_tree, build_true_tree, BuildOptions, BuildStats, BuiltTree, TreeMode,
};
pub use error::{LineageError, LineageResult};
pub use forest::Forest;
pub use models::{
    Connection, DisplayClass, Evidence, Identity, Node, NodeId, ProcessRecord, Protocol,
    SyntheticKind, TcpState, KERNEL_PID, ROOT_PID,
};
pub use render::{RenderOptions, StyleClass, Styler};
pub use source::{CollectFailure, Collection, ProcessRecordSource};
pub use snapshot::{Snapshot, SnapshotSource};
