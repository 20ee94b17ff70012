//! Forest assembly
//!
//! [`build_true_tree`] attaches every process under its resolved true
//! parent, inserting exec markers, launch-origin nodes and socket leaves.
//! [`build_standard_tree`] is the kernel's view: every process under its
//! raw parent PID, nothing synthesized. Diffing the two is the point.

use crate::error::{LineageError, LineageResult};
use crate::exec::detect_exec;
use crate::forest::Forest;
use crate::models::{Evidence, Node, NodeId, ProcessRecord, SyntheticKind, KERNEL_PID, ROOT_PID};
use crate::registry::NodeRegistry;
use crate::resolver::{resolve, ParentTarget};
use std::collections::HashSet;

/// Which builder to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeMode {
    /// True-parent resolution with synthetic nodes
    #[default]
    TrueTree,
    /// Raw parent PIDs only
    Standard,
}

/// Options for the true-parent builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Add a leaf per network connection under its process
    pub network: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { network: true }
    }
}

/// Counters collected while assembling a forest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Processes attached under a parent
    pub attached: usize,
    /// Processes whose parent could not be located
    pub dropped: usize,
    /// Real processes not reachable from the root after assembly
    pub unreachable: usize,
    pub exec_markers: usize,
    pub launch_origins: usize,
    pub network_leaves: usize,
}

/// An assembled forest and how it was built
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub forest: Forest,
    pub stats: BuildStats,
}

/// Build with the selected mode
pub fn build_tree(
    records: &[ProcessRecord],
    mode: TreeMode,
    options: &BuildOptions,
) -> LineageResult<BuiltTree> {
    match mode {
        TreeMode::TrueTree => build_true_tree(records, options),
        TreeMode::Standard => build_standard_tree(records),
    }
}

/// Build the forest from resolved true parents
pub fn build_true_tree(
    records: &[ProcessRecord],
    options: &BuildOptions,
) -> LineageResult<BuiltTree> {
    let mut registry = NodeRegistry::build_from(records);
    if registry.root().is_none() {
        return Err(LineageError::RootMissing { pid: ROOT_PID });
    }

    let mut stats = BuildStats::default();
    for (record, node) in non_root_nodes(records, &registry) {
        let attach_as = match detect_exec(record) {
            Some(marker_path) => {
                let marker = registry.insert_synthetic(Node::synthetic(
                    SyntheticKind::ExecMarker,
                    marker_path,
                    record.start_time,
                    Evidence::RawPpid,
                ));
                registry.attach(marker, node);
                stats.exec_markers += 1;
                marker
            }
            None => node,
        };

        let resolution = resolve(record, &registry);
        {
            let real = registry.node_mut(node);
            real.evidence = resolution.evidence;
            if let Some(note) = &resolution.annotation {
                real.path.push_str(note);
            }
        }
        registry.node_mut(attach_as).evidence = resolution.evidence;

        let parent = match resolution.target {
            ParentTarget::Process(pid) => registry.lookup(pid),
            ParentTarget::LaunchOrigin(path) => registry.lookup_or_create_launch_origin(path),
        };
        attach_or_drop(&mut registry, record, node, parent, attach_as, &mut stats);

        if options.network {
            for connection in &record.connections {
                let leaf = registry.insert_synthetic(Node::synthetic(
                    SyntheticKind::Network,
                    connection.describe(),
                    record.start_time,
                    Evidence::Network,
                ));
                registry.attach(node, leaf);
                stats.network_leaves += 1;
            }
        }
    }
    stats.launch_origins = registry.launch_origin_count();

    finish(registry, stats)
}

/// Build the forest from kernel-reported parent PIDs only
pub fn build_standard_tree(records: &[ProcessRecord]) -> LineageResult<BuiltTree> {
    let mut registry = NodeRegistry::build_from(records);
    if registry.root().is_none() {
        return Err(LineageError::RootMissing { pid: ROOT_PID });
    }

    let mut stats = BuildStats::default();
    for (record, node) in non_root_nodes(records, &registry) {
        let parent = registry.lookup(record.ppid);
        attach_or_drop(&mut registry, record, node, parent, node, &mut stats);
    }

    finish(registry, stats)
}

/// Records to place, in collection order, paired with their nodes.
///
/// Skips the kernel entity, the root and repeated PIDs.
fn non_root_nodes<'a>(
    records: &'a [ProcessRecord],
    registry: &NodeRegistry,
) -> Vec<(&'a ProcessRecord, NodeId)> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| r.pid != KERNEL_PID && !r.is_root())
        .filter(|r| seen.insert(r.pid))
        .filter_map(|r| registry.lookup(r.pid).map(|id| (r, id)))
        .collect()
}

fn attach_or_drop(
    registry: &mut NodeRegistry,
    record: &ProcessRecord,
    node: NodeId,
    parent: Option<NodeId>,
    attach_as: NodeId,
    stats: &mut BuildStats,
) {
    match parent {
        Some(parent) if parent == node => {
            log::debug!("PID {} resolved to itself as parent; dropped", record.pid);
            stats.dropped += 1;
        }
        Some(parent) if registry.attach(parent, attach_as) => stats.attached += 1,
        Some(_) => {
            log::debug!("PID {} could not be attached; dropped", record.pid);
            stats.dropped += 1;
        }
        None => {
            log::debug!(
                "Parent of PID {} ({}) not found in snapshot; dropped",
                record.pid,
                registry.node(node).evidence
            );
            stats.dropped += 1;
        }
    }
}

fn finish(registry: NodeRegistry, mut stats: BuildStats) -> LineageResult<BuiltTree> {
    let forest = registry
        .into_forest()
        .ok_or(LineageError::RootMissing { pid: ROOT_PID })?;

    let unreachable = forest.detached_pids();
    stats.unreachable = unreachable.len();
    if stats.dropped > 0 || !unreachable.is_empty() {
        log::warn!(
            "{} processes dropped (parent not found), {} not reachable from PID {}",
            stats.dropped,
            stats.unreachable,
            ROOT_PID
        );
        log::debug!("Unreachable PIDs: {:?}", unreachable);
    }

    Ok(BuiltTree { forest, stats })
}
