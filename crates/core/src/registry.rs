//! Node registry used while the forest is being assembled
//!
//! The registry owns every node in a flat arena and keeps two lookup
//! indexes: live PID -> node and launch descriptor path -> node. Once the
//! build phase is over it is consumed into a read-only [`Forest`] and the
//! indexes are discarded.

use crate::forest::Forest;
use crate::models::{
    Evidence, Node, NodeId, ProcessRecord, SyntheticKind, KERNEL_PID, ROOT_PID,
};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Arena of nodes plus construction-time lookup indexes
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
    attached: Vec<bool>,
    by_pid: HashMap<u32, NodeId>,
    by_plist: HashMap<String, NodeId>,
}

impl NodeRegistry {
    /// Create one node per record, skipping the kernel entity.
    ///
    /// PIDs are expected to be unique; a repeated PID keeps its first record.
    pub fn build_from(records: &[ProcessRecord]) -> Self {
        let mut registry = Self::default();
        for record in records {
            if record.pid == KERNEL_PID {
                continue;
            }
            if registry.by_pid.contains_key(&record.pid) {
                log::warn!("Duplicate record for PID {}; keeping the first", record.pid);
                continue;
            }
            let id = registry.push(Node::process(record));
            registry.by_pid.insert(record.pid, id);
        }
        registry
    }

    /// Node for a live PID
    pub fn lookup(&self, pid: u32) -> Option<NodeId> {
        self.by_pid.get(&pid).copied()
    }

    /// Whether a PID belongs to a process in this snapshot
    pub fn is_live(&self, pid: u32) -> bool {
        self.by_pid.contains_key(&pid)
    }

    /// The root service manager's node, if it was collected
    pub fn root(&self) -> Option<NodeId> {
        self.lookup(ROOT_PID)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Add a node that does not stand for a live process
    pub fn insert_synthetic(&mut self, node: Node) -> NodeId {
        self.push(node)
    }

    /// Find the shared node for a launch descriptor, creating it on first use.
    ///
    /// Paths are compared byte for byte. A new node is attached under the
    /// root straight away. Returns `None` only when there is no root.
    pub fn lookup_or_create_launch_origin(&mut self, path: &str) -> Option<NodeId> {
        if let Some(id) = self.by_plist.get(path) {
            return Some(*id);
        }

        let root = self.root()?;
        let id = self.push(Node::synthetic(
            SyntheticKind::LaunchOrigin,
            path.to_string(),
            OffsetDateTime::UNIX_EPOCH,
            Evidence::LaunchOrigin,
        ));
        self.attach(root, id);
        self.by_plist.insert(path.to_string(), id);
        Some(id)
    }

    /// Number of distinct launch-origin nodes created so far
    pub fn launch_origin_count(&self) -> usize {
        self.by_plist.len()
    }

    /// Append `child` as the next child of `parent`.
    ///
    /// Refuses (returns `false`) to attach a node to itself, to attach the
    /// root, or to attach a node a second time.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || Some(child) == self.root() || self.attached[child.0] {
            return false;
        }
        self.nodes[parent.0].children.push(child);
        self.attached[child.0] = true;
        true
    }

    /// Consume the registry into a forest rooted at PID 1
    pub fn into_forest(self) -> Option<Forest> {
        let root = self.root()?;
        Some(Forest::new(self.nodes, root))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.attached.push(false);
        id
    }
}
