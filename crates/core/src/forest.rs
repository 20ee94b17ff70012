//! The assembled, read-only process forest

use crate::models::{Node, NodeId};

/// Arena of nodes rooted at the root service manager.
///
/// Nodes that were never attached stay in the arena but are not reachable
/// from [`Forest::root`]; traversals only ever follow child edges.
#[derive(Debug, Clone)]
pub struct Forest {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Forest {
    pub(crate) fn new(nodes: Vec<Node>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Nodes reachable from the root, in pre-order, with their depth
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            forest: self,
            stack: vec![(self.root, 0)],
        }
    }

    /// PIDs of every real process reachable from the root, in pre-order
    #[cfg(test)]
    pub(crate) fn reachable_pids(&self) -> Vec<u32> {
        self.preorder()
            .filter_map(|(id, _)| self.node(id).identity.pid())
            .collect()
    }

    /// PIDs of real processes present in the arena but unreachable from the root
    pub fn detached_pids(&self) -> Vec<u32> {
        let mut reachable = vec![false; self.nodes.len()];
        for (id, _) in self.preorder() {
            reachable[id.0] = true;
        }
        self.nodes
            .iter()
            .enumerate()
            .filter(|(index, _)| !reachable[*index])
            .filter_map(|(_, node)| node.identity.pid())
            .collect()
    }

    /// Reachable node for a live PID
    pub fn find_pid(&self, pid: u32) -> Option<NodeId> {
        self.preorder()
            .map(|(id, _)| id)
            .find(|id| self.node(*id).identity.pid() == Some(pid))
    }

    /// Size of the arena, attached or not
    pub(crate) fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes reachable from the root
    pub fn node_count(&self) -> usize {
        self.preorder().count()
    }
}

/// Pre-order iterator over a [`Forest`]
pub struct Preorder<'a> {
    forest: &'a Forest,
    stack: Vec<(NodeId, usize)>,
}

impl Iterator for Preorder<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        for child in self.forest.children(id).iter().rev() {
            self.stack.push((*child, depth + 1));
        }
        Some((id, depth))
    }
}

#[cfg(test)]
mod tests {
    use crate::models::ProcessRecord;
    use crate::registry::NodeRegistry;
    use time::OffsetDateTime;

    fn record(pid: u32, ppid: u32) -> ProcessRecord {
        ProcessRecord::new(pid, ppid, pid, format!("/bin/p{}", pid), OffsetDateTime::UNIX_EPOCH)
    }

    #[test]
    fn test_preorder_follows_discovery_order() {
        let records = [record(1, 0), record(10, 1), record(11, 10), record(20, 1)];
        let mut registry = NodeRegistry::build_from(&records);
        let root = registry.root().unwrap();
        let ten = registry.lookup(10).unwrap();
        let eleven = registry.lookup(11).unwrap();
        let twenty = registry.lookup(20).unwrap();
        registry.attach(root, ten);
        registry.attach(ten, eleven);
        registry.attach(root, twenty);

        let forest = registry.into_forest().unwrap();
        let order: Vec<_> = forest
            .preorder()
            .map(|(id, depth)| (forest.node(id).identity.pid().unwrap(), depth))
            .collect();
        assert_eq!(order, vec![(1, 0), (10, 1), (11, 2), (20, 1)]);
        assert_eq!(forest.node_count(), 4);
        assert_eq!(forest.children(ten), &[eleven]);
    }

    #[test]
    fn test_detached_pids_reports_unattached_processes() {
        let records = [record(1, 0), record(10, 1), record(30, 99)];
        let mut registry = NodeRegistry::build_from(&records);
        let root = registry.root().unwrap();
        let ten = registry.lookup(10).unwrap();
        registry.attach(root, ten);

        let forest = registry.into_forest().unwrap();
        assert_eq!(forest.reachable_pids(), vec![1, 10]);
        assert_eq!(forest.detached_pids(), vec![30]);
        assert!(forest.find_pid(30).is_none());
        assert!(forest.find_pid(10).is_some());
    }
}
