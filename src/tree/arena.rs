//! Slotted node storage, generalized from an inner-tree abstraction that
//! kept containers in a `petgraph::stable_graph::StableGraph` keyed by
//! `NodeIndex` plus a `Uuid -> NodeIndex` lookup map. That `Uuid`
//! indirection isn't needed here (`NodeId` *is* the stable index) since
//! nothing outside this crate needs a process-independent identifier, but
//! the storage strategy is the same: a stable graph guarantees a held
//! index either resolves to a live node or is simply absent, never a
//! dangling pointer into freed memory.

use petgraph::stable_graph::StableGraph;
use petgraph::Directed;

use crate::tree::node::{Node, NodeData, NodeId};

pub struct Arena {
    graph: StableGraph<Node, (), Directed, u32>,
}

impl Arena {
    pub fn new() -> Arena {
        Arena {
            graph: StableGraph::default(),
        }
    }

    /// Allocates a new node with the given payload and returns its id.
    /// The node starts detached (no parent, no children).
    pub fn insert(&mut self, data: NodeData) -> NodeId {
        let ix = self.graph.add_node(Node::new(NodeId(0.into()), data));
        let id = NodeId(ix);
        self.graph[ix].id = id;
        id
    }

    /// Removes and returns a node. Any edges `petgraph` held for it are
    /// dropped along with it; we don't use edges for relationships (those
    /// are plain fields on `Node`), so this is purely storage reclamation.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.graph.remove_node(id.0)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id.0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.graph.node_weight(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.graph.node_weight_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }
}

impl std::ops::Index<NodeId> for Arena {
    type Output = Node;
    fn index(&self, id: NodeId) -> &Node {
        self.get(id)
            .unwrap_or_else(|| panic!("dangling NodeId {id} used to index Arena"))
    }
}

impl std::ops::IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("dangling NodeId {id} used to index Arena"))
    }
}
