//! The container tree: C1 (arena, ordered list) and C2 (tree operations).

pub mod arena;
pub mod container_tree;
pub mod node;
pub mod ordered;

pub use container_tree::ContainerTree;
pub use node::{Kind, Layout, Node, NodeData, NodeId};
pub use ordered::OrderedList;
