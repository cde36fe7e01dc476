//! The tagged-variant node type: kind-based polymorphism realized as
//! `Node { common, kind }` rather than a flat struct with kind-gated
//! optional fields (the shape an earlier `Container` enum used, with one
//! variant per kind and duplicated fields across variants).

use petgraph::graph::NodeIndex;

use crate::backend::{OutputId, SurfaceHandle};
use crate::geometry::Rect;
use crate::tree::ordered::OrderedList;

/// Stable identifier for a node. Backed by a `petgraph` node index;
/// `petgraph::stable_graph::StableGraph` guarantees a removed index is never
/// handed back out, so a stale `NodeId` is safe to hold and will simply
/// fail to resolve rather than aliasing a different, later node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) NodeIndex<u32>);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

/// The tagged kind of a node, computed from `NodeData`'s discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Root,
    Output,
    Workspace,
    Container,
    View,
}

impl Kind {
    /// Whether a node of `self` kind may parent a node of `other` kind.
    pub fn can_have_child(self, other: Kind) -> bool {
        use Kind::*;
        match self {
            Root => other == Output,
            Output => other == Workspace,
            Workspace => other == Container || other == View,
            Container => other == Container || other == View,
            View => false,
        }
    }
}

/// How a parent arranges its children. Only meaningful on `Workspace` and
/// `Container` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    None,
    Horiz,
    Vert,
    Tabbed,
    Stacked,
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Layout::None => "none",
            Layout::Horiz => "splith",
            Layout::Vert => "splitv",
            Layout::Tabbed => "tabbed",
            Layout::Stacked => "stacked",
        })
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    Root,
    Output {
        backend_id: OutputId,
        scale: f64,
    },
    Workspace,
    Container,
    View {
        surface: SurfaceHandle,
        desired_w: i32,
        desired_h: i32,
        app_id: Option<String>,
        title: Option<String>,
    },
}

impl NodeData {
    pub fn kind(&self) -> Kind {
        match self {
            NodeData::Root => Kind::Root,
            NodeData::Output { .. } => Kind::Output,
            NodeData::Workspace => Kind::Workspace,
            NodeData::Container => Kind::Container,
            NodeData::View { .. } => Kind::View,
        }
    }
}

/// A node in the container tree. `common` fields are carried by every kind;
/// `data` carries the kind-specific payload.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: Option<String>,
    pub rect: Rect,
    pub layout: Layout,
    pub weight: f64,
    pub parent: Option<NodeId>,
    pub children: OrderedList<NodeId>,
    /// `Some` only for `Workspace` nodes.
    pub floating: Option<OrderedList<NodeId>>,
    pub focused_child: Option<NodeId>,
    pub visible: bool,
    pub is_floating: bool,
    pub is_fullscreen: bool,
    pub gaps_inner: u32,
    pub gaps_outer: u32,
    /// The rectangle a `Tabbed`/`Stacked` parent reserved for its tab strip
    /// or title bar, reported for hit-testing.
    pub band_rect: Option<Rect>,
    pub data: NodeData,
}

impl Node {
    pub fn kind(&self) -> Kind {
        self.data.kind()
    }

    pub(crate) fn new(id: NodeId, data: NodeData) -> Node {
        let floating = matches!(data, NodeData::Workspace).then(OrderedList::new);
        Node {
            id,
            name: None,
            rect: Rect::default(),
            layout: Layout::None,
            weight: 1.0,
            parent: None,
            children: OrderedList::new(),
            floating,
            focused_child: None,
            visible: false,
            is_floating: false,
            is_fullscreen: false,
            gaps_inner: 0,
            gaps_outer: 0,
            band_rect: None,
            data,
        }
    }

    /// The view's surface handle, if this is a `View`.
    pub fn surface_handle(&self) -> Option<SurfaceHandle> {
        match &self.data {
            NodeData::View { surface, .. } => Some(*surface),
            _ => None,
        }
    }
}
