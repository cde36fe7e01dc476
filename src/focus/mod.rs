//! The focus model: a per-seat focus stack plus directional navigation,
//! generalized from a pair of free functions (`move_focus_recurse`,
//! `focus_on_next_container`) that used to walk a globally-owned tree, and
//! from sway's notion of an "inactive" focus recall stack kept per
//! workspace.

use crate::backend::{Backend, Direction};
use crate::error::{Error, Result};
use crate::tree::{ContainerTree, Kind, Layout, NodeId};

/// Bounded recency stack of focused nodes for one seat. The head is the
/// current focus; the rest is the recall order used when the current focus
/// is destroyed or its workspace loses visibility.
#[derive(Default)]
pub struct FocusStack {
    stack: Vec<NodeId>,
}

impl FocusStack {
    pub fn new() -> FocusStack {
        FocusStack::default()
    }

    pub fn current(&self) -> Option<NodeId> {
        self.stack.last().copied()
    }

    /// Moves `node` to the top of the stack, inserting it if absent.
    pub fn push(&mut self, node: NodeId) {
        self.stack.retain(|&n| n != node);
        self.stack.push(node);
    }

    /// Drops `node` from the recall history entirely (it was destroyed).
    pub fn forget(&mut self, node: NodeId) {
        self.stack.retain(|&n| n != node);
    }

    /// The most recently focused node that isn't `node` itself, used to
    /// recall a prior focus after `node` stops being focusable.
    pub fn previous(&self, excluding: NodeId) -> Option<NodeId> {
        self.stack.iter().rev().find(|&&n| n != excluding).copied()
    }

    /// The most recent entry that isn't `excluding` and satisfies
    /// `predicate`, searched from the top (most recent) down.
    fn most_recent_matching<F: Fn(NodeId) -> bool>(
        &self,
        excluding: NodeId,
        predicate: F,
    ) -> Option<NodeId> {
        self.stack
            .iter()
            .rev()
            .find(|&&n| n != excluding && predicate(n))
            .copied()
    }
}

pub struct FocusManager {
    stacks: std::collections::HashMap<u32, FocusStack>,
}

impl FocusManager {
    pub fn new() -> FocusManager {
        FocusManager {
            stacks: std::collections::HashMap::new(),
        }
    }

    fn stack_mut(&mut self, seat: u32) -> &mut FocusStack {
        self.stacks.entry(seat).or_default()
    }

    pub fn get_focus(&self, seat: u32) -> Option<NodeId> {
        self.stacks.get(&seat).and_then(|s| s.current())
    }

    /// The node that would regain focus if `subtree`'s most recent focus
    /// target (`excluding`) stopped being focusable right now: the most
    /// recently focused entry in `seat`'s stack whose node is `subtree`
    /// itself or a descendant of it, falling back to `subtree` when no such
    /// entry exists (or the whole seat has never focused anything).
    pub fn get_focus_inactive(
        &self,
        tree: &ContainerTree,
        seat: u32,
        subtree: NodeId,
        excluding: NodeId,
    ) -> NodeId {
        self.stacks
            .get(&seat)
            .and_then(|s| {
                s.most_recent_matching(excluding, |n| tree.contains(n) && is_within_subtree(tree, n, subtree))
            })
            .unwrap_or(subtree)
    }

    /// Sets `seat`'s focus to `node`, walking up to mark every ancestor's
    /// `focused_child` along the path so rendering (tabbed/stacked
    /// visibility) and subsequent `get_focus_inactive` calls agree with the
    /// new focus. Every node on that path (other than Root/Output) is
    /// registered in the focus stack, not just `node` itself, so a later
    /// subtree-scoped recall can land on an intermediate container even if
    /// it was never directly the seat's focus.
    pub fn set_focus(
        &mut self,
        tree: &mut ContainerTree,
        backend: &mut dyn Backend,
        seat: u32,
        node: NodeId,
    ) -> Result<()> {
        if !tree.contains(node) {
            return Err(Error::TreeInvariant(format!("{node} is not in the tree")));
        }
        if let Some(previous) = self.get_focus(seat) {
            if previous != node {
                if let Some(surface) = tree.get(previous).and_then(|n| n.surface_handle()) {
                    backend.set_activated(surface, false);
                }
            }
        }

        let mut chain = Vec::new();
        let mut cur = node;
        loop {
            chain.push(cur);
            match tree.get(cur).and_then(|n| n.parent) {
                Some(parent) => {
                    tree.get_mut(parent)
                        .ok_or_else(|| Error::TreeInvariant(format!("{parent} missing from arena")))?
                        .focused_child = Some(cur);
                    cur = parent;
                }
                None => break,
            }
        }
        tree.refresh_visibility(tree.root());

        // Push root-ward first so `node` ends up on top, i.e. the most
        // recent entry, matching the "head is the current focus" contract.
        for &n in chain.iter().rev() {
            if !matches!(tree.get(n).map(|x| x.kind()), Some(Kind::Root) | Some(Kind::Output)) {
                self.stack_mut(seat).push(n);
            }
        }

        if let Some(surface) = tree.get(node).and_then(|n| n.surface_handle()) {
            backend.set_activated(surface, true);
            backend.send_keyboard_enter(surface);
        }
        Ok(())
    }

    /// Removes `node` from every seat's recall history; called when a node
    /// is destroyed.
    pub fn forget(&mut self, node: NodeId) {
        for stack in self.stacks.values_mut() {
            stack.forget(node);
        }
    }

    /// Finds the focus target in `direction` from `node`: first try a
    /// sibling within the nearest ancestor whose layout matches the
    /// direction's axis; failing that, cross to the next output in that
    /// direction (if `wrap` is false, an edge on the last sibling with no
    /// adjacent output returns `None`; wrapping revisits the first/last
    /// sibling instead).
    pub fn directional(
        &self,
        tree: &ContainerTree,
        backend: &dyn Backend,
        node: NodeId,
        direction: Direction,
        wrap: bool,
    ) -> Option<NodeId> {
        if let Some(target) = sibling_in_direction(tree, node, direction, wrap) {
            return Some(target);
        }
        let output = tree.output_of(node)?;
        let backend_id = match tree.get(output)?.data {
            crate::tree::NodeData::Output { backend_id, .. } => backend_id,
            _ => return None,
        };
        match backend.adjacent_output(backend_id, direction) {
            Some(adjacent) => {
                let target_output = tree.output_by_backend_id(adjacent)?;
                focus_target_of_output(tree, target_output)
            }
            None if wrap => {
                // No output further in `direction`: wrap to the extreme
                // output on the opposite edge, which by insertion order is
                // the root's first child going right/down, or last child
                // going left/up.
                let root = tree.root();
                let outputs = tree.get(root)?.children.as_slice();
                let wrapped = match direction {
                    Direction::Right | Direction::Down => outputs.first().copied(),
                    Direction::Left | Direction::Up => outputs.last().copied(),
                }?;
                if wrapped == output {
                    return None;
                }
                focus_target_of_output(tree, wrapped)
            }
            None => None,
        }
    }
}

impl Default for FocusManager {
    fn default() -> Self {
        Self::new()
    }
}

fn axis_matches(layout: Layout, direction: Direction) -> bool {
    match direction {
        Direction::Left | Direction::Right => layout == Layout::Horiz,
        Direction::Up | Direction::Down => layout == Layout::Vert,
    }
}

fn step_is_forward(direction: Direction) -> bool {
    matches!(direction, Direction::Right | Direction::Down)
}

fn sibling_in_direction(
    tree: &ContainerTree,
    node: NodeId,
    direction: Direction,
    wrap: bool,
) -> Option<NodeId> {
    let mut cur = node;
    loop {
        let parent = tree.get(cur)?.parent?;
        let parent_node = tree.get(parent)?;
        if parent_node.kind() == Kind::Root || parent_node.kind() == Kind::Output {
            return None;
        }
        let matches_axis = axis_matches(parent_node.layout, direction)
            || matches!(parent_node.layout, Layout::Tabbed | Layout::Stacked);
        if matches_axis {
            let siblings = parent_node.children.as_slice();
            let idx = siblings.iter().position(|&s| s == cur)?;
            let forward = step_is_forward(direction);
            let next_idx = if forward { idx + 1 } else { idx.checked_sub(1) };
            match next_idx {
                Some(i) if i < siblings.len() => return deepest_focused(tree, siblings[i]),
                _ if wrap && !siblings.is_empty() => {
                    let target = if forward { siblings[0] } else { siblings[siblings.len() - 1] };
                    return deepest_focused(tree, target);
                }
                _ => {}
            }
        }
        cur = parent;
    }
}

fn focus_target_of_output(tree: &ContainerTree, output: NodeId) -> Option<NodeId> {
    let ws = *tree.get(output)?.focused_child.as_ref().unwrap_or(&output);
    let ws = if tree.get(ws)?.kind() == Kind::Workspace {
        ws
    } else {
        tree.descendant_of_kind(output, Kind::Workspace)?
    };
    deepest_focused(tree, ws)
}

fn deepest_focused(tree: &ContainerTree, node: NodeId) -> Option<NodeId> {
    match tree.get(node)?.focused_child {
        Some(child) => deepest_focused(tree, child),
        None => Some(node),
    }
}

/// Whether `node` is `subtree` itself or a descendant of it.
fn is_within_subtree(tree: &ContainerTree, node: NodeId, subtree: NodeId) -> bool {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if n == subtree {
            return true;
        }
        cur = tree.get(n).and_then(|x| x.parent);
    }
    false
}

/// Whether the pointer should warp to the newly focused view, per
/// `original_source/sway/input/cursor.c`: only when warping is enabled in
/// config, the target is a tiled (non-floating) view, and the pointer
/// isn't already inside the view's output.
pub fn should_warp(
    warping_enabled: bool,
    target_is_floating: bool,
    pointer_already_in_output: bool,
) -> bool {
    warping_enabled && !target_is_floating && !pointer_already_in_output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{test_support::StubBackend, OutputId, SurfaceHandle};
    use crate::geometry::Rect;

    fn setup() -> (ContainerTree, StubBackend, NodeId) {
        let mut tree = ContainerTree::new();
        let output = tree.create_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
        let ws = tree.create_workspace(output, "1").unwrap();
        (tree, StubBackend::new(), ws)
    }

    #[test]
    fn set_focus_marks_ancestors_and_activates_surface() {
        let (mut tree, mut backend, ws) = setup();
        let view = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws, view).unwrap();
        let mut focus = FocusManager::new();
        focus.set_focus(&mut tree, &mut backend, 0, view).unwrap();
        assert_eq!(focus.get_focus(0), Some(view));
        assert_eq!(tree.get(ws).unwrap().focused_child, Some(view));
        assert!(backend.calls.contains(&crate::backend::test_support::Call::SetActivated(
            SurfaceHandle(1),
            true
        )));
    }

    #[test]
    fn get_focus_inactive_recalls_previous_within_subtree() {
        let (mut tree, mut backend, ws) = setup();
        let a = tree.create_view(SurfaceHandle(1));
        let b = tree.create_view(SurfaceHandle(2));
        tree.add_child(ws, a).unwrap();
        tree.add_child(ws, b).unwrap();
        let mut focus = FocusManager::new();
        focus.set_focus(&mut tree, &mut backend, 0, a).unwrap();
        focus.set_focus(&mut tree, &mut backend, 0, b).unwrap();
        assert_eq!(focus.get_focus_inactive(&tree, 0, ws, b), a);
    }

    #[test]
    fn get_focus_inactive_falls_back_to_subtree_root() {
        let (mut tree, mut backend, ws) = setup();
        let a = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws, a).unwrap();
        let mut focus = FocusManager::new();
        focus.set_focus(&mut tree, &mut backend, 0, a).unwrap();
        // `a` is the only thing ever focused and it's the one being
        // excluded, so recall has nothing within `ws` to land on.
        assert_eq!(focus.get_focus_inactive(&tree, 0, ws, a), ws);
    }

    #[test]
    fn get_focus_inactive_ignores_entries_outside_subtree() {
        let (mut tree, mut backend, ws) = setup();
        let output = tree.output_of(ws).unwrap();
        let other_ws = tree.create_workspace(output, "2").unwrap();
        let a = tree.create_view(SurfaceHandle(1));
        let b = tree.create_view(SurfaceHandle(2));
        tree.add_child(ws, a).unwrap();
        tree.add_child(other_ws, b).unwrap();
        let mut focus = FocusManager::new();
        focus.set_focus(&mut tree, &mut backend, 0, a).unwrap();
        focus.set_focus(&mut tree, &mut backend, 0, b).unwrap();
        // `b` lives in `other_ws`, not `ws`, so recalling within `ws`
        // (excluding nothing in particular) must not jump there.
        assert_eq!(focus.get_focus_inactive(&tree, 0, ws, b), a);
    }

    #[test]
    fn directional_moves_between_horiz_siblings() {
        let (mut tree, mut backend, ws) = setup();
        tree.get_mut(ws).unwrap().layout = Layout::Horiz;
        let a = tree.create_view(SurfaceHandle(1));
        let b = tree.create_view(SurfaceHandle(2));
        tree.add_child(ws, a).unwrap();
        tree.add_child(ws, b).unwrap();
        let mut focus = FocusManager::new();
        focus.set_focus(&mut tree, &mut backend, 0, a).unwrap();
        let target = focus.directional(&tree, &backend, a, Direction::Right, false);
        assert_eq!(target, Some(b));
    }

    #[test]
    fn directional_without_wrap_stops_at_edge() {
        let (mut tree, mut backend, ws) = setup();
        tree.get_mut(ws).unwrap().layout = Layout::Horiz;
        let a = tree.create_view(SurfaceHandle(1));
        let b = tree.create_view(SurfaceHandle(2));
        tree.add_child(ws, a).unwrap();
        tree.add_child(ws, b).unwrap();
        let mut focus = FocusManager::new();
        focus.set_focus(&mut tree, &mut backend, 0, b).unwrap();
        let target = focus.directional(&tree, &backend, b, Direction::Right, false);
        assert_eq!(target, None);
    }

    #[test]
    fn warp_predicate_respects_all_three_gates() {
        assert!(should_warp(true, false, false));
        assert!(!should_warp(false, false, false));
        assert!(!should_warp(true, true, false));
        assert!(!should_warp(true, false, true));
    }
}
