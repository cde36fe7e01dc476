//! The layout engine: turns the tree's logical structure into pixel
//! rectangles and pushes them to the backend. Grounded on a
//! `get_actual_geometry`/`set_geometry` pattern of mutating a node's own
//! `geometry` field and letting a recursive "arrange" walk push it down,
//! and on `original_source/sway/layout.c`'s `arrange_windows`, whose
//! proportional-split algorithm (including its zero/negative-weight guard
//! and exact-remainder handling on the last child) this module reproduces
//! faithfully.

use crate::backend::Backend;
use crate::error::Result;
use crate::geometry::Rect;
use crate::tree::{ContainerTree, Kind, Layout, NodeId};

/// Height, in pixels, of the tab/title band `Tabbed`/`Stacked` containers
/// reserve at the top of their content rect.
pub const BAND_HEIGHT: i32 = 24;

/// Recomputes geometry for `node` and its whole subtree and pushes the
/// result to `backend`. Call with `tree.root()` after any mutation that can
/// change sizes (insert, remove, resize, fullscreen toggle, layout change).
pub fn arrange(tree: &mut ContainerTree, backend: &mut dyn Backend, node: NodeId) -> Result<()> {
    let rect = tree
        .get(node)
        .ok_or_else(|| crate::error::Error::TreeInvariant(format!("{node} missing from arena")))?
        .rect;
    arrange_with_rect(tree, backend, node, rect)
}

fn arrange_with_rect(
    tree: &mut ContainerTree,
    backend: &mut dyn Backend,
    node: NodeId,
    rect: Rect,
) -> Result<()> {
    tree.get_mut(node)
        .ok_or_else(|| crate::error::Error::TreeInvariant(format!("{node} missing from arena")))?
        .rect = rect;

    match kind_of(tree, node)? {
        Kind::Root => arrange_root(tree, backend, node, rect),
        Kind::Output => arrange_output(tree, backend, node, rect),
        Kind::Workspace => arrange_workspace(tree, backend, node, rect),
        Kind::Container => arrange_container(tree, backend, node, rect),
        Kind::View => arrange_view(tree, backend, node, rect),
    }
}

fn kind_of(tree: &ContainerTree, node: NodeId) -> Result<Kind> {
    Ok(tree
        .get(node)
        .ok_or_else(|| crate::error::Error::TreeInvariant(format!("{node} missing from arena")))?
        .kind())
}

fn arrange_root(tree: &mut ContainerTree, backend: &mut dyn Backend, root: NodeId, _rect: Rect) -> Result<()> {
    let outputs: Vec<NodeId> = tree[root].children.iter().copied().collect();
    for output in outputs {
        let output_rect = tree[output].rect;
        arrange_with_rect(tree, backend, output, output_rect)?;
    }
    Ok(())
}

fn arrange_output(
    tree: &mut ContainerTree,
    backend: &mut dyn Backend,
    output: NodeId,
    rect: Rect,
) -> Result<()> {
    let workspaces: Vec<NodeId> = tree[output].children.iter().copied().collect();
    for ws in workspaces {
        arrange_with_rect(tree, backend, ws, rect)?;
    }
    Ok(())
}

fn arrange_workspace(
    tree: &mut ContainerTree,
    backend: &mut dyn Backend,
    ws: NodeId,
    rect: Rect,
) -> Result<()> {
    let gaps_outer = tree[ws].gaps_outer as i32;
    let content = rect.shrink(gaps_outer);
    arrange_children(tree, backend, ws, content)?;

    let floating: Vec<NodeId> = tree[ws]
        .floating
        .as_ref()
        .map(|f| f.iter().copied().collect())
        .unwrap_or_default();
    for view in floating {
        let own = tree[view].rect.clamp_within(rect);
        arrange_with_rect(tree, backend, view, own)?;
    }
    Ok(())
}

fn arrange_container(
    tree: &mut ContainerTree,
    backend: &mut dyn Backend,
    container: NodeId,
    rect: Rect,
) -> Result<()> {
    let gaps_inner = tree[container].gaps_inner as i32;
    let content = rect.shrink(gaps_inner);
    arrange_children(tree, backend, container, content)
}

fn arrange_view(
    tree: &mut ContainerTree,
    backend: &mut dyn Backend,
    view: NodeId,
    rect: Rect,
) -> Result<()> {
    let effective_rect = if tree[view].is_fullscreen {
        fullscreen_rect(tree, view).unwrap_or(rect)
    } else {
        rect
    };
    tree[view].rect = effective_rect;
    if let Some(surface) = tree[view].surface_handle() {
        backend.set_geometry(surface, effective_rect);
    }
    Ok(())
}

/// A fullscreen view takes over its whole output, regardless of where it
/// sits in the tree.
fn fullscreen_rect(tree: &ContainerTree, view: NodeId) -> Option<Rect> {
    let output = tree.output_of(view)?;
    Some(tree.get(output)?.rect)
}

/// Dispatches children arrangement by the parent's `Layout`: `Tabbed`/
/// `Stacked` show only the focused child in the full content rect (behind a
/// reserved tab/title band); `Horiz`/`Vert` proportionally split the
/// content rect along the main axis; `Layout::None` on a childless
/// container/workspace is a no-op.
fn arrange_children(
    tree: &mut ContainerTree,
    backend: &mut dyn Backend,
    parent: NodeId,
    content: Rect,
) -> Result<()> {
    let children: Vec<NodeId> = tree[parent].children.iter().copied().collect();
    if children.is_empty() {
        return Ok(());
    }
    match tree[parent].layout {
        Layout::Tabbed | Layout::Stacked => {
            let band = content.top_band(BAND_HEIGHT);
            let below = content.shrink_top(BAND_HEIGHT);
            tree[parent].band_rect = Some(band);
            for &child in &children {
                arrange_with_rect(tree, backend, child, below)?;
            }
        }
        Layout::Horiz => {
            tree[parent].band_rect = None;
            let widths = split_main_axis(tree, &children, content.w);
            let mut x = content.x;
            for (child, w) in children.iter().zip(widths) {
                let child_rect = Rect::new(x, content.y, w, content.h);
                arrange_with_rect(tree, backend, *child, child_rect)?;
                x += w;
            }
        }
        Layout::Vert => {
            tree[parent].band_rect = None;
            let heights = split_main_axis(tree, &children, content.h);
            let mut y = content.y;
            for (child, h) in children.iter().zip(heights) {
                let child_rect = Rect::new(content.x, y, content.w, h);
                arrange_with_rect(tree, backend, *child, child_rect)?;
                y += h;
            }
        }
        Layout::None => {
            tree[parent].band_rect = None;
            // A container with no declared layout behaves like `Horiz`
            // (the default new containers are created with, per
            // `tree::node::Node::new`); treat it identically so a
            // freshly-unwrapped container never shows a zero-size child.
            let widths = split_main_axis(tree, &children, content.w);
            let mut x = content.x;
            for (child, w) in children.iter().zip(widths) {
                let child_rect = Rect::new(x, content.y, w, content.h);
                arrange_with_rect(tree, backend, *child, child_rect)?;
                x += w;
            }
        }
    }
    Ok(())
}

/// Splits `total` pixels among `children` proportionally to their
/// `weight`, guarding against zero/negative weights (treated as an equal
/// share of the remaining space, matching `sway`'s legacy `old_width`
/// fallback) and skipping the rescale step entirely when the weights sum to
/// a negligible total. The last child absorbs whatever rounding remainder
/// is left so the sizes always sum to exactly `total`.
fn split_main_axis(tree: &ContainerTree, children: &[NodeId], total: i32) -> Vec<i32> {
    let n = children.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![total];
    }

    let weights: Vec<f64> = children
        .iter()
        .map(|&id| {
            let w = tree[id].weight;
            if w <= 0.0 {
                total as f64 / (n - 1) as f64
            } else {
                w
            }
        })
        .collect();
    let sum: f64 = weights.iter().sum();

    let mut sizes: Vec<i32> = if sum > 0.1 {
        weights
            .iter()
            .map(|w| ((w / sum) * total as f64).round() as i32)
            .collect()
    } else {
        weights.iter().map(|w| w.round() as i32).collect()
    };

    let sum_except_last: i32 = sizes[..n - 1].iter().sum();
    sizes[n - 1] = total - sum_except_last;
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{test_support::StubBackend, OutputId, SurfaceHandle};

    fn setup() -> (ContainerTree, StubBackend, NodeId) {
        let mut tree = ContainerTree::new();
        let output = tree.create_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
        let ws = tree.create_workspace(output, "1").unwrap();
        (tree, StubBackend::new(), ws)
    }

    #[test]
    fn three_equal_views_split_1920_evenly() {
        let (mut tree, mut backend, ws) = setup();
        let views: Vec<NodeId> = (0..3)
            .map(|i| {
                let v = tree.create_view(SurfaceHandle(i));
                tree.add_child(ws, v).unwrap();
                v
            })
            .collect();
        arrange(&mut tree, &mut backend, tree.root()).unwrap();
        let widths: Vec<i32> = views.iter().map(|&v| tree.get(v).unwrap().rect.w).collect();
        assert_eq!(widths, vec![640, 640, 640]);
    }

    #[test]
    fn odd_width_remainder_goes_to_last_child() {
        let (mut tree, mut backend, ws) = setup();
        let output = tree.output_of(ws).unwrap();
        tree.get_mut(output).unwrap().rect = Rect::new(0, 0, 1921, 1080);
        let views: Vec<NodeId> = (0..3)
            .map(|i| {
                let v = tree.create_view(SurfaceHandle(i));
                tree.add_child(ws, v).unwrap();
                v
            })
            .collect();
        arrange(&mut tree, &mut backend, tree.root()).unwrap();
        let widths: Vec<i32> = views.iter().map(|&v| tree.get(v).unwrap().rect.w).collect();
        assert_eq!(widths, vec![640, 640, 641]);
        assert_eq!(widths.iter().sum::<i32>(), 1921);
    }

    #[test]
    fn fullscreen_view_takes_whole_output() {
        let (mut tree, mut backend, ws) = setup();
        let a = tree.create_view(SurfaceHandle(1));
        let b = tree.create_view(SurfaceHandle(2));
        tree.add_child(ws, a).unwrap();
        tree.add_child(ws, b).unwrap();
        tree.get_mut(a).unwrap().is_fullscreen = true;
        arrange(&mut tree, &mut backend, tree.root()).unwrap();
        assert_eq!(tree.get(a).unwrap().rect, Rect::new(0, 0, 1920, 1080));
    }

    #[test]
    fn tabbed_container_reserves_band_and_sizes_children_equally() {
        let (mut tree, mut backend, ws) = setup();
        tree.get_mut(ws).unwrap().layout = Layout::Tabbed;
        let a = tree.create_view(SurfaceHandle(1));
        let b = tree.create_view(SurfaceHandle(2));
        tree.add_child(ws, a).unwrap();
        tree.add_child(ws, b).unwrap();
        arrange(&mut tree, &mut backend, tree.root()).unwrap();
        assert_eq!(tree.get(a).unwrap().rect.h, 1080 - BAND_HEIGHT);
        assert_eq!(tree.get(b).unwrap().rect.h, 1080 - BAND_HEIGHT);
        assert!(tree.get(ws).unwrap().band_rect.is_some());
    }
}
