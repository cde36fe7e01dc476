//! Builds the JSON payloads i3-ipc clients expect, reading straight off the
//! container tree. Serde-based, in contrast to an earlier, ad hoc protocol
//! that carried `rustc_serialize::json::Json` values built by hand
//! (`value_json` and friends); see DESIGN.md for why this crate reaches
//! for `serde_json` here.

use serde_json::{json, Value};

use crate::config::Config;
use crate::focus::FocusManager;
use crate::tree::{ContainerTree, Kind, Node, NodeId};

fn rect_json(rect: crate::geometry::Rect) -> Value {
    json!({
        "x": rect.x,
        "y": rect.y,
        "width": rect.w,
        "height": rect.h,
    })
}

fn node_type_name(node: &Node) -> &'static str {
    if node.is_floating {
        return "floating_con";
    }
    match node.kind() {
        Kind::Root => "root",
        Kind::Output => "output",
        Kind::Workspace => "workspace",
        Kind::Container | Kind::View => "con",
    }
}

fn node_json(tree: &ContainerTree, id: NodeId) -> Value {
    let node = tree.get(id).expect("id came from the tree itself");
    let mut children: Vec<Value> = node
        .children
        .iter()
        .map(|&child| node_json(tree, child))
        .collect();
    if let Some(floating) = &node.floating {
        children.extend(floating.iter().map(|&child| node_json(tree, child)));
    }

    json!({
        "id": id.0.index() as i64,
        "name": node.name,
        "type": node_type_name(node),
        "layout": node.layout.to_string(),
        "percent": node.weight,
        "rect": rect_json(node.rect),
        "window_rect": rect_json(node.rect),
        "focused": false,
        "focus": [],
        "urgent": false,
        "fullscreen_mode": if node.is_fullscreen { 1 } else { 0 },
        "floating": if node.is_floating { "auto_on" } else { "auto_off" },
        "nodes": children,
        "floating_nodes": [],
    })
}

/// `GET_TREE` reply: the whole tree rooted at `root`.
pub fn tree_json(tree: &ContainerTree) -> Value {
    node_json(tree, tree.root())
}

/// `GET_WORKSPACES` reply: a flat array of workspace summaries.
pub fn workspaces_json(tree: &ContainerTree, focus: &FocusManager, seat: u32) -> Value {
    let focused = focus.get_focus(seat);
    let mut out = Vec::new();
    collect_workspaces(tree, tree.root(), focused, &mut out);
    Value::Array(out)
}

fn collect_workspaces(tree: &ContainerTree, node: NodeId, focused: Option<NodeId>, out: &mut Vec<Value>) {
    let n = tree.get(node).expect("id came from the tree itself");
    if n.kind() == Kind::Workspace {
        let output = tree.output_of(node).and_then(|o| tree.get(o)).and_then(|o| o.name.clone());
        let is_focused = focused
            .map(|f| tree.ancestor_of_kind(f, Kind::Workspace) == Some(node) || f == node)
            .unwrap_or(false);
        let output_visible = tree
            .get(tree.output_of(node).unwrap_or(node))
            .map(|o| o.focused_child == Some(node))
            .unwrap_or(false);
        out.push(json!({
            "id": node.0.index() as i64,
            "num": n.name.as_deref().and_then(|s| s.parse::<i64>().ok()).unwrap_or(-1),
            "name": n.name,
            "visible": output_visible,
            "focused": is_focused,
            "urgent": false,
            "rect": rect_json(n.rect),
            "output": output,
        }));
        return;
    }
    for &child in n.children.iter() {
        collect_workspaces(tree, child, focused, out);
    }
}

/// `GET_OUTPUTS` reply.
pub fn outputs_json(tree: &ContainerTree) -> Value {
    let root = tree.root();
    let outputs: Vec<Value> = tree
        .get(root)
        .expect("root always exists")
        .children
        .iter()
        .map(|&output| {
            let o = tree.get(output).expect("id came from the tree itself");
            let current_ws = o.focused_child.and_then(|ws| tree.get(ws)).and_then(|ws| ws.name.clone());
            json!({
                "name": o.name.clone().unwrap_or_else(|| format!("output-{}", output.0.index())),
                "active": true,
                "primary": false,
                "rect": rect_json(o.rect),
                "current_workspace": current_ws,
            })
        })
        .collect();
    Value::Array(outputs)
}

/// `GET_MARKS` reply. Marks are not modeled on `Node` (no command in the
/// table sets one), so this is always empty.
pub fn marks_json() -> Value {
    Value::Array(Vec::new())
}

/// `GET_VERSION` reply, including `loaded_config_file_name` the way
/// `original_source/sway` reports it.
pub fn version_json(config: &Config) -> Value {
    json!({
        "major": 4,
        "minor": 0,
        "patch": 0,
        "human_readable": concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
        "loaded_config_file_name": config.loaded_config_file_name,
    })
}

/// `GET_CONFIG` reply: the raw, unparsed config text (config grammar
/// itself is out of scope).
pub fn config_json(raw: &str) -> Value {
    json!({ "config": raw })
}

/// `GET_BAR_CONFIG` reply with no argument: the list of configured bar
/// ids, always empty (the bar protocol is out of scope).
pub fn bar_config_ids_json() -> Value {
    Value::Array(Vec::new())
}

/// `GET_BINDING_MODES` reply: this crate doesn't implement binding mode
/// stacks beyond acknowledging `mode` commands, so only `"default"` is
/// ever reported.
pub fn binding_modes_json() -> Value {
    json!(["default"])
}

/// `GET_INPUTS` reply. No input device registry exists behind `Backend`
/// (keymap/device enumeration is out of scope), so this is always empty.
pub fn inputs_json() -> Value {
    Value::Array(Vec::new())
}

/// `GET_SEATS` reply, reporting the one seat this crate's focus stack
/// currently tracks.
pub fn seats_json(focus: &FocusManager, seat: u32) -> Value {
    json!([{
        "name": format!("seat{seat}"),
        "capabilities": 0,
        "focus": focus.get_focus(seat).map(|n| n.0.index() as i64).unwrap_or(0),
        "devices": [],
    }])
}

pub fn success_json(success: bool, error: Option<&str>) -> Value {
    match error {
        Some(e) => json!({ "success": success, "error": e }),
        None => json!({ "success": success }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{OutputId, SurfaceHandle};
    use crate::geometry::Rect;

    #[test]
    fn tree_json_nests_children() {
        let mut tree = ContainerTree::new();
        let output = tree.create_output(OutputId(1), Rect::new(0, 0, 100, 100));
        let ws = tree.create_workspace(output, "1").unwrap();
        let view = tree.create_view(SurfaceHandle(1));
        tree.add_child(ws, view).unwrap();

        let value = tree_json(&tree);
        assert_eq!(value["type"], "root");
        let ws_json = &value["nodes"][0]["nodes"][0];
        assert_eq!(ws_json["type"], "workspace");
        assert_eq!(ws_json["nodes"][0]["type"], "con");
    }

    #[test]
    fn workspaces_json_reports_name_and_visibility() {
        let mut tree = ContainerTree::new();
        let output = tree.create_output(OutputId(1), Rect::new(0, 0, 100, 100));
        tree.create_workspace(output, "1").unwrap();
        let focus = FocusManager::new();
        let value = workspaces_json(&tree, &focus, 0);
        assert_eq!(value[0]["name"], "1");
        assert_eq!(value[0]["visible"], true);
    }
}
