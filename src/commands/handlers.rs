//! Handler implementations for each entry in the command table. Each
//! handler corresponds to an earlier free function operating directly on
//! a global "active container" (`remove_active`, `toggle_float`,
//! `split_vertical`, `split_horizontal`, `tile_tabbed`), generalized to
//! take the `CommandContext` this command interpreter threads through
//! instead.

use crate::backend::{Backend, Direction};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::focus::FocusManager;
use crate::keys::{KeyMatcher, Keysym, Modifiers};
use crate::layout;
use crate::tree::{ContainerTree, Kind, Layout, NodeId};

/// Everything a handler needs: the tree/focus/backend triple, the binding
/// table (for `bindsym`), static config, which seat issued the command,
/// and the node the command applies to (i3's "current container" — the
/// criteria-matched target, or the focused container by default). `reading`
/// and `pending_execs` carry the config-reading queue so `exec`/
/// `exec_always` batch instead of spawning immediately while a config file
/// is being read.
pub struct CommandContext<'a> {
    pub tree: &'a mut ContainerTree,
    pub backend: &'a mut dyn Backend,
    pub focus: &'a mut FocusManager,
    pub keys: &'a mut KeyMatcher,
    pub config: &'a Config,
    pub seat: u32,
    pub target: NodeId,
    pub reading: bool,
    pub pending_execs: &'a mut Vec<String>,
}

fn rearrange(ctx: &mut CommandContext) -> Result<()> {
    let root = ctx.tree.root();
    layout::arrange(ctx.tree, ctx.backend, root)
}

pub fn cmd_focus(ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    let direction = match args.first().map(String::as_str) {
        Some("left") => Direction::Left,
        Some("right") => Direction::Right,
        Some("up") => Direction::Up,
        Some("down") => Direction::Down,
        Some("parent") => return focus_parent(ctx),
        Some("child") => return focus_child(ctx),
        Some("prev") => return focus_sibling(ctx, false),
        Some("next") => return focus_sibling(ctx, true),
        other => {
            return Err(Error::CommandInvalid(format!(
                "focus: expected a direction, got {other:?}"
            )))
        }
    };
    let wrap = ctx.config.force_focus_wrapping;
    match ctx
        .focus
        .directional(ctx.tree, ctx.backend, ctx.target, direction, wrap)
    {
        Some(target) => {
            ctx.focus.set_focus(ctx.tree, ctx.backend, ctx.seat, target)?;
            ctx.tree.refresh_visibility(ctx.tree.root());
            Ok(())
        }
        None => Err(Error::CommandFailure(
            "no node in that direction".to_string(),
        )),
    }
}

/// `focus parent`: moves focus to the target's parent container, stopping
/// short of Output/Root (there's no container there to focus).
fn focus_parent(ctx: &mut CommandContext) -> Result<()> {
    let parent = ctx
        .tree
        .get(ctx.target)
        .and_then(|n| n.parent)
        .filter(|&p| {
            !matches!(
                ctx.tree.get(p).map(|n| n.kind()),
                Some(Kind::Root) | Some(Kind::Output)
            )
        })
        .ok_or_else(|| Error::CommandFailure("focus: already at the top of the tree".to_string()))?;
    ctx.focus.set_focus(ctx.tree, ctx.backend, ctx.seat, parent)?;
    ctx.tree.refresh_visibility(ctx.tree.root());
    Ok(())
}

/// `focus child`: moves focus down into the target's currently (or
/// first-) focused child.
fn focus_child(ctx: &mut CommandContext) -> Result<()> {
    let child = ctx
        .tree
        .get(ctx.target)
        .and_then(|n| n.focused_child.or_else(|| n.children.get(0).copied()))
        .ok_or_else(|| Error::CommandFailure("focus: no child to descend into".to_string()))?;
    ctx.focus.set_focus(ctx.tree, ctx.backend, ctx.seat, child)?;
    ctx.tree.refresh_visibility(ctx.tree.root());
    Ok(())
}

/// `focus prev`/`focus next`: cycles to the target's previous/next sibling
/// (wrapping), descending into that sibling's own most-recently-focused
/// descendant.
fn focus_sibling(ctx: &mut CommandContext, forward: bool) -> Result<()> {
    let parent = ctx
        .tree
        .get(ctx.target)
        .and_then(|n| n.parent)
        .ok_or_else(|| Error::CommandFailure("focus: no parent to cycle siblings within".to_string()))?;
    let siblings: Vec<NodeId> = ctx
        .tree
        .get(parent)
        .ok_or_else(|| Error::TreeInvariant(format!("{parent} missing from arena")))?
        .children
        .iter()
        .copied()
        .collect();
    if siblings.len() < 2 {
        return Err(Error::CommandFailure("focus: no sibling to move to".to_string()));
    }
    let idx = siblings
        .iter()
        .position(|&s| s == ctx.target)
        .ok_or_else(|| Error::TreeInvariant(format!("{} not among its parent's children", ctx.target)))?;
    let next_idx = if forward {
        (idx + 1) % siblings.len()
    } else {
        (idx + siblings.len() - 1) % siblings.len()
    };
    let target = deepest_focus_target(ctx.tree, siblings[next_idx]);
    ctx.focus.set_focus(ctx.tree, ctx.backend, ctx.seat, target)?;
    ctx.tree.refresh_visibility(ctx.tree.root());
    Ok(())
}

fn set_container_layout(ctx: &mut CommandContext, layout: Layout) -> Result<()> {
    let container = ctx
        .tree
        .ancestor_by(ctx.target, |n| {
            matches!(n.kind(), Kind::Container | Kind::Workspace)
        })
        .or_else(|| {
            if matches!(ctx.tree.get(ctx.target).map(|n| n.kind()), Some(Kind::Container) | Some(Kind::Workspace)) {
                Some(ctx.target)
            } else {
                None
            }
        })
        .ok_or_else(|| Error::CommandFailure("no container to set layout on".to_string()))?;
    ctx.tree
        .get_mut(container)
        .ok_or_else(|| Error::TreeInvariant(format!("{container} missing from arena")))?
        .layout = layout;
    rearrange(ctx)
}

pub fn cmd_layout(ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    let layout = match args.first().map(String::as_str) {
        Some("splith") => Layout::Horiz,
        Some("splitv") => Layout::Vert,
        Some("tabbed") => Layout::Tabbed,
        Some("stacking") | Some("stacked") => Layout::Stacked,
        Some("toggle") => {
            let container = ctx
                .tree
                .ancestor_of_kind(ctx.target, Kind::Container)
                .or(Some(ctx.target))
                .filter(|&n| {
                    matches!(ctx.tree.get(n).map(|n| n.kind()), Some(Kind::Container) | Some(Kind::Workspace))
                })
                .ok_or_else(|| Error::CommandFailure("no container to toggle".to_string()))?;
            let next = match ctx.tree.get(container).map(|n| n.layout) {
                Some(Layout::Horiz) => Layout::Vert,
                Some(Layout::Vert) => Layout::Tabbed,
                Some(Layout::Tabbed) => Layout::Stacked,
                _ => Layout::Horiz,
            };
            return set_container_layout(ctx, next);
        }
        other => {
            return Err(Error::CommandInvalid(format!(
                "layout: unknown argument {other:?}"
            )))
        }
    };
    set_container_layout(ctx, layout)
}

fn split(ctx: &mut CommandContext, layout: Layout) -> Result<()> {
    match ctx.tree.get(ctx.target).map(|n| n.kind()) {
        Some(Kind::View) => {
            ctx.tree.wrap_in_container(ctx.target, layout)?;
        }
        Some(Kind::Container) => {
            ctx.tree
                .get_mut(ctx.target)
                .ok_or_else(|| Error::TreeInvariant(format!("{} missing from arena", ctx.target)))?
                .layout = layout;
        }
        _ => return Err(Error::CommandFailure("nothing to split".to_string())),
    }
    rearrange(ctx)
}

pub fn cmd_splith(ctx: &mut CommandContext, _args: &[String]) -> Result<()> {
    split(ctx, Layout::Horiz)
}

pub fn cmd_splitv(ctx: &mut CommandContext, _args: &[String]) -> Result<()> {
    split(ctx, Layout::Vert)
}

pub fn cmd_split(ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("h") | Some("horizontal") => cmd_splith(ctx, &[]),
        Some("v") | Some("vertical") => cmd_splitv(ctx, &[]),
        Some("toggle") => {
            let current = ctx
                .tree
                .ancestor_by(ctx.target, |n| n.kind() == Kind::Container)
                .and_then(|c| ctx.tree.get(c).map(|n| n.layout))
                .unwrap_or(Layout::Horiz);
            let next = if current == Layout::Horiz {
                Layout::Vert
            } else {
                Layout::Horiz
            };
            split(ctx, next)
        }
        other => Err(Error::CommandInvalid(format!(
            "split: unknown argument {other:?}"
        ))),
    }
}

pub fn cmd_workspace(ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    let name = args
        .first()
        .ok_or_else(|| Error::CommandInvalid("workspace: missing name".to_string()))?;

    let ws = match ctx.tree.workspace_by_name(name) {
        Some(ws) => ws,
        None => {
            let output = ctx
                .tree
                .output_of(ctx.target)
                .ok_or_else(|| Error::CommandFailure("no output to create workspace on".to_string()))?;
            ctx.tree.create_workspace(output, name)?
        }
    };

    let output = ctx
        .tree
        .output_of(ws)
        .ok_or_else(|| Error::TreeInvariant(format!("{ws} has no output ancestor")))?;
    ctx.tree
        .get_mut(output)
        .ok_or_else(|| Error::TreeInvariant(format!("{output} missing from arena")))?
        .focused_child = Some(ws);
    ctx.tree.refresh_visibility(ctx.tree.root());

    let target = deepest_focus_target(ctx.tree, ws);
    ctx.focus.set_focus(ctx.tree, ctx.backend, ctx.seat, target)?;
    rearrange(ctx)
}

fn deepest_focus_target(tree: &ContainerTree, node: NodeId) -> NodeId {
    match tree.get(node).and_then(|n| n.focused_child) {
        Some(child) => deepest_focus_target(tree, child),
        None => node,
    }
}

pub fn cmd_floating(ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    let currently = ctx
        .tree
        .get(ctx.target)
        .ok_or_else(|| Error::TreeInvariant(format!("{} missing from arena", ctx.target)))?
        .is_floating;
    let want = match args.first().map(String::as_str) {
        Some("enable") => true,
        Some("disable") => false,
        Some("toggle") | None => !currently,
        Some(other) => {
            return Err(Error::CommandInvalid(format!(
                "floating: unknown argument {other:?}"
            )))
        }
    };
    if want == currently {
        return Ok(());
    }

    let ws = ctx
        .tree
        .workspace_of(ctx.target)
        .ok_or_else(|| Error::CommandFailure("target has no workspace".to_string()))?;

    if want {
        ctx.tree.remove_child(ctx.target)?;
        ctx.tree.add_floating(ws, ctx.target)?;
    } else {
        ctx.tree.remove_child(ctx.target)?;
        let tiling_root = ctx
            .tree
            .descendant_by(ws, |n| n.kind() == Kind::Container)
            .unwrap_or(ws);
        ctx.tree.add_child(tiling_root, ctx.target)?;
    }
    ctx.tree.refresh_visibility(ctx.tree.root());
    rearrange(ctx)
}

pub fn cmd_fullscreen(ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    let node = ctx
        .tree
        .get_mut(ctx.target)
        .ok_or_else(|| Error::TreeInvariant(format!("{} missing from arena", ctx.target)))?;
    let currently = node.is_fullscreen;
    let want = match args.first().map(String::as_str) {
        Some("enable") => true,
        Some("disable") => false,
        Some("toggle") | None => !currently,
        Some(other) => {
            return Err(Error::CommandInvalid(format!(
                "fullscreen: unknown argument {other:?}"
            )))
        }
    };
    node.is_fullscreen = want;
    if let Some(surface) = ctx.tree.get(ctx.target).and_then(|n| n.surface_handle()) {
        ctx.backend.set_fullscreen(surface, want);
    }
    rearrange(ctx)
}

pub fn cmd_kill(ctx: &mut CommandContext, _args: &[String]) -> Result<()> {
    let surface = ctx.tree.get(ctx.target).and_then(|n| n.surface_handle());
    let subtree = ctx.tree.workspace_of(ctx.target).unwrap_or_else(|| ctx.tree.root());
    let recall = ctx.focus.get_focus_inactive(ctx.tree, ctx.seat, subtree, ctx.target);

    ctx.tree.destroy(ctx.target)?;
    ctx.focus.forget(ctx.target);
    if let Some(surface) = surface {
        ctx.backend.close(surface);
    }
    ctx.tree.refresh_visibility(ctx.tree.root());

    if ctx.tree.contains(recall) {
        ctx.focus.set_focus(ctx.tree, ctx.backend, ctx.seat, recall)?;
    }
    rearrange(ctx)
}

/// Runs `cmdline` now, or queues it if a config file is currently being
/// read (`ctx.reading`) so it replays once the backend signals readiness.
/// Either way this always reports success: the fork itself succeeded, and
/// a downstream spawn failure is only ever the process's problem, logged
/// rather than surfaced as a command failure.
fn exec(ctx: &mut CommandContext, cmdline: String) -> Result<()> {
    if ctx.reading {
        ctx.pending_execs.push(cmdline);
        return Ok(());
    }
    if let Err(e) = ctx.backend.spawn(&cmdline) {
        log::warn!("exec: {cmdline:?} failed to spawn: {e}");
    }
    Ok(())
}

pub fn cmd_exec(ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    exec(ctx, args.join(" "))
}

pub fn cmd_exec_always(ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    // Unlike `exec`, i3 re-runs this on every config reload even if it ran
    // before; we don't track a "ran this session" flag across reloads
    // (config reparsing is out of scope), so the two behave identically
    // for a single invocation.
    cmd_exec(ctx, args)
}

pub fn cmd_reload(_ctx: &mut CommandContext, _args: &[String]) -> Result<()> {
    log::info!("reload requested; config re-parsing is not implemented");
    Ok(())
}

pub fn cmd_mode(_ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    let name = args.first().map(String::as_str).unwrap_or("default");
    log::info!("mode switch requested: {name}");
    Ok(())
}

/// Maps a config keysym name to a `Keysym` value. A full XKB name table is
/// out of scope; this stable hash is sufficient for bindings to compare
/// and dispatch consistently within one run, which is all the matcher
/// needs since it only ever compares keysyms for equality.
fn keysym_from_name(name: &str) -> Keysym {
    let mut hash: u32 = 2166136261;
    for byte in name.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

pub fn cmd_bindsym(ctx: &mut CommandContext, args: &[String]) -> Result<()> {
    let release = args.first().map(String::as_str) == Some("--release");
    let rest = if release { &args[1..] } else { args };

    let combo = rest
        .first()
        .ok_or_else(|| Error::CommandInvalid("bindsym: missing key combo".to_string()))?;
    let command = rest[1..].join(" ");
    if command.is_empty() {
        return Err(Error::CommandInvalid(
            "bindsym: missing command".to_string(),
        ));
    }

    let mut modifiers = Modifiers::empty();
    let mut keys = Vec::new();
    for part in combo.split('+') {
        match Modifiers::from_name(part) {
            Some(m) => modifiers |= m,
            None => keys.push(keysym_from_name(part)),
        }
    }
    if keys.is_empty() {
        return Err(Error::CommandInvalid(format!(
            "bindsym: no keysym in {combo:?}"
        )));
    }
    ctx.keys.bind(modifiers, keys, command, release);
    Ok(())
}
