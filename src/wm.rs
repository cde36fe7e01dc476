//! The `Wm` context: one struct a single thread owns outright, replacing
//! scattered global `RwLock`s (the earlier, multi-thread shape had
//! `try_lock_tree`, a global bindings table, and a global registry, all
//! behind `lazy_static!`). Every other module in this crate is deliberately
//! ignorant of `Wm`; this is the one place they're wired together, and the
//! one place exclusive access to the tree on every callback is actually
//! enforced, simply by construction: there is no lock to take because
//! there is only one `&mut Wm` in existence.

use std::collections::HashMap;

use crate::backend::{Backend, Direction, OutputId, SurfaceHandle};
use crate::commands::{self, CommandContext, CommandOutcome};
use crate::config::Config;
use crate::error::Result;
use crate::focus::{self, FocusManager};
use crate::geometry::Rect;
use crate::ipc::{protocol::EventType, IpcServer};
use crate::keys::{HeldKeys, KeyMatcher, Keysym, Modifiers};
use crate::layout;
use crate::tree::{ContainerTree, Kind, NodeId};

/// The default seat id used until multi-seat input is wired up; kept as a
/// named constant rather than a bare `0` at every call site.
pub const PRIMARY_SEAT: u32 = 0;

pub struct Wm {
    pub tree: ContainerTree,
    pub backend: Box<dyn Backend>,
    pub focus: FocusManager,
    pub keys: KeyMatcher,
    pub config: Config,
    pub ipc: Option<IpcServer>,
    pub vars: HashMap<String, String>,
    pub raw_config: String,
    held: HeldKeys,
    /// Set while a config file is being fed through `run_command` line by
    /// line; `exec`/`exec_always` queue onto `pending_execs` instead of
    /// spawning immediately so a config full of autostart commands doesn't
    /// race the backend before it's ready to host windows.
    reading: bool,
    pending_execs: Vec<String>,
}

impl Wm {
    pub fn new(backend: Box<dyn Backend>, config: Config) -> Wm {
        Wm {
            tree: ContainerTree::new(),
            backend,
            focus: FocusManager::new(),
            keys: KeyMatcher::new(),
            config,
            ipc: None,
            vars: HashMap::new(),
            raw_config: String::new(),
            held: HeldKeys::new(),
            reading: false,
            pending_execs: Vec::new(),
        }
    }

    pub fn attach_ipc(&mut self, ipc: IpcServer) {
        self.ipc = Some(ipc);
    }

    /// Enters config-reading mode: subsequent `exec`/`exec_always` commands
    /// queue instead of spawning.
    pub fn begin_reading_config(&mut self) {
        self.reading = true;
    }

    /// Leaves config-reading mode and spawns every queued `exec`/
    /// `exec_always` command line, in the order they were issued. Called
    /// once the backend signals it's ready to host windows.
    pub fn end_reading_config(&mut self) {
        self.reading = false;
        for cmdline in self.pending_execs.drain(..) {
            if let Err(e) = self.backend.spawn(&cmdline) {
                log::warn!("exec: {cmdline:?} failed to spawn: {e}");
            }
        }
    }

    fn focused(&self) -> NodeId {
        self.focus
            .get_focus(PRIMARY_SEAT)
            .filter(|&n| self.tree.contains(n))
            .unwrap_or_else(|| self.tree.root())
    }

    fn rearrange(&mut self) -> Result<()> {
        let root = self.tree.root();
        layout::arrange(&mut self.tree, &mut *self.backend, root)
    }

    // ---- backend-facing callbacks -------------------------------------

    /// A new output appeared. Creates it with a single default workspace
    /// and focuses it if nothing else is focused yet.
    pub fn on_output_added(&mut self, id: OutputId, rect: Rect) -> Result<NodeId> {
        let output = self.tree.create_output(id, rect);
        let name = next_workspace_name(&self.tree);
        let ws = self.tree.create_workspace(output, &name)?;
        if self.focus.get_focus(PRIMARY_SEAT).is_none() {
            self.focus.set_focus(&mut self.tree, &mut *self.backend, PRIMARY_SEAT, ws)?;
        }
        self.tree.refresh_visibility(self.tree.root());
        self.rearrange()?;
        self.emit_workspace_event("init", ws)?;
        Ok(output)
    }

    /// An output disappeared; its workspaces migrate to a remaining
    /// output, and focus is recalled if it pointed into the removed
    /// output.
    pub fn on_output_removed(&mut self, id: OutputId) -> Result<()> {
        let output = match self.tree.output_by_backend_id(id) {
            Some(o) => o,
            None => return Ok(()),
        };
        let was_focused_under = self
            .focus
            .get_focus(PRIMARY_SEAT)
            .map(|f| self.tree.output_of(f) == Some(output))
            .unwrap_or(false);

        self.tree.remove_output(output)?;
        self.tree.refresh_visibility(self.tree.root());

        if was_focused_under {
            if let Some(root_output) = self.tree.get(self.tree.root()).and_then(|n| n.children.get(0).copied()) {
                if let Some(target) = focus_deepest(&self.tree, root_output) {
                    self.focus.set_focus(&mut self.tree, &mut *self.backend, PRIMARY_SEAT, target)?;
                }
            }
        }
        self.rearrange()
    }

    /// A client surface mapped. Inserts it as a tiled view into the
    /// currently focused workspace and gives it focus.
    pub fn on_view_mapped(
        &mut self,
        surface: SurfaceHandle,
        desired_w: i32,
        desired_h: i32,
        app_id: Option<String>,
        title: Option<String>,
    ) -> Result<NodeId> {
        let view = self.tree.create_view(surface);
        if let Some(node) = self.tree.get_mut(view) {
            node.name = title.clone();
        }
        if let crate::tree::NodeData::View { desired_w: w, desired_h: h, app_id: a, title: t, .. } =
            &mut self.tree.get_mut(view).expect("just created").data
        {
            *w = desired_w;
            *h = desired_h;
            *a = app_id;
            *t = title;
        }

        let focused = self.focused();
        let ws = self
            .tree
            .workspace_of(focused)
            .or_else(|| self.tree.descendant_of_kind(self.tree.root(), Kind::Workspace))
            .ok_or_else(|| crate::error::Error::TreeInvariant("no workspace to map into".to_string()))?;
        let parent = self
            .tree
            .descendant_by(ws, |n| n.kind() == Kind::Container)
            .unwrap_or(ws);
        self.tree.add_child(parent, view)?;
        self.tree.refresh_visibility(self.tree.root());
        self.focus.set_focus(&mut self.tree, &mut *self.backend, PRIMARY_SEAT, view)?;
        self.rearrange()?;
        self.emit_window_event("new", view)?;
        Ok(view)
    }

    pub fn on_view_unmapped(&mut self, surface: SurfaceHandle) -> Result<()> {
        let view = match self.find_view(surface) {
            Some(v) => v,
            None => return Ok(()),
        };
        let subtree = self.tree.workspace_of(view).unwrap_or_else(|| self.tree.root());
        let recall = self.focus.get_focus_inactive(&self.tree, PRIMARY_SEAT, subtree, view);
        self.tree.destroy(view)?;
        self.focus.forget(view);
        self.tree.refresh_visibility(self.tree.root());
        if self.tree.contains(recall) {
            self.focus.set_focus(&mut self.tree, &mut *self.backend, PRIMARY_SEAT, recall)?;
        }
        self.rearrange()?;
        self.emit_window_event("close", view)
    }

    fn find_view(&self, surface: SurfaceHandle) -> Option<NodeId> {
        self.tree
            .descendant_by(self.tree.root(), |n| n.surface_handle() == Some(surface))
    }

    /// A keysym transitioned up or down. Held-key bookkeeping happens
    /// unconditionally; on a press that completes a binding, the bound
    /// command runs and its outcomes are returned.
    pub fn on_key(
        &mut self,
        keysym: Keysym,
        modifiers: Modifiers,
        pressed: bool,
    ) -> Result<Option<Vec<CommandOutcome>>> {
        let matched = if pressed {
            self.held.press(keysym);
            self.keys.matches(modifiers, &self.held).map(|b| b.command.clone())
        } else {
            // Check against the still-held set (including `keysym` itself)
            // before releasing it, since a release binding's keysym is the
            // one that just went up.
            let released = self.keys.matches_release(modifiers, &self.held).map(|b| b.command.clone());
            self.held.release(keysym);
            released
        };
        let Some(command) = matched else {
            return Ok(None);
        };

        let target = self.focused();
        let vars = self.vars.clone();
        let mut ctx = CommandContext {
            tree: &mut self.tree,
            backend: &mut *self.backend,
            focus: &mut self.focus,
            keys: &mut self.keys,
            config: &self.config,
            seat: PRIMARY_SEAT,
            target,
            reading: self.reading,
            pending_execs: &mut self.pending_execs,
        };
        let outcomes = commands::run(&mut ctx, &command, &vars);
        Ok(Some(outcomes))
    }

    /// Runs an arbitrary command line against the currently focused node,
    /// the path IPC's `RUN_COMMAND` and config directives both use.
    pub fn run_command(&mut self, line: &str) -> Vec<CommandOutcome> {
        let target = self.focused();
        let vars = self.vars.clone();
        let mut ctx = CommandContext {
            tree: &mut self.tree,
            backend: &mut *self.backend,
            focus: &mut self.focus,
            keys: &mut self.keys,
            config: &self.config,
            seat: PRIMARY_SEAT,
            target,
            reading: self.reading,
            pending_execs: &mut self.pending_execs,
        };
        commands::run(&mut ctx, line, &vars)
    }

    /// Drains whatever IPC traffic has accumulated since the last tick.
    /// Cooperative: never blocks, safe to call once per event-loop pass.
    pub fn pump_ipc(&mut self) -> Result<()> {
        let target = self.focused();
        let mut ipc = match self.ipc.take() {
            Some(ipc) => ipc,
            None => return Ok(()),
        };
        let result = ipc.poll(
            &mut self.tree,
            &mut *self.backend,
            &mut self.focus,
            &mut self.keys,
            &self.config,
            &self.vars,
            &self.raw_config,
            PRIMARY_SEAT,
            target,
            self.reading,
            &mut self.pending_execs,
        );
        self.ipc = Some(ipc);
        result
    }

    /// Whether the pointer should warp after the given directional focus
    /// move completes.
    pub fn should_warp_to(&self, target: NodeId) -> bool {
        let target_is_floating = self.tree.get(target).map(|n| n.is_floating).unwrap_or(false);
        let pointer_output = self.backend.pointer_output();
        let target_output = self.tree.output_of(target).and_then(|o| match self.tree.get(o)?.data {
            crate::tree::NodeData::Output { backend_id, .. } => Some(backend_id),
            _ => None,
        });
        let already_there = pointer_output.is_some() && pointer_output == target_output;
        focus::should_warp(self.config.warping_enabled, target_is_floating, already_there)
    }

    pub fn directional_focus(&mut self, direction: Direction) -> Result<()> {
        let current = self.focused();
        let wrap = self.config.force_focus_wrapping;
        let target = self
            .focus
            .directional(&self.tree, &*self.backend, current, direction, wrap);
        if let Some(target) = target {
            let warp = self.should_warp_to(target);
            self.focus.set_focus(&mut self.tree, &mut *self.backend, PRIMARY_SEAT, target)?;
            if warp {
                if let Some(output) = self.tree.output_of(target) {
                    if let crate::tree::NodeData::Output { backend_id, .. } = self.tree.get(output).expect("just resolved").data {
                        let center = self.tree.get(target).expect("just resolved").rect.center();
                        self.backend.warp_cursor(backend_id, center);
                    }
                }
            }
            self.tree.refresh_visibility(self.tree.root());
        }
        Ok(())
    }

    fn emit_workspace_event(&mut self, change: &str, ws: NodeId) -> Result<()> {
        if self.ipc.is_none() {
            return Ok(());
        }
        let summaries = crate::ipc::json::workspaces_json(&self.tree, &self.focus, PRIMARY_SEAT);
        let current = summaries
            .as_array()
            .and_then(|list| list.iter().find(|w| w["id"] == ws.0.index() as i64))
            .cloned();
        let payload = serde_json::json!({ "change": change, "current": current });
        self.ipc.as_mut().expect("checked above").broadcast(EventType::Workspace, &payload)
    }

    fn emit_window_event(&mut self, change: &str, _view: NodeId) -> Result<()> {
        let Some(ipc) = self.ipc.as_mut() else { return Ok(()) };
        let payload = serde_json::json!({ "change": change });
        ipc.broadcast(EventType::Window, &payload)
    }
}

fn focus_deepest(tree: &ContainerTree, node: NodeId) -> Option<NodeId> {
    match tree.get(node)?.focused_child {
        Some(child) => focus_deepest(tree, child).or(Some(node)),
        None => Some(node),
    }
}

/// The smallest positive integer name not already in use, the way a fresh
/// workspace is conventionally numbered.
fn next_workspace_name(tree: &ContainerTree) -> String {
    let mut n = 1;
    while tree.workspace_by_name(&n.to_string()).is_some() {
        n += 1;
    }
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_support::StubBackend;

    #[test]
    fn mapping_a_view_focuses_it_and_assigns_a_workspace() {
        let mut wm = Wm::new(Box::new(StubBackend::new()), Config::default());
        wm.on_output_added(OutputId(1), Rect::new(0, 0, 1920, 1080)).unwrap();
        let view = wm
            .on_view_mapped(SurfaceHandle(1), 800, 600, None, None)
            .unwrap();
        assert_eq!(wm.focus.get_focus(PRIMARY_SEAT), Some(view));
    }

    #[test]
    fn unmapping_focused_view_recalls_previous_focus() {
        let mut wm = Wm::new(Box::new(StubBackend::new()), Config::default());
        wm.on_output_added(OutputId(1), Rect::new(0, 0, 1920, 1080)).unwrap();
        let a = wm.on_view_mapped(SurfaceHandle(1), 0, 0, None, None).unwrap();
        let _b = wm.on_view_mapped(SurfaceHandle(2), 0, 0, None, None).unwrap();
        wm.on_view_unmapped(SurfaceHandle(2)).unwrap();
        assert_eq!(wm.focus.get_focus(PRIMARY_SEAT), Some(a));
    }

    #[test]
    fn binding_runs_its_command_on_press() {
        let mut wm = Wm::new(Box::new(StubBackend::new()), Config::default());
        wm.on_output_added(OutputId(1), Rect::new(0, 0, 1920, 1080)).unwrap();
        wm.on_view_mapped(SurfaceHandle(1), 0, 0, None, None).unwrap();
        wm.keys.bind(Modifiers::LOGO, vec![40], "kill".to_string(), false);
        let outcomes = wm.on_key(40, Modifiers::LOGO, true).unwrap();
        assert!(outcomes.is_some());
        assert!(outcomes.unwrap()[0].success);
    }

    #[test]
    fn release_binding_runs_its_command_on_key_up_not_down() {
        let mut wm = Wm::new(Box::new(StubBackend::new()), Config::default());
        wm.on_output_added(OutputId(1), Rect::new(0, 0, 1920, 1080)).unwrap();
        wm.on_view_mapped(SurfaceHandle(1), 0, 0, None, None).unwrap();
        wm.keys.bind(Modifiers::LOGO, vec![40], "kill".to_string(), true);

        let on_press = wm.on_key(40, Modifiers::LOGO, true).unwrap();
        assert!(on_press.is_none());

        let on_release = wm.on_key(40, Modifiers::LOGO, false).unwrap();
        assert!(on_release.is_some());
        assert!(on_release.unwrap()[0].success);
    }

    #[test]
    fn queued_execs_spawn_once_reading_ends() {
        let mut wm = Wm::new(Box::new(StubBackend::new()), Config::default());
        wm.on_output_added(OutputId(1), Rect::new(0, 0, 1920, 1080)).unwrap();
        wm.begin_reading_config();
        wm.run_command("exec foo");
        wm.run_command("exec bar");
        assert_eq!(wm.pending_execs, vec!["foo".to_string(), "bar".to_string()]);
        wm.end_reading_config();
        assert!(wm.pending_execs.is_empty());
    }
}
