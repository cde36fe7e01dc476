//! In-memory fake backend used by this crate's own tests: a stand-in
//! compositor so tree/layout/focus logic is exercisable without a real
//! Wayland server.

use std::collections::HashMap;

use crate::backend::{Backend, Direction, OutputId, SurfaceHandle};
use crate::error::Result;
use crate::geometry::{Point, Rect};

/// A recorded call, for assertions in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetGeometry(SurfaceHandle, Rect),
    SetActivated(SurfaceHandle, bool),
    SetFullscreen(SurfaceHandle, bool),
    KeyboardEnter(SurfaceHandle),
    KeyboardLeave(SurfaceHandle),
    Close(SurfaceHandle),
    BringToFront(SurfaceHandle),
    SendToBack(SurfaceHandle),
    WarpCursor(OutputId, Point),
    Spawn(String),
}

#[derive(Default)]
pub struct StubBackend {
    pub calls: Vec<Call>,
    pub outputs: Vec<OutputId>,
    /// Adjacency table: (from, direction) -> to.
    pub adjacency: HashMap<(OutputId, Direction), OutputId>,
    pub output_layouts: HashMap<OutputId, Rect>,
    pub pointer_output: Option<OutputId>,
    pub fail_spawn: bool,
}

impl StubBackend {
    pub fn new() -> Self {
        StubBackend::default()
    }

    pub fn set_adjacent(&mut self, from: OutputId, direction: Direction, to: OutputId) {
        self.adjacency.insert((from, direction), to);
    }
}

impl Backend for StubBackend {
    fn set_geometry(&mut self, handle: SurfaceHandle, rect: Rect) {
        self.calls.push(Call::SetGeometry(handle, rect));
    }

    fn set_activated(&mut self, handle: SurfaceHandle, activated: bool) {
        self.calls.push(Call::SetActivated(handle, activated));
    }

    fn set_fullscreen(&mut self, handle: SurfaceHandle, fullscreen: bool) {
        self.calls.push(Call::SetFullscreen(handle, fullscreen));
    }

    fn send_keyboard_enter(&mut self, handle: SurfaceHandle) {
        self.calls.push(Call::KeyboardEnter(handle));
    }

    fn send_keyboard_leave(&mut self, handle: SurfaceHandle) {
        self.calls.push(Call::KeyboardLeave(handle));
    }

    fn close(&mut self, handle: SurfaceHandle) {
        self.calls.push(Call::Close(handle));
    }

    fn bring_to_front(&mut self, handle: SurfaceHandle) {
        self.calls.push(Call::BringToFront(handle));
    }

    fn send_to_back(&mut self, handle: SurfaceHandle) {
        self.calls.push(Call::SendToBack(handle));
    }

    fn warp_cursor(&mut self, output: OutputId, point: Point) {
        self.pointer_output = Some(output);
        self.calls.push(Call::WarpCursor(output, point));
    }

    fn pointer_output(&self) -> Option<OutputId> {
        self.pointer_output
    }

    fn adjacent_output(&self, from: OutputId, direction: Direction) -> Option<OutputId> {
        self.adjacency.get(&(from, direction)).copied()
    }

    fn layout_contains(&self, output: OutputId, point: Point) -> bool {
        self.output_layouts
            .get(&output)
            .map(|r| r.contains_point(point))
            .unwrap_or(false)
    }

    fn spawn(&mut self, cmdline: &str) -> Result<()> {
        self.calls.push(Call::Spawn(cmdline.to_string()));
        if self.fail_spawn {
            Err(crate::error::Error::BackendError(format!(
                "spawn failed: {cmdline}"
            )))
        } else {
            Ok(())
        }
    }
}
