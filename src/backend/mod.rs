//! The narrow interface the core uses to talk to the display/input
//! provider. Binding directly to a real compositor crate is left to the
//! embedder; here that binding is abstracted behind a trait so the tree,
//! layout, focus, and command logic can be exercised without one. A real
//! integration is expected to implement `Backend` against whatever
//! compositor crate it embeds; `test_support::StubBackend` is the
//! in-process fake this crate's own tests drive.

pub mod test_support;

use crate::error::Result;
use crate::geometry::{Point, Rect};

/// Opaque handle to a mapped client surface. The backend hands these out on
/// `on_map` and the core never interprets them beyond equality/hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Opaque handle identifying a physical/virtual output, stable across the
/// output's lifetime as announced by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub u64);

/// Directional query used by `adjacent_output`, matching the focus model's
/// navigation directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// Effective description of an output, as announced by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputInfo {
    pub id: OutputId,
    pub rect: Rect,
    pub scale_millis: u32,
}

/// The abstract operations the core depends on. All methods are infallible
/// from the caller's point of view except `spawn`: surface/geometry/
/// activation requests are fire-and-forget from the core's perspective (a
/// failure is the backend's problem to log), while `spawn` failure must be
/// reported to the caller so the command interpreter can still return
/// `Success` for the fork while logging the exec failure.
pub trait Backend {
    fn set_geometry(&mut self, handle: SurfaceHandle, rect: Rect);
    fn set_activated(&mut self, handle: SurfaceHandle, activated: bool);
    fn set_fullscreen(&mut self, handle: SurfaceHandle, fullscreen: bool);
    fn send_keyboard_enter(&mut self, handle: SurfaceHandle);
    fn send_keyboard_leave(&mut self, handle: SurfaceHandle);
    fn close(&mut self, handle: SurfaceHandle);
    fn bring_to_front(&mut self, handle: SurfaceHandle);
    fn send_to_back(&mut self, handle: SurfaceHandle);

    fn warp_cursor(&mut self, output: OutputId, point: Point);
    fn pointer_output(&self) -> Option<OutputId>;

    fn adjacent_output(&self, from: OutputId, direction: Direction) -> Option<OutputId>;
    fn layout_contains(&self, output: OutputId, point: Point) -> bool;

    /// Spawns `cmdline` via the shell, detached (double-fork or
    /// equivalent); the core does not wait on it except to reap zombies.
    fn spawn(&mut self, cmdline: &str) -> Result<()>;
}
