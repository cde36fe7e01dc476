//! `tilewm`: an i3-compatible tiling window manager core. This crate holds
//! the compositor-independent logic — the container tree, layout engine,
//! focus model, command interpreter, keybinding matcher, and IPC server —
//! behind the `backend::Backend` trait, so it can be driven by any
//! Wayland/wlc/X11 host that implements that trait.

pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
pub mod focus;
pub mod geometry;
pub mod ipc;
pub mod keys;
pub mod layout;
pub mod tree;
pub mod wm;

pub use error::{Error, Result};
pub use wm::Wm;
