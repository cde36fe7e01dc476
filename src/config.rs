//! Runtime configuration and config-file discovery.
//!
//! Parsing config directives into bindings is out of scope here; reload
//! re-runs the raw file through the command interpreter instead. What lives
//! here is the ambient behavior every reload needs: the config search path,
//! raw file reading for `GET_CONFIG`, and the handful of behavioral knobs
//! (gaps, wrapping, transaction timeout) commands mutate at runtime.

use std::env;
use std::path::{Path, PathBuf};

/// Behavioral settings the command interpreter and layout engine consult.
#[derive(Debug, Clone)]
pub struct Config {
    pub gaps_inner: u32,
    pub gaps_outer: u32,
    pub force_focus_wrapping: bool,
    pub warping_enabled: bool,
    /// Transaction commit timeout. `None` disables the transaction layer
    /// entirely (geometry is applied immediately, no ack tracking).
    pub txn_timeout_ms: Option<u64>,
    pub loaded_config_file_name: Option<String>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            gaps_inner: 0,
            gaps_outer: 0,
            force_focus_wrapping: false,
            warping_enabled: true,
            txn_timeout_ms: Some(200),
            loaded_config_file_name: None,
        }
    }
}

/// Walks the i3/sway config search order and returns the first path that
/// exists. `sway`/`i3` names are tried in that order for each directory
/// before moving to the next directory.
pub fn resolve_path() -> Option<PathBuf> {
    let home = env::var_os("HOME").map(PathBuf::from);
    let xdg_config_home = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| home.as_ref().map(|h| h.join(".config")));

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(h) = &home {
        candidates.push(h.join(".sway/config"));
    }
    if let Some(x) = &xdg_config_home {
        candidates.push(x.join("sway/config"));
    }
    candidates.push(PathBuf::from("/etc/sway/config"));
    if let Some(h) = &home {
        candidates.push(h.join(".i3/config"));
    }
    if let Some(x) = &xdg_config_home {
        candidates.push(x.join("i3/config"));
    }
    candidates.push(PathBuf::from("/etc/i3/config"));

    if let Some(dirs) = env::var_os("XDG_CONFIG_DIRS") {
        for dir in env::split_paths(&dirs) {
            candidates.push(dir.join("sway/config"));
        }
    }

    candidates.into_iter().find(|p| p.is_file())
}

/// Reads the raw bytes of a resolved config path (or an explicit override),
/// for `GET_CONFIG`. Does not interpret the contents.
pub fn read_raw(path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path)
}
