//! The IPC server: a Unix-domain socket speaking i3-ipc.
//!
//! An earlier design spawned an OS thread per connection and relied on a
//! process-wide `RwLock` registry for state access. The core assumes
//! exclusive, single-threaded access to the tree on every callback, so
//! this module instead keeps every connection's socket non-blocking and
//! drains them from one `poll` call driven by the same loop that pumps
//! backend events — no socket read ever blocks the core, and no lock is
//! needed because nothing else ever touches the tree concurrently. This
//! departure from a thread-per-connection model is recorded in DESIGN.md.

pub mod json;
pub mod protocol;

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::backend::Backend;
use crate::commands::{self, CommandContext};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::focus::FocusManager;
use crate::keys::KeyMatcher;
use crate::tree::{ContainerTree, NodeId};

use protocol::{EventType, RequestType};

struct Client {
    stream: UnixStream,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    subscriptions: u32,
}

pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
    clients: Vec<Client>,
}

impl IpcServer {
    /// Binds a fresh listening socket at `path`, removing a stale socket
    /// file left behind by a previous run (a plain file at that path from
    /// something else is left alone and surfaces as a bind error).
    pub fn bind(path: impl AsRef<Path>) -> Result<IpcServer> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| Error::IpcProtocol(format!("removing stale socket: {e}")))?;
        }
        let listener = UnixListener::bind(&path)
            .map_err(|e| Error::IpcProtocol(format!("binding {}: {e}", path.display())))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::IpcProtocol(format!("set_nonblocking: {e}")))?;
        Ok(IpcServer {
            listener,
            socket_path: path,
            clients: Vec::new(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    if stream.set_nonblocking(true).is_ok() {
                        self.clients.push(Client {
                            stream,
                            read_buf: Vec::new(),
                            write_buf: Vec::new(),
                            subscriptions: 0,
                        });
                        log::debug!("ipc: client connected ({} total)", self.clients.len());
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("ipc: accept failed: {e}");
                    break;
                }
            }
        }
    }

    /// One iteration of the cooperative loop: accepts new connections,
    /// drains and dispatches whatever complete requests have arrived, and
    /// drops any client whose socket errored or closed.
    #[allow(clippy::too_many_arguments)]
    pub fn poll(
        &mut self,
        tree: &mut ContainerTree,
        backend: &mut dyn Backend,
        focus: &mut FocusManager,
        keys: &mut KeyMatcher,
        config: &Config,
        vars: &HashMap<String, String>,
        raw_config: &str,
        seat: u32,
        focused_target: NodeId,
        reading: bool,
        pending_execs: &mut Vec<String>,
    ) -> Result<()> {
        self.accept_pending();

        let mut dead = Vec::new();
        for (idx, client) in self.clients.iter_mut().enumerate() {
            match drain_client(client) {
                Ok(false) => dead.push(idx),
                Ok(true) => {}
                Err(e) => {
                    log::warn!("ipc: client error: {e}");
                    dead.push(idx);
                }
            }
        }

        for (idx, client) in self.clients.iter_mut().enumerate() {
            if dead.contains(&idx) {
                continue;
            }
            loop {
                let Some((type_code, payload, consumed)) = protocol::try_parse_frame(&client.read_buf)? else {
                    break;
                };
                client.read_buf.drain(..consumed);
                match handle_request(
                    type_code,
                    &payload,
                    tree,
                    backend,
                    focus,
                    keys,
                    config,
                    vars,
                    raw_config,
                    seat,
                    focused_target,
                    reading,
                    pending_execs,
                    &mut client.subscriptions,
                )? {
                    Some((reply_type, body)) => {
                        let bytes = serde_json::to_vec(&body)
                            .map_err(|e| Error::IpcProtocol(format!("encoding reply: {e}")))?;
                        protocol::write_frame(&mut client.write_buf, reply_type, &bytes)
                            .map_err(|e| Error::IpcProtocol(format!("buffering reply: {e}")))?;
                    }
                    None => {
                        // Malformed request or an unrecognized request
                        // type: the client is misbehaving or speaking a
                        // protocol this server doesn't implement, so drop
                        // the connection instead of guessing at a reply.
                        dead.push(idx);
                        break;
                    }
                }
            }
        }
        dead.sort_unstable();
        dead.dedup();
        for &idx in dead.iter().rev() {
            self.clients.remove(idx);
        }

        for client in self.clients.iter_mut() {
            flush_client(client);
        }
        Ok(())
    }

    /// Sends an event frame to every client subscribed to `event`.
    pub fn broadcast(&mut self, event: EventType, payload: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| Error::IpcProtocol(format!("encoding event: {e}")))?;
        for client in self.clients.iter_mut() {
            if client.subscriptions & event.subscription_mask() == 0 {
                continue;
            }
            let _ = protocol::write_frame(&mut client.write_buf, event.code(), &bytes);
        }
        for client in self.clients.iter_mut() {
            flush_client(client);
        }
        Ok(())
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Reads whatever is currently available into `client.read_buf`. Returns
/// `Ok(false)` if the peer closed the connection, `Ok(true)` otherwise.
fn drain_client(client: &mut Client) -> Result<bool> {
    let mut chunk = [0u8; 4096];
    loop {
        match client.stream.read(&mut chunk) {
            Ok(0) => return Ok(false),
            Ok(n) => client.read_buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(true),
            Err(e) => return Err(Error::IpcProtocol(format!("read: {e}"))),
        }
    }
}

fn flush_client(client: &mut Client) {
    if client.write_buf.is_empty() {
        return;
    }
    match client.stream.write(&client.write_buf) {
        Ok(n) => {
            client.write_buf.drain(..n);
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => {}
        Err(e) => log::warn!("ipc: write failed: {e}"),
    }
}

/// Handles one complete request. Returns `Ok(None)` to signal that the
/// client should be disconnected instead of replied to: either the request
/// type isn't one this server speaks, or the payload is malformed in a way
/// that leaves nothing sensible to reply with.
#[allow(clippy::too_many_arguments)]
fn handle_request(
    type_code: u32,
    payload: &[u8],
    tree: &mut ContainerTree,
    backend: &mut dyn Backend,
    focus: &mut FocusManager,
    keys: &mut KeyMatcher,
    config: &Config,
    vars: &HashMap<String, String>,
    raw_config: &str,
    seat: u32,
    focused_target: NodeId,
    reading: bool,
    pending_execs: &mut Vec<String>,
    subscriptions: &mut u32,
) -> Result<Option<(u32, Value)>> {
    let Some(request) = RequestType::from_code(type_code) else {
        log::warn!("ipc: unknown request type {type_code}, dropping client");
        return Ok(None);
    };
    let body = match request {
        RequestType::RunCommand => {
            let line = String::from_utf8_lossy(payload).to_string();
            let mut ctx = CommandContext {
                tree,
                backend,
                focus,
                keys,
                config,
                seat,
                target: focused_target,
                reading,
                pending_execs,
            };
            let outcomes = commands::run(&mut ctx, &line, vars);
            Value::Array(
                outcomes
                    .into_iter()
                    .map(|o| json::success_json(o.success, o.error.as_deref()))
                    .collect(),
            )
        }
        RequestType::GetWorkspaces => json::workspaces_json(tree, focus, seat),
        RequestType::Subscribe => {
            let mask = match parse_subscription_mask(payload) {
                Ok(mask) => mask,
                Err(e) => {
                    log::warn!("ipc: malformed subscribe payload, dropping client: {e}");
                    return Ok(None);
                }
            };
            *subscriptions = mask;
            json::success_json(true, None)
        }
        RequestType::GetOutputs => json::outputs_json(tree),
        RequestType::GetTree => json::tree_json(tree),
        RequestType::GetMarks => json::marks_json(),
        RequestType::GetBarConfig => json::bar_config_ids_json(),
        RequestType::GetVersion => json::version_json(config),
        RequestType::GetBindingModes => json::binding_modes_json(),
        RequestType::GetConfig => json::config_json(raw_config),
        RequestType::SendTick => json::success_json(true, None),
        RequestType::Sync => json::success_json(true, None),
        RequestType::GetBindingState => serde_json::json!({ "name": "default" }),
        RequestType::GetInputs => json::inputs_json(),
        RequestType::GetSeats => json::seats_json(focus, seat),
    };
    Ok(Some((request.code(), body)))
}

/// `SUBSCRIBE`'s payload is a JSON array of event-name strings (e.g.
/// `["workspace", "window"]`); unrecognized names are ignored, but a
/// payload that isn't even valid JSON is propagated as an error rather than
/// silently treated as an empty subscription, so the caller can drop the
/// connection instead of leaving a client subscribed to nothing by accident.
fn parse_subscription_mask(payload: &[u8]) -> Result<u32> {
    let names: Vec<String> = serde_json::from_slice(payload)
        .map_err(|e| Error::IpcProtocol(format!("parsing subscribe payload: {e}")))?;
    let mut mask = 0u32;
    for name in names {
        let event = match name.as_str() {
            "workspace" => EventType::Workspace,
            "output" => EventType::Output,
            "mode" => EventType::Mode,
            "window" => EventType::Window,
            "barconfig_update" => EventType::BarConfigUpdate,
            "binding" => EventType::Binding,
            "shutdown" => EventType::Shutdown,
            "tick" => EventType::Tick,
            _ => continue,
        };
        mask |= event.subscription_mask();
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_mask_recognizes_known_events() {
        let mask = parse_subscription_mask(br#"["workspace","window","bogus"]"#).unwrap();
        assert_eq!(
            mask,
            EventType::Workspace.subscription_mask() | EventType::Window.subscription_mask()
        );
    }

    #[test]
    fn subscription_mask_rejects_malformed_json() {
        assert!(parse_subscription_mask(b"not json").is_err());
    }

    #[test]
    fn bind_and_drop_removes_socket_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tilewm.sock");
        {
            let _server = IpcServer::bind(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
