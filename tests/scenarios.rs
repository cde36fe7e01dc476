//! End-to-end scenarios exercised against the public API with
//! `StubBackend` standing in for a real compositor.

use std::io::Read;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use tilewm::backend::test_support::StubBackend;
use tilewm::backend::{Direction, OutputId, SurfaceHandle};
use tilewm::config::Config;
use tilewm::geometry::Rect;
use tilewm::ipc::protocol::{self, EventType, RequestType};
use tilewm::ipc::IpcServer;
use tilewm::keys::{HeldKeys, KeyMatcher, Modifiers};
use tilewm::layout;
use tilewm::tree::{ContainerTree, Layout};

/// S1 — horizontal split geometry: three equal-weight views in a 1920-wide
/// workspace split evenly, with the last view's edge landing exactly on
/// the workspace boundary.
#[test]
fn s1_horizontal_split_geometry() {
    let mut tree = ContainerTree::new();
    let output = tree.create_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    let ws = tree.create_workspace(output, "1").unwrap();
    tree.get_mut(ws).unwrap().layout = Layout::Horiz;

    let a = tree.create_view(SurfaceHandle(1));
    let b = tree.create_view(SurfaceHandle(2));
    let c = tree.create_view(SurfaceHandle(3));
    tree.add_child(ws, a).unwrap();
    tree.add_child(ws, b).unwrap();
    tree.add_child(ws, c).unwrap();

    let mut backend = StubBackend::new();
    layout::arrange(&mut tree, &mut backend, tree.root()).unwrap();

    assert_eq!(tree.get(a).unwrap().rect, Rect::new(0, 0, 640, 1080));
    assert_eq!(tree.get(b).unwrap().rect, Rect::new(640, 0, 640, 1080));
    assert_eq!(tree.get(c).unwrap().rect, Rect::new(1280, 0, 640, 1080));
    let c_rect = tree.get(c).unwrap().rect;
    assert_eq!(c_rect.x + c_rect.w, 1920);
}

/// S2 — pixel drift: an odd total width still sums exactly, with the
/// remainder absorbed by the last child.
#[test]
fn s2_pixel_drift_absorbed_by_last_child() {
    let mut tree = ContainerTree::new();
    let output = tree.create_output(OutputId(1), Rect::new(0, 0, 1921, 1080));
    let ws = tree.create_workspace(output, "1").unwrap();
    tree.get_mut(ws).unwrap().layout = Layout::Horiz;

    let views: Vec<_> = (0..3)
        .map(|i| {
            let v = tree.create_view(SurfaceHandle(i));
            tree.add_child(ws, v).unwrap();
            v
        })
        .collect();

    let mut backend = StubBackend::new();
    layout::arrange(&mut tree, &mut backend, tree.root()).unwrap();

    let widths: Vec<i32> = views.iter().map(|&v| tree.get(v).unwrap().rect.w).collect();
    assert_eq!(widths, vec![640, 640, 641]);
    assert_eq!(widths.iter().sum::<i32>(), 1921);
}

/// S3 — directional wrap across outputs: focusing right off the
/// rightmost output returns nothing without wrapping enabled, and lands
/// on the leftmost output's view with wrapping enabled.
#[test]
fn s3_directional_wrap_across_outputs() {
    let mut tree = ContainerTree::new();
    let left_output = tree.create_output(OutputId(1), Rect::new(0, 0, 960, 1080));
    let left_ws = tree.create_workspace(left_output, "1").unwrap();
    let left_view = tree.create_view(SurfaceHandle(1));
    tree.add_child(left_ws, left_view).unwrap();

    let right_output = tree.create_output(OutputId(2), Rect::new(960, 0, 960, 1080));
    let right_ws = tree.create_workspace(right_output, "2").unwrap();
    let right_view = tree.create_view(SurfaceHandle(2));
    tree.add_child(right_ws, right_view).unwrap();

    let mut backend = StubBackend::new();
    backend.set_adjacent(OutputId(1), Direction::Right, OutputId(2));
    backend.set_adjacent(OutputId(2), Direction::Left, OutputId(1));

    let mut focus = tilewm::focus::FocusManager::new();
    focus
        .set_focus(&mut tree, &mut backend, 0, right_view)
        .unwrap();

    let no_wrap = focus.directional(&tree, &backend, right_view, Direction::Right, false);
    assert_eq!(no_wrap, None);

    let wrapped = focus.directional(&tree, &backend, right_view, Direction::Right, true);
    assert_eq!(wrapped, Some(left_view));
}

/// S4 — binding match: a three-key chord fires its command exactly once
/// and only on the completing press.
#[test]
fn s4_binding_fires_once_on_completing_press() {
    let mut matcher = KeyMatcher::new();
    const SUPER_L: u32 = 1;
    const SHIFT_L: u32 = 2;
    const KEY_Q: u32 = 3;
    matcher.bind(
        Modifiers::LOGO | Modifiers::SHIFT,
        vec![SUPER_L, SHIFT_L, KEY_Q],
        "kill".to_string(),
        false,
    );

    let mut held = HeldKeys::new();
    held.press(SHIFT_L);
    assert!(matcher.matches(Modifiers::SHIFT, &held).is_none());
    held.press(SUPER_L);
    assert!(matcher
        .matches(Modifiers::LOGO | Modifiers::SHIFT, &held)
        .is_none());
    held.press(KEY_Q);
    let binding = matcher
        .matches(Modifiers::LOGO | Modifiers::SHIFT, &held)
        .expect("chord should now be complete");
    assert_eq!(binding.command, "kill");
}

/// S5 — IPC `RUN_COMMAND` round-trip over a real Unix socket: a
/// `workspace 2` command produces the exact i3-ipc reply a real client
/// would expect.
#[test]
fn s5_ipc_command_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = tmp.path().join("tilewm.sock");
    let mut server = IpcServer::bind(&socket_path).unwrap();

    let mut client = UnixStream::connect(&socket_path).unwrap();
    client.set_nonblocking(true).unwrap();

    let payload = b"workspace 2";
    protocol::write_frame(&mut client, RequestType::RunCommand.code(), payload).unwrap();

    let mut tree = ContainerTree::new();
    let output = tree.create_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    tree.create_workspace(output, "1").unwrap();
    let mut backend = StubBackend::new();
    let mut focus = tilewm::focus::FocusManager::new();
    let mut keys = KeyMatcher::new();
    let config = Config::default();
    let vars = std::collections::HashMap::new();
    let target = tree.root();
    let mut pending_execs = Vec::new();

    // Give the listener a moment to see the connection before polling.
    std::thread::sleep(Duration::from_millis(20));
    server
        .poll(
            &mut tree,
            &mut backend,
            &mut focus,
            &mut keys,
            &config,
            &vars,
            "",
            0,
            target,
            false,
            &mut pending_execs,
        )
        .unwrap();

    assert!(tree.workspace_by_name("2").is_some());

    std::thread::sleep(Duration::from_millis(20));
    let mut response = [0u8; 512];
    let n = read_available(&mut client, &mut response);
    let body = &response[..n];
    assert!(body.starts_with(protocol::MAGIC));
    let (type_code, json_payload, _) = protocol::try_parse_frame(body).unwrap().unwrap();
    assert_eq!(type_code, RequestType::RunCommand.code());
    let value: serde_json::Value = serde_json::from_slice(&json_payload).unwrap();
    assert_eq!(value, serde_json::json!([{ "success": true }]));
}

/// S6 — `SUBSCRIBE` + event fan-out: only the subscribed client receives
/// the broadcast workspace event.
#[test]
fn s6_subscribed_client_receives_event_unsubscribed_does_not() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = tmp.path().join("tilewm.sock");
    let mut server = IpcServer::bind(&socket_path).unwrap();

    let mut subscriber = UnixStream::connect(&socket_path).unwrap();
    subscriber.set_nonblocking(true).unwrap();
    let mut bystander = UnixStream::connect(&socket_path).unwrap();
    bystander.set_nonblocking(true).unwrap();

    protocol::write_frame(
        &mut subscriber,
        RequestType::Subscribe.code(),
        br#"["workspace"]"#,
    )
    .unwrap();

    let mut tree = ContainerTree::new();
    let output = tree.create_output(OutputId(1), Rect::new(0, 0, 1920, 1080));
    tree.create_workspace(output, "1").unwrap();
    let mut backend = StubBackend::new();
    let mut focus = tilewm::focus::FocusManager::new();
    let mut keys = KeyMatcher::new();
    let config = Config::default();
    let vars = std::collections::HashMap::new();
    let target = tree.root();
    let mut pending_execs = Vec::new();

    std::thread::sleep(Duration::from_millis(20));
    server
        .poll(
            &mut tree,
            &mut backend,
            &mut focus,
            &mut keys,
            &config,
            &vars,
            "",
            0,
            target,
            false,
            &mut pending_execs,
        )
        .unwrap();
    // Drain the SUBSCRIBE ack so it doesn't get mistaken for the event.
    let mut ack = [0u8; 256];
    read_available(&mut subscriber, &mut ack);

    server
        .broadcast(EventType::Workspace, &serde_json::json!({ "change": "focus" }))
        .unwrap();

    std::thread::sleep(Duration::from_millis(20));
    let mut subscriber_buf = [0u8; 512];
    let n = read_available(&mut subscriber, &mut subscriber_buf);
    assert!(n > 0, "subscribed client should receive the event frame");
    let (type_code, _, _) = protocol::try_parse_frame(&subscriber_buf[..n]).unwrap().unwrap();
    assert_eq!(type_code, EventType::Workspace.code());

    let mut bystander_buf = [0u8; 512];
    let n = read_available(&mut bystander, &mut bystander_buf);
    assert_eq!(n, 0, "unsubscribed client should receive nothing");
}

fn read_available(stream: &mut UnixStream, buf: &mut [u8]) -> usize {
    match stream.read(buf) {
        Ok(n) => n,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => 0,
        Err(e) => panic!("unexpected read error: {e}"),
    }
}
