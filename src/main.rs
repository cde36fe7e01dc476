//! Binary entry point. Grounded on the nested `way-cooler/src/main.rs`
//! fork's ambient stack (`getopts` for flags, `env_logger` for logging,
//! `nix::sys::signal` for `SIGINT`/`SIGCHLD`), reworked around `tilewm::Wm`
//! instead of that fork's `wlroots` `Server`.
//!
//! No real compositor backend is vendored here (rendering and input
//! binding are out of scope); this binary wires `tilewm::Wm`
//! up to `tilewm::backend::test_support::StubBackend` and the IPC socket
//! so the core is independently runnable and inspectable with `i3-msg`
//! compatible tooling. A real deployment links `tilewm` as a library and
//! supplies its own `Backend` impl instead of this `main`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use getopts::Options;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use tilewm::backend::test_support::StubBackend;
use tilewm::backend::OutputId;
use tilewm::config::{self, Config};
use tilewm::geometry::Rect;
use tilewm::ipc::IpcServer;
use tilewm::wm::Wm;

static SHOULD_EXIT: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_: i32) {
    SHOULD_EXIT.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        signal::sigaction(Signal::SIGINT, &action)?;
        signal::sigaction(Signal::SIGTERM, &action)?;
    }
    // Reap children spawned by `exec`/`exec_always` without an explicit
    // wait() call anywhere in the core.
    unsafe {
        signal::sigaction(
            Signal::SIGCHLD,
            &SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty()),
        )?;
    }
    Ok(())
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {program} [options]");
    print!("{}", opts.usage(&brief));
}

/// `$SWAYSOCK` if set, else a fresh `sway-ipc.<uid>.<pid>.sock` in
/// `$XDG_RUNTIME_DIR` (falling back to `/tmp`), matching the naming a real
/// sway picks for a socket nothing already pointed at. `$I3SOCK` is only
/// ever an output of a successful bind (see below), never consulted as an
/// override here.
fn socket_path() -> std::path::PathBuf {
    std::env::var_os("SWAYSOCK")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| {
            let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
            let uid = nix::unistd::Uid::current().as_raw();
            std::path::PathBuf::from(runtime_dir)
                .join(format!("sway-ipc.{uid}.{}.sock", std::process::id()))
        })
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("c", "config", "path to a config file", "PATH");
    opts.optflag("d", "debug", "enable debug logging");
    opts.optflag("v", "version", "print version and exit");
    opts.optflag("h", "help", "print this help text");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{e}");
            print_usage(&program, &opts);
            std::process::exit(1);
        }
    };

    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return;
    }
    if matches.opt_present("v") {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return;
    }

    if matches.opt_present("d") {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = install_signal_handlers() {
        log::warn!("failed to install signal handlers: {e}");
    }

    let mut config = Config::default();
    let config_path = matches
        .opt_str("c")
        .map(std::path::PathBuf::from)
        .or_else(config::resolve_path);
    let raw_config = match &config_path {
        Some(path) => match config::read_raw(path) {
            Ok(text) => {
                config.loaded_config_file_name = Some(path.display().to_string());
                text
            }
            Err(e) => {
                log::warn!("could not read config {}: {e}", path.display());
                String::new()
            }
        },
        None => {
            log::info!("no config file found; starting with defaults");
            String::new()
        }
    };

    let mut wm = Wm::new(Box::new(StubBackend::new()), config);
    wm.raw_config = raw_config.clone();

    let socket = socket_path();
    match IpcServer::bind(&socket) {
        Ok(server) => {
            log::info!("ipc listening on {}", socket.display());
            std::env::set_var("SWAYSOCK", &socket);
            std::env::set_var("I3SOCK", &socket);
            wm.attach_ipc(server);
        }
        Err(e) => log::error!("failed to bind ipc socket: {e}"),
    }

    // Batch `exec`/`exec_always` from the config instead of spawning them
    // before the core has anywhere to place their windows.
    wm.begin_reading_config();
    for line in raw_config.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        wm.run_command(line);
    }

    // No real backend is wired in (see module doc); seed one output so the
    // core has somewhere to place windows reported over IPC.
    if let Err(e) = wm.on_output_added(OutputId(0), Rect::new(0, 0, 1920, 1080)) {
        log::error!("failed to create initial output: {e}");
        std::process::exit(1);
    }
    wm.end_reading_config();

    log::info!("tilewm running; press Ctrl-C to exit");
    while !SHOULD_EXIT.load(Ordering::SeqCst) {
        if let Err(e) = wm.pump_ipc() {
            log::warn!("ipc poll error: {e}");
        }
        std::thread::sleep(Duration::from_millis(16));
    }
    log::info!("shutting down");
}
