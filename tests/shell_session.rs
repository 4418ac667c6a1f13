//! End-to-end tests against real subprocesses.
#![cfg(unix)]

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowbridge::config::ShellSettings;
use flowbridge::event::{AppEvent, init_app_eventsource};
use flowbridge::output::{LineClass, StatusIndicator};
use flowbridge::shell::{LineSplitter, ShellBridge, ShellCommand, ShellState};
use flowbridge::ui::{EntryKind, LogEntry, LogSink, MemoryPane};
use flowbridge::{App, AppConfig, BridgeError};
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, Receiver};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

/// Reads output until `count` complete lines have arrived.
async fn read_lines(output: &mut Receiver<Vec<u8>>, count: usize) -> Vec<String> {
    let mut splitter = LineSplitter::new();
    let mut lines = Vec::new();
    while lines.len() < count {
        let chunk = timeout(WAIT, output.recv())
            .await
            .expect("timed out waiting for shell output")
            .expect("shell output closed early");
        lines.extend(splitter.push(&chunk));
    }
    lines
}

fn sh() -> ShellCommand {
    ShellCommand::new("sh")
}

#[tokio::test]
async fn merged_output_keeps_write_order() {
    let (event_sink, _events) = init_app_eventsource();
    let mut bridge = ShellBridge::new(sh());
    let mut output = bridge.start(event_sink).unwrap();
    assert_eq!(bridge.state(), ShellState::Running);
    assert!(bridge.pid().is_some());

    bridge.send("echo out-1").unwrap();
    bridge.send("echo err-1 >&2").unwrap();
    bridge.send("echo out-2").unwrap();

    assert_eq!(read_lines(&mut output, 3).await, vec!["out-1", "err-1", "out-2"]);
}

#[tokio::test]
async fn commands_reach_stdin_verbatim_and_in_order() {
    // cat echoes its input, so the output is exactly what the bridge wrote
    let (event_sink, _events) = init_app_eventsource();
    let mut bridge = ShellBridge::new(ShellCommand::new("cat"));
    let mut output = bridge.start(event_sink).unwrap();

    bridge.send("cd known_root").unwrap();
    bridge.send("make synth").unwrap();

    assert_eq!(read_lines(&mut output, 2).await, vec!["cd known_root", "make synth"]);
}

#[tokio::test]
async fn anchored_send_resets_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let (event_sink, _events) = init_app_eventsource();
    let mut bridge = ShellBridge::new(sh());
    let mut output = bridge.start(event_sink).unwrap();

    bridge.send("cd /").unwrap();
    bridge.send_anchored(&root, "pwd").unwrap();

    assert_eq!(read_lines(&mut output, 1).await, vec![root.display().to_string()]);
}

#[tokio::test]
async fn term_is_dumb() {
    let (event_sink, _events) = init_app_eventsource();
    let mut bridge = ShellBridge::new(sh().cwd(Path::new("/")));
    let mut output = bridge.start(event_sink).unwrap();

    bridge.send("echo \"$TERM\"").unwrap();
    bridge.send("pwd").unwrap();

    assert_eq!(read_lines(&mut output, 2).await, vec!["dumb", "/"]);
}

#[tokio::test]
async fn invalid_utf8_is_replaced() {
    let (event_sink, _events) = init_app_eventsource();
    let mut bridge = ShellBridge::new(sh());
    let mut output = bridge.start(event_sink).unwrap();

    bridge.send(r"printf 'a\377b\n'").unwrap();

    let lines = read_lines(&mut output, 1).await;
    assert_eq!(lines, vec!["a\u{FFFD}b"]);
}

#[tokio::test]
async fn shell_exit_is_reported_and_final() {
    let (event_sink, mut events) = init_app_eventsource();
    let mut bridge = ShellBridge::new(sh());
    let mut output = bridge.start(event_sink).unwrap();

    bridge.send("echo bye").unwrap();
    bridge.send("exit 3").unwrap();

    assert_eq!(read_lines(&mut output, 1).await, vec!["bye"]);

    let closed = timeout(WAIT, output.recv()).await.unwrap();
    assert_eq!(closed, None);
    let event = timeout(WAIT, events.recv()).await.unwrap();
    assert_eq!(event, Some(AppEvent::ShellExited));

    let status = bridge.shutdown().expect("exit status");
    assert_eq!(status.code(), Some(3));
    assert_eq!(bridge.state(), ShellState::Stopped);
    assert!(matches!(bridge.send("echo again"), Err(BridgeError::Write { .. })));

    let (event_sink, _events) = init_app_eventsource();
    assert!(matches!(bridge.start(event_sink), Err(BridgeError::AlreadyStarted)));
}

#[tokio::test]
async fn spawn_failure_then_send_fails() {
    let (event_sink, _events) = init_app_eventsource();
    let mut bridge = ShellBridge::new(ShellCommand::new("/nonexistent/flowbridge-sh"));

    match bridge.start(event_sink) {
        Err(BridgeError::Spawn { program, .. }) => assert_eq!(program, "/nonexistent/flowbridge-sh"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("spawn should fail"),
    }
    assert_eq!(bridge.state(), ShellState::Stopped);
    assert!(matches!(bridge.send("make synth"), Err(BridgeError::Write { .. })));
}

/// Shares its entries with the test and signals when the shell has exited.
#[derive(Clone, Default)]
struct WatchedPane {
    pane: Arc<Mutex<MemoryPane>>,
    exited: Arc<Notify>,
}

impl LogSink for WatchedPane {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        self.pane.lock().unwrap().append(entry)?;
        if entry.kind == EntryKind::Failure && entry.text.starts_with("Shell exited") {
            self.exited.notify_one();
        }
        Ok(())
    }

    fn set_status(&mut self, status: StatusIndicator) -> io::Result<()> {
        self.pane.lock().unwrap().set_status(status)
    }
}

#[tokio::test]
async fn app_loop_renders_output_until_shell_exits() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let os_release = root.join("os-release");
    std::fs::write(&os_release, "NAME=\"Ubuntu\"\nID=ubuntu\n").unwrap();

    let config = AppConfig {
        shell: ShellSettings {
            program: "sh".to_string(),
            args: Vec::new(),
            ..ShellSettings::default()
        },
        os_release,
        ..AppConfig::default()
    };
    let pane = WatchedPane::default();
    let mut app = App::new(&config, root, pane.clone());
    assert_eq!(app.bridge().state(), ShellState::Running);

    let (input_tx, input_rx) = mpsc::channel(8);
    let driver = async {
        input_tx.send(Ok("echo hello-error".to_string())).await.unwrap();
        input_tx.send(Ok("exit".to_string())).await.unwrap();
        pane.exited.notified().await;
        input_tx.send(Ok(":quit".to_string())).await.unwrap();
    };

    let (result, ()) = timeout(WAIT, async { tokio::join!(app.run(input_rx), driver) })
        .await
        .expect("app loop did not finish");
    result.unwrap();

    assert!(app.should_exit());
    assert_eq!(app.bridge().state(), ShellState::Stopped);

    let pane = pane.pane.lock().unwrap();
    assert_eq!(pane.output_lines(), vec![(LineClass::ErrorLike, "hello-error")]);
    assert_eq!(pane.status, StatusIndicator::Attention);
    let last = pane.entries.last().unwrap();
    assert_eq!(last.kind, EntryKind::Failure);
    assert!(last.text.starts_with("Shell exited"));
}
