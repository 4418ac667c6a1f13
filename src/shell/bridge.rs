//! Persistent shell subprocess and its command/output bridge.
//!
//! The bridge owns exactly one interactive interpreter. Commands go to its
//! stdin as newline-terminated text; stdout and stderr share a single pipe so
//! the reader thread sees them interleaved in the order they were written.
//! There is no request/response pairing: both directions are append-only
//! streams.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::error::BridgeError;
use crate::event::AppEvent;

// Channel buffer sizes
const OUTPUT_CHANNEL_BUFFER: usize = 1024;
const READ_BUFFER: usize = 16384;

/// Lifecycle of the shell session.
///
/// `Stopped` is terminal: the bridge never respawns the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    NotStarted,
    Running,
    Stopped,
}

/// How to launch the interpreter.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl Default for ShellCommand {
    /// `bash -i` with `TERM=dumb`.
    fn default() -> Self {
        Self::new("bash").arg("-i")
    }
}

impl ShellCommand {
    /// A command for `program` with no arguments and `TERM=dumb`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: vec![("TERM".to_string(), "dumb".to_string())],
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets an environment override, replacing an earlier one for `key`.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.into()));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Owns the single long-lived shell session.
pub struct ShellBridge {
    command: ShellCommand,
    state: ShellState,
    child: Option<Child>,
    writer: Option<Box<dyn Write + Send>>,
}

impl ShellBridge {
    /// Creates a bridge in the `NotStarted` state.
    pub fn new(command: ShellCommand) -> Self {
        Self {
            command,
            state: ShellState::NotStarted,
            child: None,
            writer: None,
        }
    }

    /// Creates a running bridge whose input goes to `writer` instead of a
    /// subprocess. There is no output side.
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            command: ShellCommand::new("<detached>"),
            state: ShellState::Running,
            child: None,
            writer: Some(writer),
        }
    }

    pub fn state(&self) -> ShellState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn program(&self) -> &str {
        &self.command.program
    }

    /// Spawns the interpreter and starts draining its merged output.
    ///
    /// Returns the receiver for raw output chunks, delivered in arrival
    /// order. End-of-stream and read failures are reported on `event_sink`
    /// after the last chunk has been queued.
    ///
    /// On failure the bridge moves straight to `Stopped`; later `send`
    /// calls fail with [`BridgeError::Write`].
    pub fn start(
        &mut self,
        event_sink: UnboundedSender<AppEvent>,
    ) -> Result<Receiver<Vec<u8>>, BridgeError> {
        if self.state != ShellState::NotStarted {
            return Err(BridgeError::AlreadyStarted);
        }

        match self.spawn(event_sink) {
            Ok(output_rx) => {
                self.state = ShellState::Running;
                Ok(output_rx)
            }
            Err(e) => {
                error!("Shell failed to start: {}", e);
                self.state = ShellState::Stopped;
                Err(e)
            }
        }
    }

    fn spawn(
        &mut self,
        event_sink: UnboundedSender<AppEvent>,
    ) -> Result<Receiver<Vec<u8>>, BridgeError> {
        let program = self.command.program.clone();
        let spawn_err = |source: io::Error| BridgeError::Spawn {
            program: program.clone(),
            source,
        };

        // One pipe for both stdout and stderr gives a single ordered stream
        let (reader, out_writer) = io::pipe().map_err(spawn_err)?;
        let err_writer = out_writer.try_clone().map_err(spawn_err)?;

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .envs(self.command.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(out_writer)
            .stderr(err_writer);
        if let Some(cwd) = &self.command.cwd {
            cmd.current_dir(cwd);
        }

        let spawned = cmd.spawn();
        // The parent's copies of the write end live in `cmd`; EOF only
        // arrives once they are gone.
        drop(cmd);
        let mut child = spawned.map_err(spawn_err)?;

        let stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => {
                kill_and_reap(&mut child);
                return Err(spawn_err(io::Error::other("shell stdin was not captured")));
            }
        };

        let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(OUTPUT_CHANNEL_BUFFER);

        let reader_thread = thread::Builder::new()
            .name("shell-reader".to_string())
            .spawn(move || read_loop(reader, output_tx, event_sink));
        if let Err(e) = reader_thread {
            kill_and_reap(&mut child);
            return Err(spawn_err(e));
        }

        info!(
            pid = child.id(),
            program = %self.command.program,
            args = ?self.command.args,
            "Shell started"
        );

        self.child = Some(child);
        self.writer = Some(Box::new(stdin));
        Ok(output_rx)
    }

    /// Writes `command` followed by a single `\n` and flushes.
    ///
    /// Trailing line terminators already present in `command` are dropped
    /// first, so the shell sees exactly one. Fire-and-forget: nothing waits
    /// for the command's output, and a failed write is not retried.
    pub fn send(&mut self, command: &str) -> Result<(), BridgeError> {
        let writer = match (self.state, self.writer.as_mut()) {
            (ShellState::Running, Some(writer)) => writer,
            _ => {
                warn!(state = ?self.state, "Dropping command, shell is not running: {}", command);
                return Err(BridgeError::not_running());
            }
        };

        let line = frame_command(command);
        let result = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush());

        if let Err(source) = result {
            warn!("Failed to write command to shell: {}", source);
            self.refresh_state();
            return Err(BridgeError::Write { source });
        }

        debug!("Sent to shell: {}", command);
        Ok(())
    }

    /// Re-anchors the shell at `root`, then sends `command`.
    ///
    /// The long-lived shell keeps every `cd` it ever ran, so commands with
    /// relative paths always go through here.
    pub fn send_anchored(&mut self, root: &Path, command: &str) -> Result<(), BridgeError> {
        self.send(&anchor_command(root))?;
        self.send(command)
    }

    /// Ends the session: closes stdin, kills the interpreter if it is still
    /// alive and reaps it. Idempotent.
    pub fn shutdown(&mut self) -> Option<ExitStatus> {
        self.writer = None;
        self.state = match self.state {
            ShellState::NotStarted => ShellState::NotStarted,
            _ => ShellState::Stopped,
        };

        let mut child = self.child.take()?;
        let status = match child.try_wait() {
            Ok(Some(status)) => Some(status),
            _ => {
                kill_and_reap(&mut child);
                child.try_wait().ok().flatten()
            }
        };
        info!(status = ?status, "Shell stopped");
        status
    }

    fn refresh_state(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        if let Ok(Some(status)) = child.try_wait() {
            info!(status = ?status, "Shell has exited");
            self.child = None;
            self.writer = None;
            self.state = ShellState::Stopped;
        }
    }
}

impl Drop for ShellBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The `cd` command that returns the shell to `root`.
pub fn anchor_command(root: &Path) -> String {
    format!("cd {}", quote(&root.to_string_lossy()))
}

/// Single-quotes `arg` for a POSIX shell.
pub fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn frame_command(command: &str) -> String {
    let mut line = command.trim_end_matches(['\r', '\n']).to_string();
    line.push('\n');
    line
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Kill on shell failed: {}", e);
    }
    if let Err(e) = child.wait() {
        error!("Failed to reap shell process: {}", e);
    }
}

fn read_loop(
    mut reader: impl Read,
    output_tx: Sender<Vec<u8>>,
    event_sink: UnboundedSender<AppEvent>,
) {
    let mut buf = [0u8; READ_BUFFER];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                // EOF: every writer is gone, the shell exited
                if let Err(e) = event_sink.send(AppEvent::ShellExited) {
                    error!("Failed to send ShellExited event: {:?}", e);
                }
                break;
            }
            Ok(n) => {
                // blocking_send is fine here, this is a plain std thread
                if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                    // Receiver dropped, nobody is listening any more
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if let Err(send_err) = event_sink.send(AppEvent::ShellError {
                    message: format!("shell output read error: {}", e),
                }) {
                    error!("Failed to send ShellError event: {:?}", send_err);
                }
                break;
            }
        }
    }
}
