//! Application controller.
//!
//! `App` owns the shell bridge, the line framing state, the status indicator,
//! the flow selection and the log sink. Everything that touches them runs on
//! the single application loop in [`App::run`]; the bridge's reader thread
//! only ships bytes over a channel.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{Receiver, UnboundedReceiver};
use tracing::{debug, error, info, warn};

use crate::action::{ACTION_PREFIX, Action, HELP};
use crate::config::AppConfig;
use crate::error::{BridgeError, FlowError};
use crate::event::{AppEvent, init_app_eventsource};
use crate::flow::{DesignFile, FlowContext};
use crate::output::{StatusIndicator, classify, strip_ansi_codes};
use crate::platform;
use crate::shell::{LineSplitter, ShellBridge};
use crate::ui::{LogEntry, LogSink};

pub struct App<S: LogSink> {
    // backend
    bridge: ShellBridge,
    splitter: LineSplitter,
    flow: FlowContext,

    // frontend
    sink: S,
    status: StatusIndicator,

    // settings
    strip_ansi: bool,
    makefile_template: PathBuf,
    /// Why shell commands are refused, if they are.
    shell_disabled: Option<String>,

    exit: bool,

    // event sources
    shell_output: Option<Receiver<Vec<u8>>>,
    app_events: UnboundedReceiver<AppEvent>,
}

impl<S: LogSink> App<S> {
    /// Probes the platform, starts the shell anchored at `root` and reports
    /// both on `sink`.
    ///
    /// A failed probe or spawn is logged, not returned: the application keeps
    /// running with shell commands unavailable.
    pub fn new(config: &AppConfig, root: PathBuf, sink: S) -> Self {
        let (event_sink, app_events) = init_app_eventsource();

        let mut flow = FlowContext::new(root.clone(), config.flow_dir.clone());
        flow.pdk = config.pdk.clone();
        flow.design = config.design.clone();

        let mut app = Self {
            bridge: ShellBridge::new(config.shell.to_command(&root)),
            splitter: LineSplitter::new(),
            flow,
            sink,
            status: StatusIndicator::default(),
            strip_ansi: config.strip_ansi,
            makefile_template: root.join(&config.makefile_template),
            shell_disabled: None,
            exit: false,
            shell_output: None,
            app_events,
        };

        app.notice("Application started.");
        app.notice(format!("Current directory:\n{}", root.display()));

        match platform::probe(&config.os_release) {
            Ok(host) => app.notice(format!("Host platform: {host}")),
            Err(e) => {
                app.report(&e);
                app.shell_disabled = Some(e.to_string());
            }
        }

        match app.bridge.start(event_sink) {
            Ok(output) => {
                debug!(pid = ?app.bridge.pid(), "Shell attached to app");
                app.shell_output = Some(output);
            }
            Err(e) => {
                app.report(&e);
                if e.is_fatal() {
                    app.shell_disabled = Some(format!("`{}` could not be started", app.bridge.program()));
                }
            }
        }

        app
    }

    /// Wraps an already running bridge. Shell output, if any, arrives on
    /// `shell_output`.
    pub fn with_bridge(
        bridge: ShellBridge,
        shell_output: Option<Receiver<Vec<u8>>>,
        app_events: UnboundedReceiver<AppEvent>,
        flow: FlowContext,
        sink: S,
    ) -> Self {
        Self {
            bridge,
            splitter: LineSplitter::new(),
            makefile_template: flow.root.join("defaultMakefile.txt"),
            flow,
            sink,
            status: StatusIndicator::default(),
            strip_ansi: true,
            shell_disabled: None,
            exit: false,
            shell_output,
            app_events,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn status(&self) -> StatusIndicator {
        self.status
    }

    pub fn flow(&self) -> &FlowContext {
        &self.flow
    }

    pub fn bridge(&self) -> &ShellBridge {
        &self.bridge
    }

    pub fn should_exit(&self) -> bool {
        self.exit
    }

    /// Refuse shell commands, e.g. after a failed platform probe.
    pub fn disable_shell(&mut self, reason: impl Into<String>) {
        self.shell_disabled = Some(reason.into());
    }

    /// Runs until `:quit`, end of `user_input`, or a broken input stream.
    pub async fn run(&mut self, mut user_input: Receiver<io::Result<String>>) -> Result<()> {
        loop {
            if self.exit {
                break;
            }
            tokio::select! {
                line = user_input.recv() => {
                    let Some(line) = line else {
                        info!("User input closed");
                        self.exit = true;
                        break;
                    };
                    let line = line.context("Failed to read user input")?;
                    self.handle_input(&line);
                }
                chunk = recv_output(&mut self.shell_output) => {
                    match chunk {
                        Some(bytes) => self.handle_output(&bytes),
                        None => {
                            // Reader thread is gone; whatever is buffered is final
                            self.shell_output = None;
                            self.flush_pending_output();
                        }
                    }
                }
                event = self.app_events.recv() => {
                    // The only sender lives in the reader thread
                    match event {
                        Some(event) => self.handle_app_event(event),
                        None => self.wait_for_input_only(&mut user_input).await?,
                    }
                }
            }
        }

        self.bridge.shutdown();
        Ok(())
    }

    /// Once the event channel has closed only user input is left to wait on.
    async fn wait_for_input_only(
        &mut self,
        user_input: &mut Receiver<io::Result<String>>,
    ) -> Result<()> {
        while !self.exit {
            let Some(line) = user_input.recv().await else {
                self.exit = true;
                break;
            };
            let line = line.context("Failed to read user input")?;
            self.handle_input(&line);
        }
        Ok(())
    }

    /// Handles one line typed by the user.
    pub fn handle_input(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        if trimmed.starts_with(ACTION_PREFIX) {
            match Action::parse(trimmed) {
                Ok(action) => self.perform(action),
                Err(message) => self.failure(message),
            }
        } else {
            // Leading whitespace is part of the command
            self.run_shell(line.trim_end());
        }
    }

    /// Frames, classifies and renders a chunk of shell output.
    pub fn handle_output(&mut self, chunk: &[u8]) {
        for line in self.splitter.push(chunk) {
            self.render_line(&line);
        }
        if let Some(prompt) = self.splitter.flush_prompt() {
            self.render_line(&prompt);
        }
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ShellExited => {
                self.drain_output();
                let status = self.bridge.shutdown();
                info!(?status, "Shell session ended");
                self.failure("Shell exited. Restart flowbridge to open a new session.");
            }
            AppEvent::ShellError { message } => {
                error!("Shell output error: {}", message);
                self.drain_output();
                self.bridge.shutdown();
                self.failure(format!("Shell session stopped: {message}"));
            }
        }
    }

    /// Renders output chunks that were queued before an exit notification.
    fn drain_output(&mut self) {
        if let Some(rx) = self.shell_output.as_mut() {
            let mut chunks = Vec::new();
            loop {
                match rx.try_recv() {
                    Ok(chunk) => chunks.push(chunk),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
            for chunk in chunks {
                self.handle_output(&chunk);
            }
        }
        self.flush_pending_output();
    }

    fn flush_pending_output(&mut self) {
        if let Some(rest) = self.splitter.finish() {
            self.render_line(&rest);
        }
    }

    fn render_line(&mut self, raw: &str) {
        let text = if self.strip_ansi {
            strip_ansi_codes(raw)
        } else {
            raw.to_string()
        };
        let class = classify(&text);
        self.status.observe(class);
        self.emit(LogEntry::output(class, text));
        if let Err(e) = self.sink.set_status(self.status) {
            warn!("Failed to update status indicator: {}", e);
        }
    }

    /// Sends `command` to the shell from the application root.
    fn run_shell(&mut self, command: &str) {
        if let Some(reason) = &self.shell_disabled {
            let message = format!("Shell commands are disabled ({reason})");
            self.failure(message);
            return;
        }
        if let Err(e) = self.bridge.send_anchored(&self.flow.root, command) {
            self.report(&e);
        }
    }

    fn perform(&mut self, action: Action) {
        debug!(?action, "Performing action");
        match action {
            Action::Make(step) => {
                match self.flow.selection() {
                    Some((pdk, design)) => {
                        let message = format!("Design: {design}\nPDK: {pdk}");
                        self.notice(message);
                    }
                    None => self.notice("DEFAULT design"),
                }
                let command = self.flow.step_command(step);
                self.run_shell(&command);
                let label = step.map(|s| s.label()).unwrap_or("full flow");
                self.notice(format!("Running make {label}..."));
            }
            Action::Clean(step) => {
                let command = self.flow.clean_command(step);
                self.run_shell(&command);
                self.notice(format!("make {}", step.target()));
            }
            Action::Gui => {
                let command = self.flow.gui_command();
                self.run_shell(&command);
                self.notice("Opening OpenROAD GUI");
            }
            Action::SourceEnv => {
                let command = self.flow.source_env_command();
                self.run_shell(&command);
                self.notice("Sourcing env.sh");
            }
            Action::Pdk(pdk) => {
                self.notice(format!("PDK changed to: {pdk}"));
                self.flow.pdk = Some(pdk);
            }
            Action::Pdks => match self.flow.list_pdks() {
                Ok(pdks) if pdks.is_empty() => self.notice("No PDKs found"),
                Ok(pdks) => self.notice(format!("PDKs: {}", pdks.join(", "))),
                Err(e) => self.report_flow(&e),
            },
            Action::Design(design) => {
                self.notice(format!("Design changed to: {design}"));
                self.flow.design = Some(design);
            }
            Action::Import(dir) => self.import(&dir),
            Action::Reset(file) => self.reset(file),
            Action::Makefile => {
                let template = self.makefile_template.clone();
                match self.flow.set_makefile(&template) {
                    Ok(_) => self.notice("Makefile updated"),
                    Err(FlowError::NoSelection) => self.failure("No design has been imported yet."),
                    Err(e) => self.report_flow(&e),
                }
            }
            Action::Show(file) => match self.flow.read_design_file(file) {
                Ok(content) => {
                    self.notice(file.file_name());
                    for line in content.lines() {
                        self.emit(LogEntry::plain(line));
                    }
                }
                Err(e) => self.report_flow(&e),
            },
            Action::Load(file, path) => {
                let path = self.flow.root.join(path);
                let content = match std::fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(e) => return self.report_flow(&FlowError::Io { path, source: e }),
                };
                match self.flow.write_design_file(file, &content) {
                    Ok(target) => self.notice(format!("Saved {}", target.display())),
                    Err(e) => self.report_flow(&e),
                }
            }
            Action::Status => {
                let program = self.bridge.program();
                let shell = match self.bridge.pid() {
                    Some(pid) => format!("{program} {:?} (pid {pid})", self.bridge.state()),
                    None => format!("{program} {:?}", self.bridge.state()),
                };
                let message = format!(
                    "shell: {shell}, output: {}, pdk: {}, design: {}",
                    self.status.label(),
                    self.flow.pdk.as_deref().unwrap_or("-"),
                    self.flow.design.as_deref().unwrap_or("-"),
                );
                self.notice(message);
            }
            Action::Help => {
                for line in HELP.lines() {
                    self.emit(LogEntry::plain(line));
                }
            }
            Action::Quit => self.exit = true,
        }
    }

    fn import(&mut self, dir: &Path) {
        let dir = self.flow.root.join(dir);
        let imported = match self.flow.import_design(&dir) {
            Ok(imported) => imported,
            Err(e) => return self.report_flow(&e),
        };
        self.notice(format!(
            "Combined {} files into '{}'.",
            imported.file_count,
            imported.combined.display()
        ));
        self.reset(DesignFile::Config);
        self.reset(DesignFile::Constraint);
        self.notice(format!(
            "Imported {} into {} and {}",
            imported.name,
            imported.pdk_dir.display(),
            imported.src_dir.display()
        ));
    }

    fn reset(&mut self, file: DesignFile) {
        match self.flow.reset_design_file(file) {
            Ok(_) => self.notice(format!("Reset {}", file.file_name())),
            Err(e) => self.report_flow(&e),
        }
    }

    fn emit(&mut self, entry: LogEntry) {
        if let Err(e) = self.sink.append(&entry) {
            error!("Failed to write log entry: {}", e);
        }
    }

    fn notice(&mut self, text: impl Into<String>) {
        self.emit(LogEntry::notice(text));
    }

    fn failure(&mut self, text: impl Into<String>) {
        self.emit(LogEntry::failure(text));
    }

    fn report(&mut self, err: &BridgeError) {
        warn!("{}", err);
        self.failure(err.to_string());
    }

    fn report_flow(&mut self, err: &FlowError) {
        warn!("{}", err);
        self.failure(err.to_string());
    }
}

async fn recv_output(rx: &mut Option<Receiver<Vec<u8>>>) -> Option<Vec<u8>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::output::LineClass;
    use crate::ui::{EntryKind, MemoryPane};

    #[derive(Clone, Default)]
    struct SharedInput(Arc<Mutex<Vec<u8>>>);

    impl SharedInput {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for SharedInput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn app() -> (App<MemoryPane>, SharedInput) {
        let input = SharedInput::default();
        let bridge = ShellBridge::with_writer(Box::new(input.clone()));
        let (_event_sink, app_events) = init_app_eventsource();
        let flow = FlowContext::new("/srv/HelperGUI", "../flow");
        let app = App::with_bridge(bridge, None, app_events, flow, MemoryPane::default());
        (app, input)
    }

    #[test]
    fn test_user_command_is_anchored() {
        let (mut app, input) = app();
        app.handle_input("ls -la\n");
        app.handle_input("   ");
        app.handle_input("  echo ' padded '  \r\n");
        assert_eq!(
            input.text(),
            "cd '/srv/HelperGUI'\nls -la\ncd '/srv/HelperGUI'\n  echo ' padded '\n"
        );
    }

    #[test]
    fn test_make_action_sends_flow_command() {
        let (mut app, input) = app();
        app.handle_input(":pdk sky130hd");
        app.handle_input(":design aes");
        app.handle_input(":make cts");
        assert_eq!(
            input.text(),
            "cd '/srv/HelperGUI'\ncd '../flow' && make DESIGN_CONFIG=./designs/sky130hd/aes/config.mk cts\n"
        );
        assert!(app.sink().texts().contains(&"PDK changed to: sky130hd"));
        assert!(app.sink().texts().contains(&"Running make CTS (Clock Tree)..."));
    }

    #[test]
    fn test_disabled_shell_sends_nothing() {
        let (mut app, input) = app();
        app.disable_shell("/etc/os-release not found");
        app.handle_input("make synth");
        app.handle_input(":clean");
        assert_eq!(input.text(), "");

        let failures = app
            .sink()
            .entries
            .iter()
            .filter(|e| e.kind == EntryKind::Failure)
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    fn test_output_classification_and_status() {
        let (mut app, _input) = app();

        app.handle_output(b"[INFO] start\nError: no such file\nuser@host:~$ ");
        assert_eq!(
            app.sink().output_lines(),
            vec![
                (LineClass::Normal, "[INFO] start"),
                (LineClass::ErrorLike, "Error: no such file"),
                (LineClass::Prompt, "user@host:~$ "),
            ]
        );
        assert_eq!(app.status(), StatusIndicator::Idle);
        assert_eq!(
            app.sink().status_history,
            vec![StatusIndicator::Busy, StatusIndicator::Attention, StatusIndicator::Idle]
        );
    }

    #[test]
    fn test_partial_output_waits_for_newline() {
        let (mut app, _input) = app();
        app.handle_output(b"Running synth");
        assert!(app.sink().output_lines().is_empty());
        app.handle_output(b"esis\n");
        assert_eq!(app.sink().output_lines(), vec![(LineClass::Normal, "Running synthesis")]);
        assert_eq!(app.status(), StatusIndicator::Busy);
    }

    #[test]
    fn test_ansi_is_stripped_before_classifying() {
        let (mut app, _input) = app();
        app.handle_output(b"\x1b[01;32muser@host\x1b[00m:~$ ");
        assert_eq!(app.sink().output_lines(), vec![(LineClass::Prompt, "user@host:~$ ")]);
    }

    #[test]
    fn test_shell_exit_stops_session() {
        let (mut app, input) = app();
        app.handle_output(b"last words");
        app.handle_app_event(AppEvent::ShellExited);
        assert_eq!(app.sink().output_lines(), vec![(LineClass::Normal, "last words")]);
        assert_eq!(app.bridge().state(), crate::shell::ShellState::Stopped);

        app.handle_input("pwd");
        assert_eq!(input.text(), "");
        assert!(!app.should_exit());
    }

    #[test]
    fn test_quit_and_unknown_actions() {
        let (mut app, _input) = app();
        app.handle_input(":frobnicate");
        assert_eq!(app.sink().entries.last().map(|e| e.kind), Some(EntryKind::Failure));
        app.handle_input(":quit");
        assert!(app.should_exit());
    }

    #[test]
    fn test_makefile_without_design() {
        let (mut app, _input) = app();
        app.handle_input(":makefile");
        assert_eq!(
            app.sink().entries.last().map(|e| e.text.as_str()),
            Some("No design has been imported yet.")
        );
    }

    #[test]
    fn test_load_replaces_design_file() {
        let root = tempfile::tempdir().unwrap();
        let design_dir = root.path().join("flow/designs/nangate45/aes");
        std::fs::create_dir_all(&design_dir).unwrap();
        std::fs::write(root.path().join("tight.sdc"), "create_clock -period 2.0 clk\n").unwrap();

        let bridge = ShellBridge::with_writer(Box::new(SharedInput::default()));
        let (_event_sink, app_events) = init_app_eventsource();
        let flow = FlowContext::new(root.path(), "flow");
        let mut app = App::with_bridge(bridge, None, app_events, flow, MemoryPane::default());

        app.handle_input(":pdk nangate45");
        app.handle_input(":design aes");
        app.handle_input(":load constraint.sdc tight.sdc");
        assert_eq!(
            std::fs::read_to_string(design_dir.join("constraint.sdc")).unwrap(),
            "create_clock -period 2.0 clk\n"
        );

        app.handle_input(":load config.mk missing.mk");
        assert_eq!(app.sink().entries.last().map(|e| e.kind), Some(EntryKind::Failure));
    }

    #[tokio::test]
    async fn test_run_ends_with_user_input() {
        // app() drops the event sender, so run() falls back to input only
        let (mut app, input) = app();
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(Ok(":pdk asap7".to_string())).await.unwrap();
        tx.send(Ok("make synth".to_string())).await.unwrap();
        drop(tx);

        app.run(rx).await.unwrap();
        assert!(app.should_exit());
        assert_eq!(app.flow().pdk.as_deref(), Some("asap7"));
        assert_eq!(input.text(), "cd '/srv/HelperGUI'\nmake synth\n");
    }

    #[tokio::test]
    async fn test_run_reports_broken_input() {
        let (mut app, _input) = app();
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(Err(io::Error::from(io::ErrorKind::InvalidData))).await.unwrap();

        let err = app.run(rx).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read user input"));
    }

    #[test]
    fn test_status_names_the_shell() {
        let (mut app, _input) = app();
        app.handle_input(":status");
        let last = app.sink().entries.last().map(|e| e.text.clone()).unwrap();
        assert!(last.starts_with("shell: <detached> Running"), "{last}");
    }

    #[test]
    fn test_spawn_failure_disables_shell() {
        let dir = tempfile::tempdir().unwrap();
        let os_release = dir.path().join("os-release");
        std::fs::write(&os_release, "ID=debian\n").unwrap();
        let mut config = AppConfig::default();
        config.shell.program = "/nonexistent/flowbridge-sh".to_string();
        config.os_release = os_release;

        let mut app = App::new(&config, dir.path().to_path_buf(), MemoryPane::default());
        assert_eq!(app.bridge().state(), crate::shell::ShellState::Stopped);

        app.handle_input("pwd");
        let last = app.sink().entries.last().map(|e| e.text.clone()).unwrap();
        assert_eq!(
            last,
            "Shell commands are disabled (`/nonexistent/flowbridge-sh` could not be started)"
        );
    }
}
