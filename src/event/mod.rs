//! Event sources feeding the application loop.
//!
//! Three channels converge on the single application loop:
//!
//! - **User input**: lines typed on stdin, read by a dedicated thread so the
//!   loop never blocks on the terminal
//! - **Shell output**: raw byte chunks from the bridge's reader thread (see
//!   [`crate::shell::ShellBridge::start`])
//! - **App events**: low-frequency lifecycle notifications such as the shell
//!   exiting
//!
//! Output chunks get their own bounded channel so a chatty `make` run cannot
//! flood the lifecycle queue, and end-of-stream is ordered after the last
//! chunk because the reader sends it only after its final chunk went out.

use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc::{self, Receiver, UnboundedReceiver, UnboundedSender};

/// Lifecycle notifications from the shell bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AppEvent {
    /// The merged output stream reached end-of-file.
    ShellExited,

    /// Reading the merged output stream failed.
    ShellError { message: String },
}

/// Creates the channel used for [`AppEvent`]s.
///
/// Unbounded because the events are rare and are sent from a plain thread
/// that must never block on a full queue.
pub fn init_app_eventsource() -> (UnboundedSender<AppEvent>, UnboundedReceiver<AppEvent>) {
    mpsc::unbounded_channel()
}

/// Spawns a thread reading stdin line by line.
///
/// The channel closes once stdin reaches end-of-file or the receiver is
/// dropped.
pub fn init_user_input() -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(64);
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
