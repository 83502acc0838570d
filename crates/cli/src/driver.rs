// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal Driver (C1): a narrow, testable adapter over an external
//! terminal-multiplexer executable invoked as a child process.
//!
//! This is the sole place in the crate where user-provided strings are
//! quoted into a shell command line. Every other component holds a
//! [`SessionName`] (already validated at construction) and never builds
//! shell text itself.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::DriverError;
use crate::session::SessionName;

/// One element of a `send_keys` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// Sent as-is (typed literally into the pane).
    Literal(String),
    Enter,
    Escape,
    CtrlC,
    Slash,
}

impl Key {
    /// Render as the token tmux's `send-keys` expects.
    fn as_tmux_token(&self) -> String {
        match self {
            Self::Literal(s) => shell_quote(s),
            Self::Enter => "Enter".to_string(),
            Self::Escape => "Escape".to_string(),
            Self::CtrlC => "C-c".to_string(),
            Self::Slash => shell_quote("/"),
        }
    }
}

/// One row of `listSessions()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub created_at_unix: i64,
    pub attached: bool,
    pub window_count: u32,
}

/// Escape a string for inclusion inside single quotes in a POSIX shell
/// command line, via the `'\''` idiom.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn reject_control_chars(s: &str, field: &str) -> Result<(), DriverError> {
    if s.chars().any(|c| c.is_control()) {
        return Err(DriverError::BadName(format!("{field} must not contain control characters")));
    }
    Ok(())
}

/// The Terminal Driver contract (C1). Implemented manually (rather than via
/// `#[async_trait]`) as boxed futures, the same shape as the detector
/// pipeline's `Detector` trait, so production and fake implementations can
/// be swapped behind a trait object.
pub trait TerminalDriver: Send + Sync {
    fn session_exists<'a>(
        &'a self,
        name: &'a SessionName,
    ) -> Pin<Box<dyn Future<Output = Result<bool, DriverError>> + Send + 'a>>;

    fn create_session<'a>(
        &'a self,
        name: &'a SessionName,
        working_dir: &'a Path,
        window_name: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'a>>;

    fn kill_session<'a>(
        &'a self,
        name: &'a SessionName,
    ) -> Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'a>>;

    fn send_keys<'a>(
        &'a self,
        name: &'a SessionName,
        keys: &'a [Key],
    ) -> Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'a>>;

    fn capture_pane<'a>(
        &'a self,
        name: &'a SessionName,
        last_n_lines: i64,
    ) -> Pin<Box<dyn Future<Output = Result<String, DriverError>> + Send + 'a>>;

    fn list_sessions<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SessionInfo>, DriverError>> + Send + 'a>>;
}

/// Production adapter targeting a tmux-compatible session-oriented
/// multiplexer. Every invocation shells out through a single
/// `{shell} -c {command}` child process with a hard wall-clock timeout.
pub struct TmuxDriver {
    mux_bin: String,
    shell: String,
    timeout: Duration,
}

impl TmuxDriver {
    pub fn new(mux_bin: impl Into<String>, shell: impl Into<String>, timeout: Duration) -> Self {
        Self { mux_bin: mux_bin.into(), shell: shell.into(), timeout }
    }

    async fn run(&self, command: String) -> Result<std::process::Output, DriverError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return Err(DriverError::SpawnFailed(e.to_string())),
        };

        // `kill_on_drop` means the in-flight child is SIGKILLed if this
        // future is dropped by the surrounding `timeout`, satisfying the
        // "on timeout the child is killed" requirement without needing a
        // handle to the child after the race.
        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(DriverError::SpawnFailed(e.to_string())),
            Err(_) => {
                warn!(command = %redact(&command), "terminal driver invocation timed out");
                Err(DriverError::Timeout)
            }
        }
    }

    fn bin(&self) -> &str {
        &self.mux_bin
    }
}

/// tmux's error text for an operation against a session that doesn't
/// exist. Matched against stderr to normalize to `DriverError::NotFound`.
fn stderr_is_not_found(stderr: &str) -> bool {
    stderr.contains("can't find session") || stderr.contains("session not found")
}

fn stderr_is_duplicate(stderr: &str) -> bool {
    stderr.contains("duplicate session")
}

fn redact(command: &str) -> String {
    if command.len() > 120 {
        format!("{}...", &command[..120])
    } else {
        command.to_string()
    }
}

impl TerminalDriver for TmuxDriver {
    fn session_exists<'a>(
        &'a self,
        name: &'a SessionName,
    ) -> Pin<Box<dyn Future<Output = Result<bool, DriverError>> + Send + 'a>> {
        Box::pin(async move {
            let command = format!("{} has-session -t {}", self.bin(), shell_quote(name.as_str()));
            match self.run(command).await {
                Ok(output) => Ok(output.status.success()),
                Err(e) => Err(e),
            }
        })
    }

    fn create_session<'a>(
        &'a self,
        name: &'a SessionName,
        working_dir: &'a Path,
        window_name: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'a>> {
        Box::pin(async move {
            let dir = working_dir.to_string_lossy();
            reject_control_chars(&dir, "working_dir")?;
            let mut command = format!(
                "{} new-session -d -s {} -c {}",
                self.bin(),
                shell_quote(name.as_str()),
                shell_quote(&dir)
            );
            if let Some(window) = window_name {
                reject_control_chars(window, "window_name")?;
                command.push_str(&format!(
                    " \\; rename-window -t {} {}",
                    shell_quote(name.as_str()),
                    shell_quote(window)
                ));
            }
            let output = self.run(command).await?;
            if output.status.success() {
                debug!(session = %name, "driver.session_created");
                return Ok(());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr_is_duplicate(&stderr) {
                return Err(DriverError::AlreadyExists(name.to_string()));
            }
            Err(DriverError::SpawnFailed(stderr.trim().to_string()))
        })
    }

    fn kill_session<'a>(
        &'a self,
        name: &'a SessionName,
    ) -> Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'a>> {
        Box::pin(async move {
            let command = format!("{} kill-session -t {}", self.bin(), shell_quote(name.as_str()));
            let output = self.run(command).await?;
            if output.status.success() {
                debug!(session = %name, "driver.session_killed");
                return Ok(());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr_is_not_found(&stderr) {
                return Err(DriverError::NotFound(name.to_string()));
            }
            Err(DriverError::SpawnFailed(stderr.trim().to_string()))
        })
    }

    fn send_keys<'a>(
        &'a self,
        name: &'a SessionName,
        keys: &'a [Key],
    ) -> Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'a>> {
        Box::pin(async move {
            let tokens: Vec<String> = keys.iter().map(Key::as_tmux_token).collect();
            let command =
                format!("{} send-keys -t {} {}", self.bin(), shell_quote(name.as_str()), tokens.join(" "));
            let output = self.run(command).await?;
            if output.status.success() {
                return Ok(());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr_is_not_found(&stderr) {
                return Err(DriverError::NotFound(name.to_string()));
            }
            Err(DriverError::SpawnFailed(stderr.trim().to_string()))
        })
    }

    fn capture_pane<'a>(
        &'a self,
        name: &'a SessionName,
        last_n_lines: i64,
    ) -> Pin<Box<dyn Future<Output = Result<String, DriverError>> + Send + 'a>> {
        Box::pin(async move {
            if last_n_lines <= 0 {
                return Err(DriverError::BadName("last_n_lines must be positive".to_string()));
            }
            let command = format!(
                "{} capture-pane -t {} -p -S -{last_n_lines}",
                self.bin(),
                shell_quote(name.as_str())
            );
            let output = self.run(command).await?;
            if output.status.success() {
                return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr_is_not_found(&stderr) {
                return Err(DriverError::NotFound(name.to_string()));
            }
            Err(DriverError::SpawnFailed(stderr.trim().to_string()))
        })
    }

    fn list_sessions<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SessionInfo>, DriverError>> + Send + 'a>> {
        Box::pin(async move {
            let format = "#{session_name}\t#{session_created}\t#{session_attached}\t#{session_windows}";
            let command = format!("{} list-sessions -F {}", self.bin(), shell_quote(format));
            let output = self.run(command).await?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                // An empty server (no sessions at all) exits non-zero; treat
                // that as an empty list rather than an error.
                if stderr.contains("no server running") || stderr.contains("no sessions") {
                    return Ok(Vec::new());
                }
                return Err(DriverError::SpawnFailed(stderr.trim().to_string()));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            let mut sessions = Vec::new();
            for line in stdout.lines() {
                let mut fields = line.split('\t');
                let (Some(name), Some(created), Some(attached), Some(windows)) =
                    (fields.next(), fields.next(), fields.next(), fields.next())
                else {
                    continue;
                };
                sessions.push(SessionInfo {
                    name: name.to_string(),
                    created_at_unix: created.parse().unwrap_or_default(),
                    attached: attached.trim() == "1",
                    window_count: windows.parse().unwrap_or_default(),
                });
            }
            Ok(sessions)
        })
    }
}

impl fmt::Debug for TmuxDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmuxDriver").field("mux_bin", &self.mux_bin).finish()
    }
}

/// In-memory fake used by every unit test and the `tests/specs` integration
/// crate, so the whole orchestrator can be exercised without a real
/// multiplexer binary.
#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use tokio::sync::RwLock;

    use super::*;
    use crate::clock::SharedClock;

    #[derive(Debug, Clone)]
    pub struct FakeSession {
        pub working_dir: PathBuf,
        pub window_name: Option<String>,
        pub pane: String,
        pub created_at_unix: i64,
        /// Set once a send_keys payload containing `launch_marker` is seen.
        pub cli_interactive: bool,
        /// When true, the pane never grows on `/` regardless of
        /// `cli_interactive` — simulates a CLI that never reaches its
        /// interactive prompt.
        pub frozen: bool,
        /// When set, every `send_keys` call against this session fails
        /// with this error.
        pub send_keys_error: Option<DriverError>,
        /// When set, every `capture_pane` call against this session fails
        /// with this error instead of returning the pane text.
        pub capture_pane_error: Option<DriverError>,
    }

    /// In-memory stand-in for [`TerminalDriver`].
    pub struct FakeDriver {
        sessions: RwLock<HashMap<String, FakeSession>>,
        clock: SharedClock,
        /// Literal substring that, when sent via `send_keys`, flips a
        /// session's `cli_interactive` flag (stands in for the real CLI
        /// launch command).
        launch_marker: String,
        kill_sessions: std::sync::atomic::AtomicUsize,
        create_sessions: std::sync::atomic::AtomicUsize,
    }

    impl FakeDriver {
        pub fn new(clock: SharedClock) -> Self {
            Self {
                sessions: RwLock::new(HashMap::new()),
                clock,
                launch_marker: "launch-cli".to_string(),
                kill_sessions: std::sync::atomic::AtomicUsize::new(0),
                create_sessions: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        pub fn with_launch_marker(mut self, marker: impl Into<String>) -> Self {
            self.launch_marker = marker.into();
            self
        }

        pub fn create_session_calls(&self) -> usize {
            self.create_sessions.load(std::sync::atomic::Ordering::SeqCst)
        }

        pub fn kill_session_calls(&self) -> usize {
            self.kill_sessions.load(std::sync::atomic::Ordering::SeqCst)
        }

        /// Test hook: force a session's CLI-interactive state directly,
        /// bypassing the launch-marker heuristic.
        pub async fn set_interactive(&self, name: &str, interactive: bool) {
            if let Some(session) = self.sessions.write().await.get_mut(name) {
                session.cli_interactive = interactive;
            }
        }

        /// Test hook: make the pane permanently unresponsive to the
        /// slash-probe.
        pub async fn set_frozen(&self, name: &str, frozen: bool) {
            if let Some(session) = self.sessions.write().await.get_mut(name) {
                session.frozen = frozen;
            }
        }

        /// Test hook: force every subsequent `send_keys` against this
        /// session to fail with `error`, or clear the injected failure.
        pub async fn set_send_keys_error(&self, name: &str, error: Option<DriverError>) {
            if let Some(session) = self.sessions.write().await.get_mut(name) {
                session.send_keys_error = error;
            }
        }

        /// Test hook: force every subsequent `capture_pane` against this
        /// session to fail with `error`, or clear the injected failure.
        pub async fn set_capture_pane_error(&self, name: &str, error: Option<DriverError>) {
            if let Some(session) = self.sessions.write().await.get_mut(name) {
                session.capture_pane_error = error;
            }
        }

        pub async fn pane_text(&self, name: &str) -> Option<String> {
            self.sessions.read().await.get(name).map(|s| s.pane.clone())
        }
    }

    impl TerminalDriver for FakeDriver {
        fn session_exists<'a>(
            &'a self,
            name: &'a SessionName,
        ) -> Pin<Box<dyn Future<Output = Result<bool, DriverError>> + Send + 'a>> {
            Box::pin(async move { Ok(self.sessions.read().await.contains_key(name.as_str())) })
        }

        fn create_session<'a>(
            &'a self,
            name: &'a SessionName,
            working_dir: &'a Path,
            window_name: Option<&'a str>,
        ) -> Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'a>> {
            Box::pin(async move {
                let mut sessions = self.sessions.write().await;
                if sessions.contains_key(name.as_str()) {
                    return Err(DriverError::AlreadyExists(name.to_string()));
                }
                sessions.insert(
                    name.as_str().to_string(),
                    FakeSession {
                        working_dir: working_dir.to_path_buf(),
                        window_name: window_name.map(str::to_string),
                        pane: "$ ".to_string(),
                        created_at_unix: self.clock.utc_now().timestamp(),
                        cli_interactive: false,
                        frozen: false,
                        send_keys_error: None,
                        capture_pane_error: None,
                    },
                );
                self.create_sessions.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
        }

        fn kill_session<'a>(
            &'a self,
            name: &'a SessionName,
        ) -> Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'a>> {
            Box::pin(async move {
                let mut sessions = self.sessions.write().await;
                if sessions.remove(name.as_str()).is_none() {
                    return Err(DriverError::NotFound(name.to_string()));
                }
                self.kill_sessions.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
        }

        fn send_keys<'a>(
            &'a self,
            name: &'a SessionName,
            keys: &'a [Key],
        ) -> Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'a>> {
            Box::pin(async move {
                let mut sessions = self.sessions.write().await;
                let session =
                    sessions.get_mut(name.as_str()).ok_or_else(|| DriverError::NotFound(name.to_string()))?;
                if let Some(err) = &session.send_keys_error {
                    return Err(err.clone());
                }
                for key in keys {
                    match key {
                        Key::Literal(text) => {
                            if text.contains(&self.launch_marker) && !session.frozen {
                                session.cli_interactive = true;
                            }
                            session.pane.push_str(text);
                        }
                        Key::Enter => session.pane.push('\n'),
                        Key::Slash => {
                            if session.cli_interactive && !session.frozen {
                                session.pane.push_str("\n> palette: search commands, files, and more");
                            } else {
                                session.pane.push('/');
                            }
                        }
                        Key::Escape => {
                            if let Some(idx) = session.pane.rfind("\n> palette") {
                                session.pane.truncate(idx);
                            }
                        }
                        Key::CtrlC => {}
                    }
                }
                Ok(())
            })
        }

        fn capture_pane<'a>(
            &'a self,
            name: &'a SessionName,
            last_n_lines: i64,
        ) -> Pin<Box<dyn Future<Output = Result<String, DriverError>> + Send + 'a>> {
            Box::pin(async move {
                if last_n_lines <= 0 {
                    return Err(DriverError::BadName("last_n_lines must be positive".to_string()));
                }
                let sessions = self.sessions.read().await;
                let session =
                    sessions.get(name.as_str()).ok_or_else(|| DriverError::NotFound(name.to_string()))?;
                if let Some(err) = &session.capture_pane_error {
                    return Err(err.clone());
                }
                let lines: Vec<&str> = session.pane.lines().collect();
                let start = lines.len().saturating_sub(last_n_lines as usize);
                Ok(lines[start..].join("\n"))
            })
        }

        fn list_sessions<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<SessionInfo>, DriverError>> + Send + 'a>> {
            Box::pin(async move {
                let sessions = self.sessions.read().await;
                Ok(sessions
                    .iter()
                    .map(|(name, s)| SessionInfo {
                        name: name.clone(),
                        created_at_unix: s.created_at_unix,
                        attached: false,
                        window_count: 1,
                    })
                    .collect())
            })
        }
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
