//! Forwarding resolved paths to the editor.
//!
//! The server does not open files itself. A resolved path (with the
//! definition line when one is known) is handed to an [`Opener`], which by
//! default runs the plumber so the editor shows the file.
//!
//! Openers must not block: they run while a search slot is held.
//! [`CommandOpener`] starts its program on the tokio runtime and returns
//! at once; a program still running after the timeout is killed.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Handle;

/// Default opener command line: the path is appended as the last argument.
pub const DEFAULT_OPENER: &[&str] = &["plumb", "-s", "chordfind", "-d", "edit"];

/// How long an opener program may run before it is killed.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can show a file to the user.
pub trait Opener: Send + Sync {
    /// Opens `path`, positioned at `line` when given. Must return without
    /// waiting on the editor; failures are logged.
    fn open(&self, path: &Path, line: Option<u64>);
}

/// Runs an external program with the address appended.
#[derive(Debug, Clone)]
pub struct CommandOpener {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOpener {
    /// Builds an opener from a command line; `None` if `argv` is empty.
    #[must_use]
    pub fn new<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.as_ref().to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            timeout: OPEN_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The argument passed for `path` and `line`: `path:line` or `path`.
    #[must_use]
    pub fn address(path: &Path, line: Option<u64>) -> String {
        match line {
            Some(line) => format!("{}:{line}", path.display()),
            None => path.display().to_string(),
        }
    }
}

impl Default for CommandOpener {
    fn default() -> Self {
        Self {
            program: DEFAULT_OPENER[0].to_string(),
            args: DEFAULT_OPENER[1..].iter().map(ToString::to_string).collect(),
            timeout: OPEN_TIMEOUT,
        }
    }
}

impl Opener for CommandOpener {
    fn open(&self, path: &Path, line: Option<u64>) {
        let address = Self::address(path, line);
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("Cannot run {} for {address}: no runtime", self.program);
            return;
        };

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let program = self.program.clone();
        let timeout = self.timeout;

        runtime.spawn(async move {
            let child = match command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    tracing::warn!("Cannot run {program}: {e}");
                    return;
                }
            };
            // Dropping the child on timeout kills it
            match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(Ok(out)) if out.status.success() => {
                    tracing::debug!("Opened {address} with {program}");
                }
                Ok(Ok(out)) => tracing::warn!(
                    "{program} failed for {address}: {} {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
                Ok(Err(e)) => tracing::warn!("{program} failed for {address}: {e}"),
                Err(_) => tracing::warn!("{program} killed after {timeout:?} for {address}"),
            }
        });
    }
}

/// Opener that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOpener;

impl Opener for NoopOpener {
    fn open(&self, _path: &Path, _line: Option<u64>) {}
}
