//! Best-effort text recognition.
//!
//! Recognition is a capability behind the [`TextRecognizer`] trait, so the
//! pipeline never depends on one platform:
//!
//! | Provider | Implementation |
//! |---|---|
//! | `disabled` | [`DisabledRecognizer`], never returns text |
//! | `vision` | [`CommandRecognizer::vision`], macOS Vision through a Swift script |
//! | `command` | [`CommandRecognizer::new`], any program printing text on stdout |
//!
//! ## Process contract
//!
//! The external program gets one image path. Text on stdout with exit code 0
//! is a result. Empty or whitespace-only output, a non-zero exit, a spawn
//! failure, or running past the timeout is an [`OcrError`]. Callers treat
//! every error as "no text" and keep going.
//!
//! One deadline covers the whole run: waiting for the exit status and
//! waiting for stdout to close. Its stdout is drained on a helper thread to
//! keep a large result from blocking on a full pipe. On Unix the child leads
//! its own process group, and an overrun kills the group, so a helper that
//! leaves a background process holding the pipe costs at most `timeout`.

use crate::config::{OcrConfig, OcrProvider};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Placeholder replaced by the image path in command arguments.
pub const PATH_PLACEHOLDER: &str = "{path}";

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    #[error("{program} printed no text")]
    Empty { program: String },
    #[error("text recognition is disabled")]
    Disabled,
}

/// A text recognition backend.
pub trait TextRecognizer {
    /// Recognize text in the image at `path`. The text is trimmed and never
    /// empty; finding nothing is [`OcrError::Empty`].
    fn recognize(&self, path: &Path) -> Result<String, OcrError>;

    /// Stable description of the backend and its settings. Cached results
    /// are only reused while this stays the same.
    fn fingerprint(&self) -> String;

    /// Whether this backend can ever produce text.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Recognition switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRecognizer;

impl TextRecognizer for DisabledRecognizer {
    fn recognize(&self, _path: &Path) -> Result<String, OcrError> {
        Err(OcrError::Disabled)
    }

    fn fingerprint(&self) -> String {
        "disabled".to_string()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Runs an external program per image, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRecognizer {
    /// `args` may contain [`PATH_PLACEHOLDER`]; without one, the image path
    /// is appended as the last argument.
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// The platform-native recognizer: `swift <script> {path} --languages <hints>`.
    pub fn vision(script: &str, languages: &[String], timeout: Duration) -> Self {
        let mut args = vec![script.to_string(), PATH_PLACEHOLDER.to_string()];
        if !languages.is_empty() {
            args.push("--languages".to_string());
            args.push(languages.join(","));
        }
        Self::new("swift", args, timeout)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for one run, with the placeholder substituted.
    fn args_for(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        if self.args.iter().any(|a| a.contains(PATH_PLACEHOLDER)) {
            self.args
                .iter()
                .map(|a| a.replace(PATH_PLACEHOLDER, &path))
                .collect()
        } else {
            let mut args = self.args.clone();
            args.push(path.into_owned());
            args
        }
    }
}

impl TextRecognizer for CommandRecognizer {
    fn recognize(&self, path: &Path) -> Result<String, OcrError> {
        let mut command = Command::new(&self.program);
        command.args(self.args_for(path));
        debug!(program = %self.program, path = %path.display(), "running text recognizer");

        let (status, stdout) = run_with_timeout(command, &self.program, self.timeout)?;
        if !status.success() {
            return Err(OcrError::Failed {
                program: self.program.clone(),
                status,
            });
        }
        let text = String::from_utf8_lossy(&stdout).trim().to_string();
        if text.is_empty() {
            return Err(OcrError::Empty {
                program: self.program.clone(),
            });
        }
        Ok(text)
    }

    fn fingerprint(&self) -> String {
        format!("command:{}\0{}", self.program, self.args.join("\0"))
    }
}

/// Spawn `command`, collect stdout, and kill it once `timeout` has passed.
fn run_with_timeout(
    mut command: Command,
    program: &str,
    timeout: Duration,
) -> Result<(ExitStatus, Vec<u8>), OcrError> {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| OcrError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = stdout.read_to_end(&mut buf).map(|_| buf);
        // The receiver is gone once the run timed out.
        let _ = tx.send(result);
    });

    let timed_out = || OcrError::TimedOut {
        program: program.to_string(),
        timeout,
    };
    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            kill_tree(&mut child);
            return Err(timed_out());
        }
        thread::sleep(POLL_INTERVAL);
    };

    // A leftover background process can hold stdout open after the exit.
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(stdout) => Ok((status, stdout?)),
        Err(RecvTimeoutError::Timeout) => {
            kill_tree(&mut child);
            Err(timed_out())
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(io::Error::other("stdout reader thread panicked").into())
        }
    }
}

/// Kill the child and, on Unix, every process left in its group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        if let Err(e) = Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            debug!(error = %e, "could not signal the recognizer process group");
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Build the recognizer selected by the config.
///
/// `vision` needs macOS; elsewhere it degrades to [`DisabledRecognizer`]
/// with a warning rather than failing every image.
pub fn recognizer_from_config(config: &OcrConfig) -> Box<dyn TextRecognizer> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider {
        OcrProvider::Disabled => Box::new(DisabledRecognizer),
        OcrProvider::Vision => {
            if cfg!(target_os = "macos") {
                Box::new(CommandRecognizer::vision(
                    &config.script,
                    &config.languages,
                    timeout,
                ))
            } else {
                warn!("ocr.provider = \"vision\" needs macOS; text recognition is disabled");
                Box::new(DisabledRecognizer)
            }
        }
        OcrProvider::Command => match config.command.split_first() {
            Some((program, args)) => {
                Box::new(CommandRecognizer::new(program.clone(), args.to_vec(), timeout))
            }
            None => {
                warn!("ocr.command is empty; text recognition is disabled");
                Box::new(DisabledRecognizer)
            }
        },
    }
}
