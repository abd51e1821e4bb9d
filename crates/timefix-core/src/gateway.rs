//! Collaborator traits around the core, plus the production implementations:
//! exiftool for metadata, the filesystem for renames and attribute stamps,
//! stdin for operator prompts. The core never shells out or blocks on input
//! except through these seams.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Which metadata tags a write targets.
#[derive(Debug, Clone)]
pub enum TagSelector {
    /// The tool's combined date-tag shortcut.
    AllDates,
    Tags(Vec<String>),
}

/// Read and write timestamp metadata on a file.
pub trait MetadataGateway: Sync {
    /// All timestamp-bearing tags as raw strings, keyed by tag name.
    fn read_all(&self, path: &Path) -> Result<BTreeMap<String, String>>;
    /// A single tag's raw value, if the tag is present.
    fn read_one(&self, path: &Path, tag: &str) -> Result<Option<String>>;
    /// Write an already-formatted timestamp to the selected tags.
    fn write(&self, path: &Path, formatted: &str, tags: &TagSelector) -> Result<()>;
}

/// Stamp filesystem creation/modification times.
pub trait FsAttributeWriter: Sync {
    fn set_created_and_modified(&self, path: &Path, ts: NaiveDateTime) -> Result<()>;
}

/// Blocking operator interaction. Implementations retry until one of the
/// valid options is entered, and serialize so at most one prompt is
/// outstanding at a time.
pub trait InteractivePrompt: Sync {
    fn choose(&self, prompt: &str, valid: &[String]) -> Result<String>;

    fn confirm(&self, prompt: &str) -> Result<bool> {
        let answer = self.choose(prompt, &["y".to_string(), "n".to_string()])?;
        Ok(answer == "y")
    }
}

/// Prefix a filename with a formatted timestamp.
pub trait FileRenamer: Sync {
    /// Returns the (possibly unchanged) path. A name that already begins
    /// with the exact formatted timestamp is left alone.
    fn rename_with_prefix(&self, path: &Path, formatted: &str, partition: &str) -> Result<PathBuf>;
}

/// Relocate failed files into the quarantine folder.
pub trait QuarantineMover: Sync {
    /// Move every path into `dest_dir`, creating it if absent. Individual
    /// failures are logged and the file stays in place; returns the number
    /// actually moved.
    fn move_all(&self, paths: &[PathBuf], dest_dir: &Path) -> usize;
}

/// Open files in an external preview application while the operator decides.
pub trait PreviewApp: Sync {
    fn open(&self, path: &Path);
    fn close(&self);
}

/// The full set of collaborators a run needs, grouped so the pipeline can
/// hand them around as one reference.
pub struct Collaborators<'a> {
    pub metadata: &'a dyn MetadataGateway,
    pub attrs: &'a dyn FsAttributeWriter,
    pub prompt: &'a dyn InteractivePrompt,
    pub renamer: &'a dyn FileRenamer,
    pub mover: &'a dyn QuarantineMover,
    pub preview: &'a dyn PreviewApp,
}

/// Metadata access by shelling out to exiftool, with a bounded per-call
/// timeout. A timed-out call is a failed read/write, never a hang.
pub struct ExiftoolGateway {
    timeout: Duration,
}

impl ExiftoolGateway {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Availability/bootstrap check; returns the tool version string.
    pub fn version(&self) -> Result<String> {
        self.run(&["-ver".to_string()]).map(|out| out.trim().to_string())
    }

    fn run(&self, args: &[String]) -> Result<String> {
        run_command("exiftool", args, self.timeout)
    }

    fn run_for(&self, path: &Path, args: &[String]) -> Result<String> {
        self.run(args).map_err(|e| match e {
            Error::MetadataRead { message, .. } => Error::MetadataRead {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }
}

/// Run an external command to completion within `timeout`. Stdout and stderr
/// are drained on background threads so a child producing more than a pipe
/// buffer of output never deadlocks against the exit poll.
fn run_command(program: &str, args: &[String], timeout: Duration) -> Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_reader = child.stdout.take().map(spawn_pipe_reader);
    let stderr_reader = child.stderr.take().map(spawn_pipe_reader);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                // Killing the child closes its pipes, so the reader threads
                // hit EOF and exit on their own.
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Timeout {
                    command: format!("{program} {}", args.join(" ")),
                    timeout,
                });
            }
            None => std::thread::sleep(Duration::from_millis(20)),
        }
    };

    let stdout = stdout_reader.map(join_pipe_reader).unwrap_or_default();
    if status.success() {
        return Ok(stdout);
    }
    let stderr = stderr_reader.map(join_pipe_reader).unwrap_or_default();
    Err(Error::MetadataRead {
        path: PathBuf::new(),
        message: format!("{program} exited with {status}: {}", stderr.trim()),
    })
}

fn spawn_pipe_reader<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = pipe.read_to_string(&mut buf);
        buf
    })
}

fn join_pipe_reader(handle: std::thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

impl MetadataGateway for ExiftoolGateway {
    fn read_all(&self, path: &Path) -> Result<BTreeMap<String, String>> {
        let args = vec![
            "-j".to_string(),
            "-time:all".to_string(),
            "-s".to_string(),
            path.display().to_string(),
        ];
        let stdout = self.run_for(path, &args)?;
        let parsed: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|e| Error::MetadataRead {
                path: path.to_path_buf(),
                message: format!("bad JSON from exiftool: {e}"),
            })?;

        let mut tags = BTreeMap::new();
        if let Some(object) = parsed.as_array().and_then(|a| a.first()).and_then(|v| v.as_object()) {
            for (tag, value) in object {
                if tag == "SourceFile" {
                    continue;
                }
                if let Some(raw) = value.as_str() {
                    tags.insert(tag.clone(), raw.to_string());
                }
            }
        }
        debug!(path = %path.display(), tags = tags.len(), "read timestamp tags");
        Ok(tags)
    }

    fn read_one(&self, path: &Path, tag: &str) -> Result<Option<String>> {
        let args = vec![
            "-s3".to_string(),
            format!("-{tag}"),
            path.display().to_string(),
        ];
        let stdout = self.run_for(path, &args)?;
        let value = stdout.trim();
        Ok(if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        })
    }

    fn write(&self, path: &Path, formatted: &str, tags: &TagSelector) -> Result<()> {
        let mut args = match tags {
            TagSelector::AllDates => vec![format!("-AllDates={formatted}")],
            TagSelector::Tags(names) => names
                .iter()
                .map(|tag| format!("-{tag}={formatted}"))
                .collect(),
        };
        args.push(path.display().to_string());
        self.run(&args).map_err(|e| match e {
            Error::MetadataRead { message, .. } => Error::MetadataWrite {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        Ok(())
    }
}

/// Sets modification (and access) time via the `filetime` crate. Creation
/// time is not portably settable from here; the modification stamp is what
/// downstream tooling keys on.
pub struct FiletimeWriter;

impl FsAttributeWriter for FiletimeWriter {
    fn set_created_and_modified(&self, path: &Path, ts: NaiveDateTime) -> Result<()> {
        let Some(local) = ts.and_local_timezone(chrono::Local).single() else {
            warn!(path = %path.display(), %ts, "timestamp not representable in local time, skipping attribute stamp");
            return Ok(());
        };
        let ft = filetime::FileTime::from_unix_time(local.timestamp(), 0);
        filetime::set_file_times(path, ft, ft)?;
        Ok(())
    }
}

/// Console prompt over stdin. A mutex keeps prompts strictly one at a time
/// even when the surrounding pipeline runs files in parallel.
pub struct ConsolePrompt {
    lock: Mutex<()>,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self { lock: Mutex::new(()) }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractivePrompt for ConsolePrompt {
    fn choose(&self, prompt: &str, valid: &[String]) -> Result<String> {
        let _guard = self.lock.lock().unwrap();
        let stdin = io::stdin();
        loop {
            eprintln!("{prompt}");
            eprint!("> ");
            io::stderr().flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Err(Error::Prompt("stdin closed".to_string()));
            }
            let answer = line.trim();
            if valid.iter().any(|v| v == answer) {
                return Ok(answer.to_string());
            }
            eprintln!("invalid choice, expected one of: {}", valid.join(", "));
        }
    }
}

/// Renames `name` to `<timestamp><partition><name>` in place.
pub struct FsRenamer;

impl FileRenamer for FsRenamer {
    fn rename_with_prefix(&self, path: &Path, formatted: &str, partition: &str) -> Result<PathBuf> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::RenameConflict {
                path: path.to_path_buf(),
                message: "no usable filename".to_string(),
            })?;

        // Only a clean prefix counts as already renamed: the timestamp must
        // be followed by nothing, the extension dot, or the partition.
        // "20230615_143000_1.jpg" still needs its own prefix.
        if let Some(rest) = name.strip_prefix(formatted) {
            if rest.is_empty() || rest.starts_with('.') || rest.starts_with(partition) {
                return Ok(path.to_path_buf());
            }
        }

        let dest = path.with_file_name(format!("{formatted}{partition}{name}"));
        if dest.exists() {
            return Err(Error::RenameConflict {
                path: path.to_path_buf(),
                message: format!("destination already exists: {}", dest.display()),
            });
        }
        if !path.exists() {
            return Err(Error::RenameConflict {
                path: path.to_path_buf(),
                message: "source file vanished".to_string(),
            });
        }
        fs::rename(path, &dest)?;
        Ok(dest)
    }
}

/// Moves files into the quarantine folder and stamps them with "now".
pub struct DirMover;

impl QuarantineMover for DirMover {
    fn move_all(&self, paths: &[PathBuf], dest_dir: &Path) -> usize {
        if paths.is_empty() {
            return 0;
        }
        if let Err(e) = fs::create_dir_all(dest_dir) {
            error!(dir = %dest_dir.display(), error = %e, "cannot create quarantine folder");
            return 0;
        }

        let mut moved = 0;
        for path in paths {
            let Some(name) = path.file_name() else {
                continue;
            };
            let dest = dest_dir.join(name);
            match fs::rename(path, &dest) {
                Ok(()) => {
                    let now = filetime::FileTime::now();
                    let _ = filetime::set_file_times(&dest, now, now);
                    info!(from = %path.display(), to = %dest.display(), "file quarantined");
                    moved += 1;
                }
                Err(e) => {
                    // File stays in place, flagged for manual follow-up.
                    error!(path = %path.display(), error = %e, "quarantine move failed");
                }
            }
        }
        moved
    }
}

/// Best-effort preview via the platform opener. Closing a viewer is not
/// portable, so `close` only logs.
pub struct SystemPreview;

impl PreviewApp for SystemPreview {
    fn open(&self, path: &Path) {
        #[cfg(target_os = "macos")]
        let opener = "open";
        #[cfg(not(target_os = "macos"))]
        let opener = "xdg-open";

        let result = Command::new(opener)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "could not open preview");
        }
    }

    fn close(&self) {
        debug!("preview close requested");
    }
}
