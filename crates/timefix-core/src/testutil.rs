//! Shared test doubles: an in-memory metadata store, a scripted prompt, and
//! recording collaborators that never touch the real filesystem tools.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::gateway::{
    FsAttributeWriter, InteractivePrompt, MetadataGateway, PreviewApp, QuarantineMover,
    TagSelector,
};

fn file_key(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Metadata gateway over an in-memory tag store, keyed by file name so
/// renamed files keep working like they would with a real tool.
#[derive(Default)]
pub struct MemoryGateway {
    tags: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    writes: Mutex<Vec<(PathBuf, String)>>,
}

impl MemoryGateway {
    pub fn with_tags(self, file: &str, tags: &[(&str, &str)]) -> Self {
        {
            let mut store = self.tags.lock().unwrap();
            let entry = store.entry(file.to_string()).or_default();
            for (tag, raw) in tags {
                entry.insert(tag.to_string(), raw.to_string());
            }
        }
        self
    }

    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.writes.lock().unwrap().clone()
    }
}

impl MetadataGateway for MemoryGateway {
    fn read_all(&self, path: &Path) -> Result<BTreeMap<String, String>> {
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(&file_key(path))
            .cloned()
            .unwrap_or_default())
    }

    fn read_one(&self, path: &Path, tag: &str) -> Result<Option<String>> {
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(&file_key(path))
            .and_then(|tags| tags.get(tag))
            .cloned())
    }

    fn write(&self, path: &Path, formatted: &str, tags: &TagSelector) -> Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), formatted.to_string()));

        let names: Vec<String> = match tags {
            TagSelector::AllDates => vec![
                "DateTimeOriginal".to_string(),
                "CreateDate".to_string(),
                "ModifyDate".to_string(),
            ],
            TagSelector::Tags(names) => names.clone(),
        };
        let mut store = self.tags.lock().unwrap();
        let entry = store.entry(file_key(path)).or_default();
        for name in names {
            entry.insert(name, formatted.to_string());
        }
        Ok(())
    }
}

/// Gateway whose reads always fail, as if the external tool kept timing out.
/// Writes succeed so the failure can be isolated to the read side.
pub struct FailingGateway;

impl MetadataGateway for FailingGateway {
    fn read_all(&self, path: &Path) -> Result<BTreeMap<String, String>> {
        Err(Error::MetadataRead {
            path: path.to_path_buf(),
            message: "simulated read failure".to_string(),
        })
    }

    fn read_one(&self, path: &Path, _tag: &str) -> Result<Option<String>> {
        Err(Error::MetadataRead {
            path: path.to_path_buf(),
            message: "simulated read failure".to_string(),
        })
    }

    fn write(&self, _path: &Path, _formatted: &str, _tags: &TagSelector) -> Result<()> {
        Ok(())
    }
}

/// Prompt double that replays a fixed script of answers.
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
        }
    }
}

impl InteractivePrompt for ScriptedPrompt {
    fn choose(&self, _prompt: &str, valid: &[String]) -> Result<String> {
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Prompt("prompt script exhausted".to_string()))?;
        assert!(
            valid.contains(&answer),
            "scripted answer {answer:?} not among valid options {valid:?}"
        );
        Ok(answer)
    }
}

#[derive(Default)]
pub struct RecordingAttrs {
    stamps: Mutex<Vec<(PathBuf, NaiveDateTime)>>,
}

impl RecordingAttrs {
    pub fn stamps(&self) -> Vec<(PathBuf, NaiveDateTime)> {
        self.stamps.lock().unwrap().clone()
    }
}

impl FsAttributeWriter for RecordingAttrs {
    fn set_created_and_modified(&self, path: &Path, ts: NaiveDateTime) -> Result<()> {
        self.stamps.lock().unwrap().push((path.to_path_buf(), ts));
        Ok(())
    }
}

/// Records intended moves without touching the filesystem.
#[derive(Default)]
pub struct RecordingMover {
    moved: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl RecordingMover {
    pub fn moved(&self) -> Vec<(PathBuf, PathBuf)> {
        self.moved.lock().unwrap().clone()
    }
}

impl QuarantineMover for RecordingMover {
    fn move_all(&self, paths: &[PathBuf], dest_dir: &Path) -> usize {
        let mut moved = self.moved.lock().unwrap();
        for path in paths {
            moved.push((path.clone(), dest_dir.to_path_buf()));
        }
        paths.len()
    }
}

pub struct NoPreview;

impl PreviewApp for NoPreview {
    fn open(&self, _path: &Path) {}
    fn close(&self) {}
}
