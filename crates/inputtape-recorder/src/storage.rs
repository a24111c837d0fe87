//! Recording storage - JSON lines, one action per line

use crate::events::{ActionEvent, EventLog, Recording};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use inputtape_core::Error;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const EXTENSION: &str = "jsonl";

/// Upper bound on the preallocation taken from a header's event count
const MAX_PREALLOC: usize = 1 << 16;

/// First line of every file
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    name: String,
    started_at: DateTime<Utc>,
    events: usize,
}

pub struct RecordingStorage {
    dir: PathBuf,
}

impl RecordingStorage {
    /// Storage under `~/.inputtape`
    pub fn new() -> Result<Self> {
        Self::with_dir(default_dir()?)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn save(&self, recording: &Recording) -> Result<PathBuf> {
        let ts = recording.started_at.format("%Y%m%d_%H%M%S");
        let filename = format!("{}_{}.{}", sanitize(&recording.name), ts, EXTENSION);
        let path = self.dir.join(&filename);
        self.save_to(recording, &path)?;
        Ok(path)
    }

    pub fn save_to(&self, recording: &Recording, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut w = BufWriter::new(file);

        let header = Header {
            name: recording.name.clone(),
            started_at: recording.started_at,
            events: recording.events.len(),
        };
        serde_json::to_writer(&mut w, &header)?;
        writeln!(w)?;

        for e in &recording.events {
            serde_json::to_writer(&mut w, e)?;
            writeln!(w)?;
        }

        w.flush()?;
        tracing::info!(path = %path.display(), events = recording.events.len(), "recording saved");
        Ok(())
    }

    /// Load by file name (relative to the storage dir) or by path
    pub fn load(&self, file: &str) -> Result<Recording> {
        let path = self.resolve(file);
        let f = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut lines = BufReader::new(f).lines();

        let header_line = lines
            .next()
            .ok_or_else(|| Error::invalid_recording(format!("{} is empty", path.display())))??;
        let header: Header = serde_json::from_str(&header_line)
            .with_context(|| format!("Bad header in {}", path.display()))?;

        let mut events = Vec::with_capacity(header.events.min(MAX_PREALLOC));
        for (i, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let e: ActionEvent = serde_json::from_str(&line)
                .with_context(|| format!("Bad event on line {} of {}", i + 2, path.display()))?;
            events.push(e);
        }

        let events = EventLog::from(events);
        if let Err(i) = events.validate() {
            return Err(Error::invalid_recording(format!(
                "{}: event {} is earlier than the one before it",
                path.display(),
                i
            ))
            .with_context(serde_json::json!({ "path": path.display().to_string(), "index": i }))
            .into());
        }
        if events.len() != header.events {
            tracing::warn!(
                expected = header.events,
                found = events.len(),
                "event count differs from header"
            );
        }

        Ok(Recording {
            name: header.name,
            started_at: header.started_at,
            events,
        })
    }

    /// All recordings, sorted by file name
    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(s) = name.to_str() {
                if s.ends_with(&format!(".{}", EXTENSION)) {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, file: &str) -> Result<()> {
        let path = self.resolve(file);
        fs::remove_file(&path).with_context(|| format!("Failed to delete {}", path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let p = Path::new(file);
        if p.is_absolute() || p.exists() {
            p.to_path_buf()
        } else {
            self.dir.join(file)
        }
    }
}

/// `~/.inputtape`
pub fn default_dir() -> Result<PathBuf> {
    let home = dirs_next::home_dir().context("Home directory not found")?;
    Ok(home.join(".inputtape"))
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
