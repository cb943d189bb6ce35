//! Resume log of tracks already handled, so a new session picks up where the
//! last one stopped.
//!
//! The log is line oriented: one track id per line marks it done, a line of
//! the form `-<id>` retracts it again (used when the user goes back). Loading
//! replays the lines in order into an in-memory set, so writing the same id
//! twice is harmless.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_RESUME_FILE: &str = "processed_tracks.log";

const RETRACT_PREFIX: char = '-';

/// Append-only record of disposed track ids
pub struct ResumeStore {
    path: PathBuf,
    file: File,
    done: HashSet<String>,
}

impl ResumeStore {
    /// Open (or create) the log at `path` and rebuild the set of done ids.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };

        let done = replay(&content);

        // Bytes up to and including the last newline. Anything after it is an
        // interrupted write and is cut off, so it never counts on a later open.
        let complete_len = content.rfind('\n').map_or(0, |end| end + 1);
        if complete_len < content.len() {
            tracing::warn!(path = %path.display(), "Resume log ends mid-line, discarding partial entry");
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(complete_len as u64)?;
            file.sync_all()?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::info!(path = %path.display(), count = done.len(), "Resume log loaded");

        Ok(Self { path, file, done })
    }

    /// Mark `track_id` as done. Returns `false` when it already was.
    ///
    /// The entry is synced to disk before returning.
    pub fn record(&mut self, track_id: &str) -> io::Result<bool> {
        validate_id(track_id)?;
        if self.done.contains(track_id) {
            return Ok(false);
        }

        self.append_line(track_id)?;
        self.done.insert(track_id.to_string());
        tracing::debug!(track_id, "Recorded track in resume log");
        Ok(true)
    }

    /// Undo a previous [`record`](Self::record). Returns `false` when the id was not done.
    pub fn retract(&mut self, track_id: &str) -> io::Result<bool> {
        validate_id(track_id)?;
        if !self.done.contains(track_id) {
            return Ok(false);
        }

        self.append_line(&format!("{}{}", RETRACT_PREFIX, track_id))?;
        self.done.remove(track_id);
        tracing::debug!(track_id, "Retracted track from resume log");
        Ok(true)
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.done.contains(track_id)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.done.iter().map(String::as_str)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }

    fn append_line(&mut self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.file.write_all(buf.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()
    }
}

fn validate_id(track_id: &str) -> io::Result<()> {
    if track_id.is_empty()
        || track_id.starts_with(RETRACT_PREFIX)
        || track_id.chars().any(char::is_whitespace)
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid track id {:?}", track_id),
        ));
    }
    Ok(())
}

fn replay(content: &str) -> HashSet<String> {
    let mut done = HashSet::new();
    let complete = match content.rfind('\n') {
        Some(end) => &content[..end],
        None => "",
    };

    for line in complete.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.strip_prefix(RETRACT_PREFIX) {
            Some(id) => {
                done.remove(id);
            }
            None => {
                done.insert(line.to_string());
            }
        }
    }
    done
}
