//! Per-task log files.
//!
//! Layout: `<root>/<YYYYMMDD_HHMMSS>/task_001_<slug>.log`, one file per task,
//! every line prefixed with `[YYYY-MM-DD HH:MM:SS.mmm]`.
//!
//! Write failures are logged and the affected task's file is abandoned; a log
//! problem never fails the run.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::events::TaskEvent;

use super::board::format_duration;
use super::ProgressObserver;

pub const DEFAULT_SLUG_LENGTH: usize = 40;

/// Lowercase, non-alphanumerics collapsed to `_`, cut at a word boundary.
pub fn slugify_task_name(name: &str, max_length: usize) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.len() <= max_length {
        return slug.to_string();
    }
    let cut = &slug[..max_length];
    match cut.rfind('_') {
        Some(pos) if pos > 0 => cut[..pos].to_string(),
        _ => cut.trim_end_matches('_').to_string(),
    }
}

/// `task_001_<slug>.log` (1-based, zero-padded to three digits).
pub fn format_log_filename(task_index: usize, task_name: &str) -> String {
    format!(
        "task_{:03}_{}.log",
        task_index + 1,
        slugify_task_name(task_name, DEFAULT_SLUG_LENGTH)
    )
}

pub fn format_run_directory(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("[%Y-%m-%d %H:%M:%S%.3f]").to_string()
}

pub struct TaskLogWriter {
    run_dir: PathBuf,
    files: HashMap<usize, BufWriter<File>>,
    abandoned: Vec<usize>,
}

impl TaskLogWriter {
    pub fn new(root: impl AsRef<Path>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_dir: root.as_ref().join(format_run_directory(started_at)),
            files: HashMap::new(),
            abandoned: Vec::new(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn log_path(&self, task_index: usize, task_name: &str) -> PathBuf {
        self.run_dir.join(format_log_filename(task_index, task_name))
    }

    fn open(&mut self, task_index: usize, task_name: &str) -> std::io::Result<&mut BufWriter<File>> {
        if !self.files.contains_key(&task_index) {
            fs::create_dir_all(&self.run_dir)?;
            let file = File::create(self.log_path(task_index, task_name))?;
            self.files.insert(task_index, BufWriter::new(file));
        }
        self.files
            .get_mut(&task_index)
            .ok_or_else(|| std::io::Error::other("log file vanished"))
    }

    fn write_line(&mut self, task_index: usize, task_name: &str, at: DateTime<Utc>, text: &str) {
        if self.abandoned.contains(&task_index) {
            return;
        }
        let result = self
            .open(task_index, task_name)
            .and_then(|w| writeln!(w, "{} {}", format_timestamp(at), text));
        if let Err(e) = result {
            warn!(task = task_name, error = %e, "cannot write task log; giving up on this file");
            self.files.remove(&task_index);
            self.abandoned.push(task_index);
        }
    }

    fn close(&mut self, task_index: usize, task_name: &str) {
        let Some(mut w) = self.files.remove(&task_index) else {
            return;
        };
        if let Err(e) = w.flush() {
            warn!(task = task_name, error = %e, "cannot flush task log");
        }
    }
}

impl ProgressObserver for TaskLogWriter {
    fn apply(&mut self, event: &TaskEvent) {
        match event {
            TaskEvent::Started {
                task_index,
                task_name,
                timestamp,
            } => {
                self.write_line(*task_index, task_name, *timestamp, &format!("started: {task_name}"));
            }
            TaskEvent::OutputLine {
                task_index,
                task_name,
                line,
                timestamp,
            } => {
                self.write_line(*task_index, task_name, *timestamp, line);
            }
            TaskEvent::Finished {
                task_index,
                task_name,
                outcome,
                duration,
                error,
                timestamp,
            } => {
                // skipped tasks never opened a file; don't create one just to say so
                if !self.files.contains_key(task_index) {
                    return;
                }
                let mut summary = format!("finished: {outcome} in {}", format_duration(*duration));
                if let Some(err) = error {
                    summary.push_str(&format!(" ({err})"));
                }
                self.write_line(*task_index, task_name, *timestamp, &summary);
                self.close(*task_index, task_name);
            }
            TaskEvent::RunStarted { .. } | TaskEvent::RunFinished { .. } => {}
        }
    }
}

impl Drop for TaskLogWriter {
    fn drop(&mut self) {
        for (_, mut w) in self.files.drain() {
            let _ = w.flush();
        }
    }
}
