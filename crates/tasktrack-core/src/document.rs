//! Document resource: the text holding task lines plus the cursor that points into it.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrackError};
use crate::line::identifiers_in;
use crate::session::TaskId;
use crate::store::replace_file;

pub trait TaskDocument {
    /// Zero-based line the cursor sits on.
    fn cursor_line(&self) -> usize;

    /// Full document text.
    fn text(&self) -> Result<String>;

    /// Replaces line `line` (zero-based) with `content`, keeping its line terminator.
    fn write_line(&mut self, line: usize, content: &str) -> Result<()>;

    /// Line `line` without its `\n` terminator, or `None` past the end of the document.
    fn read_line(&self, line: usize) -> Result<Option<String>> {
        Ok(line_at(&self.text()?, line).map(str::to_string))
    }

    fn current_line(&self) -> Result<Option<String>> {
        self.read_line(self.cursor_line())
    }

    /// Identifiers already embedded anywhere in the document.
    fn identifiers(&self) -> Result<BTreeSet<TaskId>> {
        Ok(identifiers_in(&self.text()?))
    }
}

fn line_at(text: &str, line: usize) -> Option<&str> {
    text.split_inclusive('\n')
        .nth(line)
        .map(|l| l.strip_suffix('\n').unwrap_or(l))
}

fn replace_line(text: &str, line: usize, content: &str) -> Result<String> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    if line >= lines.len() {
        return Err(TrackError::LineOutOfRange {
            line,
            len: lines.len(),
        });
    }
    let mut out = String::with_capacity(text.len() + content.len());
    for (idx, existing) in lines.iter().enumerate() {
        if idx == line {
            out.push_str(content);
            if existing.ends_with('\n') {
                out.push('\n');
            }
        } else {
            out.push_str(existing);
        }
    }
    Ok(out)
}

/// A document on disk. Rewrites go through a temporary file so a failed write leaves the
/// original untouched; a symlinked document is rewritten at its target.
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
    cursor: usize,
}

impl FileDocument {
    pub fn new(path: impl AsRef<Path>, cursor: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cursor,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskDocument for FileDocument {
    fn cursor_line(&self) -> usize {
        self.cursor
    }

    fn text(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.path)?)
    }

    fn write_line(&mut self, line: usize, content: &str) -> Result<()> {
        let updated = replace_line(&self.text()?, line, content)?;
        replace_file(&self.path, updated.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDocument {
    text: String,
    cursor: usize,
}

impl MemoryDocument {
    pub fn new(text: impl Into<String>, cursor: usize) -> Self {
        Self {
            text: text.into(),
            cursor,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl TaskDocument for MemoryDocument {
    fn cursor_line(&self) -> usize {
        self.cursor
    }

    fn text(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    fn write_line(&mut self, line: usize, content: &str) -> Result<()> {
        self.text = replace_line(&self.text, line, content)?;
        Ok(())
    }
}
