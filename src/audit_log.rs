//! Per-collection audit log.
//!
//! Each collection gets its own text file under the root log folder,
//! `UpgradeTeamProjectFeatures-<collection>.txt`. Status lines go through a
//! single call that writes the terse console sink and the detailed file sink.
//! The file is truncated on open; there is no rotation and no sharing.
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const LOG_FILE_PREFIX: &str = "UpgradeTeamProjectFeatures-";

/// File name for a collection's log, with path separators neutralized.
pub fn log_file_name(collection_name: &str) -> String {
    let safe: String = collection_name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect();
    format!("{LOG_FILE_PREFIX}{safe}.txt")
}

/// Open log for one collection plus the console it mirrors to.
pub struct AuditLog<'c> {
    path: PathBuf,
    file: BufWriter<File>,
    console: &'c mut dyn Write,
}

impl<'c> AuditLog<'c> {
    /// Create the collection's log and write its header.
    pub fn open(root: &Path, collection_name: &str, console: &'c mut dyn Write) -> Result<Self> {
        let path = root.join(log_file_name(collection_name));
        let file =
            File::create(&path).with_context(|| format!("create log {}", path.display()))?;
        let mut log = Self {
            path,
            file: BufWriter::new(file),
            console,
        };
        log.file(&format!("*** scanning Team Projects in TPC {collection_name} ***"))?;
        log.file("")?;
        Ok(log)
    }

    /// Write `console` to the console and `detail` to the log file.
    pub fn status(&mut self, console: &str, detail: &str) -> Result<()> {
        self.console(console)?;
        self.file(detail)
    }

    /// Write the same line to both sinks.
    pub fn both(&mut self, text: &str) -> Result<()> {
        self.status(text, text)
    }

    pub fn console(&mut self, text: &str) -> Result<()> {
        writeln!(self.console, "{text}").context("write console")
    }

    pub fn file(&mut self, text: &str) -> Result<()> {
        writeln!(self.file, "{text}").with_context(|| format!("write {}", self.path.display()))
    }

    /// Flush and close the file, returning its path.
    ///
    /// Dropping the log without calling this still flushes and closes the
    /// file, but any error is lost.
    pub fn close(self) -> Result<PathBuf> {
        let Self { path, file, .. } = self;
        let file = file
            .into_inner()
            .map_err(|err| err.into_error())
            .with_context(|| format!("flush {}", path.display()))?;
        file.sync_all().with_context(|| format!("sync {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
#[path = "audit_log_tests.rs"]
mod tests;
