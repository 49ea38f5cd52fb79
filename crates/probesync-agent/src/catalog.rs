//! File catalog
//!
//! Enumerates candidate capture files in the working directory. The
//! sensor process embeds a sortable timestamp in the file name, so
//! lexical order coincides with chronological order.
//!
//! A file is "active" (still being appended to, never safe to delete)
//! when it is the newest in the sorted list or a companion
//! write-in-progress journal artifact sits alongside it.

use crate::config::Config;
use crate::error::Result;
use std::collections::HashSet;
use std::path::PathBuf;

/// Suffix of the companion write-in-progress artifact
/// (e.g., `rpi-kismet-2026.kismet` -> `rpi-kismet-2026.kismet-journal`).
pub const JOURNAL_SUFFIX: &str = "-journal";

/// A capture file discovered in the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFile {
    /// Full path to the file
    pub path: PathBuf,

    /// File name (used for chronological ordering)
    pub name: String,

    /// Whether the file may still be written to by the sensor process
    pub active: bool,
}

/// Scans a directory for capture files matching the naming convention
#[derive(Debug, Clone)]
pub struct FileCatalog {
    dir: PathBuf,
    prefix: String,
    suffix: String,
}

impl FileCatalog {
    /// Create a catalog over a directory with an explicit convention
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Create a catalog from the agent configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.capture_dir(),
            config.file_prefix.clone(),
            config.file_suffix.clone(),
        )
    }

    /// Enumerate capture files, oldest first, with active files marked.
    pub fn scan(&self) -> Result<Vec<CaptureFile>> {
        let mut names: Vec<String> = Vec::new();
        let mut journals: HashSet<String> = HashSet::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if name.starts_with(&self.prefix) && name.ends_with(&self.suffix) {
                names.push(name);
            } else if let Some(base) = name.strip_suffix(JOURNAL_SUFFIX) {
                journals.insert(base.to_owned());
            }
        }

        names.sort();
        let newest = names.last().cloned();

        Ok(names
            .into_iter()
            .map(|name| {
                let active = Some(&name) == newest.as_ref() || journals.contains(&name);
                CaptureFile {
                    path: self.dir.join(&name),
                    name,
                    active,
                }
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &std::path::Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    fn catalog(dir: &std::path::Path) -> FileCatalog {
        FileCatalog::new(dir, "rpi-kismet", ".kismet")
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        assert!(catalog(dir.path()).scan().unwrap().is_empty());
    }

    #[test]
    fn test_chronological_order_and_newest_active() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "rpi-kismet-2026-02-01.kismet");
        touch(dir.path(), "rpi-kismet-2026-01-15.kismet");
        touch(dir.path(), "rpi-kismet-2026-01-20.kismet");

        let files = catalog(dir.path()).scan().unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "rpi-kismet-2026-01-15.kismet",
                "rpi-kismet-2026-01-20.kismet",
                "rpi-kismet-2026-02-01.kismet",
            ]
        );
        assert!(!files[0].active);
        assert!(!files[1].active);
        assert!(files[2].active);
    }

    #[test]
    fn test_journal_marks_file_active() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "rpi-kismet-01.kismet");
        touch(dir.path(), "rpi-kismet-02.kismet");
        touch(dir.path(), "rpi-kismet-01.kismet-journal");

        let files = catalog(dir.path()).scan().unwrap();
        // Older file has an in-progress journal; both are active
        assert!(files[0].active);
        assert!(files[1].active);
    }

    #[test]
    fn test_non_matching_files_ignored() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "rpi-kismet-01.kismet");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "other-capture.kismet");
        touch(dir.path(), "probesync-watermark.json");

        let files = catalog(dir.path()).scan().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "rpi-kismet-01.kismet");
    }
}
