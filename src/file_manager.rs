use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::MirrorError;

/// Owns the output root and maps local paths onto it.
#[derive(Debug, Clone)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    pub fn new(base_dir: &Path) -> Result<Self> {
        let base_dir = base_dir.to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create base directory: {:?}", base_dir))?;

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Where a local path lives on disk. Segments are percent-decoded so a
    /// browser following the encoded reference lands on the stored file.
    pub fn disk_path(&self, local_path: &str) -> PathBuf {
        let mut path = self.base_dir.clone();
        for segment in local_path.split('/').filter(|s| !s.is_empty()) {
            path.push(decode_segment(segment));
        }
        path
    }

    pub fn exists(&self, local_path: &str) -> bool {
        self.disk_path(local_path).is_file()
    }

    /// Reads a previously mirrored file. Invalid UTF-8 is replaced rather
    /// than rejected.
    pub fn read_text_lossy(&self, local_path: &str) -> Result<String, MirrorError> {
        let path = self.disk_path(local_path);
        fs::read(&path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .map_err(|source| MirrorError::LocalRead { path, source })
    }

    pub fn write(&self, local_path: &str, content: &[u8]) -> Result<PathBuf, MirrorError> {
        let path = self.disk_path(local_path);
        let write = |path: &Path| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)
        };

        match write(&path) {
            Ok(()) => Ok(path),
            Err(source) => Err(MirrorError::Write { path, source }),
        }
    }
}

fn decode_segment(segment: &str) -> String {
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    match decoded.as_ref() {
        "." | ".." => "_".repeat(decoded.len()),
        _ => decoded.replace(['/', '\\', '\0'], "_"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_creates_base_dir() {
        let temp_dir = tempdir().unwrap();
        let base = temp_dir.path().join("nested").join("out");
        let file_manager = FileManager::new(&base).unwrap();
        assert!(base.is_dir());
        assert_eq!(file_manager.base_dir(), base.as_path());
    }

    #[test]
    fn test_disk_path_decodes_segments() {
        let temp_dir = tempdir().unwrap();
        let file_manager = FileManager::new(temp_dir.path()).unwrap();

        assert_eq!(
            file_manager.disk_path("caf%C3%A9/index.html"),
            temp_dir.path().join("café").join("index.html")
        );
        assert_eq!(
            file_manager.disk_path("a%2Fb/%2E%2E/x.css"),
            temp_dir.path().join("a_b").join("__").join("x.css")
        );
    }

    #[test]
    fn test_write_creates_parents_and_reads_back() {
        let temp_dir = tempdir().unwrap();
        let file_manager = FileManager::new(temp_dir.path()).unwrap();

        assert!(!file_manager.exists("blog/post/index.html"));
        let saved = file_manager
            .write("blog/post/index.html", b"<p>hi</p>")
            .unwrap();
        assert!(saved.is_file());
        assert!(file_manager.exists("blog/post/index.html"));
        assert_eq!(
            file_manager.read_text_lossy("blog/post/index.html").unwrap(),
            "<p>hi</p>"
        );
    }

    #[test]
    fn test_read_replaces_invalid_utf8() {
        let temp_dir = tempdir().unwrap();
        let file_manager = FileManager::new(temp_dir.path()).unwrap();
        file_manager.write("a.css", b"a{content:'\xff'}").unwrap();

        assert_eq!(
            file_manager.read_text_lossy("a.css").unwrap(),
            "a{content:'\u{FFFD}'}"
        );
    }

    #[test]
    fn test_failures_are_reported_per_path() {
        let temp_dir = tempdir().unwrap();
        let file_manager = FileManager::new(temp_dir.path()).unwrap();

        assert!(matches!(
            file_manager.read_text_lossy("missing.html"),
            Err(MirrorError::LocalRead { .. })
        ));

        file_manager.write("taken.css", b"x").unwrap();
        assert!(matches!(
            file_manager.write("taken.css/index.html", b"y"),
            Err(MirrorError::Write { .. })
        ));
    }
}
