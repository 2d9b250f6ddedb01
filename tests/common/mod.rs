#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};
use zip::write::SimpleFileOptions;

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    /// Writes raw bytes, e.g. windows-1252 encoded text.
    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Builds a zip archive holding `members` in the given order.
    pub fn write_zip(&self, name: &str, members: &[(&str, &[u8])]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let file = File::create(&path).expect("create zip file");
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (member, bytes) in members {
            if member.ends_with('/') {
                writer.add_directory(*member, options).expect("add directory");
                continue;
            }
            writer.start_file(*member, options).expect("start zip member");
            writer.write_all(bytes).expect("write zip member");
        }
        writer.finish().expect("finish zip");
        path
    }
}
