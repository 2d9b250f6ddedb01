//! Input reader for standalone CSV files and zip archive members.
//!
//! Every source is decoded from the extract encoding and repaired before any
//! parsing happens, so downstream code only sees [`SourceFile::content`].

use std::{
    collections::VecDeque,
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use encoding_rs::Encoding;
use log::{debug, warn};
use zip::ZipArchive;

use crate::{error::FileError, io_utils};

/// Header length at which the export tool is known to cut header lines.
pub const TRUNCATED_HEADER_LEN: usize = 1024;

/// A fixed substitution applied to files whose name starts with `file_prefix`.
struct RowPatch {
    file_prefix: &'static str,
    find: &'static str,
    replace: &'static str,
}

const ROW_PATCHES: &[RowPatch] = &[RowPatch {
    file_prefix: "Primary_Clinical_Diagnosis_",
    find: r#"no tremors today. \"",,"3","#,
    replace: r#"no tremors today.",,"3","#,
}];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Display path; zip members are written as `archive.zip!member.csv`.
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn header_line(&self) -> &str {
        header_line(&self.content)
    }

    pub fn header_looks_truncated(&self) -> bool {
        header_looks_truncated(&self.content)
    }

    /// Wraps a CSV parsing failure with the header length for diagnosis.
    pub fn parse_error(&self, source: anyhow::Error) -> FileError {
        FileError::Parse {
            name: self.name.clone(),
            header_len: self.header_line().chars().count(),
            source,
        }
    }
}

pub fn header_line(content: &str) -> &str {
    content.lines().next().unwrap_or_default().trim()
}

/// True when the first line is exactly [`TRUNCATED_HEADER_LEN`] long.
pub fn header_looks_truncated(content: &str) -> bool {
    header_line(content).chars().count() == TRUNCATED_HEADER_LEN
}

fn file_name_of(name: &str) -> &str {
    name.rsplit(['/', '\\', '!']).next().unwrap_or(name)
}

/// Applies the known fixes for broken extract quoting.
pub fn repair_content(name: &str, text: &str) -> String {
    let file_name = file_name_of(name);
    let mut content = text.to_string();
    for patch in ROW_PATCHES {
        if file_name.starts_with(patch.file_prefix) && content.contains(patch.find) {
            debug!("Applying row patch for {file_name}");
            content = content.replace(patch.find, patch.replace);
        }
    }
    content.replace("\\\"", "\"\"").trim().to_string()
}

fn build_source(name: String, bytes: &[u8], encoding: &'static Encoding) -> Result<SourceFile, FileError> {
    let text = io_utils::decode_bytes(bytes, encoding).map_err(|source| FileError::Read {
        name: name.clone(),
        source,
    })?;
    let source = SourceFile {
        content: repair_content(&name, &text),
        name,
    };
    if source.header_looks_truncated() {
        warn!(
            "The header of {} is {TRUNCATED_HEADER_LEN} bytes and is likely truncated, \
             resulting in invalid CSV; expect errors",
            source.name
        );
    }
    Ok(source)
}

pub fn read_csv_file(path: &Path, encoding: &'static Encoding) -> Result<SourceFile, FileError> {
    let name = path.display().to_string();
    let bytes = fs::read(path)
        .with_context(|| format!("Opening input file {path:?}"))
        .map_err(|source| FileError::Read {
            name: name.clone(),
            source,
        })?;
    build_source(name, &bytes, encoding)
}

struct ZipCursor {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
    next_index: usize,
}

impl ZipCursor {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening zip archive {path:?}"))?;
        let archive = ZipArchive::new(BufReader::new(file))
            .with_context(|| format!("Reading zip archive {path:?}"))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
            next_index: 0,
        })
    }

    fn next_member(&mut self, encoding: &'static Encoding) -> Option<Result<SourceFile, FileError>> {
        while self.next_index < self.archive.len() {
            let index = self.next_index;
            self.next_index += 1;
            let archive_name = self.path.display().to_string();
            let mut entry = match self.archive.by_index(index) {
                Ok(entry) => entry,
                Err(err) => {
                    return Some(Err(FileError::Read {
                        name: format!("{archive_name}!#{index}"),
                        source: anyhow!(err).context("Accessing zip entry"),
                    }));
                }
            };
            let member = entry.name().to_string();
            if !entry.is_file() || !member.to_ascii_lowercase().ends_with(".csv") {
                debug!("Skipping zip member {member}");
                continue;
            }
            let name = format!("{archive_name}!{member}");
            let mut bytes = Vec::new();
            if let Err(err) = entry.read_to_end(&mut bytes) {
                return Some(Err(FileError::Read {
                    name,
                    source: anyhow!(err).context("Reading zip member"),
                }));
            }
            return Some(build_source(name, &bytes, encoding));
        }
        None
    }
}

/// Yields standalone files first, then the `.csv` members of the archive,
/// reading one source at a time.
pub struct SourceReader {
    encoding: &'static Encoding,
    pending: VecDeque<PathBuf>,
    zip_path: Option<PathBuf>,
    zip: Option<ZipCursor>,
}

impl SourceReader {
    pub fn new(paths: &[PathBuf], zip_path: Option<&Path>, encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            pending: paths.iter().cloned().collect(),
            zip_path: zip_path.map(Path::to_path_buf),
            zip: None,
        }
    }
}

impl Iterator for SourceReader {
    type Item = Result<SourceFile, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(path) = self.pending.pop_front() {
            return Some(read_csv_file(&path, self.encoding));
        }
        if let Some(path) = self.zip_path.take() {
            match ZipCursor::open(&path) {
                Ok(cursor) => self.zip = Some(cursor),
                Err(source) => {
                    return Some(Err(FileError::Read {
                        name: path.display().to_string(),
                        source,
                    }));
                }
            }
        }
        let cursor = self.zip.as_mut()?;
        let item = cursor.next_member(self.encoding);
        if item.is_none() {
            self.zip = None;
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn backslash_quotes_become_doubled_quotes() {
        let repaired = repair_content("notes.csv", "a,b\n1,\"said \\\"hi\\\"\"\n");
        assert_eq!(repaired, "a,b\n1,\"said \"\"hi\"\"\"");
    }

    #[test]
    fn known_corrupt_row_is_patched_for_matching_file() {
        let raw = "PATNO,NOTE,CODE,SCORE\n1,\"no tremors today. \\\"\",,\"3\",\n";
        let repaired = repair_content("/x/Primary_Clinical_Diagnosis_20250401.csv", raw);
        assert!(repaired.contains("\"no tremors today.\",,\"3\","));

        let untouched = repair_content("/x/Other_20250401.csv", raw);
        assert!(untouched.contains("no tremors today. \"\"\",,\"3\","));
    }

    #[test]
    fn header_of_1024_chars_is_flagged() {
        let header = "a".repeat(TRUNCATED_HEADER_LEN);
        assert!(header_looks_truncated(&format!("{header}\n1\n")));
        let shorter = "a".repeat(TRUNCATED_HEADER_LEN - 1);
        assert!(!header_looks_truncated(&format!("{shorter}\n1\n")));
    }

    #[test]
    fn decoded_source_reports_truncated_header() {
        let header = "b".repeat(TRUNCATED_HEADER_LEN);
        let source = build_source(
            "wide.csv".to_string(),
            format!("{header}\n1\n").as_bytes(),
            WINDOWS_1252,
        )
        .expect("decodes");
        assert!(source.header_looks_truncated());
        assert_eq!(source.header_line().len(), TRUNCATED_HEADER_LEN);
    }

    #[test]
    fn zip_member_file_name_is_used_for_patches() {
        assert_eq!(
            file_name_of("release.zip!Primary_Clinical_Diagnosis_1.csv"),
            "Primary_Clinical_Diagnosis_1.csv"
        );
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = read_csv_file(Path::new("/nonexistent/file.csv"), WINDOWS_1252).unwrap_err();
        assert_eq!(err.kind(), "read");
        assert_eq!(err.name(), "/nonexistent/file.csv");
    }
}
