use thiserror::Error;

/// Per-file failure classes. None of them abort a batch.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Error reading '{name}': {source:#}")]
    Read {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Error parsing CSV '{name}' (header length {header_len}): {source:#}")]
    Parse {
        name: String,
        header_len: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("Error loading '{name}' into table '{table}': {source:#}")]
    Database {
        name: String,
        table: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FileError {
    pub fn name(&self) -> &str {
        match self {
            FileError::Read { name, .. }
            | FileError::Parse { name, .. }
            | FileError::Database { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FileError::Read { .. } => "read",
            FileError::Parse { .. } => "parse",
            FileError::Database { .. } => "database",
        }
    }
}
