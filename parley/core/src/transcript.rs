//! Conversation transcripts
//!
//! Serializes a ledger snapshot together with a timestamp:
//!
//! ```json
//! {
//!   "timestamp": "2026-01-02T16:27:33.123456+00:00",
//!   "conversation": [
//!     { "role": "user", "content": "hello" },
//!     { "role": "assistant", "content": "Hello! How can I assist you today?" }
//!   ]
//! }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::{ConversationLedger, Turn};

/// Errors writing or reading a transcript
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Failed to write the transcript file
    #[error("Failed to write transcript to {path}: {source}")]
    Write {
        /// Destination path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Failed to read the transcript file
    #[error("Failed to read transcript at {path}: {source}")]
    Read {
        /// Source path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// JSON encoding or decoding failed
    #[error("Invalid transcript JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A persisted conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// When the snapshot was taken (ISO-8601)
    pub timestamp: String,
    /// Retained turns, oldest first
    pub conversation: Vec<Turn>,
}

impl Transcript {
    /// Snapshot a ledger, stamped with the current local time
    #[must_use]
    pub fn from_ledger(ledger: &ConversationLedger) -> Self {
        Self::at(Local::now(), ledger)
    }

    /// Snapshot a ledger with an explicit timestamp
    #[must_use]
    pub fn at(when: DateTime<Local>, ledger: &ConversationLedger) -> Self {
        Self {
            timestamp: when.to_rfc3339(),
            conversation: ledger.snapshot(),
        }
    }

    /// Write pretty-printed JSON to any writer
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), TranscriptError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Save to a file, creating parent directories as needed
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be created or written.
    pub fn save(&self, path: &Path) -> Result<(), TranscriptError> {
        let write_err = |source| TranscriptError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(write_err)?;

        tracing::info!(path = %path.display(), turns = self.conversation.len(), "Transcript saved");
        Ok(())
    }

    /// Load a transcript file
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or isn't a transcript.
    pub fn load(path: &Path) -> Result<Self, TranscriptError> {
        let content = std::fs::read_to_string(path).map_err(|source| TranscriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}
