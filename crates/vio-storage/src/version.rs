//! Version data structures.
//!
//! A version identifies one commit: the tracked revision reported by the
//! version-control system, the instant of the commit and caller metadata.

use crate::{StorageError, StorageResult};
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Caller-supplied key/value pairs attached to a version.
///
/// Ordered so that the serialized JSON object is stable.
pub type Metadata = BTreeMap<String, String>;

/// Separates the revision from the epoch seconds.
const TIMESTAMP_SEPARATOR: char = '#';

/// Separates the version from its metadata in an index line.
const METADATA_SEPARATOR: char = ',';

/// A committed snapshot identifier.
///
/// Timestamps carry whole-second precision, the precision persisted in the
/// index, so a version read back from the index equals the one committed.
#[derive(Debug, Clone)]
pub struct Version {
    revision: String,
    timestamp: DateTime<Utc>,
    metadata: Metadata,
}

impl Version {
    /// Create a version for `revision` stamped with the current instant.
    pub fn new(revision: impl Into<String>, metadata: Metadata) -> StorageResult<Self> {
        Self::at(revision, Utc::now(), metadata)
    }

    /// Create a version for `revision` at a given instant.
    pub fn at(
        revision: impl Into<String>,
        timestamp: DateTime<Utc>,
        metadata: Metadata,
    ) -> StorageResult<Self> {
        let revision = revision.into();
        validate_revision(&revision, &revision)?;
        Ok(Self {
            revision,
            timestamp: timestamp.trunc_subsecs(0),
            metadata,
        })
    }

    /// Parse `revision` or `revision#epochSeconds`.
    ///
    /// When the timestamp is absent the current instant is used.
    pub fn parse(text: &str) -> StorageResult<Self> {
        Self::parse_with_metadata(text, Metadata::new())
    }

    /// Parse `revision` or `revision#epochSeconds` and attach `metadata`.
    pub fn parse_with_metadata(text: &str, metadata: Metadata) -> StorageResult<Self> {
        let text = text.trim();
        match text.split_once(TIMESTAMP_SEPARATOR) {
            Some((revision, seconds)) => {
                validate_revision(revision, text)?;
                let seconds: i64 = seconds.trim().parse().map_err(|e| {
                    StorageError::malformed(text, format!("invalid timestamp {seconds:?}: {e}"))
                })?;
                let timestamp = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
                    StorageError::malformed(text, format!("timestamp {seconds} out of range"))
                })?;
                Ok(Self {
                    revision: revision.to_string(),
                    timestamp,
                    metadata,
                })
            }
            None => Self::new(text, metadata),
        }
    }

    /// Parse one index line: `revision#epochSeconds,<json-object>`.
    pub fn from_index_line(line: &str) -> StorageResult<Self> {
        let (version, metadata) = line
            .split_once(METADATA_SEPARATOR)
            .ok_or_else(|| StorageError::malformed(line, "missing metadata separator"))?;

        if !version.contains(TIMESTAMP_SEPARATOR) {
            return Err(StorageError::malformed(line, "missing timestamp"));
        }

        // `null` is what an absent metadata map used to serialize to
        let metadata: Option<Metadata> = serde_json::from_str(metadata)
            .map_err(|e| StorageError::malformed(line, format!("invalid metadata: {e}")))?;

        Self::parse_with_metadata(version, metadata.unwrap_or_default()).map_err(|e| match e {
            StorageError::MalformedEntry { reason, .. } => StorageError::malformed(line, reason),
            other => other,
        })
    }

    /// Serialize to the canonical index form `revision#epochSeconds,<json>`.
    pub fn serialize(&self) -> StorageResult<String> {
        Ok(format!(
            "{}{}{}",
            self.label(),
            METADATA_SEPARATOR,
            serde_json::to_string(&self.metadata)?
        ))
    }

    /// The `revision#epochSeconds` part, without metadata.
    pub fn label(&self) -> String {
        format!("{}{}{}", self.revision, TIMESTAMP_SEPARATOR, self.epoch_seconds())
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Unix-epoch seconds of the timestamp.
    pub fn epoch_seconds(&self) -> i64 {
        self.timestamp.timestamp()
    }

    /// Snapshot location relative to the snapshot root: `revision/epochSeconds`.
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.revision).join(self.epoch_seconds().to_string())
    }
}

fn validate_revision(revision: &str, text: &str) -> StorageResult<()> {
    if revision.trim().is_empty() {
        return Err(StorageError::malformed(text, "empty revision"));
    }
    if revision.contains(TIMESTAMP_SEPARATOR) || revision.contains(METADATA_SEPARATOR) {
        return Err(StorageError::malformed(
            text,
            format!("revision {revision:?} contains a reserved character"),
        ));
    }
    Ok(())
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.revision == other.revision
            && self.timestamp == other.timestamp
            && self.metadata == other.metadata
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = serde_json::to_string(&self.metadata).map_err(|_| fmt::Error)?;
        write!(f, "{}{}{}", self.label(), METADATA_SEPARATOR, metadata)
    }
}
