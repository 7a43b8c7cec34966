//! JSON data file for the document store.
//!
//! The file holds every owner's tasks and user columns as loosely typed
//! documents. On load each document is validated; invalid ones are logged
//! and skipped so one bad record cannot take the store down. Saves go to a
//! temporary sibling file first and are renamed into place.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use taskboard_proto::column::{self, Column};
use taskboard_proto::document::{ColumnDocument, TaskDocument};
use taskboard_proto::task::Task;

use crate::documents::Collections;

/// Errors that can occur while reading or writing the data file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Failed to read the data file.
    #[error("failed to read data file {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write the data file.
    #[error("failed to write data file {path}: {source}")]
    Write {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The data file could not be parsed or produced as JSON.
    #[error("data file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk layout of the data file, as written.
#[derive(Debug, Serialize)]
struct StoreFile {
    tasks: Vec<TaskDocument>,
    columns: Vec<ColumnDocument>,
}

/// On-disk layout as read: records stay untyped until decoded one by one.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStoreFile {
    tasks: Vec<serde_json::Value>,
    columns: Vec<serde_json::Value>,
}

/// Decodes each record, skipping those whose JSON shape does not fit.
fn decode_records<T: DeserializeOwned>(records: Vec<serde_json::Value>, kind: &str) -> Vec<T> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(index, kind, error = %e, "skipping malformed document");
                None
            }
        })
        .collect()
}

/// Loads collections from `path`. A missing file yields empty collections.
///
/// # Errors
///
/// Returns [`PersistError::Read`] if the file exists but cannot be read, or
/// [`PersistError::Json`] if it is not a JSON store file.
pub async fn load(path: &Path) -> Result<Collections, PersistError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "data file not found, starting empty");
            return Ok(Collections::default());
        }
        Err(source) => {
            return Err(PersistError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let raw: RawStoreFile = serde_json::from_str(&contents)?;
    let file = StoreFile {
        tasks: decode_records(raw.tasks, "task"),
        columns: decode_records(raw.columns, "column"),
    };
    Ok(validate(file))
}

/// Writes `collections` to `path`, replacing the previous file atomically.
///
/// # Errors
///
/// Returns [`PersistError::Write`] on I/O failure.
pub async fn save(path: &Path, collections: &Collections) -> Result<(), PersistError> {
    let mut tasks: Vec<&Task> = collections.tasks.values().collect();
    tasks.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    let mut columns: Vec<&Column> = collections.columns.values().collect();
    columns.sort_by(|a, b| (&a.owner_id, a.position, &a.id).cmp(&(&b.owner_id, b.position, &b.id)));

    let file = StoreFile {
        tasks: tasks.into_iter().map(TaskDocument::from).collect(),
        columns: columns.into_iter().map(ColumnDocument::from).collect(),
    };
    let json = serde_json::to_vec_pretty(&file)?;

    let tmp = path.with_extension("tmp");
    let write_err = |source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&tmp, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    Ok(())
}

/// Turns untrusted documents into collections, skipping invalid records.
fn validate(file: StoreFile) -> Collections {
    let mut collections = Collections::default();

    for doc in file.columns {
        let id = doc.id.clone().unwrap_or_default();
        match Column::try_from(doc) {
            Ok(column) => {
                collections.columns.insert(column.id.clone(), column);
            }
            Err(e) => tracing::warn!(id = %id, error = %e, "skipping invalid column document"),
        }
    }

    for doc in file.tasks {
        let id = doc.id.clone().unwrap_or_default();
        let task = match Task::try_from(doc) {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "skipping invalid task document");
                continue;
            }
        };
        let column_exists = column::is_builtin(&task.column_id)
            || collections
                .columns
                .get(&task.column_id)
                .is_some_and(|c| c.owner_id.as_ref() == Some(&task.owner_id));
        if !column_exists {
            tracing::warn!(
                id = %task.id,
                column = %task.column_id,
                "skipping task assigned to a missing column"
            );
            continue;
        }
        collections.last_timestamp = collections.last_timestamp.max(task.created_at);
        collections.tasks.insert(task.id.clone(), task);
    }

    collections
}
