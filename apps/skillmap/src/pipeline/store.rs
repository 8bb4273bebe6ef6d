//! JSON exchange files: record sequences in, artifacts out.
//!
//! Inputs are validated up front so a bad file aborts the run before any
//! output is touched. Outputs are written to a temporary file in the target
//! directory and persisted over the destination, so a previously good
//! artifact is never left half-overwritten.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::engine::matrix::Whitelist;
use crate::errors::AppError;

/// Fails with `MissingResource` for the first path that does not exist.
pub fn ensure_exists<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<(), AppError> {
    for path in paths {
        if !path.exists() {
            return Err(AppError::MissingResource {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

fn read_text(path: &Path) -> Result<String, AppError> {
    ensure_exists([path])?;
    fs::read_to_string(path).map_err(|e| AppError::io(path, e))
}

/// Loads a JSON array of records. An empty file is an empty sequence.
/// Errors name the file and, for per-record problems, the record index.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AppError> {
    let text = read_text(path)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(&text).map_err(|e| AppError::malformed(path, None, e))?;
    let Value::Array(items) = value else {
        return Err(AppError::malformed(
            path,
            None,
            "expected a JSON array of records",
        ));
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(AppError::malformed(path, Some(index), "record is not an object"));
            }
            serde_json::from_value(item).map_err(|e| AppError::malformed(path, Some(index), e))
        })
        .collect::<Result<Vec<T>, _>>()?;

    debug!(path = %path.display(), count = records.len(), "records loaded");
    Ok(records)
}

/// Loads a single JSON document (stats file and similar).
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| AppError::malformed(path, None, e))
}

/// Loads a whitelist: a flat JSON array of strings. Blank entries are
/// ignored; an empty file is an empty whitelist.
pub fn load_whitelist(path: &Path) -> Result<Whitelist, AppError> {
    let text = read_text(path)?;
    if text.trim().is_empty() {
        return Ok(Whitelist::default());
    }

    let names: Vec<Value> = match serde_json::from_str(&text) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            return Err(AppError::malformed(
                path,
                None,
                "whitelist must be a JSON array of strings",
            ))
        }
        Err(e) => return Err(AppError::malformed(path, None, e)),
    };

    let mut allowed = Vec::with_capacity(names.len());
    for (index, name) in names.into_iter().enumerate() {
        match name {
            Value::String(s) => allowed.push(s),
            other => {
                return Err(AppError::malformed(
                    path,
                    Some(index),
                    format!("whitelist entries must be strings, got {other}"),
                ))
            }
        }
    }

    let whitelist = Whitelist::new(allowed);
    if whitelist.is_empty() {
        warn!(path = %path.display(), "whitelist is empty; the filtered matrix will have no rows");
    } else {
        info!(path = %path.display(), size = whitelist.len(), "whitelist loaded");
    }
    Ok(whitelist)
}

/// Writes `value` as pretty-printed UTF-8 JSON, replacing `path` atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;

    let tmp = NamedTempFile::new_in(dir).map_err(|e| AppError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| AppError::Internal(e.into()))?;
        writer.write_all(b"\n").map_err(|e| AppError::io(path, e))?;
        writer.flush().map_err(|e| AppError::io(path, e))?;
    }
    tmp.persist(path).map_err(|e| AppError::io(path, e.error))?;

    info!(path = %path.display(), "artifact written");
    Ok(())
}
