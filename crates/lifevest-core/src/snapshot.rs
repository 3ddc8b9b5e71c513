//! Snapshot folders
//!
//! A snapshot is a directory with exactly three subdirectories, `services`,
//! `configs` and `secrets`. Each holds one file per object, named by the
//! object's identifier on the cluster it was taken from, containing the
//! object's `Spec` as JSON. Secrets include their `Data` payload.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::objects::{Document, ObjectKind, ObjectMap};

/// Read a snapshot folder into an object map
pub fn read_snapshot(root: &Path) -> Result<ObjectMap> {
    if !root.is_dir() {
        return Err(CoreError::InvalidSnapshot {
            path: root.display().to_string(),
            message: "not a directory".to_string(),
        });
    }

    let mut map = ObjectMap::new();
    for kind in ObjectKind::ALL {
        let dir = root.join(kind.plural());
        if !dir.is_dir() {
            return Err(CoreError::InvalidSnapshot {
                path: root.display().to_string(),
                message: format!("missing '{}' directory", kind.plural()),
            });
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        for file in files {
            let Some(id) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let content = std::fs::read(&file)?;
            let document: Document =
                serde_json::from_slice(&content).map_err(|e| CoreError::Serialization {
                    path: file.display().to_string(),
                    message: e.to_string(),
                })?;
            tracing::trace!(kind = %kind, id, "read snapshot object");
            map.insert(kind, id, document);
        }
    }

    Ok(map)
}

/// Write an object map as a snapshot folder, creating `root` if needed
///
/// Fails without writing anything if `root` already holds objects, so a
/// snapshot never mixes the state of two runs.
pub fn write_snapshot(root: &Path, map: &ObjectMap) -> Result<()> {
    for kind in ObjectKind::ALL {
        let dir = root.join(kind.plural());
        if dir.is_dir() && std::fs::read_dir(&dir)?.next().is_some() {
            return Err(CoreError::InvalidSnapshot {
                path: root.display().to_string(),
                message: format!("'{}' is not empty, refusing to overwrite an existing backup", kind.plural()),
            });
        }
    }

    for kind in ObjectKind::ALL {
        let dir = root.join(kind.plural());
        std::fs::create_dir_all(&dir)?;

        for (id, document) in map.collection(kind) {
            let path = object_path(&dir, id)?;
            let json = serde_json::to_vec(document).map_err(|e| CoreError::Serialization {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            std::fs::write(&path, json)?;
        }
    }

    tracing::debug!(path = %root.display(), objects = map.len(), "wrote snapshot");
    Ok(())
}

/// Path of an object file, rejecting identifiers that would escape `dir`
fn object_path(dir: &Path, id: &str) -> Result<PathBuf> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(CoreError::InvalidSnapshot {
            path: dir.display().to_string(),
            message: format!("'{}' is not a valid object identifier", id),
        });
    }
    Ok(dir.join(id))
}
