//! Known-faces store: the name → reference embedding mapping on disk.
//!
//! The whole mapping lives in one JSON document and is rewritten on every
//! change:
//!
//! ```json
//! {"version":1,"faces":[{"name":"alice","embedding":[0.01, ...]}]}
//! ```
//!
//! The `faces` array is in enrollment order. A write goes to a sibling
//! `.tmp` file that is then renamed over the target, so readers see either
//! the old or the new mapping. There is no locking: two processes
//! registering at once race, and the last rename wins.

use crate::error::StoreError;
use faceclock_core::{enroll, Embedding, KnownFaces};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct KnownFacesFile {
    version: u32,
    faces: KnownFaces,
}

/// File-backed known-faces mapping, loaded once at open.
pub struct KnownFacesStore {
    path: PathBuf,
    faces: KnownFaces,
}

impl KnownFacesStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let faces = match std::fs::read(&path) {
            Ok(bytes) => {
                let file: KnownFacesFile =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Format {
                        path: path.clone(),
                        source,
                    })?;
                if file.version != FORMAT_VERSION {
                    return Err(StoreError::UnsupportedVersion(file.version));
                }
                file.faces
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no known-faces file, starting empty");
                KnownFaces::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::info!(path = %path.display(), enrolled = faces.len(), "loaded known faces");
        Ok(Self { path, faces })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn faces(&self) -> &KnownFaces {
        &self.faces
    }

    /// Average `samples` into `name`'s reference embedding and persist.
    ///
    /// An existing entry for `name` is overwritten without confirmation. If
    /// validation or the write fails, both the file and the in-memory mapping
    /// are left as they were.
    pub fn enroll(
        &mut self,
        name: &str,
        samples: &[Embedding],
        min_samples: usize,
    ) -> Result<Embedding, StoreError> {
        let mut updated = self.faces.clone();
        let mean = enroll::enroll(&mut updated, name, samples, min_samples)?;
        write_atomic(&self.path, &updated)?;
        self.faces = updated;
        Ok(mean)
    }

    /// Delete `name` and persist. Returns false if it was not enrolled.
    pub fn remove(&mut self, name: &str) -> Result<bool, StoreError> {
        let mut updated = self.faces.clone();
        if updated.remove(name).is_none() {
            return Ok(false);
        }
        write_atomic(&self.path, &updated)?;
        self.faces = updated;
        tracing::info!(user = name, "removed enrolled face");
        Ok(true)
    }

    /// Rewrite the file from the in-memory mapping.
    pub fn save(&self) -> Result<(), StoreError> {
        write_atomic(&self.path, &self.faces)
    }
}

fn write_atomic(path: &Path, faces: &KnownFaces) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file = KnownFacesFile {
        version: FORMAT_VERSION,
        faces: faces.clone(),
    };
    let bytes = serde_json::to_vec(&file).map_err(|source| StoreError::Format {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, bytes).map_err(io_err)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        std::fs::remove_file(&tmp).ok();
        return Err(io_err(e));
    }

    tracing::debug!(path = %path.display(), enrolled = faces.len(), "wrote known faces");
    Ok(())
}
