// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! JSON document files with crash-safe writes.
//!
//! Every store keeps its state in one [`JsonFile`]. Writes go to a sibling
//! `<file>.tmp`, are fsynced, then renamed over the target, so a failed save
//! never leaves a half-written document behind. Reads recover from a missing
//! or unparsable file by returning an empty document.

use crate::error::StoreError;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A JSON document persisted at a fixed path.
///
/// The internal mutex serializes read-modify-write cycles issued through
/// [`JsonFile::update`], so two updates on the same file never lose each
/// other's writes.
#[derive(Debug)]
pub struct JsonFile<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _document: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _document: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document.
    ///
    /// A missing file yields an empty document. An unparsable file is logged
    /// and also yields an empty document; the file itself is left alone until
    /// the next save replaces it.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the file exists but cannot be read.
    pub fn load(&self) -> Result<T, StoreError> {
        let _guard = self.lock.lock();
        self.read()
    }

    /// Replaces the document on disk.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the document cannot be written; the previous
    /// file contents are preserved.
    pub fn save(&self, document: &T) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        self.write(document)
    }

    /// Loads, applies `f` and saves, holding the file lock throughout.
    ///
    /// Nothing is written if `f` returns an error.
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut T) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let _guard = self.lock.lock();
        let mut document = self.read()?;
        let result = f(&mut document)?;
        self.write(&document)?;
        Ok(result)
    }

    fn read(&self) -> Result<T, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(StoreError::io(&self.path, &e)),
        };

        match self.parse(&bytes) {
            Ok(document) => Ok(document),
            Err(error) => {
                warn!(%error, "store file is corrupted, resetting to empty data");
                Ok(T::default())
            }
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write(&self, document: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            kind: io::ErrorKind::InvalidData,
            message: e.to_string(),
        })?;

        let temp_path = self.temp_path();
        if let Err(e) = self.write_via(&temp_path, &bytes) {
            // Best effort; the target file was never touched.
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::io(&self.path, &e));
        }

        debug!(path = %self.path.display(), size = bytes.len(), "Saved store file");
        Ok(())
    }

    fn write_via(&self, temp_path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(temp_path, &self.path)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}
