//! Association view cache.
//!
//! Reading the object list is the slowest step of a session, so the view is stored as JSON next to
//! the other run artifacts, one file per meter address. A file that cannot be parsed is deleted and
//! the view is read again from the meter.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::client::ClientError;
use crate::cosem::AssociationView;
use crate::error::ReaderError;

fn file_stem(name: &str) -> String {
    name.chars().map(|c| if matches!(c, '.' | ':' | '/' | '\\') { '_' } else { c }).collect()
}

/// A view that cannot be written is an i/o failure; the file on disk is untouched.
fn serialization_error(source: serde_json::Error) -> ReaderError {
    ReaderError::Io(io::Error::new(io::ErrorKind::InvalidData, source))
}

#[derive(Debug, Clone)]
pub struct AssociationCache {
    path: PathBuf,
}

impl AssociationCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache for the meter reached at `host:port`, stored in `dir`.
    pub fn for_media(dir: impl AsRef<Path>, host: &str, port: u16) -> Self {
        Self::new(Self::path_for(dir, host, port))
    }

    /// Cache for the meter reached through the serial port `port_name`, stored in `dir`.
    pub fn for_serial(dir: impl AsRef<Path>, port_name: &str) -> Self {
        Self::new(Self::path_for_serial(dir, port_name))
    }

    /// `<dir>/<host>_<port>.json`, with the dots of the host replaced by underscores.
    pub fn path_for(dir: impl AsRef<Path>, host: &str, port: u16) -> PathBuf {
        dir.as_ref().join(format!("{}_{port}.json", file_stem(host)))
    }

    /// `<dir>/<port name>.json`; `/dev/ttyUSB0` becomes `dev_ttyUSB0.json`.
    pub fn path_for_serial(dir: impl AsRef<Path>, port_name: &str) -> PathBuf {
        dir.as_ref().join(format!("{}.json", file_stem(port_name).trim_start_matches('_')))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached view, `None` when there is no cache file.
    ///
    /// A corrupt file is reported as [`ReaderError::CacheCorruption`] and left in place.
    pub fn load(&self) -> Result<Option<AssociationView>, ReaderError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| ReaderError::CacheCorruption { path: self.path.clone(), source })
    }

    pub fn store(&self, view: &AssociationView) -> Result<(), ReaderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(view).map_err(serialization_error)?;

        if let Err(e) = fs::write(&self.path, contents) {
            let _ = fs::remove_file(&self.path);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn invalidate(&self) -> Result<(), ReaderError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the cached view, or reads it with `fetch` and stores it.
    ///
    /// Cache failures never abort: a corrupt file is deleted and a failed store is logged.
    /// Only `fetch` errors are returned.
    pub fn load_or_fetch<F>(&self, fetch: F) -> Result<AssociationView, ClientError>
    where
        F: FnOnce() -> Result<AssociationView, ClientError>,
    {
        match self.load() {
            Ok(Some(view)) => {
                info!("Get available objects from the cache.");
                return Ok(view);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("{e}, deleting it");
                if let Err(e) = self.invalidate() {
                    warn!("cannot delete {}: {e}", self.path.display());
                }
            }
        }

        info!("Get available objects from the device.");
        let view = fetch()?;
        if let Err(e) = self.store(&view) {
            warn!("cannot write association cache {}: {e}", self.path.display());
        }
        Ok(view)
    }
}
