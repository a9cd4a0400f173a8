//! Resumption cursor for the import driver.
//!
//! One checkpoint per import job, keyed by the job's log key. The file
//! backend writes a temp file and renames it into place so a crashed writer
//! never leaves a half-written cursor behind; an in-process mutex keeps
//! writers within one process from interleaving.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint store io failure: {0}")]
    Io(#[from] io::Error),
}

pub trait CheckpointStore: Send + Sync {
    fn save(&self, key: &str, page: u32) -> Result<(), CheckpointError>;
    /// Last saved page number, or `None` when no checkpoint exists.
    fn read(&self, key: &str) -> Result<Option<u32>, CheckpointError>;
    fn clear(&self, key: &str) -> Result<(), CheckpointError>;
}

pub struct FileCheckpointStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, key: &str, page: u32) -> Result<(), CheckpointError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!("{key}.tmp"));
        fs::write(&tmp, page.to_string())?;
        fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<u32>, CheckpointError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let content = match fs::read_to_string(self.path_for(key)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match content.trim().parse::<u32>() {
            Ok(page) => Ok(Some(page)),
            Err(_) => {
                warn!(key = %key, content = %content.trim(), "unreadable checkpoint, treating as absent");
                Ok(None)
            }
        }
    }

    fn clear(&self, key: &str) -> Result<(), CheckpointError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
