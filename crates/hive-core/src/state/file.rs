use std::{
    collections::HashMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use hive_model::{JobId, TaskStatus};

use crate::error::CoreError;

/// JSON file holding the last-known task statuses across daemon restarts.
#[derive(Debug, Clone)]
pub(crate) struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty map; an unreadable or corrupt one is an error.
    pub(crate) fn load(&self) -> Result<HashMap<JobId, TaskStatus>, CoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(self.error(e)),
        };
        if bytes.is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| self.error(e))
    }

    /// Write to a sibling temp file, then rename over the target.
    pub(crate) fn store(&self, statuses: &HashMap<JobId, TaskStatus>) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        let bytes = serde_json::to_vec_pretty(statuses).map_err(|e| self.error(e))?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| self.error(e))?;
        file.write_all(&bytes).map_err(|e| self.error(e))?;
        file.sync_all().map_err(|e| self.error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.error(e))
    }

    fn error(&self, e: impl std::fmt::Display) -> CoreError {
        CoreError::State {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}
