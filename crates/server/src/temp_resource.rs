use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// An uploaded video staged on disk for the lifetime of one request.
///
/// Named `temp_<id>.mp4` inside the staging directory and created with
/// `create_new`, so two requests can never share a file. The file is removed
/// when the guard drops, on every exit path. Removal failures are logged and
/// otherwise ignored.
#[derive(Debug)]
pub struct TempVideo {
    path: PathBuf,
}

impl TempVideo {
    pub fn create(dir: &Path, id: Uuid, bytes: &[u8]) -> io::Result<Self> {
        let path = dir.join(file_name(id));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        // From here on a failed write still removes the partial file.
        let guard = Self { path };
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempVideo {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to remove {}: {e}", self.path.display()),
        }
    }
}

pub fn file_name(id: Uuid) -> String {
    format!("temp_{id}.mp4")
}
