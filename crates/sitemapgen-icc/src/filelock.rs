//! Inter-process file lock (`spec.md` 4.C), used to serialize pipe setup and
//! teardown and to serialize the `sitesettings.xml` writer.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A named exclusive lock backed by a file at a known path.
pub struct FileLock {
    path: PathBuf,
    file: std::sync::Mutex<Option<File>>,
    /// If true, the file is kept around (with group-read permission) after
    /// unlock so webserver-side code can also take the lock.
    shared_with_webserver: bool,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileLock { path: path.into(), file: std::sync::Mutex::new(None), shared_with_webserver: false }
    }

    pub fn shared_with_webserver(mut self, shared: bool) -> Self {
        self.shared_with_webserver = shared;
        self
    }

    /// Polls at `POLL_INTERVAL` until the lock is obtained or `wait` elapses.
    pub fn lock(&self, wait: Duration) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).read(true).write(true).open(&self.path)?;

        #[cfg(unix)]
        if self.shared_with_webserver {
            use std::os::unix::fs::PermissionsExt;
            let mut perm = file.metadata()?.permissions();
            perm.set_mode(0o660);
            let _ = std::fs::set_permissions(&self.path, perm);
        }

        let deadline = Instant::now() + wait;
        loop {
            let rc = unsafe { libc::flock(std::os::unix::io::AsRawFd::as_raw_fd(&file), libc::LOCK_EX | libc::LOCK_NB) };
            if rc == 0 {
                *self.file.lock().unwrap() = Some(file);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "file lock wait exceeded"));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Releases the lock. Removes the backing file unless it's configured to
    /// be shared with the webserver.
    pub fn unlock(&self) {
        let mut guard = self.file.lock().unwrap();
        if let Some(file) = guard.take() {
            unsafe {
                libc::flock(std::os::unix::io::AsRawFd::as_raw_fd(&file), libc::LOCK_UN);
            }
        }
        if !self.shared_with_webserver {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
