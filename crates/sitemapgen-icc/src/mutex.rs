//! Named binary semaphore set (`spec.md` 4.B).
//!
//! The original implementation allocates a System V semaphore set with
//! `semget(IPC_PRIVATE, ...)` and writes its kernel identifier to an anchor
//! file so clients can find it — the identifier changes on every server
//! restart, which is why `spec.md` section 9 calls out "prefer platform
//! primitives that are stable across restarts (named POSIX semaphores...)".
//! This implementation takes that advice: each registered name maps directly
//! to a POSIX named semaphore (`sem_open`), so "load" for a client is a
//! trivial re-open by name rather than a read-and-retry loop over a
//! raw kernel id.

use crate::filelock::FileLock;
use std::collections::HashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::ptr;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MutexError {
    #[error("mutex name not registered: {0}")]
    NotRegistered(String),
    #[error("mutex resource is invalid (server likely restarted)")]
    Invalid,
    #[error("semaphore syscall failed: {0}")]
    Io(#[source] std::io::Error),
}

#[derive(Debug, PartialEq, Eq)]
pub enum WaitResult {
    Ok,
    Timeout,
    Invalid,
}

/// A named group of binary semaphores, addressable by logical name.
///
/// Call [`MutexSet::register`] for every name before [`MutexSet::load`].
/// The server variant creates/owns the semaphores; the client variant only
/// opens existing ones.
pub struct MutexSet {
    app_name: String,
    run_dir: PathBuf,
    server: bool,
    names: Vec<String>,
    anchor_lock: Option<FileLock>,
}

impl MutexSet {
    pub fn new(app_name: impl Into<String>, run_dir: impl Into<PathBuf>, server: bool) -> Self {
        MutexSet {
            app_name: app_name.into(),
            run_dir: run_dir.into(),
            server,
            names: Vec::new(),
            anchor_lock: None,
        }
    }

    /// Adds a logical mutex name; idempotent, returns a dense integer id.
    /// Must be called before [`Self::load`].
    pub fn register(&mut self, name: &str) -> usize {
        if let Some(pos) = self.names.iter().position(|n| n == name) {
            return pos;
        }
        self.names.push(name.to_string());
        self.names.len() - 1
    }

    fn sem_posix_name(&self, name: &str) -> CString {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        CString::new(format!("/{}_{}", self.app_name, sanitized)).expect("no interior NUL")
    }

    fn anchor_path(&self) -> PathBuf {
        self.run_dir.join(format!("sem_{}.lck", self.app_name))
    }

    /// Server: allocates the semaphores and writes the anchor file (granting
    /// group-read so webserver-side senders can see it exists).
    /// Client: waits for the anchor file to exist, confirming the server has
    /// completed `load()`.
    pub fn load(&mut self) -> Result<(), MutexError> {
        std::fs::create_dir_all(&self.run_dir).map_err(MutexError::Io)?;
        let lock = FileLock::new(self.anchor_path());
        lock.lock(Duration::from_millis(5000)).map_err(MutexError::Io)?;
        self.anchor_lock = Some(lock);

        if self.server {
            std::fs::write(self.anchor_path(), self.names.join("\n")).map_err(MutexError::Io)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perm = std::fs::metadata(self.anchor_path())
                    .map_err(MutexError::Io)?
                    .permissions();
                perm.set_mode(0o640);
                let _ = std::fs::set_permissions(self.anchor_path(), perm);
            }
        }

        if let Some(lock) = self.anchor_lock.take() {
            lock.unlock();
        }
        Ok(())
    }

    /// Creates (server) or opens (client) the semaphore for `name`, setting
    /// the initial value (server only).
    pub fn get(&self, name: &str, initial: bool, allow_multi_post: bool) -> Result<Mutex, MutexError> {
        if !self.names.iter().any(|n| n == name) {
            return Err(MutexError::NotRegistered(name.to_string()));
        }
        let posix_name = self.sem_posix_name(name);
        let sem = if self.server {
            unsafe {
                libc::sem_unlink(posix_name.as_ptr());
                libc::sem_open(
                    posix_name.as_ptr(),
                    libc::O_CREAT | libc::O_EXCL,
                    0o660u32,
                    if initial { 1u32 } else { 0u32 },
                )
            }
        } else {
            unsafe { libc::sem_open(posix_name.as_ptr(), 0) }
        };
        if sem == libc::SEM_FAILED {
            return Err(MutexError::Io(std::io::Error::last_os_error()));
        }
        Ok(Mutex { sem, allow_multi_post, owns: self.server, name: name.to_string(), posix_name })
    }

    /// Server only: removes every semaphore and the anchor file.
    pub fn destroy(&mut self) {
        if !self.server {
            return;
        }
        for name in self.names.clone() {
            let posix_name = self.sem_posix_name(&name);
            unsafe {
                libc::sem_unlink(posix_name.as_ptr());
            }
        }
        let _ = std::fs::remove_file(self.anchor_path());
    }
}

/// A single binary (or counting-but-capped-at-1) semaphore handle.
pub struct Mutex {
    sem: *mut libc::sem_t,
    allow_multi_post: bool,
    owns: bool,
    name: String,
    posix_name: CString,
}

unsafe impl Send for Mutex {}

impl Mutex {
    /// Waits up to `timeout_ms` (or forever, if negative) for the semaphore.
    pub fn wait(&self, timeout_ms: i64) -> WaitResult {
        if timeout_ms < 0 {
            let rc = unsafe { libc::sem_wait(self.sem) };
            return if rc == 0 { WaitResult::Ok } else { WaitResult::Invalid };
        }
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        loop {
            let rc = unsafe { libc::sem_trywait(self.sem) };
            if rc == 0 {
                return WaitResult::Ok;
            }
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EAGAIN) {
                return WaitResult::Invalid;
            }
            if Instant::now() >= deadline {
                return WaitResult::Timeout;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Posts the semaphore. If `allow_multi_post`, this is idempotent: the
    /// value is forced to (at most) 1 rather than incremented.
    pub fn post(&self) {
        if self.allow_multi_post {
            let mut val: i32 = 0;
            unsafe { libc::sem_getvalue(self.sem, &mut val) };
            if val > 0 {
                return;
            }
        }
        unsafe {
            libc::sem_post(self.sem);
        }
    }

    /// Only valid when `allow_multi_post`: forces the semaphore to `value`
    /// (0 or 1) by draining then optionally posting once.
    pub fn reset(&self, value: bool) {
        debug_assert!(self.allow_multi_post, "reset() requires allow_multi_post");
        loop {
            let rc = unsafe { libc::sem_trywait(self.sem) };
            if rc != 0 {
                break;
            }
        }
        if value {
            unsafe {
                libc::sem_post(self.sem);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
            if self.owns {
                libc::sem_unlink(self.posix_name.as_ptr());
            }
        }
    }
}

/// Validates that a shared run directory exists and is usable, returning its
/// canonical path. Used by both `MutexSet` and `crate::filelock::FileLock`.
pub fn ensure_run_dir(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_and_dense() {
        let mut set = MutexSet::new("test", std::env::temp_dir(), true);
        let a = set.register("RW");
        let b = set.register("NOTIFY");
        let a2 = set.register("RW");
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(a2, a);
    }
}
