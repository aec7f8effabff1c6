//! Named shared-memory segments backed by memory-mapped files.
//!
//! A "segment" here is a plain file under a run directory, memory-mapped with
//! [`memmap2`]. This mirrors how POSIX shared memory objects behave in practice
//! (a named, persistent region any process can attach to by path) without
//! hand-rolling `shm_open`/`shm_unlink` FFI: a regular file under a tmpfs-backed
//! run directory gives the same attach/detach semantics the rest of this crate
//! needs.

use memmap2::{Mmap, MmapMut};
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

/// Builds the deterministic path for a named segment under `run_dir`.
///
/// Segment names are sanitized so they are safe path components: anything
/// that isn't ASCII alphanumeric, `-`, or `_` becomes `_`.
pub fn segment_path(run_dir: &Path, name: &str) -> PathBuf {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    run_dir.join(format!("{sanitized}.shm"))
}

/// A writable mapping over a segment file, created fresh and zero-filled.
pub struct ShmSegmentMut {
    _file: File,
    mmap: MmapMut,
}

/// A read-write mapping over an existing segment file.
pub struct ShmSegmentAttach {
    _file: File,
    mmap: MmapMut,
}

/// A read-only mapping over an existing segment file.
pub struct ShmSegmentRo {
    _file: File,
    mmap: Mmap,
}

impl ShmSegmentMut {
    /// Creates (or truncates) the segment file at `path`, sizes it to
    /// `size_bytes`, zero-fills it, and maps it read-write.
    ///
    /// Only the receiver side of a pipe should call this: creating a segment
    /// that another process has already attached invalidates their mapping.
    pub fn create<P: AsRef<Path>>(path: P, size_bytes: usize) -> io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size_bytes as u64)?;

        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        mmap.fill(0);
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

impl ShmSegmentAttach {
    /// Attaches to an existing segment file for read-write access.
    ///
    /// Senders use this: the segment must already exist (created by the
    /// receiver) or this fails with `NotFound`.
    pub fn attach<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }
}

impl ShmSegmentRo {
    pub fn attach<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }
}

/// Removes a segment file from disk. Only the receiver calls this, during
/// teardown (`spec.md` 4.D "Teardown").
pub fn destroy_segment(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_path(tag: &str) -> PathBuf {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_shm_test_{tag}_{ts}"))
    }

    #[test]
    fn create_zero_fills_and_roundtrips() {
        let path = tmp_path("create");
        {
            let mut seg = ShmSegmentMut::create(&path, 64).unwrap();
            let p = seg.as_mut_ptr();
            unsafe {
                assert_eq!(*p.add(5), 0);
                *p.add(5) = 0xAB;
            }
        }
        {
            let seg = ShmSegmentRo::attach(&path).unwrap();
            unsafe {
                assert_eq!(*seg.as_ptr().add(5), 0xAB);
            }
        }
        destroy_segment(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn attach_requires_existing_file() {
        let path = tmp_path("attach-missing");
        assert!(ShmSegmentAttach::attach(&path).is_err());
    }

    #[test]
    fn segment_path_sanitizes_name() {
        let dir = PathBuf::from("/run/sitemapgen");
        let p = segment_path(&dir, "GOOGLE_SITEMAP_GENERATOR_SHM_urls:8080");
        assert_eq!(
            p,
            dir.join("GOOGLE_SITEMAP_GENERATOR_SHM_urls_8080.shm")
        );
    }
}
