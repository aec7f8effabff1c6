//! Per-site directory layout and temp-file rotation (`spec.md` 4.F).

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const TEMP_PREFIX: &str = "temp-";

pub struct RecordfileManager {
    dir: PathBuf,
    max_temp_bytes: u64,
}

impl RecordfileManager {
    pub fn new(dir: impl Into<PathBuf>, max_temp_bytes: u64) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(RecordfileManager { dir, max_temp_bytes })
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join("current")
    }
    pub fn base_path(&self) -> PathBuf {
        self.dir.join("base")
    }
    pub fn fprint_path(&self) -> PathBuf {
        self.dir.join("fprint")
    }
    pub fn host_path(&self) -> PathBuf {
        self.dir.join("host")
    }

    fn temp_path_for(&self, timestamp_nanos: u128) -> PathBuf {
        self.dir.join(format!("{TEMP_PREFIX}{timestamp_nanos}"))
    }

    /// Atomically seals `current` by renaming it to `temp-<now>`. No-op (and
    /// returns `Ok(None)`) if `current` doesn't exist or is empty.
    pub fn complete_current(&self) -> std::io::Result<Option<PathBuf>> {
        let current = self.current_path();
        match fs::metadata(&current) {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Ok(None),
        }
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let temp = self.temp_path_for(now);
        fs::rename(&current, &temp)?;
        Ok(Some(temp))
    }

    pub fn list_temps(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }

    pub fn temp_files_size(&self) -> std::io::Result<u64> {
        let mut total = 0u64;
        for temp in self.list_temps()? {
            total += fs::metadata(temp)?.len();
        }
        Ok(total)
    }

    pub fn max_temp_bytes(&self) -> u64 {
        self.max_temp_bytes
    }

    /// Removes the oldest temp files (by name, which embeds a monotonic
    /// nanosecond timestamp) while total temp size exceeds the cap.
    pub fn cleanup_temps(&self) -> std::io::Result<()> {
        let mut temps = self.list_temps()?;
        let mut total: u64 = temps.iter().map(|p| fs::metadata(p).map(|m| m.len()).unwrap_or(0)).sum();
        temps.sort();
        let mut idx = 0;
        while total > self.max_temp_bytes && idx < temps.len() {
            let size = fs::metadata(&temps[idx]).map(|m| m.len()).unwrap_or(0);
            fs::remove_file(&temps[idx])?;
            total = total.saturating_sub(size);
            idx += 1;
        }
        Ok(())
    }

    /// Temp files whose modification time falls within `range` (epoch
    /// seconds), used by the news sitemap's recently-added window.
    pub fn temps_in(&self, range: Range<i64>) -> std::io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for temp in self.list_temps()? {
            let meta = fs::metadata(&temp)?;
            let mtime = meta.modified()?.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
            if range.contains(&mtime) {
                out.push(temp);
            }
        }
        Ok(out)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
