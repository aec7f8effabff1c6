//! Persistent "last access limit" timestamp, shared by every provider that
//! walks an external source incrementally (`urlproviderservice.cc`'s
//! `RefreshTimeStamp`/`SaveLastAccessLimit`/`ProvideRecord`).
//!
//! A provider only reports records newer than the stored limit, then (after
//! a successful run) advances the limit to the newest timestamp it actually
//! saw. If no stamp file exists yet, the limit seeds to one year before
//! `now` so the first run doesn't replay a site's entire history.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

const ONE_YEAR_SECS: i64 = 3600 * 24 * 365;

pub struct LastAccessLimit {
    path: PathBuf,
    limit: AtomicI64,
}

impl LastAccessLimit {
    /// Loads the stored limit from `path`, or seeds it to one year before
    /// `now` and persists that seed if no stamp file exists yet.
    pub fn load_or_seed(path: impl Into<PathBuf>, now: i64) -> io::Result<Self> {
        let path = path.into();
        let limit = match std::fs::read_to_string(&path) {
            Ok(text) => text.trim().parse::<i64>().unwrap_or(now - ONE_YEAR_SECS),
            Err(e) if e.kind() == io::ErrorKind::NotFound => now - ONE_YEAR_SECS,
            Err(e) => return Err(e),
        };
        let stamp = LastAccessLimit { path, limit: AtomicI64::new(limit) };
        if !stamp.path.exists() {
            stamp.save(limit)?;
        }
        Ok(stamp)
    }

    pub fn get(&self) -> i64 {
        self.limit.load(Ordering::Acquire)
    }

    fn save(&self, value: i64) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, value.to_string())
    }

    /// Advances the stored limit to `new_limit` and persists it, but only if
    /// `new_limit` is actually newer (a run that saw nothing new leaves the
    /// limit untouched).
    pub fn advance(&self, new_limit: i64) -> io::Result<()> {
        if new_limit > self.get() {
            self.limit.store(new_limit, Ordering::Release);
            self.save(new_limit)?;
        }
        Ok(())
    }
}

fn stamp_file_name(site_id: &str, suffix: &str) -> String {
    let sanitized: String = site_id.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
    format!("timestamp_{sanitized}{suffix}")
}

pub fn stamp_path(run_dir: &Path, site_id: &str, suffix: &str) -> PathBuf {
    run_dir.join(stamp_file_name(site_id, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn fresh_dir(tag: &str) -> PathBuf {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_lastaccess_{tag}_{ts}"))
    }

    #[test]
    fn missing_stamp_seeds_to_one_year_ago_and_persists() {
        let dir = fresh_dir("seed");
        let path = dir.join("timestamp_site1_file_scanner");
        let stamp = LastAccessLimit::load_or_seed(&path, 10_000_000).unwrap();
        assert_eq!(stamp.get(), 10_000_000 - ONE_YEAR_SECS);
        assert!(path.exists());
    }

    #[test]
    fn existing_stamp_is_loaded_verbatim() {
        let dir = fresh_dir("load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stamp");
        std::fs::write(&path, "42").unwrap();
        let stamp = LastAccessLimit::load_or_seed(&path, 10_000_000).unwrap();
        assert_eq!(stamp.get(), 42);
    }

    #[test]
    fn advance_ignores_non_newer_values() {
        let dir = fresh_dir("advance");
        let path = dir.join("stamp");
        let stamp = LastAccessLimit::load_or_seed(&path, 10_000_000).unwrap();
        let seeded = stamp.get();
        stamp.advance(seeded - 10).unwrap();
        assert_eq!(stamp.get(), seeded);
        stamp.advance(seeded + 100).unwrap();
        assert_eq!(stamp.get(), seeded + 100);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), (seeded + 100).to_string());
    }

    #[test]
    fn stamp_path_sanitizes_site_id() {
        let p = stamp_path(Path::new("/run"), "my site!1", "_file_scanner");
        assert_eq!(p, Path::new("/run/timestamp_my_site_1_file_scanner"));
    }
}
