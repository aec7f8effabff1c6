//! `FileScanner` (`spec.md` 4.K), grounded on `filescanner.cc`'s
//! `ScanDir`/`ProcessRecord`: recursively walk a site's document root and
//! synthesize a status-200 [`UrlRecord`] for every file written since the
//! last scan.

use crate::lastaccess::{stamp_path, LastAccessLimit};
use sitemapgen_core::SiteDataManager;
use sitemapgen_events::UrlRecord;
use sitemapgen_scheduler::Service;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

/// Escapes a single path segment the way a URL component is escaped:
/// unreserved characters pass through, everything else becomes `%XX`.
fn escape_url_component(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(*byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn mtime_secs(meta: &std::fs::Metadata) -> io::Result<i64> {
    let modified = meta.modified()?;
    Ok(modified.duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0))
}

pub struct FileScanner {
    name: String,
    data: Arc<SiteDataManager>,
    basedir: PathBuf,
    baseurl: String,
    limit: LastAccessLimit,
    running_period_secs: i64,
    next_run_at: AtomicI64,
}

impl FileScanner {
    pub fn new(
        site_id: &str,
        data: Arc<SiteDataManager>,
        basedir: impl Into<PathBuf>,
        run_dir: &Path,
        running_period_secs: i64,
    ) -> io::Result<Self> {
        let now = now_secs();
        let limit = LastAccessLimit::load_or_seed(stamp_path(run_dir, site_id, "_file_scanner"), now)?;
        Ok(FileScanner {
            name: "filescanner".to_string(),
            data,
            basedir: basedir.into(),
            baseurl: String::new(),
            limit,
            running_period_secs,
            next_run_at: AtomicI64::new(0),
        })
    }

    /// Walks the document root, feeding every file newer than the stored
    /// limit into the site's database, then advances the limit to the
    /// newest `last_modified` actually observed.
    pub fn run_generation(&self) -> io::Result<usize> {
        let mut count = 0usize;
        let mut newest = self.limit.get();
        self.scan_dir(&self.basedir, &self.baseurl, &mut count, &mut newest)?;
        self.limit.advance(newest)?;
        Ok(count)
    }

    fn scan_dir(&self, dir: &Path, url: &str, count: &mut usize, newest: &mut i64) -> io::Result<()> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to scan directory");
                return Ok(());
            }
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == "." || name == ".." {
                continue;
            }

            let child_path = entry.path();
            let child_url = format!("{url}/{}", escape_url_component(&name));

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(_) => continue,
            };

            if meta.is_dir() {
                self.scan_dir(&child_path, &child_url, count, newest)?;
            } else {
                let last_modified = mtime_secs(&meta)?;
                if last_modified > self.limit.get() {
                    let record = UrlRecord::new(&child_url, "", "", 200, meta.len() as i64, last_modified, last_modified, now_secs());
                    self.data.process_record(&record);
                    *count += 1;
                    if last_modified > *newest {
                        *newest = last_modified;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Service for FileScanner {
    fn name(&self) -> &str {
        &self.name
    }
    fn wait_time(&self) -> i64 {
        self.next_run_at.load(Ordering::Acquire) - now_secs()
    }
    fn running_period(&self) -> i64 {
        self.running_period_secs
    }
    fn run(&self) {
        let now = now_secs();
        if let Err(e) = self.run_generation() {
            tracing::warn!(scanner = %self.name, error = %e, "file scan failed, rescheduled for next cadence");
        }
        self.next_run_at.store(now + self.running_period_secs, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemapgen_config::SiteConfig;

    fn fresh_dir(tag: &str) -> PathBuf {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_filescanner_{tag}_{ts}"))
    }

    fn config(site_id: &str) -> SiteConfig {
        SiteConfig {
            site_id: site_id.into(),
            physical_path: "/var/www".into(),
            host_url: Some("http://example.com".into()),
            max_url_in_memory: 10,
            max_url_in_disk: 1000,
            max_url_life_days: 90,
            max_obsoleted: 10,
            max_temp_bytes: u64::MAX,
            backup_duration_secs: 600,
            sitemap_duration_secs: 3600,
            news_expire_secs: 86400,
            news_max_urls: 1000,
            included_query_fields: vec![],
            url_replacements: vec![],
            include_patterns: vec![],
            exclude_patterns: vec![],
            ping_url_templates: vec![],
            update_robots: false,
            log_path: None,
        }
    }

    #[test]
    fn scans_files_and_escapes_names_recursively() {
        let docroot = fresh_dir("docroot");
        let run_dir = fresh_dir("run");
        std::fs::create_dir_all(docroot.join("sub dir")).unwrap();
        std::fs::write(docroot.join("index.html"), b"hi").unwrap();
        std::fs::write(docroot.join("sub dir").join("a b.html"), b"hi").unwrap();

        let data_dir = fresh_dir("data");
        let data = Arc::new(SiteDataManager::new(&config("s1"), &data_dir).unwrap());
        let scanner = FileScanner::new("s1", Arc::clone(&data), &docroot, &run_dir, 3600).unwrap();

        let found = scanner.run_generation().unwrap();
        assert_eq!(found, 2);
        data.save_memory_data(true, true).unwrap();
    }

    #[test]
    fn second_run_with_no_new_files_finds_nothing() {
        let docroot = fresh_dir("docroot2");
        let run_dir = fresh_dir("run2");
        std::fs::create_dir_all(&docroot).unwrap();
        std::fs::write(docroot.join("index.html"), b"hi").unwrap();

        let data_dir = fresh_dir("data2");
        let data = Arc::new(SiteDataManager::new(&config("s1"), &data_dir).unwrap());
        let scanner = FileScanner::new("s1", Arc::clone(&data), &docroot, &run_dir, 3600).unwrap();
        assert_eq!(scanner.run_generation().unwrap(), 1);
        assert_eq!(scanner.run_generation().unwrap(), 0);
    }
}
