//! News-sitemap data tracking: the set of URLs added since the last news
//! sitemap generation (`newsdatamanager.cc`'s `old_fprint`/`new_entries`
//! split, used to bound the news sitemap to recently-seen URLs).

use crate::filemanager::RecordfileManager;
use crate::recordio;
use sitemapgen_events::{UrlFprint, VisitingRecord};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

const FPRINT_FILE: &str = "old_fprint";
const ENTRIES_FILE: &str = "new_entries";

pub struct NewsDataManager {
    dir: PathBuf,
    max_entries: usize,
}

impl NewsDataManager {
    /// Creates the `news` sub-directory under `site_dir` and seeds
    /// `old_fprint` from the site's current base fingerprints if one doesn't
    /// already exist, so URLs crawled before news tracking started aren't
    /// reported as new.
    pub fn new(site_dir: &Path, file_manager: &RecordfileManager, max_entries: usize) -> io::Result<Self> {
        Self::with_subdir(site_dir, "news", file_manager, max_entries)
    }

    /// Same as [`NewsDataManager::new`], but under an arbitrary sub-directory
    /// name — used by the blog-ping service, which tracks "has anything new
    /// appeared since the last ping" with the same `old_fprint`/`new_entries`
    /// shape under `blogsearch_ping/` instead of `news/` (`spec.md` 6).
    pub fn with_subdir(site_dir: &Path, subdir: &str, file_manager: &RecordfileManager, max_entries: usize) -> io::Result<Self> {
        let dir = site_dir.join(subdir);
        std::fs::create_dir_all(&dir)?;
        let mgr = NewsDataManager { dir, max_entries };
        let fprint_path = mgr.fprint_path();
        if file_manager.fprint_path().exists() && !fprint_path.exists() {
            std::fs::copy(file_manager.fprint_path(), &fprint_path)?;
        }
        Ok(mgr)
    }

    fn fprint_path(&self) -> PathBuf {
        self.dir.join(FPRINT_FILE)
    }

    pub fn entries_path(&self) -> PathBuf {
        self.dir.join(ENTRIES_FILE)
    }

    /// Folds every temp file whose mtime falls in `[since, until)` into the
    /// tracked entry set, keeping only fingerprints not already present in
    /// `old_fprint`. Caps the retained entry count at `max_entries`,
    /// dropping the least-recently-accessed entries first.
    pub fn update(&self, file_manager: &RecordfileManager, since: i64, until: i64) -> io::Result<()> {
        let temps = file_manager.temps_in(since..until)?;
        if temps.is_empty() {
            return Ok(());
        }

        let mut known: HashSet<UrlFprint> = recordio::read_fprints(&self.fprint_path())?.into_iter().collect();
        let mut fresh: Vec<VisitingRecord> = Vec::new();
        for temp in temps {
            for record in recordio::read_all(&temp)? {
                if known.insert(record.fingerprint) {
                    fresh.push(record);
                }
            }
        }

        if fresh.is_empty() {
            return Ok(());
        }

        let mut entries = recordio::read_all(&self.entries_path())?;
        entries.extend(fresh);
        entries.sort_by_key(|r| std::cmp::Reverse(r.last_access));
        entries.truncate(self.max_entries);
        entries.sort_by_key(|r| r.fingerprint);
        recordio::write_all(&self.entries_path(), &entries)?;

        let mut fprints: Vec<UrlFprint> = known.into_iter().collect();
        fprints.sort();
        recordio::write_fprints(&self.fprint_path(), &fprints)
    }

    pub fn entries(&self) -> io::Result<Vec<VisitingRecord>> {
        recordio::read_all(&self.entries_path())
    }
}
