//! Per-site data manager (`spec.md` 4.H), grounded directly on
//! `sitedatamanager.cc`'s `ProcessRecord`/`SaveMemoryData`/`UpdateDatabase`/
//! `GetHostName`.

use crate::filemanager::RecordfileManager;
use crate::hosttable::HostTable;
use crate::merger::{MergeError, RecordFileStat, RecordMerger};
use crate::queryfilter::QueryFilter;
use crate::replacer::UrlReplacer;
use crate::robotsfilter::RobotsFilter;
use crate::runtime_info::RuntimeInfo;
use crate::table::RecordTable;
use sitemapgen_config::SiteConfig;
use sitemapgen_events::{UrlFprint, UrlRecord};
use std::collections::HashSet;
use std::sync::{Mutex, RwLock, RwLockReadGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("host can't be determined for site {0}")]
    NoHost(String),
}

/// Outcome of [`SiteDataManager::process_record`], mirroring the original's
/// tri-state return (`0` = accepted, `1` = duplicate/update, silently
/// dropped otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Added,
    Updated,
    ObsoletedMarked,
    Rejected,
}

pub struct SiteDataManager {
    site_id: String,
    configured_host: Option<String>,
    max_url_in_memory: usize,
    max_url_in_disk: usize,
    max_url_life_secs: i64,
    max_obsoleted: usize,

    robots_filter: RobotsFilter,
    replacer: UrlReplacer,
    query_filter: QueryFilter,

    memory: Mutex<MemoryState>,
    /// Guards `base`/`fprint`/temps during merge (write) and sitemap reads
    /// (read). Never take this while holding `memory`'s lock (`spec.md`
    /// 4.H: memory_lock must never be held while acquiring disk_lock).
    disk: RwLock<()>,
    file_manager: RecordfileManager,
    merger: RecordMerger,
    runtime_info: RuntimeInfo,
}

struct MemoryState {
    table: RecordTable,
    host_table: HostTable,
    obsoleted: HashSet<UrlFprint>,
    last_file_stat: RecordFileStat,
}

/// `spec.md` 4.H step 1: reject anything that isn't a plain ASCII,
/// non-control path-and-query starting with `/`.
fn validate_url(url: &str) -> bool {
    url.starts_with('/') && url.bytes().all(|b| b.is_ascii() && !b.is_ascii_control())
}

impl SiteDataManager {
    pub fn new(config: &SiteConfig, data_dir: impl Into<std::path::PathBuf>) -> std::io::Result<Self> {
        let file_manager = RecordfileManager::new(data_dir, config.max_temp_bytes)?;
        let mut host_table = HostTable::new();
        let _ = host_table.load(&file_manager.host_path());

        Ok(SiteDataManager {
            site_id: config.site_id.clone(),
            configured_host: config.host_url.clone(),
            max_url_in_memory: config.max_url_in_memory,
            max_url_in_disk: config.max_url_in_disk,
            max_url_life_secs: config.max_url_life_days * 24 * 3600,
            max_obsoleted: config.max_obsoleted,
            robots_filter: RobotsFilter::empty(),
            replacer: UrlReplacer::new(config.url_replacements.clone()),
            query_filter: QueryFilter::new(config.included_query_fields.clone()),
            memory: Mutex::new(MemoryState {
                table: RecordTable::new(),
                host_table,
                obsoleted: HashSet::new(),
                last_file_stat: RecordFileStat::default(),
            }),
            disk: RwLock::new(()),
            file_manager,
            merger: RecordMerger::new(),
            runtime_info: RuntimeInfo::new(),
        })
    }

    /// Swaps in a freshly loaded robots.txt filter, e.g. after the site's
    /// document root is rescanned.
    pub fn set_robots_filter(&mut self, filter: RobotsFilter) {
        self.robots_filter = filter;
    }

    pub fn runtime_info(&self) -> &RuntimeInfo {
        &self.runtime_info
    }

    pub fn file_manager(&self) -> &RecordfileManager {
        &self.file_manager
    }

    /// `spec.md` 4.H `process_record`: validate → robots filter → replacer
    /// chain → query filter → route by status code.
    pub fn process_record(&self, record: &UrlRecord) -> ProcessOutcome {
        let url = record.url();
        if !validate_url(&url) {
            return ProcessOutcome::Rejected;
        }
        if !self.robots_filter.accept(&url) {
            return ProcessOutcome::Rejected;
        }

        let replaced = self.replacer.apply(&url);
        let filtered = self.query_filter.filter(&replaced);

        match record.status {
            200 => {
                let mut state = self.memory.lock().unwrap();
                let is_new = state.table.add(&filtered, record.content_hash, record.last_modified, record.last_filewrite, record.last_access);
                state.host_table.visit_host(&record.host(), 1);
                self.runtime_info.update(|s| s.url_in_memory = state.table.size());
                if is_new {
                    ProcessOutcome::Added
                } else {
                    ProcessOutcome::Updated
                }
            }
            404 | 301 | 302 | 307 => {
                let mut state = self.memory.lock().unwrap();
                if state.obsoleted.len() < self.max_obsoleted {
                    state.obsoleted.insert(UrlFprint::of(&filtered));
                }
                ProcessOutcome::ObsoletedMarked
            }
            _ => ProcessOutcome::Rejected,
        }
    }

    /// `true` if the in-memory table has crossed its flush threshold and
    /// `save_memory_data` should be scheduled.
    pub fn memory_needs_flush(&self) -> bool {
        self.memory.lock().unwrap().table.size() >= self.max_url_in_memory
    }

    /// `spec.md` 4.H `save_memory_data`: persists the host table and the
    /// in-memory record table to `current`, optionally sealing it into a
    /// temp file and clearing the table. When `block` is `false`, a
    /// contended memory lock is treated as "nothing to do" rather than
    /// waited on, so a hot-path caller (e.g. the record receiver) never
    /// stalls behind a concurrent flush.
    pub fn save_memory_data(&self, flush: bool, block: bool) -> Result<(), SiteError> {
        let mut state = if block {
            self.memory.lock().unwrap()
        } else {
            match self.memory.try_lock() {
                Ok(guard) => guard,
                Err(_) => return Ok(()),
            }
        };
        state.host_table.save(&self.file_manager.host_path())?;
        state.table.save(&self.file_manager.current_path())?;

        if flush {
            let produced = self.file_manager.complete_current()?;
            state.table.clear();
            self.runtime_info.update(|s| s.url_in_memory = 0);
            drop(state);

            if produced.is_some() && self.file_manager.temp_files_size()? > self.file_manager.max_temp_bytes() {
                let _write_guard = self.disk.write().unwrap();
                self.file_manager.cleanup_temps()?;
            }
        }
        Ok(())
    }

    /// `spec.md` 4.H `update_database`: snapshot and clear the obsoleted
    /// set under `memory`, release it, then merge base + temps under the
    /// disk write lock.
    pub fn update_database(&self, now: i64) -> Result<RecordFileStat, SiteError> {
        let obsoleted_snapshot = {
            let mut state = self.memory.lock().unwrap();
            std::mem::take(&mut state.obsoleted)
        };

        let cutoff = now - self.max_url_life_secs;
        let stat = {
            let _write_guard = self.disk.write().unwrap();
            self.merger.merge(&self.file_manager, &obsoleted_snapshot, self.max_url_in_disk, cutoff)?
        };

        let mut state = self.memory.lock().unwrap();
        state.last_file_stat = stat;
        self.runtime_info.update(|s| s.url_in_database = stat.total_count);
        Ok(stat)
    }

    /// Acquires the disk lock read-style, for services scanning the base
    /// file (`spec.md` 4.H: "Services acquire disk_lock read-style around
    /// their base-file scan").
    pub fn lock_disk_for_read(&self) -> RwLockReadGuard<'_, ()> {
        self.disk.read().unwrap()
    }

    /// `spec.md` 4.H `get_host_name`: the configured host, or the
    /// most-visited host observed so far.
    pub fn get_host_name(&self) -> Result<String, SiteError> {
        let host = match &self.configured_host {
            Some(h) if !h.is_empty() => h.clone(),
            _ => self.memory.lock().unwrap().host_table.get_best_host(),
        };
        if host.is_empty() {
            return Err(SiteError::NoHost(self.site_id.clone()));
        }
        self.runtime_info.update(|s| s.host_name = host.clone());
        Ok(host)
    }

    pub fn last_file_stat(&self) -> RecordFileStat {
        self.memory.lock().unwrap().last_file_stat
    }
}
