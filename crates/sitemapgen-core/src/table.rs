//! In-memory fingerprint → record table (`spec.md` 4.E).

use crate::recordio;
use sitemapgen_events::{UrlFprint, VisitingRecord};
use std::collections::HashMap;
use std::path::Path;

pub struct RecordTable {
    records: HashMap<UrlFprint, VisitingRecord>,
}

impl RecordTable {
    pub fn new() -> Self {
        RecordTable { records: HashMap::new() }
    }

    /// Adds a visit. Returns `true` if this created a new entry, `false` if
    /// it updated an existing one (`spec.md` 4.E `add`).
    pub fn add(&mut self, url: &str, content_hash: i64, last_modified: i64, last_filewrite: i64, now: i64) -> bool {
        let fingerprint = UrlFprint::of(url);
        match self.records.get_mut(&fingerprint) {
            None => {
                self.records.insert(fingerprint, VisitingRecord::new_seen(url, content_hash, last_modified, last_filewrite, now));
                true
            }
            Some(existing) => {
                existing.count_access += 1;
                existing.last_access = now;
                if existing.differs_in_identity(content_hash, last_modified, last_filewrite) {
                    existing.count_change += 1;
                    existing.last_change = now;
                    existing.content_hash = content_hash;
                    existing.last_modified = last_modified;
                    existing.last_filewrite = last_filewrite;
                }
                false
            }
        }
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Writes the table sorted by fingerprint to a single file in the temp
    /// format (`spec.md` 4.E `save`).
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut sorted: Vec<&VisitingRecord> = self.records.values().collect();
        sorted.sort_by_key(|r| r.fingerprint);
        let owned: Vec<VisitingRecord> = sorted.into_iter().cloned().collect();
        recordio::write_all(path, &owned)
    }

    pub fn load(&mut self, path: &Path) -> std::io::Result<()> {
        self.records.clear();
        for record in recordio::read_all(path)? {
            self.records.insert(record.fingerprint, record);
        }
        Ok(())
    }
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::new()
    }
}
