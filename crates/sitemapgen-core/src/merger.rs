//! k-way merge of the base file with N temp files (`spec.md` 4.G).

use crate::filemanager::RecordfileManager;
use crate::recordio;
use sitemapgen_events::{UrlFprint, VisitingRecord};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Aggregate stats about the merged base file, used later by sitemap
/// services to compute `<priority>` (`spec.md` 4.G, 4.J).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFileStat {
    pub total_count: usize,
    pub oldest_last_access: i64,
    pub newest_last_access: i64,
}

impl RecordFileStat {
    pub fn get_total_count(&self) -> usize {
        self.total_count
    }
}

pub struct RecordMerger;

impl RecordMerger {
    pub fn new() -> Self {
        RecordMerger
    }

    /// Folds `base` and every `temp-*` file into a new `base`/`fprint` pair,
    /// dropping obsoleted or expired fingerprints and enforcing `max_count`.
    /// Writes to `.new` paths then atomically swaps them in; a crash before
    /// both renames complete leaves the old `base`/`fprint` intact.
    pub fn merge(
        &self,
        file_manager: &RecordfileManager,
        obsoleted: &HashSet<UrlFprint>,
        max_count: usize,
        cutoff: i64,
    ) -> Result<RecordFileStat, MergeError> {
        let base_records = recordio::read_all(&file_manager.base_path())?;
        let temp_paths = file_manager.list_temps()?;
        let mut sources: Vec<Vec<VisitingRecord>> = Vec::with_capacity(1 + temp_paths.len());
        sources.push(base_records);
        for temp in &temp_paths {
            sources.push(recordio::read_all(temp)?);
        }

        let mut survivors = merge_sources(&sources, obsoleted, cutoff);
        evict_over_cap(&mut survivors, max_count);

        let stat = RecordFileStat {
            total_count: survivors.len(),
            oldest_last_access: survivors.iter().map(|r| r.last_access).min().unwrap_or(0),
            newest_last_access: survivors.iter().map(|r| r.last_access).max().unwrap_or(0),
        };

        let fprints: Vec<UrlFprint> = survivors.iter().map(|r| r.fingerprint).collect();
        let base_new = file_manager.dir().join("base.new");
        let fprint_new = file_manager.dir().join("fprint.new");
        recordio::write_all(&base_new, &survivors)?;
        recordio::write_fprints(&fprint_new, &fprints)?;

        std::fs::rename(&base_new, file_manager.base_path())?;
        std::fs::rename(&fprint_new, file_manager.fprint_path())?;

        for temp in temp_paths {
            std::fs::remove_file(temp)?;
        }

        Ok(stat)
    }
}

impl Default for RecordMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges `sources` (each individually sorted ascending by fingerprint) into
/// one ascending, deduplicated, filtered list.
///
/// Implemented as a k-way priority-queue merge keyed by fingerprint: each
/// source contributes a cursor, the heap always yields the globally-smallest
/// fingerprint next, and every cursor sitting on that fingerprint is folded
/// together before moving on (`spec.md` 4.G "field-wise merge").
fn merge_sources(sources: &[Vec<VisitingRecord>], obsoleted: &HashSet<UrlFprint>, cutoff: i64) -> Vec<VisitingRecord> {
    let mut cursors = vec![0usize; sources.len()];
    let mut heap: BinaryHeap<Reverse<(UrlFprint, usize)>> = BinaryHeap::new();
    for (src_idx, src) in sources.iter().enumerate() {
        if let Some(first) = src.first() {
            heap.push(Reverse((first.fingerprint, src_idx)));
        }
    }

    let mut out = Vec::new();
    while let Some(Reverse((fp, _))) = heap.pop() {
        // Pull every record across every source sharing this fingerprint.
        let mut group: Vec<&VisitingRecord> = Vec::new();
        for (src_idx, src) in sources.iter().enumerate() {
            while cursors[src_idx] < src.len() && src[cursors[src_idx]].fingerprint == fp {
                group.push(&src[cursors[src_idx]]);
                cursors[src_idx] += 1;
            }
        }
        // Drain any duplicate heap entries for this fingerprint left behind
        // by sources that had more than one cursor step consumed above.
        while matches!(heap.peek(), Some(Reverse((peek_fp, _))) if *peek_fp == fp) {
            heap.pop();
        }
        // Push the next pending fingerprint for every source just advanced.
        for (src_idx, src) in sources.iter().enumerate() {
            if let Some(rec) = src.get(cursors[src_idx]) {
                if cursors[src_idx] > 0 && src[cursors[src_idx] - 1].fingerprint == fp {
                    heap.push(Reverse((rec.fingerprint, src_idx)));
                }
            }
        }

        let merged = fold_group(&group);
        if obsoleted.contains(&fp) || merged.last_access < cutoff {
            continue;
        }
        out.push(merged);
    }
    out
}

/// Field-wise merge of every record sharing one fingerprint (`spec.md` 4.G
/// rule 2): `first_appear = min`, `last_access`/`last_change = max`, counts
/// summed, most-recent-wins for `content_hash`/`last_modified`/
/// `last_filewrite` (ties broken by source order, deterministically).
fn fold_group(group: &[&VisitingRecord]) -> VisitingRecord {
    let mut merged = group[0].clone();
    for r in &group[1..] {
        merged.first_appear = merged.first_appear.min(r.first_appear);
        merged.last_access = merged.last_access.max(r.last_access);
        merged.last_change = merged.last_change.max(r.last_change);
        merged.count_access += r.count_access;
        merged.count_change += r.count_change;
        // Most-recent-wins on the identity fields.
        if r.last_access >= merged.last_access {
            merged.content_hash = r.content_hash;
            merged.last_modified = r.last_modified;
            merged.last_filewrite = r.last_filewrite;
        }
    }
    merged
}

/// Evicts records by ascending priority (lowest `count_access`, then oldest
/// `last_access`, ties by fingerprint) until `survivors.len() <= max_count`.
fn evict_over_cap(survivors: &mut Vec<VisitingRecord>, max_count: usize) {
    if survivors.len() <= max_count {
        return;
    }
    let mut ranked: Vec<usize> = (0..survivors.len()).collect();
    ranked.sort_by_key(|&i| (survivors[i].count_access, survivors[i].last_access, survivors[i].fingerprint));
    let to_drop = survivors.len() - max_count;
    let drop_set: HashSet<usize> = ranked.into_iter().take(to_drop).collect();
    let mut idx = 0usize;
    survivors.retain(|_| {
        let keep = !drop_set.contains(&idx);
        idx += 1;
        keep
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filemanager::RecordfileManager;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn fresh_dir(tag: &str) -> std::path::PathBuf {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_merger_{tag}_{ts}"))
    }

    fn rec(url: &str, fp: u128, last_access: i64, count_access: u32) -> VisitingRecord {
        VisitingRecord {
            url: url.to_string(),
            fingerprint: UrlFprint(fp),
            first_appear: last_access,
            last_access,
            last_change: last_access,
            count_access,
            count_change: 1,
            content_hash: 0,
            last_modified: 0,
            last_filewrite: 0,
        }
    }

    #[test]
    fn merge_with_obsolete_and_cutoff_matches_spec_scenario() {
        let dir = fresh_dir("scenario3");
        let mgr = RecordfileManager::new(&dir, u64::MAX).unwrap();
        let base = vec![rec("/f1", 1, 10, 1), rec("/f2", 2, 100, 1)];
        recordio::write_all(&mgr.base_path(), &base).unwrap();
        let temp = vec![rec("/f3", 3, 50, 1)];
        recordio::write_all(&dir.join("temp-1"), &temp).unwrap();

        let mut obsoleted = HashSet::new();
        obsoleted.insert(UrlFprint(1));

        let merger = RecordMerger::new();
        let stat = merger.merge(&mgr, &obsoleted, 10, 40).unwrap();

        let out = recordio::read_all(&mgr.base_path()).unwrap();
        let fps: Vec<u128> = out.iter().map(|r| r.fingerprint.0).collect();
        assert_eq!(fps, vec![2, 3]);
        assert_eq!(stat.total_count, 2);
    }

    #[test]
    fn cap_eviction_keeps_highest_count_access() {
        let dir = fresh_dir("cap");
        let mgr = RecordfileManager::new(&dir, u64::MAX).unwrap();
        let base = vec![rec("/a", 1, 10, 1), rec("/b", 2, 10, 5), rec("/c", 3, 10, 10)];
        recordio::write_all(&mgr.base_path(), &base).unwrap();

        let merger = RecordMerger::new();
        merger.merge(&mgr, &HashSet::new(), 2, 0).unwrap();

        let out = recordio::read_all(&mgr.base_path()).unwrap();
        let counts: Vec<u32> = out.iter().map(|r| r.count_access).collect();
        assert_eq!(counts, vec![5, 10]);
    }

    #[test]
    fn fingerprint_file_matches_base_after_merge() {
        let dir = fresh_dir("sync");
        let mgr = RecordfileManager::new(&dir, u64::MAX).unwrap();
        let base = vec![rec("/a", 5, 10, 1), rec("/b", 9, 10, 1)];
        recordio::write_all(&mgr.base_path(), &base).unwrap();

        let merger = RecordMerger::new();
        merger.merge(&mgr, &HashSet::new(), 10, 0).unwrap();

        let base_out = recordio::read_all(&mgr.base_path()).unwrap();
        let fprint_out = recordio::read_fprints(&mgr.fprint_path()).unwrap();
        let base_fps: Vec<UrlFprint> = base_out.iter().map(|r| r.fingerprint).collect();
        assert_eq!(base_fps, fprint_out);
        let mut sorted = fprint_out.clone();
        sorted.sort();
        assert_eq!(fprint_out, sorted);
    }

    #[test]
    fn merge_is_idempotent() {
        let dir = fresh_dir("idempotent");
        let mgr = RecordfileManager::new(&dir, u64::MAX).unwrap();
        let base = vec![rec("/a", 1, 10, 1), rec("/b", 2, 20, 3)];
        recordio::write_all(&mgr.base_path(), &base).unwrap();

        let merger = RecordMerger::new();
        merger.merge(&mgr, &HashSet::new(), 100, 0).unwrap();
        let once = recordio::read_all(&mgr.base_path()).unwrap();

        merger.merge(&mgr, &HashSet::new(), 100, 0).unwrap();
        let twice = recordio::read_all(&mgr.base_path()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn monotonic_cutoff_shrinks_output() {
        let dir = fresh_dir("monotonic");
        let mgr = RecordfileManager::new(&dir, u64::MAX).unwrap();
        let base = vec![rec("/a", 1, 10, 1), rec("/b", 2, 50, 1), rec("/c", 3, 90, 1)];
        recordio::write_all(&mgr.base_path(), &base).unwrap();

        let merger = RecordMerger::new();
        let under_c1 = merger.merge(&mgr, &HashSet::new(), 100, 20).unwrap();
        let fps_c1: HashSet<u128> = recordio::read_all(&mgr.base_path()).unwrap().iter().map(|r| r.fingerprint.0).collect();

        recordio::write_all(&mgr.base_path(), &base).unwrap();
        let _under_c2 = merger.merge(&mgr, &HashSet::new(), 100, 60).unwrap();
        let fps_c2: HashSet<u128> = recordio::read_all(&mgr.base_path()).unwrap().iter().map(|r| r.fingerprint.0).collect();

        assert!(fps_c2.is_subset(&fps_c1));
        assert!(under_c1.total_count >= fps_c2.len());
    }
}
