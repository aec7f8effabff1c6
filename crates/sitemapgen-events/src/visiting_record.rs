//! `VisitingRecord` — the owned, in-memory/on-disk form of a visited URL.
//!
//! Distinct from [`crate::UrlRecord`] (the wire form): this one owns its URL
//! string and carries the bookkeeping fields (`first_appear`, counts) that
//! only exist once a URL has entered the record table.

use crate::UrlFprint;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisitingRecord {
    pub url: String,
    pub fingerprint: UrlFprint,
    pub first_appear: i64,
    pub last_access: i64,
    pub last_change: i64,
    pub count_access: u32,
    pub count_change: u32,
    pub content_hash: i64,
    pub last_modified: i64,
    pub last_filewrite: i64,
}

impl VisitingRecord {
    /// Builds a freshly-seen record: `first_appear == last_access`,
    /// `count_access == count_change == 1` (`spec.md` 4.E `add`).
    pub fn new_seen(
        url: impl Into<String>,
        content_hash: i64,
        last_modified: i64,
        last_filewrite: i64,
        now: i64,
    ) -> Self {
        let url = url.into();
        let fingerprint = UrlFprint::of(&url);
        VisitingRecord {
            url,
            fingerprint,
            first_appear: now,
            last_access: now,
            last_change: now,
            count_access: 1,
            count_change: 1,
            content_hash,
            last_modified,
            last_filewrite,
        }
    }

    /// Whether any of the "identity" fields that indicate a changed resource
    /// differ from `other` — `spec.md` 4.E step: "iff any of (content_hash,
    /// last_modified, last_filewrite) differs ... increments count_change".
    pub fn differs_in_identity(&self, content_hash: i64, last_modified: i64, last_filewrite: i64) -> bool {
        self.content_hash != content_hash
            || self.last_modified != last_modified
            || self.last_filewrite != last_filewrite
    }

    /// Validates the record invariants from `spec.md` section 3:
    /// `count_access >= count_change >= 1`, `first_appear <= last_access`,
    /// `last_change <= last_access`.
    pub fn check_invariants(&self) -> bool {
        self.count_access >= self.count_change
            && self.count_change >= 1
            && self.first_appear <= self.last_access
            && self.last_change <= self.last_access
    }
}
