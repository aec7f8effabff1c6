//! `<changefreq>`/`<priority>` derivation from a record's access/change
//! history, grounded on `plainsitemapservice.cc`'s `ConvertRecord`.

use sitemapgen_core::RecordFileStat;
use sitemapgen_events::VisitingRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        }
    }
}

/// `spec.md` 4.J step 2's ratio buckets: most-frequently-changing records
/// (more than half their accesses are changes, and there are more than 10
/// accesses to trust the ratio) are `always`; otherwise bucket the average
/// hours between changes.
pub fn changefreq(record: &VisitingRecord) -> ChangeFreq {
    if record.count_change * 2 >= record.count_access && record.count_access > 10 {
        return ChangeFreq::Always;
    }
    if record.count_change == 0 {
        return ChangeFreq::Never;
    }
    let span_secs = (record.last_access - record.first_appear).max(0);
    let hours_per_change = span_secs as f64 / record.count_change as f64 / 3600.0;

    if hours_per_change <= 1.0 {
        ChangeFreq::Hourly
    } else if hours_per_change <= 24.0 {
        ChangeFreq::Daily
    } else if hours_per_change <= 24.0 * 7.0 {
        ChangeFreq::Weekly
    } else if hours_per_change <= 24.0 * 30.0 {
        ChangeFreq::Monthly
    } else if hours_per_change <= 24.0 * 365.0 {
        ChangeFreq::Yearly
    } else {
        ChangeFreq::Never
    }
}

/// Priority in `[0.1, 1.0]`, scaled by how often this URL is accessed
/// relative to the busiest URL seen in this run. The original's
/// `RecordFileStat::GetPriority` body isn't in the retrieval pack; this
/// keeps the same input signal (access count against the run's stats)
/// without inventing fields that aren't otherwise documented.
pub fn priority(record: &VisitingRecord, stat: &RecordFileStat, max_count_access: u32) -> f64 {
    let _ = stat;
    if max_count_access == 0 {
        return 0.5;
    }
    let ratio = record.count_access as f64 / max_count_access as f64;
    (0.1 + ratio * 0.9).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemapgen_events::UrlFprint;

    fn rec(first_appear: i64, last_access: i64, count_access: u32, count_change: u32) -> VisitingRecord {
        VisitingRecord {
            url: "/a".into(),
            fingerprint: UrlFprint(1),
            first_appear,
            last_access,
            last_change: last_access,
            count_access,
            count_change,
            content_hash: 0,
            last_modified: 0,
            last_filewrite: 0,
        }
    }

    #[test]
    fn high_change_ratio_is_always() {
        let r = rec(0, 100, 20, 15);
        assert_eq!(changefreq(&r), ChangeFreq::Always);
    }

    #[test]
    fn hourly_bucket() {
        let r = rec(0, 3600, 3, 1);
        assert_eq!(changefreq(&r), ChangeFreq::Hourly);
    }

    #[test]
    fn weekly_bucket() {
        let r = rec(0, 24 * 3600 * 6, 3, 1);
        assert_eq!(changefreq(&r), ChangeFreq::Weekly);
    }

    #[test]
    fn never_when_span_too_large() {
        let r = rec(0, 24 * 3600 * 1000, 3, 1);
        assert_eq!(changefreq(&r), ChangeFreq::Never);
    }

    #[test]
    fn priority_scales_with_access_count() {
        let stat = RecordFileStat::default();
        let busy = rec(0, 100, 100, 1);
        let quiet = rec(0, 100, 1, 1);
        assert!(priority(&busy, &stat, 100) > priority(&quiet, &stat, 100));
    }
}
