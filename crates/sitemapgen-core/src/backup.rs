//! `BackupService` (`spec.md` 4.I), grounded on `backupservice.cc`: a
//! per-site cadence that periodically persists in-memory records to disk
//! without sealing them into a temp file.

use crate::site::SiteDataManager;
use sitemapgen_scheduler::Service;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

pub struct BackupService {
    site_id: String,
    data: Arc<SiteDataManager>,
    running_period_secs: i64,
    next_run_at: AtomicI64,
}

impl BackupService {
    pub fn new(site_id: impl Into<String>, data: Arc<SiteDataManager>, running_period_secs: i64) -> Self {
        BackupService { site_id: site_id.into(), data, running_period_secs, next_run_at: AtomicI64::new(0) }
    }
}

impl Service for BackupService {
    fn name(&self) -> &str {
        &self.site_id
    }
    fn wait_time(&self) -> i64 {
        self.next_run_at.load(Ordering::Acquire) - now_secs()
    }
    fn running_period(&self) -> i64 {
        self.running_period_secs
    }
    fn run(&self) {
        let now = now_secs();
        match self.data.save_memory_data(false, true) {
            Ok(()) => tracing::debug!(site = %self.site_id, "backed up in-memory records"),
            Err(e) => tracing::warn!(site = %self.site_id, error = %e, "failed to back up in-memory records"),
        }
        self.next_run_at.store(now + self.running_period_secs, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemapgen_config::SiteConfig;
    use sitemapgen_events::UrlRecord;

    fn fresh_dir(tag: &str) -> std::path::PathBuf {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_backup_{tag}_{ts}"))
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
    fn run_persists_current_table_without_flushing() {
        let dir = fresh_dir("run");
        let data = Arc::new(SiteDataManager::new(&config("s1"), &dir).unwrap());
        data.process_record(&UrlRecord::new("/a", "h", "s1", 200, 0, 0, 0, 1));

        let service = BackupService::new("s1", Arc::clone(&data), 600);
        service.run();

        let saved = std::fs::metadata(dir.join("current")).unwrap();
        assert!(saved.len() > 0);
        assert_eq!(service.wait_time(), 600);
    }
}
