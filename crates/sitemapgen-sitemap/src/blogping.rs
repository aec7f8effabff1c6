//! `BlogPingService` (`spec.md` 4.I "Blog-search ping service", 6
//! "Search-engine informer protocol"), grounded on
//! `basesitemapservice.h`'s `InformSearchEngine` call site.

use crate::informer::Informer;
use sitemapgen_core::{NewsDataManager, SiteDataManager, SiteError};
use sitemapgen_scheduler::Service;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

/// Pings a blog-search informer whenever new URLs have appeared since the
/// last ping. Tracks "anything new" with the same `old_fprint`/
/// `new_entries` shape as the news sitemap, rooted at `blogsearch_ping/`
/// (`spec.md` 6's per-site data directory layout).
pub struct BlogPingService {
    name: String,
    data: Arc<SiteDataManager>,
    tracker: NewsDataManager,
    informer: Informer,
    ping_target: String,
    running_period_secs: i64,
    next_run_at: AtomicI64,
    last_update: AtomicI64,
}

impl BlogPingService {
    pub fn new(
        data: Arc<SiteDataManager>,
        site_dir: &std::path::Path,
        informer: Informer,
        ping_target: impl Into<String>,
        running_period_secs: i64,
    ) -> std::io::Result<Self> {
        let tracker = NewsDataManager::with_subdir(site_dir, "blogsearch_ping", data.file_manager(), 1)?;
        Ok(BlogPingService {
            name: "blogping".to_string(),
            data,
            tracker,
            informer,
            ping_target: ping_target.into(),
            running_period_secs,
            next_run_at: AtomicI64::new(0),
            last_update: AtomicI64::new(0),
        })
    }

    /// Pings only when at least one URL has newly appeared since the last
    /// successful run; returns whether a ping was sent and succeeded.
    pub fn run_generation(&self, now: i64) -> Result<bool, SiteError> {
        let since = self.last_update.load(Ordering::Acquire);
        self.tracker.update(self.data.file_manager(), since, now)?;
        self.last_update.store(now, Ordering::Release);

        if self.tracker.entries()?.is_empty() {
            return Ok(false);
        }
        Ok((self.informer)(&self.ping_target))
    }
}

impl Service for BlogPingService {
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
        match self.run_generation(now) {
            Ok(true) => tracing::debug!(site = %self.name, "blog ping sent"),
            Ok(false) => {}
            Err(e) => tracing::warn!(site = %self.name, error = %e, "blog ping run failed"),
        }
        self.next_run_at.store(now + self.running_period_secs, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemapgen_config::SiteConfig;
    use std::sync::atomic::AtomicBool;

    fn fresh_dir(tag: &str) -> std::path::PathBuf {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_blogping_{tag}_{ts}"))
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
    fn no_new_urls_skips_the_ping() {
        let dir = fresh_dir("quiet");
        let data = Arc::new(SiteDataManager::new(&config("s1"), &dir).unwrap());
        let called = Arc::new(AtomicBool::new(false));
        let called2 = Arc::clone(&called);
        let informer: Informer = Arc::new(move |_| {
            called2.store(true, Ordering::SeqCst);
            true
        });

        let service = BlogPingService::new(Arc::clone(&data), &dir, informer, "http://example.com/sitemap.xml", 3600).unwrap();
        let pinged = service.run_generation(now_secs()).unwrap();
        assert!(!pinged);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn new_url_triggers_the_ping() {
        let dir = fresh_dir("active");
        let data = Arc::new(SiteDataManager::new(&config("s1"), &dir).unwrap());
        data.process_record(&sitemapgen_events::UrlRecord::new("/new-post", "example.com", "s1", 200, 0, 0, 0, 10));
        data.save_memory_data(true, true).unwrap();

        let called = Arc::new(AtomicBool::new(false));
        let called2 = Arc::clone(&called);
        let informer: Informer = Arc::new(move |_| {
            called2.store(true, Ordering::SeqCst);
            true
        });

        let service = BlogPingService::new(Arc::clone(&data), &dir, informer, "http://example.com/sitemap.xml", 3600).unwrap();
        let pinged = service.run_generation(now_secs()).unwrap();
        assert!(pinged);
        assert!(called.load(Ordering::SeqCst));
    }
}
