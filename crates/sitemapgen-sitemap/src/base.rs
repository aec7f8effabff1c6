//! `BaseSitemapService` (`spec.md` 4.J), grounded on
//! `basesitemapservice.h`'s public/protected surface: `StartGenerating`/
//! `AddUrl`/`EndGenerating`/`InformSearchEngine`/`FilterUrl`.

use crate::changefreq::{changefreq, priority};
use crate::informer::Informer;
use crate::writer::{SitemapWriter, UrlElement};
use sitemapgen_core::{recordio, update_robots_txt, SiteDataManager, SiteError};
use sitemapgen_scheduler::Service;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// `update_robots_txt`'s tag, marking the line this service owns in a site's
/// robots.txt so repeated runs stay idempotent.
const ROBOTS_TXT_TAG: &str = "sitemapgen";

/// Only populated for the web-flavored sitemap service, which is the one
/// `spec.md`'s robots.txt toggle attaches to.
pub struct RobotsTxtUpdate {
    pub path: PathBuf,
    pub sitemap_name: String,
    pub enabled: bool,
}

/// Simple `*`-wildcard glob, the only pattern shape `spec.md` 4.J's
/// include/exclude filters need.
fn glob_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !text[pos..].starts_with(part) {
                return false;
            }
            pos += part.len();
        } else if i == parts.len() - 1 {
            return text[pos..].ends_with(part);
        } else if let Some(found) = text[pos..].find(part) {
            pos += found + part.len();
        } else {
            return false;
        }
    }
    true
}

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

pub struct BaseSitemapService {
    name: String,
    data: Arc<SiteDataManager>,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    informers: Vec<Informer>,
    running_period_secs: i64,
    next_run_at: AtomicI64,

    stem: std::path::PathBuf,
    public_base_url: String,
    compress: bool,
    max_bytes: usize,
    max_urls: usize,
    robots_txt_update: Option<RobotsTxtUpdate>,
}

impl BaseSitemapService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        data: Arc<SiteDataManager>,
        include_patterns: Vec<String>,
        exclude_patterns: Vec<String>,
        informers: Vec<Informer>,
        running_period_secs: i64,
        stem: impl Into<std::path::PathBuf>,
        public_base_url: impl Into<String>,
        compress: bool,
        max_bytes: usize,
        max_urls: usize,
        robots_txt_update: Option<RobotsTxtUpdate>,
    ) -> Self {
        BaseSitemapService {
            name: name.into(),
            data,
            include_patterns,
            exclude_patterns,
            informers,
            running_period_secs,
            next_run_at: AtomicI64::new(0),
            stem: stem.into(),
            public_base_url: public_base_url.into(),
            compress,
            max_bytes,
            max_urls,
            robots_txt_update,
        }
    }

    /// `spec.md` 4.J step 2: included AND NOT excluded. An empty include
    /// list means "everything is included" (matches the original's
    /// behavior of a sitemap with no configured scope covering the whole
    /// site).
    fn filter_url(&self, url: &str) -> bool {
        let included = self.include_patterns.is_empty() || self.include_patterns.iter().any(|p| glob_match(p, url));
        let excluded = self.exclude_patterns.iter().any(|p| glob_match(p, url));
        included && !excluded
    }

    /// `spec.md` 4.J step 1-4: refresh the database, scan the base file
    /// under the read lock, filter, convert, and feed the writer; then
    /// inform every configured search engine and report the sitemap URLs
    /// that were produced (empty if nothing matched the filters).
    pub fn run_generation(&self, now: i64) -> Result<Vec<String>, SiteError> {
        let data = &self.data;
        data.update_database(now)?;

        let records = {
            let _guard = data.lock_disk_for_read();
            recordio::read_all(&data.file_manager().base_path())?
        };

        let filtered: Vec<_> = records.into_iter().filter(|r| self.filter_url(&r.url)).collect();
        let max_count_access = filtered.iter().map(|r| r.count_access).max().unwrap_or(0);
        let stat = data.last_file_stat();

        let mut writer = SitemapWriter::new(&self.stem, &self.public_base_url, self.compress, self.max_bytes, self.max_urls);
        for record in &filtered {
            let element = UrlElement::plain(&record.url, record.last_access, changefreq(record), priority(record, &stat, max_count_access));
            writer.write_url(&element);
        }
        let sitemap_urls = writer.finish()?;

        if let Some(update) = &self.robots_txt_update {
            let host = data.get_host_name()?;
            if let Err(e) = update_robots_txt(&update.path, update.enabled, &host, &update.sitemap_name, ROBOTS_TXT_TAG) {
                tracing::warn!(sitemap = %self.name, path = %update.path.display(), error = %e, "failed to update robots.txt");
            }
        }

        for url in &sitemap_urls {
            for informer in &self.informers {
                if !informer(url) {
                    tracing::warn!(sitemap = %self.name, url, "search engine ping failed");
                }
            }
        }

        Ok(sitemap_urls)
    }
}

impl Service for BaseSitemapService {
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
        if let Err(e) = self.run_generation(now) {
            tracing::warn!(sitemap = %self.name, error = %e, "sitemap generation failed, rescheduled for next cadence");
        }
        self.next_run_at.store(now + self.running_period_secs, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_prefix_and_suffix_wildcards() {
        assert!(glob_match("/blog/*", "/blog/post-1"));
        assert!(!glob_match("/blog/*", "/news/post-1"));
        assert!(glob_match("*.pdf", "/files/report.pdf"));
        assert!(glob_match("/a/*/c", "/a/b/c"));
        assert!(!glob_match("/a/*/c", "/a/b/d"));
    }

    #[test]
    fn exact_pattern_without_wildcard_requires_full_match() {
        assert!(glob_match("/a", "/a"));
        assert!(!glob_match("/a", "/ab"));
    }

    fn config(site_id: &str) -> sitemapgen_config::SiteConfig {
        sitemapgen_config::SiteConfig {
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

    fn fresh_dir(tag: &str) -> std::path::PathBuf {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_base_service_{tag}_{ts}"))
    }

    #[test]
    fn excluded_urls_never_reach_the_writer() {
        let dir = fresh_dir("exclude");
        let data = Arc::new(SiteDataManager::new(&config("s1"), &dir).unwrap());
        data.process_record(&sitemapgen_events::UrlRecord::new("/keep", "example.com", "s1", 200, 0, 0, 0, 10));
        data.process_record(&sitemapgen_events::UrlRecord::new("/private/secret", "example.com", "s1", 200, 0, 0, 0, 10));
        data.save_memory_data(true, true).unwrap();

        let service = BaseSitemapService::new(
            "sitemap:web",
            Arc::clone(&data),
            vec![],
            vec!["/private/*".to_string()],
            vec![],
            3600,
            dir.join("sitemap"),
            "http://example.com",
            false,
            1 << 20,
            1000,
            None,
        );

        let urls = service.run_generation(1000).unwrap();
        assert_eq!(urls.len(), 1);
        let body = std::fs::read_to_string(dir.join("sitemap.xml")).unwrap();
        assert!(body.contains("/keep"));
        assert!(!body.contains("/private"));
    }

    #[test]
    fn successful_generation_adds_sitemap_line_to_robots_txt() {
        let dir = fresh_dir("robots");
        let data = Arc::new(SiteDataManager::new(&config("s1"), &dir).unwrap());
        data.process_record(&sitemapgen_events::UrlRecord::new("/a", "example.com", "s1", 200, 0, 0, 0, 10));
        data.save_memory_data(true, true).unwrap();

        std::fs::create_dir_all(&dir).unwrap();
        let robots_path = dir.join("robots.txt");
        std::fs::write(&robots_path, "User-agent: *\n").unwrap();

        let service = BaseSitemapService::new(
            "sitemap:web",
            Arc::clone(&data),
            vec![],
            vec![],
            vec![],
            3600,
            dir.join("sitemap"),
            "http://example.com",
            false,
            1 << 20,
            1000,
            Some(RobotsTxtUpdate { path: robots_path.clone(), sitemap_name: "sitemap.xml".into(), enabled: true }),
        );

        service.run_generation(1000).unwrap();
        let robots_txt = std::fs::read_to_string(&robots_path).unwrap();
        assert!(robots_txt.contains("Sitemap: http://example.com/sitemap.xml"));
    }
}
