//! `NewsSitemapService` (`spec.md` 4.J "News sitemap diverges"), grounded
//! on `newsdatamanager.cc`'s window/cap logic reused over
//! [`sitemapgen_core::NewsDataManager`].

use crate::informer::Informer;
use crate::writer::{SitemapWriter, UrlElement};
use sitemapgen_core::{NewsDataManager, SiteDataManager, SiteError};
use sitemapgen_scheduler::Service;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

pub struct NewsSitemapService {
    name: String,
    data: Arc<SiteDataManager>,
    news: NewsDataManager,
    expire_duration_secs: i64,
    max_url_number: usize,
    informers: Vec<Informer>,
    running_period_secs: i64,
    next_run_at: AtomicI64,
    last_update: AtomicI64,

    stem: PathBuf,
    public_base_url: String,
}

impl NewsSitemapService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data: Arc<SiteDataManager>,
        site_dir: &std::path::Path,
        expire_duration_secs: i64,
        max_url_number: usize,
        informers: Vec<Informer>,
        running_period_secs: i64,
        public_base_url: impl Into<String>,
    ) -> std::io::Result<Self> {
        let news = NewsDataManager::new(site_dir, data.file_manager(), max_url_number)?;
        Ok(NewsSitemapService {
            name: "sitemap:news".to_string(),
            data,
            news,
            expire_duration_secs,
            max_url_number,
            informers,
            running_period_secs,
            next_run_at: AtomicI64::new(0),
            last_update: AtomicI64::new(0),
            stem: site_dir.join("sitemap_news"),
            public_base_url: public_base_url.into(),
        })
    }

    /// `spec.md` 4.J: merge the last window of temps into the news
    /// database, keep only entries published within `expire_duration` of
    /// `now`, and retain at most `max_url_number` of the newest ones. No
    /// sitemap index is built for news — the cap keeps output to one file.
    pub fn run_generation(&self, now: i64) -> Result<Vec<String>, SiteError> {
        let since = self.last_update.load(Ordering::Acquire);
        self.news.update(self.data.file_manager(), since, now)?;
        self.last_update.store(now, Ordering::Release);

        let mut entries = self.news.entries()?;
        entries.retain(|e| now - e.first_appear <= self.expire_duration_secs);
        entries.sort_by_key(|e| std::cmp::Reverse(e.first_appear));
        entries.truncate(self.max_url_number);

        let mut writer = SitemapWriter::new(&self.stem, &self.public_base_url, false, usize::MAX / 2, usize::MAX);
        for entry in &entries {
            writer.write_url(&UrlElement::news(&entry.url, entry.first_appear, &entry.url));
        }
        let sitemap_urls = writer.finish()?;

        for url in &sitemap_urls {
            for informer in &self.informers {
                let _ = informer(url);
            }
        }
        Ok(sitemap_urls)
    }
}

impl Service for NewsSitemapService {
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
            tracing::warn!(sitemap = %self.name, error = %e, "news sitemap generation failed, rescheduled for next cadence");
        }
        self.next_run_at.store(now + self.running_period_secs, Ordering::Release);
    }
}
