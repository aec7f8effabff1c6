//! `PlainSitemapService` (`spec.md` 4.J "Plain services"), grounded on
//! `plainsitemapservice.h`/`.cc`'s `Start`/`ProcessRecord`/`End` pattern,
//! generalized from one hardcoded flavor to the four the web sitemap
//! protocol distinguishes.

use crate::base::{BaseSitemapService, RobotsTxtUpdate};
use crate::informer::Informer;
use sitemapgen_core::{SiteDataManager, SiteError};
use sitemapgen_scheduler::Service;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapFlavor {
    Web,
    Video,
    Mobile,
    Code,
}

impl SitemapFlavor {
    pub fn stem_suffix(&self) -> &'static str {
        match self {
            SitemapFlavor::Web => "sitemap",
            SitemapFlavor::Video => "sitemap_video",
            SitemapFlavor::Mobile => "sitemap_mobile",
            SitemapFlavor::Code => "sitemap_code",
        }
    }
}

pub struct PlainSitemapService {
    flavor: SitemapFlavor,
    inner: BaseSitemapService,
}

impl PlainSitemapService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flavor: SitemapFlavor,
        data: Arc<SiteDataManager>,
        site_docroot: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        include_patterns: Vec<String>,
        exclude_patterns: Vec<String>,
        informers: Vec<Informer>,
        running_period_secs: i64,
        compress: bool,
        max_bytes: usize,
        max_urls: usize,
        robots_txt_path: impl Into<PathBuf>,
        update_robots: bool,
    ) -> Self {
        let site_docroot = site_docroot.into();
        let stem = site_docroot.join(flavor.stem_suffix());
        let name = format!("sitemap:{}", flavor.stem_suffix());
        let robots_txt_update = (flavor == SitemapFlavor::Web).then(|| RobotsTxtUpdate {
            path: robots_txt_path.into(),
            sitemap_name: format!("{}.xml", flavor.stem_suffix()),
            enabled: update_robots,
        });
        PlainSitemapService {
            flavor,
            inner: BaseSitemapService::new(
                name,
                data,
                include_patterns,
                exclude_patterns,
                informers,
                running_period_secs,
                stem,
                public_base_url,
                compress,
                max_bytes,
                max_urls,
                robots_txt_update,
            ),
        }
    }

    pub fn flavor(&self) -> SitemapFlavor {
        self.flavor
    }

    pub fn run_generation(&self, now: i64) -> Result<Vec<String>, SiteError> {
        self.inner.run_generation(now)
    }
}

impl Service for PlainSitemapService {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn wait_time(&self) -> i64 {
        self.inner.wait_time()
    }
    fn running_period(&self) -> i64 {
        self.inner.running_period()
    }
    fn run(&self) {
        self.inner.run()
    }
}
