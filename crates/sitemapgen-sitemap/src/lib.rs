//! Sitemap generation and search-engine notification (`spec.md` 4.J).

mod base;
mod blogping;
mod changefreq;
mod informer;
mod news;
mod plain;
mod writer;

pub use base::BaseSitemapService;
pub use blogping::BlogPingService;
pub use changefreq::{changefreq, priority, ChangeFreq};
pub use informer::{blog_ping_informer, ping_informer, Informer};
pub use news::NewsSitemapService;
pub use plain::{PlainSitemapService, SitemapFlavor};
pub use writer::{SitemapWriter, UrlElement};
