//! Incremental URL providers that synthesize records without a webserver
//! plugin in the loop (`spec.md` 4.K): a document-root file scanner and an
//! access-log parser, both feeding [`sitemapgen_core::SiteDataManager`]
//! directly the way a webserver plugin would over the pipe.

mod filescanner;
mod lastaccess;
mod logparser;

pub use filescanner::FileScanner;
pub use lastaccess::LastAccessLimit;
pub use logparser::LogParser;
