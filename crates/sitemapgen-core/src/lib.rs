//! Per-site data pipeline: in-memory table → temp files → merged base file
//! (`spec.md` 4.E–4.H).

mod backup;
mod filemanager;
mod hosttable;
mod merger;
mod newsdata;
mod queryfilter;
pub mod recordio;
mod replacer;
mod robots;
mod robotsfilter;
mod runtime_info;
mod site;
mod table;

pub use backup::BackupService;
pub use filemanager::RecordfileManager;
pub use hosttable::HostTable;
pub use merger::{MergeError, RecordFileStat, RecordMerger};
pub use newsdata::NewsDataManager;
pub use queryfilter::QueryFilter;
pub use replacer::UrlReplacer;
pub use robots::update_robots_txt;
pub use robotsfilter::RobotsFilter;
pub use runtime_info::{RuntimeInfo, RuntimeSnapshot};
pub use site::{ProcessOutcome, SiteDataManager, SiteError};
pub use table::RecordTable;
