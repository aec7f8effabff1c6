//! Wire and owned record types shared by every other `sitemapgen-*` crate.
//!
//! - [`UrlRecord`]: the fixed-size, `Copy` wire form carried over the ring
//!   buffer (`spec.md` section 3, "URL record (wire format...)").
//! - [`VisitingRecord`]: the owned in-memory/base-file form (`spec.md`
//!   section 3, "Visiting record").
//! - [`UrlFprint`]: the 128-bit fingerprint used as the primary key
//!   throughout the pipeline.

mod fingerprint;
mod url_record;
mod visiting_record;

pub use fingerprint::UrlFprint;
pub use url_record::{UrlRecord, ACCEPTED_STATUSES, MAX_HOST_LEN, MAX_SITEID_LEN, MAX_URL_LEN};
pub use visiting_record::VisitingRecord;
