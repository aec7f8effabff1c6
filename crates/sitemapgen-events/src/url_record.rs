//! `UrlRecord` — the fixed-size wire format carried across the ring buffer.
//!
//! This is the one on-wire representation (`spec.md` DESIGN NOTES: "keep
//! exactly one on-wire form (fixed-size) and a separate owned form for
//! in-memory processing; do not conflate them"). `VisitingRecord` is the
//! owned form used everywhere else.

pub const MAX_URL_LEN: usize = 1024;
pub const MAX_HOST_LEN: usize = 256;
pub const MAX_SITEID_LEN: usize = 128;

/// HTTP statuses accepted upstream; anything else is dropped silently.
pub const ACCEPTED_STATUSES: [i32; 5] = [200, 301, 302, 307, 404];

/// A single URL visit, as produced by a webserver plugin and carried over
/// the ring buffer.
///
/// `repr(C)` with fixed-size byte arrays keeps this `Copy` and stable across
/// process boundaries: no pointers, no heap allocation, safe to `memcpy` into
/// shared memory.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct UrlRecord {
    url: [u8; MAX_URL_LEN],
    host: [u8; MAX_HOST_LEN],
    siteid: [u8; MAX_SITEID_LEN],
    pub status: i32,
    pub content_hash: i64,
    pub last_modified: i64,
    pub last_filewrite: i64,
    pub last_access: i64,
}

impl Default for UrlRecord {
    fn default() -> Self {
        UrlRecord {
            url: [0; MAX_URL_LEN],
            host: [0; MAX_HOST_LEN],
            siteid: [0; MAX_SITEID_LEN],
            status: 0,
            content_hash: -1,
            last_modified: -1,
            last_filewrite: -1,
            last_access: 0,
        }
    }
}

fn write_fixed(buf: &mut [u8], s: &str) {
    buf.fill(0);
    let bytes = s.as_bytes();
    let n = bytes.len().min(buf.len() - 1); // leave room for the null terminator
    buf[..n].copy_from_slice(&bytes[..n]);
}

fn read_fixed(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

impl UrlRecord {
    pub fn new(
        url: &str,
        host: &str,
        siteid: &str,
        status: i32,
        content_hash: i64,
        last_modified: i64,
        last_filewrite: i64,
        last_access: i64,
    ) -> Self {
        let mut r = UrlRecord {
            status,
            content_hash,
            last_modified,
            last_filewrite,
            last_access,
            ..Default::default()
        };
        write_fixed(&mut r.url, url);
        write_fixed(&mut r.host, host);
        write_fixed(&mut r.siteid, siteid);
        r
    }

    pub fn url(&self) -> String {
        read_fixed(&self.url)
    }

    pub fn host(&self) -> String {
        read_fixed(&self.host)
    }

    pub fn siteid(&self) -> String {
        read_fixed(&self.siteid)
    }

    /// Whether `status` is one of the statuses accepted upstream.
    pub fn has_accepted_status(&self) -> bool {
        ACCEPTED_STATUSES.contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_fields() {
        let r = UrlRecord::new("/a/b?x=1", "http://example.com:8080", "site-1", 200, 123, 10, -1, 20);
        assert_eq!(r.url(), "/a/b?x=1");
        assert_eq!(r.host(), "http://example.com:8080");
        assert_eq!(r.siteid(), "site-1");
        assert_eq!(r.status, 200);
        assert_eq!(r.content_hash, 123);
        assert_eq!(r.last_modified, 10);
        assert_eq!(r.last_filewrite, -1);
        assert_eq!(r.last_access, 20);
    }

    #[test]
    fn truncates_oversize_url() {
        let long = "/".to_string() + &"a".repeat(MAX_URL_LEN * 2);
        let r = UrlRecord::new(&long, "h", "s", 200, 0, 0, 0, 0);
        assert!(r.url().len() < MAX_URL_LEN);
    }

    #[test]
    fn accepted_status_set_matches_spec() {
        for s in [200, 301, 302, 307, 404] {
            let r = UrlRecord::new("/a", "h", "s", s, 0, 0, 0, 0);
            assert!(r.has_accepted_status());
        }
        let r = UrlRecord::new("/a", "h", "s", 500, 0, 0, 0, 0);
        assert!(!r.has_accepted_status());
    }

    #[test]
    fn is_copy_and_bounded_size() {
        fn assert_copy<T: Copy>() {}
        assert_copy::<UrlRecord>();
        // header arrays plus scalar fields, generously bounded for alignment padding.
        assert!(std::mem::size_of::<UrlRecord>() <= MAX_URL_LEN + MAX_HOST_LEN + MAX_SITEID_LEN + 64);
    }
}
