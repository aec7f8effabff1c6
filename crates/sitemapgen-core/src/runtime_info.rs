//! Per-site runtime snapshot, read by status/debug tooling while services
//! keep running (`runtimeinfomanager.h`'s `ApplicationInfo` tree, scoped down
//! to one site's worth of fields).

use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct RuntimeSnapshot {
    pub url_in_memory: usize,
    pub url_in_tempfile: usize,
    pub url_in_database: usize,
    pub host_name: String,
    pub last_merge: i64,
    pub last_sitemap_success: bool,
}

/// Thread-safe holder updated by the site data manager and services, read by
/// whatever surfaces status (the `debug`/`get_site_setting`-adjacent CLI
/// paths).
#[derive(Default)]
pub struct RuntimeInfo(Mutex<RuntimeSnapshot>);

impl RuntimeInfo {
    pub fn new() -> Self {
        RuntimeInfo(Mutex::new(RuntimeSnapshot::default()))
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        self.0.lock().unwrap().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut RuntimeSnapshot)) {
        let mut guard = self.0.lock().unwrap();
        f(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_then_snapshot_reflects_changes() {
        let info = RuntimeInfo::new();
        info.update(|s| {
            s.url_in_memory = 12;
            s.host_name = "example.com".into();
        });
        let snap = info.snapshot();
        assert_eq!(snap.url_in_memory, 12);
        assert_eq!(snap.host_name, "example.com");
    }
}
