//! Host-popularity table, used to guess a site's canonical host when none is
//! configured (`sitedatamanager.cc` `GetHostName`/`VisitHost`/`GetBestHost`).

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Default)]
pub struct HostTable {
    counts: HashMap<String, u64>,
}

impl HostTable {
    pub fn new() -> Self {
        HostTable { counts: HashMap::new() }
    }

    /// Records `count` more visits for `host`. Empty hosts are ignored.
    pub fn visit_host(&mut self, host: &str, count: u64) {
        if host.is_empty() {
            return;
        }
        *self.counts.entry(host.to_ascii_lowercase()).or_insert(0) += count;
    }

    /// The most-visited host, or `""` if nothing has been recorded yet.
    /// Ties are broken by host name so the result is deterministic.
    pub fn get_best_host(&self) -> String {
        self.counts
            .iter()
            .max_by_key(|&(ref host, &count)| (count, std::cmp::Reverse(host.clone())))
            .map(|(host, _)| host.clone())
            .unwrap_or_default()
    }

    pub fn load(&mut self, path: &Path) -> std::io::Result<()> {
        self.counts.clear();
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for line in BufReader::new(file).lines() {
            let line = line?;
            let Some((host, count)) = line.rsplit_once(' ') else { continue };
            if let Ok(count) = count.parse::<u64>() {
                self.counts.insert(host.to_string(), count);
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        let mut hosts: Vec<&String> = self.counts.keys().collect();
        hosts.sort();
        for host in hosts {
            writeln!(file, "{} {}", host, self.counts[host])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_host_tracks_highest_count() {
        let mut table = HostTable::new();
        table.visit_host("a.example.com", 3);
        table.visit_host("b.example.com", 5);
        assert_eq!(table.get_best_host(), "b.example.com");
    }

    #[test]
    fn empty_table_has_no_best_host() {
        assert_eq!(HostTable::new().get_best_host(), "");
    }

    #[test]
    fn save_then_load_roundtrips() {
        let path = std::env::temp_dir().join(format!(
            "sitemapgen_hosttable_{}",
            std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos()
        ));
        let mut table = HostTable::new();
        table.visit_host("www.example.com", 7);
        table.save(&path).unwrap();

        let mut loaded = HostTable::new();
        loaded.load(&path).unwrap();
        assert_eq!(loaded.get_best_host(), "www.example.com");
        std::fs::remove_file(&path).unwrap();
    }
}
