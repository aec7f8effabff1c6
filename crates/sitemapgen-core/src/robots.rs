//! Outbound robots.txt `Sitemap:` line management (`spec.md` section on
//! "robots.txt update" and the idempotence scenario in section 8).

use std::io;
use std::path::Path;

fn tagged_line(host: &str, sitemap_name: &str, tag: &str) -> String {
    format!("Sitemap: {host}/{sitemap_name}  # Added by {tag}")
}

/// Adds or removes the tagged `Sitemap:` line in the robots.txt at `path`,
/// leaving every other line untouched. Calling with the same arguments twice
/// in a row is a no-op on the second call (`spec.md` 8 "robots.txt
/// idempotence").
pub fn update_robots_txt(path: &Path, include: bool, host: &str, sitemap_name: &str, tag: &str) -> io::Result<()> {
    let existing = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };
    let marker = format!("# Added by {tag}");
    let mut lines: Vec<&str> = existing.lines().filter(|line| !line.contains(marker.as_str())).collect();

    let new_line = tagged_line(host, sitemap_name, tag);
    if include {
        lines.push(&new_line);
    }

    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(tag: &str) -> std::path::PathBuf {
        let ts = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_robots_{tag}_{ts}"))
    }

    #[test]
    fn toggle_adds_then_removes_exactly_one_line() {
        let path = tmp("toggle");
        std::fs::write(&path, "User-agent: *\nDisallow:\n").unwrap();

        update_robots_txt(&path, true, "http://example.com", "sitemap.xml", "sitemapgen").unwrap();
        let after_add = std::fs::read_to_string(&path).unwrap();
        assert_eq!(after_add.lines().filter(|l| l.starts_with("Sitemap:")).count(), 1);
        assert!(after_add.contains("User-agent: *"));

        update_robots_txt(&path, false, "http://example.com", "sitemap.xml", "sitemapgen").unwrap();
        let after_remove = std::fs::read_to_string(&path).unwrap();
        assert_eq!(after_remove.lines().filter(|l| l.starts_with("Sitemap:")).count(), 0);
        assert!(after_remove.contains("User-agent: *"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn repeated_add_is_idempotent() {
        let path = tmp("idempotent");
        std::fs::write(&path, "User-agent: *\n").unwrap();

        update_robots_txt(&path, true, "http://example.com", "sitemap.xml", "sitemapgen").unwrap();
        let once = std::fs::read_to_string(&path).unwrap();
        update_robots_txt(&path, true, "http://example.com", "sitemap.xml", "sitemapgen").unwrap();
        let twice = std::fs::read_to_string(&path).unwrap();

        assert_eq!(once, twice);
        std::fs::remove_file(&path).unwrap();
    }
}
