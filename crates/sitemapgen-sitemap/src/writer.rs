//! XML sitemap emission (`spec.md` 4.J steps 2-3). No XML crate appears in
//! any example repo's `Cargo.toml`; this writes the handful of tags the
//! sitemap protocol needs by hand.

use crate::changefreq::ChangeFreq;
use chrono::{TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// An abstract sitemap entry, independent of where it came from
/// (`convert_record` turns a stored [`sitemapgen_events::VisitingRecord`]
/// into one of these; a news entry can build one directly).
#[derive(Debug, Clone)]
pub struct UrlElement {
    pub loc: String,
    pub last_modified: Option<i64>,
    pub changefreq: Option<ChangeFreq>,
    pub priority: Option<f64>,
    /// News-only: publication date. `None` for plain sitemap entries.
    pub publication_date: Option<i64>,
    pub news_title: Option<String>,
}

impl UrlElement {
    pub fn plain(loc: impl Into<String>, last_modified: i64, changefreq: ChangeFreq, priority: f64) -> Self {
        UrlElement {
            loc: loc.into(),
            last_modified: Some(last_modified),
            changefreq: Some(changefreq),
            priority: Some(priority),
            publication_date: None,
            news_title: None,
        }
    }

    pub fn news(loc: impl Into<String>, publication_date: i64, title: impl Into<String>) -> Self {
        UrlElement {
            loc: loc.into(),
            last_modified: None,
            changefreq: None,
            priority: None,
            publication_date: Some(publication_date),
            news_title: Some(title.into()),
        }
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_datetime(epoch_secs: i64) -> String {
    Utc.timestamp_opt(epoch_secs, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

fn render_url_entry(e: &UrlElement, buf: &mut String) {
    buf.push_str("<url><loc>");
    buf.push_str(&escape_xml(&e.loc));
    buf.push_str("</loc>");
    if let Some(lm) = e.last_modified {
        buf.push_str("<lastmod>");
        buf.push_str(&format_datetime(lm));
        buf.push_str("</lastmod>");
    }
    if let Some(cf) = e.changefreq {
        buf.push_str("<changefreq>");
        buf.push_str(cf.as_str());
        buf.push_str("</changefreq>");
    }
    if let Some(p) = e.priority {
        buf.push_str(&format!("<priority>{p:.1}</priority>"));
    }
    if let (Some(pub_date), Some(title)) = (&e.publication_date, &e.news_title) {
        buf.push_str("<news:news><news:publication_date>");
        buf.push_str(&format_datetime(*pub_date));
        buf.push_str("</news:publication_date><news:title>");
        buf.push_str(&escape_xml(title));
        buf.push_str("</news:title></news:news>");
    }
    buf.push_str("</url>");
}

/// Writes a single sitemap (and, when the content spans multiple files, a
/// sitemap index) under byte and URL-count budgets. The single concrete
/// strategy for every sitemap flavor in this crate — the original's writer
/// hierarchy collapses to one shape once namespaces are handled per-entry
/// rather than per-subclass.
pub struct SitemapWriter {
    stem: PathBuf,
    public_base_url: String,
    compress: bool,
    max_bytes: usize,
    max_urls: usize,
    buffers: Vec<String>,
    current: String,
    current_urls: usize,
}

impl SitemapWriter {
    pub fn new(stem: impl Into<PathBuf>, public_base_url: impl Into<String>, compress: bool, max_bytes: usize, max_urls: usize) -> Self {
        SitemapWriter {
            stem: stem.into(),
            public_base_url: public_base_url.into(),
            compress,
            max_bytes: max_bytes.max(1024),
            max_urls: max_urls.max(1),
            buffers: Vec::new(),
            current: String::new(),
            current_urls: 0,
        }
    }

    pub fn write_url(&mut self, element: &UrlElement) {
        let mut rendered = String::new();
        render_url_entry(element, &mut rendered);

        if self.current_urls > 0 && (self.current.len() + rendered.len() > self.max_bytes || self.current_urls >= self.max_urls) {
            self.roll_over();
        }
        self.current.push_str(&rendered);
        self.current_urls += 1;
    }

    fn roll_over(&mut self) {
        self.buffers.push(std::mem::take(&mut self.current));
        self.current_urls = 0;
    }

    fn extension(&self) -> &'static str {
        if self.compress {
            ".xml.gz"
        } else {
            ".xml"
        }
    }

    fn file_name(&self, index: Option<usize>) -> String {
        let stem = self.stem.file_name().and_then(|n| n.to_str()).unwrap_or("sitemap");
        match index {
            Some(i) => format!("{stem}_{i:03}{ext}", ext = self.extension()),
            None => format!("{stem}{ext}", ext = self.extension()),
        }
    }

    fn write_body(&self, path: &Path, body: &str) -> io::Result<()> {
        let file = std::fs::File::create(path)?;
        if self.compress {
            let mut enc = GzEncoder::new(file, Compression::default());
            enc.write_all(body.as_bytes())?;
            enc.finish()?;
        } else {
            let mut file = file;
            file.write_all(body.as_bytes())?;
        }
        Ok(())
    }

    /// Flushes pending content and writes out the final file set, returning
    /// the public URLs of every file an informer should be told about (the
    /// index URL alone when one was built, otherwise the sole sitemap URL;
    /// empty if nothing was ever written).
    pub fn finish(mut self) -> io::Result<Vec<String>> {
        if self.current_urls > 0 || self.buffers.is_empty() {
            self.roll_over();
        }
        let non_empty: Vec<&String> = self.buffers.iter().filter(|b| !b.is_empty()).collect();
        if non_empty.is_empty() {
            return Ok(Vec::new());
        }

        let dir = self.stem.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        if non_empty.len() == 1 {
            let name = self.file_name(None);
            let path = dir.join(&name);
            let body = wrap_urlset(non_empty[0]);
            self.write_body(&path, &body)?;
            return Ok(vec![format!("{}/{}", self.public_base_url.trim_end_matches('/'), name)]);
        }

        let mut child_urls = Vec::with_capacity(non_empty.len());
        for (i, body) in non_empty.iter().enumerate() {
            let name = self.file_name(Some(i));
            let path = dir.join(&name);
            self.write_body(&path, &wrap_urlset(body))?;
            child_urls.push(format!("{}/{}", self.public_base_url.trim_end_matches('/'), name));
        }

        let index_name = self.file_name(None);
        let index_path = dir.join(&index_name);
        self.write_body(&index_path, &wrap_index(&child_urls))?;
        Ok(vec![format!("{}/{}", self.public_base_url.trim_end_matches('/'), index_name)])
    }
}

fn wrap_urlset(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"{NAMESPACE}\" xmlns:news=\"http://www.google.com/schemas/sitemap-news/0.9\">{body}</urlset>\n"
    )
}

fn wrap_index(urls: &[String]) -> String {
    let mut body = String::new();
    for u in urls {
        body.push_str("<sitemap><loc>");
        body.push_str(&escape_xml(u));
        body.push_str("</loc></sitemap>");
    }
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<sitemapindex xmlns=\"{NAMESPACE}\">{body}</sitemapindex>\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn fresh_dir(tag: &str) -> PathBuf {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("sitemapgen_writer_{tag}_{ts}")).join("stem")
    }

    #[test]
    fn single_file_uses_base_name() {
        let stem = fresh_dir("single");
        let mut w = SitemapWriter::new(&stem, "http://example.com", false, 1 << 20, 1000);
        w.write_url(&UrlElement::plain("/a", 100, ChangeFreq::Daily, 0.5));
        let urls = w.finish().unwrap();
        assert_eq!(urls, vec!["http://example.com/stem.xml".to_string()]);
        assert!(stem.parent().unwrap().join("stem.xml").exists());
    }

    #[test]
    fn overflow_url_budget_splits_files_and_builds_index() {
        let stem = fresh_dir("split");
        let mut w = SitemapWriter::new(&stem, "http://example.com", false, 1 << 20, 1);
        w.write_url(&UrlElement::plain("/a", 100, ChangeFreq::Daily, 0.5));
        w.write_url(&UrlElement::plain("/b", 100, ChangeFreq::Daily, 0.5));
        let urls = w.finish().unwrap();
        assert_eq!(urls, vec!["http://example.com/stem.xml".to_string()]);
        let dir = stem.parent().unwrap();
        assert!(dir.join("stem_000.xml").exists());
        assert!(dir.join("stem_001.xml").exists());
        let index = std::fs::read_to_string(dir.join("stem.xml")).unwrap();
        assert!(index.contains("stem_000.xml"));
        assert!(index.contains("stem_001.xml"));
    }

    #[test]
    fn compressed_output_uses_gz_suffix() {
        let stem = fresh_dir("gz");
        let mut w = SitemapWriter::new(&stem, "http://example.com", true, 1 << 20, 1000);
        w.write_url(&UrlElement::plain("/a", 100, ChangeFreq::Daily, 0.5));
        let urls = w.finish().unwrap();
        assert_eq!(urls, vec!["http://example.com/stem.xml.gz".to_string()]);
    }

    #[test]
    fn no_urls_writes_nothing() {
        let stem = fresh_dir("empty");
        let w = SitemapWriter::new(&stem, "http://example.com", false, 1 << 20, 1000);
        assert_eq!(w.finish().unwrap(), Vec::<String>::new());
    }
}
