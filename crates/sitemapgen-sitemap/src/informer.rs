//! Search-engine ping informers (`spec.md` 6 "Search-engine informer
//! protocol", 9 "model it as a function value plus configuration, not a
//! class hierarchy").

use std::sync::Arc;
use std::time::Duration;

/// A notifier closed over whatever configuration it needs (a ping URL
/// template, an HTTP client, a "require this substring in the body" check).
/// Returns whether the ping succeeded.
pub type Informer = Arc<dyn Fn(&str) -> bool + Send + Sync>;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds a plain search-engine ping: `GET <template><percent-encoded
/// sitemap url>`, success = HTTP 200.
pub fn ping_informer(template: impl Into<String>) -> Informer {
    let template = template.into();
    Arc::new(move |sitemap_url: &str| send_ping(&template, sitemap_url).map(|(status, _)| status == 200).unwrap_or(false))
}

/// Blog-search ping: success additionally requires the response body to
/// contain the literal string "Thanks for the ping." (`spec.md` 6).
pub fn blog_ping_informer(template: impl Into<String>) -> Informer {
    let template = template.into();
    Arc::new(move |sitemap_url: &str| {
        send_ping(&template, sitemap_url)
            .map(|(status, body)| status == 200 && body.contains("Thanks for the ping."))
            .unwrap_or(false)
    })
}

fn send_ping(template: &str, sitemap_url: &str) -> Result<(u16, String), reqwest::Error> {
    let encoded = percent_encode(sitemap_url);
    let url = format!("{template}{encoded}");
    let client = reqwest::blocking::Client::builder().timeout(PING_TIMEOUT).build()?;
    let response = client.get(url).send()?;
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Ok((status, body))
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_encode_escapes_reserved_bytes() {
        assert_eq!(percent_encode("http://a.com/x?y=1"), "http%3A%2F%2Fa.com%2Fx%3Fy%3D1");
    }

    #[test]
    fn percent_encode_leaves_unreserved_bytes_untouched() {
        assert_eq!(percent_encode("abc-._~123"), "abc-._~123");
    }
}
