//! URL replacer chain (`sitedatamanager.cc` `ProcessRecord`: "Replace the
//! URLs", first matching replacer wins and the chain stops).

use sitemapgen_config::UrlReplacement;
use sitemapgen_events::MAX_URL_LEN;

pub struct UrlReplacer {
    rules: Vec<UrlReplacement>,
}

/// Truncates `url` to at most `MAX_URL_LEN` bytes, backing off to the
/// nearest char boundary so the result is still valid UTF-8.
fn truncate_to_max_len(mut url: String) -> String {
    if url.len() <= MAX_URL_LEN {
        return url;
    }
    let mut end = MAX_URL_LEN;
    while !url.is_char_boundary(end) {
        end -= 1;
    }
    url.truncate(end);
    url
}

impl UrlReplacer {
    pub fn new(rules: Vec<UrlReplacement>) -> Self {
        UrlReplacer { rules }
    }

    /// Applies the first rule whose `find` substring appears in `url`,
    /// replacing every occurrence, then stops (`spec.md` 4.H replacer chain),
    /// truncating the result to `MAX_URL_LEN` before returning.
    pub fn apply(&self, url: &str) -> String {
        for rule in &self.rules {
            if !rule.find.is_empty() && url.contains(rule.find.as_str()) {
                return truncate_to_max_len(url.replace(rule.find.as_str(), &rule.replace));
            }
        }
        truncate_to_max_len(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(find: &str, replace: &str) -> UrlReplacement {
        UrlReplacement { find: find.into(), replace: replace.into() }
    }

    #[test]
    fn first_matching_rule_wins() {
        let replacer = UrlReplacer::new(vec![rule("/old/", "/new/"), rule("/new/", "/never/")]);
        assert_eq!(replacer.apply("/old/page"), "/new/page");
    }

    #[test]
    fn no_match_leaves_url_unchanged() {
        let replacer = UrlReplacer::new(vec![rule("/missing/", "/x/")]);
        assert_eq!(replacer.apply("/a/page"), "/a/page");
    }

    #[test]
    fn empty_find_rule_is_skipped() {
        let replacer = UrlReplacer::new(vec![rule("", "/x/"), rule("/a/", "/b/")]);
        assert_eq!(replacer.apply("/a/page"), "/b/page");
    }

    #[test]
    fn result_is_truncated_to_max_url_len() {
        let replacer = UrlReplacer::new(vec![rule("/short/", &"/padded/".repeat(200))]);
        let result = replacer.apply("/short/page");
        assert_eq!(result.len(), sitemapgen_events::MAX_URL_LEN);
    }

    #[test]
    fn unmatched_url_is_still_truncated() {
        let replacer = UrlReplacer::new(vec![]);
        let long = "/".to_string() + &"a".repeat(2000);
        let result = replacer.apply(&long);
        assert_eq!(result.len(), sitemapgen_events::MAX_URL_LEN);
    }
}
