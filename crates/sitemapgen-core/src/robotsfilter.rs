//! Inbound robots.txt disallow filter (`sitedatamanager.cc` `ProcessRecord`:
//! "Ignore url prevented by robots.txt").
//!
//! Only the `User-agent: *` group and plain-prefix `Disallow` rules are
//! honored; wildcard and `Allow` directives from the full robots.txt spec
//! are out of scope here (`spec.md` 4.H Non-goals).

pub struct RobotsFilter {
    disallow: Vec<String>,
}

impl RobotsFilter {
    pub fn new(robots_txt: &str) -> Self {
        RobotsFilter { disallow: parse_wildcard_disallows(robots_txt) }
    }

    pub fn empty() -> Self {
        RobotsFilter { disallow: Vec::new() }
    }

    /// `true` when `url` should be kept (not disallowed).
    pub fn accept(&self, url: &str) -> bool {
        !self.disallow.iter().any(|prefix| !prefix.is_empty() && url.starts_with(prefix.as_str()))
    }
}

fn parse_wildcard_disallows(robots_txt: &str) -> Vec<String> {
    let mut disallow = Vec::new();
    let mut in_wildcard_group = false;
    for raw_line in robots_txt.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((directive, value)) = line.split_once(':') else { continue };
        let directive = directive.trim().to_ascii_lowercase();
        let value = value.trim();
        match directive.as_str() {
            "user-agent" => in_wildcard_group = value == "*",
            "disallow" if in_wildcard_group => disallow.push(value.to_string()),
            _ => {}
        }
    }
    disallow
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallowed_prefix_is_rejected() {
        let filter = RobotsFilter::new("User-agent: *\nDisallow: /private/\n");
        assert!(!filter.accept("/private/secret"));
        assert!(filter.accept("/public/page"));
    }

    #[test]
    fn other_user_agent_groups_are_ignored() {
        let filter = RobotsFilter::new("User-agent: Googlebot\nDisallow: /only-for-googlebot/\n");
        assert!(filter.accept("/only-for-googlebot/page"));
    }

    #[test]
    fn empty_filter_accepts_everything() {
        assert!(RobotsFilter::empty().accept("/anything"));
    }
}
