//! Query-string whitelist filter (`spec.md` 4.H step 4: "drop key=value
//! pairs whose key is not in the whitelist").

pub struct QueryFilter {
    whitelist: Vec<String>,
}

impl QueryFilter {
    pub fn new(whitelist: Vec<String>) -> Self {
        QueryFilter { whitelist }
    }

    /// Strips every `key=value` pair from `url`'s query string whose key is
    /// not in the whitelist. A `url` with no `?` is returned unchanged. A
    /// query string that becomes empty drops the trailing `?` too.
    pub fn filter(&self, url: &str) -> String {
        let Some((path, query)) = url.split_once('?') else {
            return url.to_string();
        };
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or("");
                self.whitelist.iter().any(|w| w == key)
            })
            .collect();
        if kept.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", kept.join("&"))
        }
    }
}
