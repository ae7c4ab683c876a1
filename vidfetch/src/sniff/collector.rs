use anyhow::{Result, anyhow};
use regex::Regex;

/**
    Accumulates stream URLs seen on the wire, in first-seen order.
*/
#[derive(Debug)]
pub struct LinkCollector {
    pattern: Regex,
    links: Vec<String>,
}

impl LinkCollector {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| anyhow!("Invalid stream pattern '{}': {}", pattern, e))?;
        Ok(Self {
            pattern,
            links: Vec::new(),
        })
    }

    /// Record `url` if it matches. Returns true when it was newly added.
    pub fn observe(&mut self, url: &str) -> bool {
        if !self.pattern.is_match(url) || self.links.iter().any(|l| l == url) {
            return false;
        }
        self.links.push(url.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn into_links(self) -> Vec<String> {
        self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_m3u8_in_order() {
        let mut collector = LinkCollector::new(r"\.m3u8").unwrap();
        assert!(!collector.observe("https://site.example/app.js"));
        assert!(collector.observe("https://cdn.example/master.m3u8?token=abc"));
        assert!(!collector.observe("https://cdn.example/seg-001.ts"));
        assert!(collector.observe("https://cdn.example/720p/index.m3u8"));
        assert_eq!(
            collector.into_links(),
            vec![
                "https://cdn.example/master.m3u8?token=abc",
                "https://cdn.example/720p/index.m3u8",
            ]
        );
    }

    #[test]
    fn test_ignores_duplicates() {
        let mut collector = LinkCollector::new(r"\.m3u8").unwrap();
        assert!(collector.observe("https://cdn.example/a.m3u8"));
        assert!(!collector.observe("https://cdn.example/a.m3u8"));
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_dot_is_literal() {
        let mut collector = LinkCollector::new(r"\.m3u8").unwrap();
        assert!(!collector.observe("https://cdn.example/xm3u8"));
        assert!(collector.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(LinkCollector::new("(").is_err());
    }
}
