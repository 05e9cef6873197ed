//! Footprint derivation.
//!
//! A footprint ties every visit from one browser together. Clients that already
//! carry the footprint cookie keep their value; everyone else gets a stable
//! fingerprint derived from what the request reveals about the client.

use std::collections::HashMap;

use uuid::Uuid;

use crate::config::FootprintsConfig;

pub const DEFAULT_COOKIE_NAME: &str = "footprints";

const FOOTPRINT_NAMESPACE: Uuid = Uuid::from_u128(0x6f3c_2b1e_9a4d_4c7e_8f21_5d0b_a7e4_c913);

#[derive(Debug, Clone)]
pub struct Footprinter {
    cookie_name: String,
}

impl Default for Footprinter {
    fn default() -> Self {
        Self::new(DEFAULT_COOKIE_NAME)
    }
}

impl Footprinter {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }

    pub fn from_config(config: &FootprintsConfig) -> Self {
        Self::new(config.cookie_name.clone())
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn footprint(
        &self,
        cookies: &HashMap<String, String>,
        ip: Option<&str>,
        user_agent: Option<&str>,
        host: &str,
    ) -> String {
        if let Some(existing) = cookies
            .get(&self.cookie_name)
            .filter(|value| !value.is_empty())
        {
            return existing.clone();
        }

        fingerprint(ip, user_agent, host)
    }
}

fn fingerprint(ip: Option<&str>, user_agent: Option<&str>, host: &str) -> String {
    let seed = format!(
        "{}|{}|{}",
        ip.unwrap_or_default(),
        user_agent.unwrap_or_default(),
        host
    );
    Uuid::new_v5(&FOOTPRINT_NAMESPACE, seed.as_bytes())
        .simple()
        .to_string()
}

/// Split a `Cookie` header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_cookie_wins() {
        let footprinter = Footprinter::default();
        let cookies = HashMap::from([("footprints".to_string(), "abc".to_string())]);
        assert_eq!(
            footprinter.footprint(&cookies, Some("10.0.0.1"), Some("curl"), "example.com"),
            "abc"
        );
    }

    #[test]
    fn fingerprint_is_stable_per_client() {
        let footprinter = Footprinter::new("fp");
        let none = HashMap::new();

        let first = footprinter.footprint(&none, Some("10.0.0.1"), Some("curl"), "example.com");
        let again = footprinter.footprint(&none, Some("10.0.0.1"), Some("curl"), "example.com");
        let other = footprinter.footprint(&none, Some("10.0.0.2"), Some("curl"), "example.com");

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn empty_cookie_is_ignored() {
        let footprinter = Footprinter::default();
        let cookies = HashMap::from([("footprints".to_string(), String::new())]);
        let value = footprinter.footprint(&cookies, None, None, "example.com");
        assert!(!value.is_empty());
    }

    #[test]
    fn cookie_header_parsing() {
        let cookies = parse_cookie_header("session=1; footprints=\"xyz\" ; =broken; flag");
        assert_eq!(cookies.get("session").map(String::as_str), Some("1"));
        assert_eq!(cookies.get("footprints").map(String::as_str), Some("xyz"));
        assert_eq!(cookies.len(), 2);
    }
}
