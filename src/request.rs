//! Request abstraction consumed by the capture path.
//!
//! [`TrackedRequest`] is the seam a host web framework implements;
//! [`RequestSnapshot`] is a framework-free implementation built from a URL,
//! headers, cookies and an optional JSON body.

use std::collections::{btree_map::Entry, BTreeMap, HashMap};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use url::Url;

use crate::footprint::{parse_cookie_header, Footprinter};

/// Read-only view of an inbound request.
pub trait TrackedRequest {
    /// Opaque identifier correlating visits from the same client.
    fn footprint(&self) -> &str;
    fn ip(&self) -> Option<&str>;
    fn server_name(&self) -> &str;
    /// Request path without leading or trailing slashes, `/` for the root.
    fn path(&self) -> &str;
    /// Raw query string, `None` when the request has none.
    fn query_string(&self) -> Option<&str>;
    /// Case-insensitive header lookup.
    fn header(&self, name: &str) -> Option<&str>;
    /// Combined query and body parameter lookup.
    fn input(&self, name: &str) -> Option<&Value>;

    /// Whether the parameter is present at all, even with an empty value.
    fn has(&self, name: &str) -> bool {
        self.input(name).is_some()
    }
}

impl<T: TrackedRequest + ?Sized> TrackedRequest for &T {
    fn footprint(&self) -> &str {
        (**self).footprint()
    }

    fn ip(&self) -> Option<&str> {
        (**self).ip()
    }

    fn server_name(&self) -> &str {
        (**self).server_name()
    }

    fn path(&self) -> &str {
        (**self).path()
    }

    fn query_string(&self) -> Option<&str> {
        (**self).query_string()
    }

    fn header(&self, name: &str) -> Option<&str> {
        (**self).header(name)
    }

    fn input(&self, name: &str) -> Option<&Value> {
        (**self).input(name)
    }

    fn has(&self, name: &str) -> bool {
        (**self).has(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestSnapshot {
    footprint: String,
    ip: Option<String>,
    server_name: String,
    path: String,
    query: Option<String>,
    headers: HashMap<String, String>,
    params: BTreeMap<String, Value>,
}

impl RequestSnapshot {
    pub fn builder(url: &str) -> Result<RequestBuilder> {
        let url = Url::parse(url).with_context(|| format!("invalid request url '{url}'"))?;
        Ok(RequestBuilder {
            url,
            ip: None,
            headers: HashMap::new(),
            cookies: HashMap::new(),
            body: Map::new(),
            footprint: None,
        })
    }
}

impl TrackedRequest for RequestSnapshot {
    fn footprint(&self) -> &str {
        &self.footprint
    }

    fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn input(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

pub struct RequestBuilder {
    url: Url,
    ip: Option<String>,
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    body: Map<String, Value>,
    footprint: Option<String>,
}

impl RequestBuilder {
    pub fn remote_addr(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Add a header. A `Cookie` header also populates the cookie jar.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        if name == "cookie" {
            self.cookies.extend(parse_cookie_header(&value));
        }
        self.headers.insert(name, value);
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Body parameters; these shadow query parameters of the same name.
    pub fn body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }

    /// Use a known footprint instead of deriving one.
    pub fn footprint(mut self, footprint: impl Into<String>) -> Self {
        self.footprint = Some(footprint.into());
        self
    }

    pub fn build(self, footprinter: &Footprinter) -> RequestSnapshot {
        let server_name = self.url.host_str().unwrap_or_default().to_string();
        let footprint = self.footprint.unwrap_or_else(|| {
            footprinter.footprint(
                &self.cookies,
                self.ip.as_deref(),
                self.headers.get("user-agent").map(String::as_str),
                &server_name,
            )
        });

        let mut params = parse_query(&self.url);
        params.extend(self.body);

        RequestSnapshot {
            footprint,
            ip: self.ip,
            path: landing_path(&self.url),
            query: self
                .url
                .query()
                .filter(|query| !query.is_empty())
                .map(str::to_string),
            server_name,
            headers: self.headers,
            params,
        }
    }
}

fn landing_path(url: &Url) -> String {
    let trimmed = url.path().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Decode query pairs. `name[]` keys accumulate into lists, `name[key]` keys
/// into maps that keep arrival order; a repeated plain key keeps its last value.
fn parse_query(url: &Url) -> BTreeMap<String, Value> {
    let mut params = BTreeMap::new();

    for (key, value) in url.query_pairs() {
        let (name, index) = split_bracketed(&key);
        let value = Value::String(value.into_owned());

        match index {
            None => {
                params.insert(name.to_string(), value);
            }
            Some("") => match params.entry(name.to_string()) {
                Entry::Occupied(mut slot) => match slot.get_mut() {
                    Value::Array(items) => items.push(value),
                    Value::Object(entries) => {
                        let next = entries.len().to_string();
                        entries.insert(next, value);
                    }
                    current => *current = Value::Array(vec![value]),
                },
                Entry::Vacant(slot) => {
                    slot.insert(Value::Array(vec![value]));
                }
            },
            Some(index) => {
                let slot = params
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    let entries = match slot.take() {
                        Value::Array(items) => items
                            .into_iter()
                            .enumerate()
                            .map(|(position, item)| (position.to_string(), item))
                            .collect(),
                        _ => Map::new(),
                    };
                    *slot = Value::Object(entries);
                }
                if let Value::Object(entries) = slot {
                    entries.insert(index.to_string(), value);
                }
            }
        }
    }

    params
}

/// Split `name[index]` into `("name", Some("index"))`; `name[]` yields an
/// empty index. Anything else is a plain key.
fn split_bracketed(key: &str) -> (&str, Option<&str>) {
    let Some(inner) = key.strip_suffix(']') else {
        return (key, None);
    };
    match inner.split_once('[') {
        Some((name, index)) if !name.is_empty() => (name, index.split(']').next()),
        _ => (key, None),
    }
}
