use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Identifier of an authenticated user, as issued by the host application.
pub type UserId = i64;

/// A single normalized attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attribute {
    Text(String),
    Number(Number),
    Bool(bool),
}

impl Attribute {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attribute::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Text(text) => f.write_str(text),
            Attribute::Number(number) => write!(f, "{number}"),
            Attribute::Bool(flag) => write!(f, "{flag}"),
        }
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::Text(value.to_string())
    }
}

/// Attribution metadata captured from one inbound request.
///
/// Every key is always present; absent inputs are `None`. Strings are capped
/// at [`MAX_ATTRIBUTE_CHARS`](crate::MAX_ATTRIBUTE_CHARS) characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRecord {
    pub footprint: String,
    pub ip: Option<String>,
    pub landing_domain: String,
    pub landing_page: String,
    pub landing_params: Option<String>,
    pub referral: Option<Attribute>,
    pub gclid: Option<Attribute>,
    pub utm_source: Option<Attribute>,
    pub utm_campaign: Option<Attribute>,
    pub utm_medium: Option<Attribute>,
    pub utm_term: Option<Attribute>,
    pub utm_content: Option<Attribute>,
    pub referrer_url: Option<String>,
    pub referrer_domain: Option<String>,
    /// Values of the configured custom parameters, keyed by parameter name.
    #[serde(default)]
    pub custom: BTreeMap<String, Option<Attribute>>,
}

impl AttributionRecord {
    /// Keys of the built-in fields, in assembly order.
    pub const FIXED_KEYS: [&'static str; 16] = [
        "footprint",
        "ip",
        "landing_domain",
        "landing_page",
        "landing_params",
        "referral",
        "gclid",
        "utm_source",
        "utm_campaign",
        "utm_medium",
        "utm_term",
        "utm_content",
        "referrer_url",
        "referrer_domain",
        // reserved by the visit itself
        "user_id",
        "custom",
    ];

    pub fn custom_value(&self, name: &str) -> Option<&Attribute> {
        self.custom.get(name).and_then(Option::as_ref)
    }
}
