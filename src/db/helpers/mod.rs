use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::Attribute;

/// Fixed-width UTC timestamps, so string order in SQLite matches time order.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn custom_to_json(custom: &BTreeMap<String, Option<Attribute>>) -> Result<String> {
    serde_json::to_string(custom).context("failed to serialize custom attributes")
}

pub fn custom_from_json(raw: &str) -> Result<BTreeMap<String, Option<Attribute>>> {
    serde_json::from_str(raw).context("failed to parse custom attributes")
}
