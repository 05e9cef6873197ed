//! Persisted visit model.
//!
//! A `Visit` is one recorded attribution record plus the user it belongs to,
//! if any. Non-text attribute values are stored in their display form.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Attribute, AttributionRecord, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: String,
    pub user_id: Option<UserId>,
    pub footprint: String,
    pub ip: Option<String>,
    pub landing_domain: String,
    pub landing_page: String,
    pub landing_params: Option<String>,
    pub referral: Option<String>,
    pub gclid: Option<String>,
    pub utm_source: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub referrer_url: Option<String>,
    pub referrer_domain: Option<String>,
    pub custom: BTreeMap<String, Option<Attribute>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    pub fn from_attribution(
        record: AttributionRecord,
        user_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        fn text(value: Option<Attribute>) -> Option<String> {
            value.map(|attribute| attribute.to_string())
        }

        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            footprint: record.footprint,
            ip: record.ip,
            landing_domain: record.landing_domain,
            landing_page: record.landing_page,
            landing_params: record.landing_params,
            referral: text(record.referral),
            gclid: text(record.gclid),
            utm_source: text(record.utm_source),
            utm_campaign: text(record.utm_campaign),
            utm_medium: text(record.utm_medium),
            utm_term: text(record.utm_term),
            utm_content: text(record.utm_content),
            referrer_url: record.referrer_url,
            referrer_domain: record.referrer_domain,
            custom: record.custom,
            created_at: now,
            updated_at: now,
        }
    }
}
