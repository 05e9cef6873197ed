use std::collections::BTreeMap;

use url::Url;

use crate::{
    config::FootprintsConfig,
    models::{Attribute, AttributionRecord},
    request::TrackedRequest,
};

use super::normalize::{normalize_value, truncate, truncate_owned};

const UTM_PARAMETERS: [&str; 5] = [
    "utm_source",
    "utm_campaign",
    "utm_medium",
    "utm_term",
    "utm_content",
];

/// Build the attribution record for one request. Pure; never fails.
pub fn capture_attribution<Q>(request: &Q, config: &FootprintsConfig) -> AttributionRecord
where
    Q: TrackedRequest + ?Sized,
{
    let [utm_source, utm_campaign, utm_medium, utm_term, utm_content] = capture_utm(request);
    let (referrer_url, referrer_domain) = capture_referrer(request);

    AttributionRecord {
        footprint: truncate(request.footprint()),
        ip: capture_ip(request, config),
        landing_domain: truncate(request.server_name()),
        landing_page: truncate(request.path()),
        landing_params: request.query_string().map(truncate),
        referral: capture_input(request, "ref"),
        gclid: capture_input(request, "gclid"),
        utm_source,
        utm_campaign,
        utm_medium,
        utm_term,
        utm_content,
        referrer_url,
        referrer_domain,
        custom: capture_custom(request, &config.custom_parameters),
    }
}

fn capture_ip<Q: TrackedRequest + ?Sized>(request: &Q, config: &FootprintsConfig) -> Option<String> {
    if !config.attribution_ip {
        return None;
    }
    request.ip().map(truncate)
}

fn capture_input<Q: TrackedRequest + ?Sized>(request: &Q, name: &str) -> Option<Attribute> {
    request.input(name).cloned().and_then(normalize_value)
}

fn capture_utm<Q: TrackedRequest + ?Sized>(request: &Q) -> [Option<Attribute>; 5] {
    UTM_PARAMETERS.map(|name| {
        if request.has(name) {
            capture_input(request, name)
        } else {
            None
        }
    })
}

fn capture_referrer<Q: TrackedRequest + ?Sized>(request: &Q) -> (Option<String>, Option<String>) {
    let Some(url) = request.header("referer") else {
        return (None, None);
    };

    let domain = referrer_host(url).map(truncate_owned);
    (Some(truncate(url)), domain)
}

/// Host component of a referrer, if it parses as an absolute URL with a host.
pub fn referrer_host(referrer: &str) -> Option<String> {
    let parsed = Url::parse(referrer).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

fn capture_custom<Q: TrackedRequest + ?Sized>(
    request: &Q,
    names: &[String],
) -> BTreeMap<String, Option<Attribute>> {
    names
        .iter()
        .map(|name| (name.clone(), capture_input(request, name)))
        .collect()
}
