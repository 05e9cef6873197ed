use std::sync::Arc;

use footprints::{
    AttributionCapture, Database, Footprinter, FootprintsConfig, RequestSnapshot, TrackedRequest,
};

fn campaign_request(footprinter: &Footprinter) -> RequestSnapshot {
    RequestSnapshot::builder("https://shop.example.com/?utm_source=ads&utm_medium=cpc&gclid=abc123")
        .unwrap()
        .remote_addr("198.51.100.20")
        .header("User-Agent", "Mozilla/5.0")
        .build(footprinter)
}

#[tokio::test]
async fn inline_tracking_persists_the_visit() {
    let db = Arc::new(Database::in_memory().unwrap());
    let config = FootprintsConfig::default();
    let footprinter = Footprinter::from_config(&config);
    let capture = AttributionCapture::with_queue(config, Arc::clone(&db)).unwrap();

    let request = capture
        .track(campaign_request(&footprinter), Some(42))
        .await
        .unwrap();

    let visits = db.get_visits_for_footprint(request.footprint()).await.unwrap();
    assert_eq!(visits.len(), 1);

    let visit = &visits[0];
    assert_eq!(visit.user_id, Some(42));
    assert_eq!(visit.utm_source.as_deref(), Some("ads"));
    assert_eq!(visit.utm_medium.as_deref(), Some("cpc"));
    assert_eq!(visit.utm_campaign, None);
    assert_eq!(visit.gclid.as_deref(), Some("abc123"));
    assert_eq!(visit.referrer_url, None);
    assert_eq!(visit.referrer_domain, None);
    assert_eq!(visit.ip, None);
    assert_eq!(visit.landing_domain, "shop.example.com");
    assert_eq!(visit.landing_page, "/");

    capture.shutdown().await.unwrap();
}

#[tokio::test]
async fn queued_tracking_lands_after_shutdown_and_can_be_claimed() {
    let db = Arc::new(Database::in_memory().unwrap());
    let config = FootprintsConfig {
        async_dispatch: true,
        attribution_ip: true,
        custom_parameters: vec!["affiliate".into()],
        ..FootprintsConfig::default()
    };
    let footprinter = Footprinter::from_config(&config);
    let capture = AttributionCapture::with_queue(config, Arc::clone(&db)).unwrap();

    let first = capture
        .track(campaign_request(&footprinter), None)
        .await
        .unwrap();
    let second = RequestSnapshot::builder("https://shop.example.com/checkout?affiliate=acme")
        .unwrap()
        .remote_addr("198.51.100.20")
        .header("User-Agent", "Mozilla/5.0")
        .header("Referer", "https://shop.example.com/?utm_source=ads")
        .build(&footprinter);
    capture.track(&second, None).await.unwrap();
    capture.shutdown().await.unwrap();

    // same client, same derived footprint
    assert_eq!(first.footprint(), second.footprint());

    let visits = db.get_visits_for_footprint(first.footprint()).await.unwrap();
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[0].ip.as_deref(), Some("198.51.100.20"));
    assert_eq!(visits[1].referrer_domain.as_deref(), Some("shop.example.com"));
    assert_eq!(
        visits[1].custom.get("affiliate").cloned().flatten(),
        Some("acme".into())
    );

    let claimed = db
        .assign_user_to_footprint(first.footprint(), 7)
        .await
        .unwrap();
    assert_eq!(claimed, 2);
    let first_touch = db.initial_visit(first.footprint()).await.unwrap().unwrap();
    assert_eq!(first_touch.user_id, Some(7));
    assert_eq!(first_touch.gclid.as_deref(), Some("abc123"));
}
