//! Visit recording jobs.
//!
//! A [`TrackVisit`] job carries one attribution record and the user it should
//! be credited to. It is either handled in-line against a [`VisitRecorder`] or
//! handed to a [`Dispatcher`] (normally the [`JobQueue`]) to run later.

use std::future::Future;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::Visit,
    models::{AttributionRecord, UserId},
};

mod queue;

pub use queue::JobQueue;

/// Sink for recorded visits.
pub trait VisitRecorder: Send + Sync + 'static {
    fn record(&self, visit: Visit) -> impl Future<Output = Result<()>> + Send;
}

/// Facility accepting jobs for deferred execution.
///
/// `dispatch` only hands the job off; it must not wait for the job to run.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: TrackVisit) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackVisit {
    pub attributes: AttributionRecord,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl TrackVisit {
    pub fn new(attributes: AttributionRecord, user_id: Option<UserId>) -> Self {
        Self {
            attributes,
            user_id,
            created_at: Utc::now(),
        }
    }

    /// Record the visit now. The visit is stamped with the time the job was
    /// created, not the time it ran.
    pub async fn handle<R: VisitRecorder>(self, recorder: &R) -> Result<()> {
        let visit = Visit::from_attribution(self.attributes, self.user_id, self.created_at);
        recorder.record(visit).await
    }

    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize visit job")
    }

    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).context("failed to deserialize visit job")
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use anyhow::{bail, Result};

    use super::{Dispatcher, TrackVisit, VisitRecorder};
    use crate::db::Visit;

    /// Recorder keeping visits in memory; optionally failing every call.
    #[derive(Default)]
    pub struct MemoryRecorder {
        pub visits: Mutex<Vec<Visit>>,
        pub fail: bool,
    }

    impl MemoryRecorder {
        pub fn failing() -> Self {
            Self {
                visits: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn recorded(&self) -> Vec<Visit> {
            self.visits.lock().unwrap().clone()
        }
    }

    impl VisitRecorder for MemoryRecorder {
        async fn record(&self, visit: Visit) -> Result<()> {
            if self.fail {
                bail!("visit store unavailable");
            }
            self.visits.lock().unwrap().push(visit);
            Ok(())
        }
    }

    /// Dispatcher that only remembers what it was handed.
    #[derive(Default)]
    pub struct CollectingDispatcher {
        pub jobs: Mutex<Vec<TrackVisit>>,
    }

    impl CollectingDispatcher {
        pub fn dispatched(&self) -> Vec<TrackVisit> {
            self.jobs.lock().unwrap().clone()
        }
    }

    impl Dispatcher for CollectingDispatcher {
        fn dispatch(&self, job: TrackVisit) -> Result<()> {
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryRecorder;
    use super::*;
    use crate::models::Attribute;

    fn record() -> AttributionRecord {
        AttributionRecord {
            footprint: "fp".into(),
            ip: None,
            landing_domain: "example.com".into(),
            landing_page: "/".into(),
            landing_params: Some("utm_source=ads&count=2".into()),
            referral: None,
            gclid: None,
            utm_source: Some("ads".into()),
            utm_campaign: None,
            utm_medium: None,
            utm_term: None,
            utm_content: Some(Attribute::Number(2.into())),
            referrer_url: None,
            referrer_domain: None,
            custom: [("affiliate".to_string(), None)].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn handle_records_one_visit() {
        let recorder = MemoryRecorder::default();
        let job = TrackVisit::new(record(), Some(42));
        let created_at = job.created_at;

        job.handle(&recorder).await.unwrap();

        let visits = recorder.recorded();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].user_id, Some(42));
        assert_eq!(visits[0].utm_source.as_deref(), Some("ads"));
        assert_eq!(visits[0].utm_content.as_deref(), Some("2"));
        assert_eq!(visits[0].created_at, created_at);
        assert_eq!(visits[0].custom.get("affiliate"), Some(&None));
    }

    #[tokio::test]
    async fn handle_propagates_recorder_failure() {
        let recorder = MemoryRecorder::failing();
        let err = TrackVisit::new(record(), None)
            .handle(&recorder)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }

    #[test]
    fn payload_preserves_the_job() {
        let job = TrackVisit::new(record(), None);
        let decoded = TrackVisit::from_payload(&job.to_payload().unwrap()).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(TrackVisit::from_payload("{\"attributes\": 3}").is_err());
    }
}
