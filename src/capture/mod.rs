//! Attribution capture.
//!
//! [`AttributionCapture::track`] turns one inbound request into exactly one
//! recording action: either the visit is written before `track` returns, or a
//! job is handed to the dispatcher and `track` returns immediately.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    config::FootprintsConfig,
    jobs::{Dispatcher, JobQueue, TrackVisit, VisitRecorder},
    models::{AttributionRecord, UserId},
    request::TrackedRequest,
};

mod extract;
mod normalize;

pub use extract::{capture_attribution, referrer_host};
pub use normalize::{normalize_value, truncate, MAX_ATTRIBUTE_CHARS};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

pub struct AttributionCapture<R, D> {
    config: FootprintsConfig,
    recorder: Arc<R>,
    dispatcher: D,
}

impl<R: VisitRecorder, D: Dispatcher> AttributionCapture<R, D> {
    pub fn new(config: FootprintsConfig, recorder: Arc<R>, dispatcher: D) -> Result<Self> {
        config
            .validate()
            .context("invalid attribution configuration")?;

        Ok(Self {
            config,
            recorder,
            dispatcher,
        })
    }

    pub fn config(&self) -> &FootprintsConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Derive the attribution record for a request without recording it.
    pub fn capture<Q: TrackedRequest + ?Sized>(&self, request: &Q) -> AttributionRecord {
        capture_attribution(request, &self.config)
    }

    /// Record a visit for `request` and hand the request back.
    ///
    /// With `async` enabled the job is only queued; failures after hand-off are
    /// the queue's to handle. Otherwise recording errors surface here.
    pub async fn track<Q: TrackedRequest>(
        &self,
        request: Q,
        current_user: Option<UserId>,
    ) -> Result<Q> {
        let job = TrackVisit::new(self.capture(&request), current_user);

        if self.config.async_dispatch {
            self.dispatcher
                .dispatch(job)
                .context("failed to queue visit")?;
        } else {
            log_debug!("recording visit for footprint {}", request.footprint());
            job.handle(self.recorder.as_ref())
                .await
                .context("failed to record visit")?;
        }

        Ok(request)
    }
}

impl<R: VisitRecorder> AttributionCapture<R, JobQueue> {
    /// Build a capture whose deferred jobs run on an in-process [`JobQueue`]
    /// feeding the same recorder. Must be called inside a tokio runtime.
    pub fn with_queue(config: FootprintsConfig, recorder: Arc<R>) -> Result<Self> {
        config
            .validate()
            .context("invalid attribution configuration")?;
        let dispatcher = JobQueue::start(Arc::clone(&recorder), config.queue_capacity);

        Ok(Self {
            config,
            recorder,
            dispatcher,
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.dispatcher.shutdown().await
    }
}
