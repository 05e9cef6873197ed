use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        Mutex,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::{Dispatcher, TrackVisit, VisitRecorder};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// In-process visit queue backed by a single worker task.
///
/// Jobs travel through the channel serialized, so anything that cannot be
/// serialized is rejected at dispatch time rather than inside the worker.
pub struct JobQueue {
    sender: mpsc::Sender<String>,
    cancel_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn start<R: VisitRecorder>(recorder: Arc<R>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(run_worker(receiver, recorder, cancel_token.clone()));

        Self {
            sender,
            cancel_token,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Jobs accepted but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Stop accepting work, drain what is already queued, and wait for the worker.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel_token.cancel();

        if let Some(handle) = self.worker.lock().await.take() {
            handle.await.context("visit queue worker failed to join")
        } else {
            Ok(())
        }
    }
}

impl Dispatcher for JobQueue {
    fn dispatch(&self, job: TrackVisit) -> Result<()> {
        if self.cancel_token.is_cancelled() {
            return Err(anyhow!("visit queue is shutting down"));
        }

        let payload = job.to_payload()?;
        self.sender.try_send(payload).map_err(|err| match err {
            TrySendError::Full(_) => anyhow!(
                "visit queue is full ({} jobs pending)",
                self.sender.max_capacity()
            ),
            TrySendError::Closed(_) => anyhow!("visit queue is closed"),
        })?;

        log_debug!("queued visit for footprint {}", job.attributes.footprint);
        Ok(())
    }
}

async fn run_worker<R: VisitRecorder>(
    mut receiver: mpsc::Receiver<String>,
    recorder: Arc<R>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            payload = receiver.recv() => {
                match payload {
                    Some(payload) => process(&payload, recorder.as_ref()).await,
                    None => break,
                }
            }
            _ = cancel_token.cancelled() => {
                receiver.close();
                let mut drained = 0usize;
                while let Some(payload) = receiver.recv().await {
                    process(&payload, recorder.as_ref()).await;
                    drained += 1;
                }
                log_info!("visit queue shutting down after draining {drained} jobs");
                break;
            }
        }
    }
}

async fn process<R: VisitRecorder>(payload: &str, recorder: &R) {
    let job = match TrackVisit::from_payload(payload) {
        Ok(job) => job,
        Err(err) => {
            log_error!("dropping undecodable visit job: {err:?}");
            return;
        }
    };

    let footprint = job.attributes.footprint.clone();
    if let Err(err) = job.handle(recorder).await {
        log_error!("failed to record visit for footprint {footprint}: {err:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::MemoryRecorder;
    use crate::models::AttributionRecord;

    fn job(footprint: &str) -> TrackVisit {
        TrackVisit::new(
            AttributionRecord {
                footprint: footprint.into(),
                ip: None,
                landing_domain: "example.com".into(),
                landing_page: "/".into(),
                landing_params: None,
                referral: None,
                gclid: None,
                utm_source: None,
                utm_campaign: None,
                utm_medium: None,
                utm_term: None,
                utm_content: None,
                referrer_url: None,
                referrer_domain: None,
                custom: Default::default(),
            },
            None,
        )
    }

    #[tokio::test]
    async fn queued_jobs_are_recorded_by_shutdown() {
        let recorder = Arc::new(MemoryRecorder::default());
        let queue = JobQueue::start(Arc::clone(&recorder), 16);

        queue.dispatch(job("a")).unwrap();
        queue.dispatch(job("b")).unwrap();
        queue.shutdown().await.unwrap();

        let footprints: Vec<_> = recorder
            .recorded()
            .into_iter()
            .map(|visit| visit.footprint)
            .collect();
        assert_eq!(footprints, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_fails() {
        let recorder = Arc::new(MemoryRecorder::default());
        let queue = JobQueue::start(recorder, 4);
        queue.shutdown().await.unwrap();

        assert!(queue.dispatch(job("late")).is_err());
        // second shutdown is a no-op
        queue.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_rejects_dispatch() {
        let recorder = Arc::new(MemoryRecorder::default());
        let queue = JobQueue::start(Arc::clone(&recorder), 1);

        // The worker cannot run until this task yields, so the single slot stays taken.
        queue.dispatch(job("first")).unwrap();
        assert_eq!(queue.pending(), 1);
        let err = queue.dispatch(job("second")).unwrap_err();
        assert!(err.to_string().contains("full"));

        queue.shutdown().await.unwrap();
        assert_eq!(recorder.recorded().len(), 1);
    }

    #[tokio::test]
    async fn recorder_failures_stay_inside_the_worker() {
        let recorder = Arc::new(MemoryRecorder::failing());
        let queue = JobQueue::start(Arc::clone(&recorder), 4);

        queue.dispatch(job("x")).unwrap();
        queue.shutdown().await.unwrap();
        assert!(recorder.recorded().is_empty());
    }
}
