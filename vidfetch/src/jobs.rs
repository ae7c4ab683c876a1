use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Semaphore, watch};
use tracing::{info, warn};

use crate::pipeline::ProcessResponse;
use crate::storage::VideoId;

/// Snapshot of an in-flight job. `started_at` is unset while the job
/// waits for a free slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobInfo {
    pub id: VideoId,
    pub url: String,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

struct InFlight {
    info: JobInfo,
    result_rx: watch::Receiver<Option<ProcessResponse>>,
}

type InFlightMap = Arc<Mutex<HashMap<VideoId, InFlight>>>;

/// Removes the in-flight entry when the job task ends, even on panic.
struct EntryGuard {
    jobs: InFlightMap,
    id: VideoId,
}

impl EntryGuard {
    fn mark_started(&self) {
        if let Some(job) = self.jobs.lock().get_mut(&self.id) {
            job.info.started_at = Some(Utc::now());
        }
    }
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        self.jobs.lock().remove(&self.id);
    }
}

/**
    Runs processing jobs with bounded concurrency.

    Jobs run on their own task, so a client that disconnects does not
    cancel a download halfway through. Submitting an id that is already
    in flight attaches to the running job instead of starting another.
*/
pub struct JobStore {
    slots: Arc<Semaphore>,
    jobs: InFlightMap,
}

impl JobStore {
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /**
        Run `job` for `id`, or wait for the job already running for it.
    */
    pub async fn submit<Fut>(&self, id: VideoId, url: String, job: Fut) -> ProcessResponse
    where
        Fut: Future<Output = ProcessResponse> + Send + 'static,
    {
        let result_rx = {
            let mut jobs = self.jobs.lock();
            match jobs.get(&id) {
                Some(existing) => {
                    info!("[jobs] Job {} already in flight, waiting for it", id);
                    existing.result_rx.clone()
                }
                None => {
                    let (result_tx, result_rx) = watch::channel(None);
                    jobs.insert(
                        id.clone(),
                        InFlight {
                            info: JobInfo {
                                id: id.clone(),
                                url,
                                submitted_at: Utc::now(),
                                started_at: None,
                            },
                            result_rx: result_rx.clone(),
                        },
                    );
                    self.spawn(id, job, result_tx);
                    result_rx
                }
            }
        };

        wait_for_result(result_rx).await
    }

    fn spawn<Fut>(
        &self,
        id: VideoId,
        job: Fut,
        result_tx: watch::Sender<Option<ProcessResponse>>,
    ) where
        Fut: Future<Output = ProcessResponse> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let guard = EntryGuard {
            jobs: Arc::clone(&self.jobs),
            id,
        };

        tokio::spawn(async move {
            let response = match slots.acquire_owned().await {
                Ok(_permit) => {
                    guard.mark_started();
                    info!("[jobs] Starting job {}", guard.id);
                    job.await
                }
                Err(_) => ProcessResponse::error("Job queue closed"),
            };
            let _ = result_tx.send(Some(response));
            drop(guard);
        });
    }

    /// In-flight jobs, oldest first.
    pub fn list(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self
            .jobs
            .lock()
            .values()
            .map(|job| job.info.clone())
            .collect();
        jobs.sort_by_key(|job| job.submitted_at);
        jobs
    }

    /// Stop handing out slots. Queued jobs fail, running ones finish.
    pub fn close(&self) {
        self.slots.close();
    }
}

async fn wait_for_result(
    mut result_rx: watch::Receiver<Option<ProcessResponse>>,
) -> ProcessResponse {
    loop {
        if let Some(response) = result_rx.borrow_and_update().clone() {
            return response;
        }
        if result_rx.changed().await.is_err() {
            warn!("[jobs] Job ended without reporting a result");
            return result_rx.borrow().clone().unwrap_or_else(|| {
                ProcessResponse::error("Job aborted. Check server logs for details.")
            });
        }
    }
}
