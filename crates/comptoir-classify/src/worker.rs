// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The classification worker pool.
//!
//! Jobs arrive on an mpsc channel from the ingest paths. Each worker
//! loads the conversation, runs the status rules, then the folder stage
//! when an LLM is configured. A retryable failure puts the job back on
//! the queue after a capped backoff; after the last delay it is abandoned
//! for this cycle. The job carries only the conversation id, so the next
//! message on the conversation rebuilds it.
//!
//! On shutdown the pool finishes what is already queued, bounded by the
//! drain deadline; whatever still runs at the deadline is aborted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use comptoir_core::types::ConversationStatus;
use comptoir_core::{ClassifyJob, ComptoirError};
use comptoir_storage::Database;
use comptoir_storage::queries::conversations;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::folder::FolderClassifier;
use crate::status;

/// Messages loaded per conversation, feeding both stages.
const RECENT_CONTEXT: u32 = 10;

/// Requeue delays per failed attempt; after the last one the job is
/// dropped for this cycle.
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(30),
    Duration::from_secs(120),
    Duration::from_secs(600),
];

/// Everything a worker needs to classify one conversation.
#[derive(Clone)]
pub struct ClassifyContext {
    db: Database,
    resolved_keywords: Vec<String>,
    folder: Option<FolderClassifier>,
}

impl ClassifyContext {
    /// `folder` is `None` when no LLM key is configured; the status stage
    /// still runs.
    pub fn new(
        db: Database,
        resolved_keywords: Vec<String>,
        folder: Option<FolderClassifier>,
    ) -> Self {
        let resolved_keywords = resolved_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            db,
            resolved_keywords,
            folder,
        }
    }
}

struct WorkerShared {
    ctx: ClassifyContext,
    requeue: mpsc::Sender<ClassifyJob>,
    attempts: DashMap<String, usize>,
    cancel: CancellationToken,
}

/// Fixed pool of classification workers draining one queue.
pub struct ClassifyPool {
    handles: Vec<JoinHandle<()>>,
}

impl ClassifyPool {
    /// Spawn `workers` tasks on the current runtime.
    ///
    /// `tx` must send into the same channel `rx` drains; failed jobs go
    /// back through it after their backoff.
    pub fn spawn(
        workers: usize,
        ctx: ClassifyContext,
        tx: mpsc::Sender<ClassifyJob>,
        rx: mpsc::Receiver<ClassifyJob>,
        cancel: CancellationToken,
    ) -> Self {
        let shared = Arc::new(WorkerShared {
            ctx,
            requeue: tx,
            attempts: DashMap::new(),
            cancel,
        });
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..workers)
            .map(|worker| {
                let shared = shared.clone();
                let rx = rx.clone();
                tokio::spawn(async move { worker_loop(worker, shared, rx).await })
            })
            .collect();
        Self { handles }
    }

    /// Wait for the workers to stop after cancellation, up to `limit`;
    /// whatever is still running at the deadline is aborted.
    pub async fn drain(self, limit: Duration) {
        let deadline = tokio::time::Instant::now() + limit;
        for mut handle in self.handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                warn!("classification worker aborted at the drain deadline");
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    shared: Arc<WorkerShared>,
    rx: Arc<Mutex<mpsc::Receiver<ClassifyJob>>>,
) {
    debug!(worker, "classification worker started");
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                job = rx.recv() => job,
                // After cancellation: hand over what is already queued,
                // stop once the queue is empty.
                _ = shared.cancel.cancelled() => rx.try_recv().ok(),
            }
        };
        let Some(job) = next else { break };
        process(&shared, job).await;
    }
    debug!(worker, "classification worker stopped");
}

async fn process(shared: &WorkerShared, job: ClassifyJob) {
    let conversation_id = job.conversation_id.clone();
    match classify_conversation(&shared.ctx, &conversation_id).await {
        Ok(()) => {
            shared.attempts.remove(&conversation_id);
        }
        Err(e) if e.is_retryable() => {
            let attempt = {
                let mut entry = shared.attempts.entry(conversation_id.clone()).or_insert(0);
                *entry += 1;
                *entry
            };
            match retry_delay(attempt) {
                Some(delay) => {
                    warn!(
                        conversation_id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "classification failed, requeueing"
                    );
                    let requeue = shared.requeue.clone();
                    let cancel = shared.cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {
                                let conversation_id = job.conversation_id.clone();
                                if requeue.try_send(job).is_err() {
                                    warn!(
                                        conversation_id = %conversation_id,
                                        "classification queue full, requeue dropped"
                                    );
                                }
                            }
                            _ = cancel.cancelled() => {}
                        }
                    });
                }
                None => {
                    warn!(
                        conversation_id,
                        attempt,
                        error = %e,
                        "classification abandoned for this cycle"
                    );
                    shared.attempts.remove(&conversation_id);
                }
            }
        }
        Err(e) => {
            warn!(conversation_id, error = %e, "classification failed, not retryable");
            shared.attempts.remove(&conversation_id);
        }
    }
}

/// Backoff delay for the n-th failed attempt (1-based); `None` abandons.
fn retry_delay(attempt: usize) -> Option<Duration> {
    RETRY_DELAYS.get(attempt - 1).copied()
}

async fn classify_conversation(
    ctx: &ClassifyContext,
    conversation_id: &str,
) -> Result<(), ComptoirError> {
    let Some(conversation) = conversations::get(&ctx.db, conversation_id).await? else {
        debug!(conversation_id, "conversation vanished before classification");
        return Ok(());
    };
    if conversation.status == ConversationStatus::Archived {
        return Ok(());
    }

    let messages = conversations::recent_messages(&ctx.db, conversation_id, RECENT_CONTEXT).await?;

    let now = Utc::now();
    let next = status::evaluate(&conversation, &messages, &ctx.resolved_keywords, now);
    if next != conversation.status {
        conversations::set_status(&ctx.db, conversation_id, next, now).await?;
        info!(
            conversation_id,
            from = %conversation.status,
            to = %next,
            "conversation status updated"
        );
    }

    if let Some(folder) = &ctx.folder {
        if let Some(folder_id) = folder.classify(&conversation, &messages).await? {
            if conversation.folder_id.as_deref() != Some(folder_id.as_str()) {
                conversations::set_folder(&ctx.db, conversation_id, Some(&folder_id), now).await?;
                info!(conversation_id, folder_id, "conversation routed into folder");
            }
        }
    }

    Ok(())
}
