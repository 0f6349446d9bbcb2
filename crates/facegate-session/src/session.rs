//! Session actor: a dedicated engine thread owning the scanner and the
//! single reference face, driven through an async handle.
//!
//! The handle rejects a second enroll/verify while one is in flight
//! (`SessionError::Busy`) instead of queueing or interleaving them.

use crate::policy::ScanPolicy;
use crate::procedure::{self, CancelFlag, ProcedureError, Verification};
use crate::scanner::FaceScanner;
use facegate_core::ReferenceFace;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Label attached to the enrolled reference.
const REFERENCE_LABEL: &str = "user";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("another scan is already in progress")]
    Busy,
    #[error(transparent)]
    Procedure(#[from] ProcedureError),
    #[error("session thread exited")]
    ChannelClosed,
}

/// What the caller learns from a successful enrollment. The embedding
/// itself stays inside the session.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollSummary {
    pub label: String,
    pub confidence: f32,
    pub enrolled_at: String,
}

/// Snapshot of the session state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub enrolled: bool,
    pub label: Option<String>,
    pub enrolled_at: Option<String>,
}

enum SessionRequest {
    Enroll {
        reply: oneshot::Sender<Result<EnrollSummary, SessionError>>,
    },
    Verify {
        reply: oneshot::Sender<Result<Verification, SessionError>>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// Clone-safe async handle to the session thread.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
    busy: Arc<AtomicBool>,
    cancel: CancelFlag,
}

impl SessionHandle {
    /// Run an enrollment scan. On success the session's reference face
    /// is replaced (at most one exists at a time).
    pub async fn enroll(&self) -> Result<EnrollSummary, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(SessionRequest::Enroll { reply: reply_tx })?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Run a verification scan against the enrolled reference.
    pub async fn verify(&self) -> Result<Verification, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(SessionRequest::Verify { reply: reply_tx })?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Current session state. Never rejected, but waits for an
    /// in-flight scan to finish.
    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Request cancellation of the in-flight scan, if any. Takes
    /// effect at the next attempt boundary.
    pub fn cancel_scan(&self) {
        self.cancel.cancel();
    }

    /// Acquire the busy slot and queue a scan request.
    fn submit(&self, request: SessionRequest) -> Result<(), SessionError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(SessionError::Busy);
        }
        if let Err(e) = self.tx.try_send(request) {
            self.busy.store(false, Ordering::Release);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => SessionError::Busy,
                mpsc::error::TrySendError::Closed(_) => SessionError::ChannelClosed,
            });
        }
        Ok(())
    }
}

/// Spawn the session engine on a dedicated OS thread.
///
/// The thread owns the scanner and the reference face; it processes
/// one request at a time until every handle is dropped.
pub fn spawn_session<S>(mut scanner: S, policy: ScanPolicy) -> SessionHandle
where
    S: FaceScanner + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<SessionRequest>(1);
    let busy = Arc::new(AtomicBool::new(false));
    let cancel = CancelFlag::new();

    let thread_busy = busy.clone();
    let thread_cancel = cancel.clone();

    std::thread::Builder::new()
        .name("facegate-session".into())
        .spawn(move || {
            tracing::info!("session thread started");
            let mut reference: Option<ReferenceFace> = None;

            while let Some(request) = rx.blocking_recv() {
                match request {
                    SessionRequest::Enroll { reply } => {
                        thread_cancel.clear();
                        let result =
                            procedure::run_enroll(&mut scanner, &policy, &thread_cancel, REFERENCE_LABEL)
                                .map(|enrollment| {
                                    let summary = EnrollSummary {
                                        label: enrollment.reference.label.clone(),
                                        confidence: enrollment.confidence,
                                        enrolled_at: enrollment.reference.enrolled_at.to_rfc3339(),
                                    };
                                    reference = Some(enrollment.reference);
                                    summary
                                })
                                .map_err(SessionError::from);
                        thread_busy.store(false, Ordering::Release);
                        let _ = reply.send(result);
                    }
                    SessionRequest::Verify { reply } => {
                        thread_cancel.clear();
                        let result = procedure::run_verify(
                            &mut scanner,
                            reference.as_ref(),
                            &policy,
                            &thread_cancel,
                        )
                        .map_err(SessionError::from);
                        thread_busy.store(false, Ordering::Release);
                        let _ = reply.send(result);
                    }
                    SessionRequest::Status { reply } => {
                        let _ = reply.send(SessionStatus {
                            enrolled: reference.is_some(),
                            label: reference.as_ref().map(|r| r.label.clone()),
                            enrolled_at: reference.as_ref().map(|r| r.enrolled_at.to_rfc3339()),
                        });
                    }
                }
            }
            tracing::info!("session thread exiting");
        })
        .expect("failed to spawn session thread");

    SessionHandle { tx, busy, cancel }
}
