//! The two bounded scan procedures.
//!
//! Both run up to `max_attempts` attempts at a fixed cadence against a
//! [`FaceScanner`]. Enrollment keeps the highest-confidence qualifying
//! sample and turns it into the reference; verification tracks the
//! smallest distance to the reference and stops early on the first
//! match. Cancellation is coarse: the flag is only checked between
//! attempts, never mid-inference.

use crate::policy::ScanPolicy;
use crate::scanner::{FaceScanner, ScanError};
use facegate_core::{DetectionSample, ReferenceFace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcedureError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("no face met the {threshold} confidence threshold in {attempts} attempts")]
    NoQualifyingFace { threshold: f32, attempts: usize },
    #[error("scan cancelled")]
    Cancelled,
}

/// Shared cancellation flag, checked at attempt boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Successful enrollment: the new reference plus capture metadata.
#[derive(Debug)]
pub struct Enrollment {
    pub reference: ReferenceFace,
    /// Detector confidence of the winning sample.
    pub confidence: f32,
    pub attempts: usize,
}

/// Outcome of a verification scan.
#[derive(Debug, Clone)]
pub struct Verification {
    pub matched: bool,
    /// Smallest distance seen across all attempts; `None` when no
    /// sample could be compared (no face, or nothing enrolled).
    pub best_distance: Option<f32>,
    /// Attempts consumed; less than the budget on an early match.
    pub attempts: usize,
}

/// Run the enrollment procedure: sample up to `max_attempts` times and
/// keep the highest-confidence sample at or above the confidence
/// threshold. The budget is always exhausted — a later sample may beat
/// an earlier one.
pub fn run_enroll<S: FaceScanner>(
    scanner: &mut S,
    policy: &ScanPolicy,
    cancel: &CancelFlag,
    label: &str,
) -> Result<Enrollment, ProcedureError> {
    let mut best: Option<DetectionSample> = None;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(ProcedureError::Cancelled);
        }
        pace(policy);

        let Some(sample) = scanner.scan()? else {
            tracing::debug!(attempt, "no face in frame");
            continue;
        };

        let score = sample.confidence();
        let improves = best.as_ref().map_or(true, |b| score > b.confidence());
        if score >= policy.confidence_threshold && improves {
            tracing::debug!(attempt, score, "new best enrollment candidate");
            best = Some(sample);
        } else {
            tracing::trace!(attempt, score, "sample discarded");
        }
    }

    match best {
        Some(sample) => {
            let confidence = sample.confidence();
            tracing::info!(confidence, label, "enrollment succeeded");
            Ok(Enrollment {
                reference: ReferenceFace::new(label, sample.embedding),
                confidence,
                attempts: policy.max_attempts,
            })
        }
        None => Err(ProcedureError::NoQualifyingFace {
            threshold: policy.confidence_threshold,
            attempts: policy.max_attempts,
        }),
    }
}

/// Run the verification procedure: sample at the same cadence and
/// budget, comparing each sample's embedding to the reference. Succeeds
/// and returns immediately once a distance falls under the threshold.
///
/// With no reference enrolled, samples are still captured but nothing
/// can match, so the procedure fails after the full budget.
pub fn run_verify<S: FaceScanner>(
    scanner: &mut S,
    reference: Option<&ReferenceFace>,
    policy: &ScanPolicy,
    cancel: &CancelFlag,
) -> Result<Verification, ProcedureError> {
    let mut best_distance: Option<f32> = None;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(ProcedureError::Cancelled);
        }
        pace(policy);

        let Some(sample) = scanner.scan()? else {
            tracing::debug!(attempt, "no face in frame");
            continue;
        };

        let Some(reference) = reference else {
            tracing::debug!(attempt, "no reference enrolled; sample discarded");
            continue;
        };

        let m = reference.match_against(&sample.embedding);
        if best_distance.map_or(true, |d| m.distance < d) {
            best_distance = Some(m.distance);
        }

        if m.is_within(policy.distance_threshold) {
            tracing::info!(attempt, distance = m.distance, label = %m.label, "match accepted");
            return Ok(Verification {
                matched: true,
                best_distance,
                attempts: attempt,
            });
        }
        tracing::debug!(attempt, distance = m.distance, "no match yet");
    }

    tracing::info!(?best_distance, "verification exhausted its attempt budget");
    Ok(Verification {
        matched: false,
        best_distance,
        attempts: policy.max_attempts,
    })
}

/// Wait one sampling interval. The first sample lands a full interval
/// after the procedure starts, matching the capture cadence.
fn pace(policy: &ScanPolicy) {
    if !policy.interval.is_zero() {
        std::thread::sleep(policy.interval);
    }
}
